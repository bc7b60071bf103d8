// assay-core/src/infrastructure/store/mod.rs

pub mod datasets;
pub mod rules;

pub use datasets::JsonDatasetSource;
pub use rules::{DocumentFormat, FileRuleRepository};
