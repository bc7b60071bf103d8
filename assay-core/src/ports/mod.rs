// assay-core/src/ports/mod.rs

pub mod store;

pub use store::{DatasetSource, LoadedRules, RejectedRule, RuleRepository};
