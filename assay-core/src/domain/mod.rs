// assay-core/src/domain/mod.rs

pub mod aggregation;
pub mod condition;
pub mod data;
pub mod error;
pub mod expression;
pub mod result;
pub mod rules;

pub use error::DomainError;
