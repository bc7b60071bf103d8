// assay-core/src/domain/data/mod.rs

pub mod compare;
pub mod table;
pub mod value;

pub use compare::ComparisonOperator;
pub use table::{DataRecord, DataTable, DataTables, ShapeViolation, record};
pub use value::Value;
