// assay-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum DomainError {
    #[error("Parse error: {0}")]
    #[diagnostic(
        code(assay::domain::parse),
        help("Check the formula, regular expression or date format of the rule.")
    )]
    Parse(String),

    #[error("Column '{column}' not found in table '{table}'")]
    #[diagnostic(code(assay::domain::missing_column))]
    MissingColumn { table: String, column: String },

    #[error("Table '{0}' not found in dataset")]
    #[diagnostic(code(assay::domain::unknown_table))]
    UnknownTable(String),

    #[error("Type mismatch: {0}")]
    #[diagnostic(code(assay::domain::type_mismatch))]
    TypeMismatch(String),

    #[error("Evaluation error: {0}")]
    #[diagnostic(code(assay::domain::evaluation))]
    Evaluation(String),

    #[error("Invalid rule '{rule_id}': {reason}")]
    #[diagnostic(
        code(assay::domain::invalid_rule),
        help("Fix the rule parameters; the rule cannot run until it is valid.")
    )]
    InvalidRule { rule_id: String, reason: String },
}

impl DomainError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn missing_column(table: &str, column: &str) -> Self {
        Self::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
