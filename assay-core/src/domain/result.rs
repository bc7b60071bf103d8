// assay-core/src/domain/result.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use super::rules::{DataQualityRule, Severity};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResultSeverity {
    Failure,
    Warning,
    Success,
}

impl ResultSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Warning => "warning",
            Self::Success => "success",
        }
    }
}

impl From<Severity> for ResultSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Failure => Self::Failure,
            Severity::Warning => Self::Warning,
        }
    }
}

impl fmt::Display for ResultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One verdict of a validation pass. `row_index` is `None` for rule-level
/// diagnostics (the rule could not run at all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub table: String,
    pub rule_id: String,
    pub rule_name: String,
    pub column: String,
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub severity: ResultSeverity,
    pub message: String,
}

impl ValidationResult {
    fn base(rule: &DataQualityRule, row_index: Option<usize>, severity: ResultSeverity, message: String) -> Self {
        Self {
            table: rule.table.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            column: rule.column.clone(),
            row_index,
            group: None,
            severity,
            message,
        }
    }

    pub fn success(rule: &DataQualityRule, row_index: usize, message: impl Into<String>) -> Self {
        Self::base(rule, Some(row_index), ResultSeverity::Success, message.into())
    }

    /// A failed check, reported with the rule's own severity.
    pub fn violation(rule: &DataQualityRule, row_index: usize, message: impl Into<String>) -> Self {
        Self::base(rule, Some(row_index), rule.severity.into(), message.into())
    }

    /// An error caught while judging a row. Always a failure.
    pub fn row_error(rule: &DataQualityRule, row_index: usize, message: impl Into<String>) -> Self {
        Self::base(rule, Some(row_index), ResultSeverity::Failure, message.into())
    }

    /// The rule could not be compiled against the snapshot.
    pub fn rule_error(rule: &DataQualityRule, message: impl Into<String>) -> Self {
        Self::base(rule, None, ResultSeverity::Failure, message.into())
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }

    pub fn is_success(&self) -> bool {
        self.severity == ResultSeverity::Success
    }
}
