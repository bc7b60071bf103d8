// assay-core/src/application/lint.rs

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::instrument;
use validator::Validate;

use crate::domain::condition::chain_issues;
use crate::domain::data::DataTables;
use crate::domain::rules::{CompiledRule, DataQualityRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Error,
    Warning,
}

impl fmt::Display for LintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintIssue {
    pub rule_id: String,
    pub level: LintLevel,
    pub message: String,
}

impl LintIssue {
    fn error(rule: &DataQualityRule, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: LintLevel::Error,
            message: message.into(),
        }
    }

    fn warning(rule: &DataQualityRule, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            level: LintLevel::Warning,
            message: message.into(),
        }
    }
}

/// Checks rule definitions against a snapshot without judging any row.
///
/// Errors are what would turn into rule-level failures during a pass
/// (invalid fields, duplicate ids, unknown tables or columns, bad patterns).
/// Warnings cover chains with missing or dangling logical operators and
/// ragged tables.
#[instrument(skip_all, fields(rules = rules.len()))]
pub fn lint_rules(rules: &[DataQualityRule], tables: &DataTables) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut checked_tables = HashSet::new();

    for rule in rules {
        if let Err(errors) = rule.validate() {
            for (field, errs) in errors.field_errors() {
                for err in errs {
                    let detail = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    issues.push(LintIssue::error(rule, format!("{}: {}", field, detail)));
                }
            }
        }

        if !seen_ids.insert(rule.id.as_str()) {
            issues.push(LintIssue::error(rule, format!("duplicate rule id '{}'", rule.id)));
        }

        if let Err(e) = CompiledRule::compile(rule, tables) {
            issues.push(LintIssue::error(rule, e.to_string()));
        }

        for issue in chain_issues(&rule.conditions) {
            issues.push(LintIssue::warning(rule, issue));
        }
        for issue in chain_issues(rule.cross_table_conditions.iter().map(|c| &c.condition)) {
            issues.push(LintIssue::warning(rule, format!("cross-table {}", issue)));
        }

        if checked_tables.insert(rule.table.as_str()) {
            if let Some(table) = tables.get(&rule.table) {
                let ragged = table.shape_violations();
                if !ragged.is_empty() {
                    issues.push(LintIssue::warning(
                        rule,
                        format!(
                            "table '{}' has {} row(s) whose columns differ from the first row",
                            rule.table,
                            ragged.len()
                        ),
                    ));
                }
            }
        }
    }

    issues
}
