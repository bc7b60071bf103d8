// assay-core/src/application/report.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::result::{ResultSeverity, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub rule_id: String,
    pub rule_name: String,
    pub table: String,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl RuleSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.warnings
    }
}

/// Counts of one validation pass, per rule (in rule order) and overall.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub rules: Vec<RuleSummary>,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl PassSummary {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut by_rule: IndexMap<&str, RuleSummary> = IndexMap::new();

        for result in results {
            let entry = by_rule
                .entry(result.rule_id.as_str())
                .or_insert_with(|| RuleSummary {
                    rule_id: result.rule_id.clone(),
                    rule_name: result.rule_name.clone(),
                    table: result.table.clone(),
                    ..Default::default()
                });
            match result.severity {
                ResultSeverity::Success => entry.passed += 1,
                ResultSeverity::Failure => entry.failed += 1,
                ResultSeverity::Warning => entry.warnings += 1,
            }
        }

        let rules: Vec<RuleSummary> = by_rule.into_values().collect();
        Self {
            passed: rules.iter().map(|r| r.passed).sum(),
            failed: rules.iter().map(|r| r.failed).sum(),
            warnings: rules.iter().map(|r| r.warnings).sum(),
            rules,
        }
    }

    /// No failures, and no warnings either when `fail_on_warning` is set.
    pub fn is_success(&self, fail_on_warning: bool) -> bool {
        self.failed == 0 && (!fail_on_warning || self.warnings == 0)
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.warnings
    }
}
