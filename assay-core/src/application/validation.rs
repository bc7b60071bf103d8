// assay-core/src/application/validation.rs

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::domain::data::DataTables;
use crate::domain::result::ValidationResult;
use crate::domain::rules::{CompiledRule, DataQualityRule, Outcome, RowVerdict};

/// Lifecycle of a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    #[default]
    Idle,
    Running,
    Done,
}

/// One evaluation of all enabled rules against a snapshot. The pass borrows
/// the rules and tables and owns the results it produces.
#[derive(Debug)]
pub struct ValidationPass<'a> {
    rules: &'a [DataQualityRule],
    tables: &'a DataTables,
    state: PassState,
    results: Vec<ValidationResult>,
}

impl<'a> ValidationPass<'a> {
    pub fn new(rules: &'a [DataQualityRule], tables: &'a DataTables) -> Self {
        Self {
            rules,
            tables,
            state: PassState::Idle,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    /// Runs the pass. A second call discards the previous results and
    /// produces identical ones.
    pub fn run(&mut self, parallel: bool) -> &[ValidationResult] {
        self.state = PassState::Running;
        self.results.clear();

        self.results = if parallel {
            self.rules
                .par_iter()
                .map(|rule| evaluate_rule(rule, self.tables))
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        } else {
            self.rules
                .iter()
                .flat_map(|rule| evaluate_rule(rule, self.tables))
                .collect()
        };

        self.state = PassState::Done;
        &self.results
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ValidationResult> {
        self.results
    }
}

/// Evaluates every enabled rule against `tables`. Results are ordered by
/// rule declaration, then by row index.
#[instrument(skip_all, fields(rules = rules.len(), tables = tables.len()))]
pub fn evaluate(rules: &[DataQualityRule], tables: &DataTables) -> Vec<ValidationResult> {
    let mut pass = ValidationPass::new(rules, tables);
    pass.run(false);
    let results = pass.into_results();
    info!(results = results.len(), "Validation pass finished");
    results
}

/// Same as [`evaluate`], with rules spread over the rayon thread pool.
/// The output is identical to the sequential pass.
#[instrument(skip_all, fields(rules = rules.len(), tables = tables.len()))]
pub fn evaluate_parallel(rules: &[DataQualityRule], tables: &DataTables) -> Vec<ValidationResult> {
    let mut pass = ValidationPass::new(rules, tables);
    pass.run(true);
    let results = pass.into_results();
    info!(results = results.len(), "Parallel validation pass finished");
    results
}

/// Results of a single rule. Errors never escape: a rule that cannot be
/// compiled yields one rule-level failure, a row that cannot be judged
/// yields one failure for that row.
pub fn evaluate_rule(rule: &DataQualityRule, tables: &DataTables) -> Vec<ValidationResult> {
    if !rule.enabled {
        debug!(rule = %rule.id, "Skipping disabled rule");
        return Vec::new();
    }

    let compiled = match CompiledRule::compile(rule, tables) {
        Ok(c) => c,
        Err(e) => {
            warn!(rule = %rule.id, error = %e, "Rule cannot run");
            return vec![ValidationResult::rule_error(rule, e.to_string())];
        }
    };

    compiled
        .verdicts()
        .into_iter()
        .filter_map(|verdict| to_result(rule, verdict))
        .collect()
}

fn to_result(rule: &DataQualityRule, verdict: RowVerdict) -> Option<ValidationResult> {
    let RowVerdict {
        row_index,
        group,
        outcome,
    } = verdict;
    let result = match outcome {
        Ok(Outcome::Skip) => return None,
        Ok(Outcome::Pass(msg)) => ValidationResult::success(rule, row_index, msg),
        Ok(Outcome::Fail(msg)) => ValidationResult::violation(rule, row_index, msg),
        Err(e) => {
            debug!(rule = %rule.id, row = row_index, error = %e, "Row evaluation failed");
            ValidationResult::row_error(rule, row_index, e.to_string())
        }
    };
    Some(result.with_group(group))
}
