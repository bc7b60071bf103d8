// assay-core/src/domain/condition.rs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::domain::data::{ComparisonOperator, DataRecord, DataTable, DataTables, Value};
use crate::domain::error::DomainError;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionOperator {
    #[serde(alias = "==", alias = "equals")]
    Eq,
    #[serde(alias = "!=", alias = "not-equals")]
    Ne,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Ge,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Le,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    IsBlank,
    IsNotBlank,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Contains => "contains",
            Self::NotContains => "not-contains",
            Self::StartsWith => "starts-with",
            Self::EndsWith => "ends-with",
            Self::Matches => "matches",
            Self::IsBlank => "is-blank",
            Self::IsNotBlank => "is-not-blank",
        }
    }

    fn comparison(&self) -> Option<ComparisonOperator> {
        match self {
            Self::Eq => Some(ComparisonOperator::Eq),
            Self::Ne => Some(ComparisonOperator::Ne),
            Self::Gt => Some(ComparisonOperator::Gt),
            Self::Ge => Some(ComparisonOperator::Ge),
            Self::Lt => Some(ComparisonOperator::Lt),
            Self::Le => Some(ComparisonOperator::Le),
            _ => None,
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a condition combines with the next one in its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[serde(alias = "and", alias = "&&")]
    And,
    #[serde(alias = "or", alias = "||")]
    Or,
}

impl LogicalOperator {
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub column: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTableCondition {
    pub table: String,
    #[serde(flatten)]
    pub condition: Condition,
}

/// Structural problems of a chain: a missing joining operator before the
/// last condition, or a dangling one on the last.
pub fn chain_issues<'a, I>(conditions: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Condition>,
{
    let conditions: Vec<&Condition> = conditions.into_iter().collect();
    let last = conditions.len().saturating_sub(1);
    conditions
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match (i == last, c.logical_operator) {
            (false, None) => Some(format!(
                "condition #{} on '{}' has no logicalOperator (AND assumed)",
                i + 1,
                c.column
            )),
            (true, Some(op)) => Some(format!(
                "last condition on '{}' carries a dangling logicalOperator {:?}",
                c.column, op
            )),
            _ => None,
        })
        .collect()
}

/// Folds condition results strictly left to right. Every result is
/// combined with the running value using the operator carried by the
/// condition before it; there is no AND-before-OR precedence.
pub fn fold_chain<I>(results: I) -> bool
where
    I: IntoIterator<Item = (bool, Option<LogicalOperator>)>,
{
    let mut iter = results.into_iter();
    let Some((mut acc, mut pending)) = iter.next() else {
        return true;
    };
    for (result, op) in iter {
        let join = pending.unwrap_or_else(|| {
            warn!("Condition chain link without logicalOperator, assuming AND");
            LogicalOperator::And
        });
        acc = join.apply(acc, result);
        pending = op;
    }
    acc
}

// --- COMPILED FORM ---

/// A condition with its regular expression compiled once.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    column: String,
    operator: ConditionOperator,
    value: Value,
    pattern: Option<Regex>,
    logical_operator: Option<LogicalOperator>,
}

impl CompiledCondition {
    pub fn compile(condition: &Condition) -> Result<Self, DomainError> {
        let pattern = match condition.operator {
            ConditionOperator::Matches => {
                if condition.value.is_blank() {
                    return Err(DomainError::parse(format!(
                        "matches needs a pattern in condition on '{}'",
                        condition.column
                    )));
                }
                let source = condition.value.to_string();
                let regex = Regex::new(&source).map_err(|e| {
                    DomainError::parse(format!(
                        "invalid pattern '{}' in condition on '{}': {}",
                        source, condition.column, e
                    ))
                })?;
                Some(regex)
            }
            _ => None,
        };
        Ok(Self {
            column: condition.column.clone(),
            operator: condition.operator,
            value: condition.value.clone(),
            pattern,
            logical_operator: condition.logical_operator,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Tests one cell value against the condition.
    pub fn test(&self, cell: &Value) -> bool {
        if let Some(cmp) = self.operator.comparison() {
            return cmp.compare(cell, &self.value);
        }
        let text = cell.to_string();
        let needle = self.value.to_string();
        match self.operator {
            ConditionOperator::IsBlank => cell.is_blank(),
            ConditionOperator::IsNotBlank => !cell.is_blank(),
            ConditionOperator::Contains => text.contains(&needle),
            ConditionOperator::NotContains => !text.contains(&needle),
            ConditionOperator::StartsWith => text.starts_with(&needle),
            ConditionOperator::EndsWith => text.ends_with(&needle),
            ConditionOperator::Matches => self.pattern.as_ref().is_some_and(|re| re.is_match(&text)),
            _ => false,
        }
    }

    pub fn test_record(&self, record: &DataRecord) -> bool {
        self.test(record.get(&self.column).unwrap_or(&NULL))
    }
}

/// A same-table chain, evaluated against one row at a time.
#[derive(Debug, Clone, Default)]
pub struct ConditionChain {
    links: Vec<CompiledCondition>,
}

impl ConditionChain {
    /// Compiles the chain and checks that each column exists in `table`.
    pub fn compile(
        conditions: &[Condition],
        table_name: &str,
        table: &DataTable,
    ) -> Result<Self, DomainError> {
        let links = conditions
            .iter()
            .map(|c| {
                if !table.is_empty() && !table.has_column(&c.column) {
                    return Err(DomainError::missing_column(table_name, &c.column));
                }
                CompiledCondition::compile(c)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { links })
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn evaluate(&self, record: &DataRecord) -> bool {
        fold_chain(
            self.links
                .iter()
                .map(|l| (l.test_record(record), l.logical_operator)),
        )
    }
}

/// Evaluates a cross-table chain. A condition holds when at least one row
/// of its table satisfies it; the results are then folded like a
/// same-table chain. The outcome does not depend on the current row.
pub fn evaluate_cross_table(
    conditions: &[CrossTableCondition],
    tables: &DataTables,
) -> Result<bool, DomainError> {
    let mut results = Vec::with_capacity(conditions.len());
    for cross in conditions {
        let table = tables
            .get(&cross.table)
            .ok_or_else(|| DomainError::UnknownTable(cross.table.clone()))?;
        let column = &cross.condition.column;
        if !table.is_empty() && !table.has_column(column) {
            return Err(DomainError::missing_column(&cross.table, column));
        }
        let compiled = CompiledCondition::compile(&cross.condition)?;
        let holds = table.records().iter().any(|r| compiled.test_record(r));
        results.push((holds, cross.condition.logical_operator));
    }
    Ok(fold_chain(results))
}
