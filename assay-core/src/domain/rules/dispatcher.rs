// assay-core/src/domain/rules/dispatcher.rs

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

use super::dates;
use super::params::*;
use super::{DataQualityRule, RuleKind};
use crate::domain::aggregation::{AggregationConfig, ResultHandling, partition};
use crate::domain::condition::{ConditionChain, evaluate_cross_table};
use crate::domain::data::{ComparisonOperator, DataRecord, DataTable, DataTables, Value};
use crate::domain::error::DomainError;
use crate::domain::expression::{
    AggregateCall, DistinctGroup, EvalContext, Expr, Expression, GroupScope,
};

static NULL: Value = Value::Null;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const VALUE_BINDING: &str = "value";
const DEPENDS_ON_BINDING: &str = "dependsOnValue";
const KEY_SEPARATOR: char = '\u{1f}';

/// Result of checking one row (or one group member) against a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pass(String),
    Fail(String),
    /// The rule does not apply (its condition chain is false). Nothing is recorded.
    Skip,
}

impl Outcome {
    fn pass() -> Self {
        Self::Pass("passed".to_string())
    }

    fn check(ok: bool, failure: impl FnOnce() -> String) -> Self {
        if ok { Self::pass() } else { Self::Fail(failure()) }
    }
}

/// Outcome for one row, with the group it was judged through for
/// dataset-level rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RowVerdict {
    pub row_index: usize,
    pub group: Option<String>,
    pub outcome: Result<Outcome, DomainError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "text" => Ok(Self::String),
            "number" | "numeric" | "integer" | "float" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" | "datetime" => Ok(Self::Date),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            _ => Err(format!("unknown data type '{}'", s)),
        }
    }
}

impl DataType {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, v) => matches!(v, Value::String(_)),
            (Self::Number, v) => v.as_number().is_some(),
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Boolean, Value::String(s)) => {
                s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
            }
            (Self::Date, v) => v.as_date().is_some(),
            (Self::Object, Value::String(s)) => {
                serde_json::from_str::<serde_json::Value>(s).is_ok_and(|j| j.is_object())
            }
            (Self::Array, Value::String(s)) => {
                serde_json::from_str::<serde_json::Value>(s).is_ok_and(|j| j.is_array())
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
enum DateSource {
    Fixed(NaiveDate),
    Column(String),
}

#[derive(Debug, Clone)]
struct DateBound {
    source: DateSource,
    inclusive: bool,
}

#[derive(Debug, Clone)]
struct Expectation {
    operator: ComparisonOperator,
    value: Value,
}

impl Expectation {
    fn holds(&self, result: &Value) -> bool {
        self.operator.compare(result, &self.value)
    }
}

#[derive(Debug, Clone)]
enum Check {
    Required,
    NotNull,
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Pattern {
        regex: Regex,
    },
    Unique {
        counts: HashMap<String, usize>,
    },
    Type(DataType),
    Enum {
        allowed: HashSet<String>,
        case_sensitive: bool,
    },
    Dependency {
        depends_on: String,
        condition: Option<Expression>,
    },
    Compare {
        left: String,
        right: String,
        operator: ComparisonOperator,
        allow_null: bool,
    },
    Lookup {
        keys: HashSet<String>,
        target: String,
    },
    Formula {
        expr: Expression,
        expect: Option<Expectation>,
    },
    GroupFormula {
        expr: Expression,
        expect: Option<Expectation>,
        group_columns: Vec<String>,
        result_handling: ResultHandling,
    },
    DateRange {
        lower: Option<DateBound>,
        upper: Option<DateBound>,
        strftime: Option<String>,
    },
    DateFormat {
        strftime: String,
        required: bool,
    },
}

/// A rule bound to a dataset snapshot, with its parameters validated and
/// everything that does not depend on the current row computed once.
#[derive(Debug)]
pub struct CompiledRule<'a> {
    rule: &'a DataQualityRule,
    table: &'a DataTable,
    check: Check,
    conditions: ConditionChain,
    cross_table_holds: bool,
    bind_value: bool,
}

impl<'a> CompiledRule<'a> {
    /// Validates the rule against the snapshot. Errors here are rule-level:
    /// no row can be judged.
    pub fn compile(rule: &'a DataQualityRule, tables: &'a DataTables) -> Result<Self, DomainError> {
        let table = tables
            .get(&rule.table)
            .ok_or_else(|| DomainError::UnknownTable(rule.table.clone()))?;

        let compiler = Compiler {
            rule,
            table,
            tables,
        };
        let check = compiler.check()?;
        compiler.require_columns(rule.additional_columns.iter().map(String::as_str))?;

        let conditions = ConditionChain::compile(&rule.conditions, &rule.table, table)?;
        let cross_table_holds = evaluate_cross_table(&rule.cross_table_conditions, tables)?;

        debug!(
            rule = %rule.id,
            rule_type = %rule.rule_type(),
            "Compiled rule"
        );

        Ok(Self {
            rule,
            table,
            check,
            conditions,
            cross_table_holds,
            bind_value: compiler.binds_value(),
        })
    }

    pub fn rule(&self) -> &DataQualityRule {
        self.rule
    }

    /// Formula rules using distinct-group aggregation are judged per group.
    pub fn is_dataset_level(&self) -> bool {
        matches!(self.check, Check::GroupFormula { .. })
    }

    /// Judges every row of the rule's table, in row order.
    pub fn verdicts(&self) -> Vec<RowVerdict> {
        match &self.check {
            Check::GroupFormula {
                expr,
                expect,
                group_columns,
                result_handling,
            } => self.group_verdicts(expr, expect.as_ref(), group_columns, *result_handling),
            _ => (0..self.table.len())
                .map(|row_index| RowVerdict {
                    row_index,
                    group: None,
                    outcome: self.evaluate_row(row_index),
                })
                .collect(),
        }
    }

    fn applies_to(&self, record: &DataRecord) -> bool {
        self.cross_table_holds && self.conditions.evaluate(record)
    }

    /// Judges one row of a row-level rule.
    pub fn evaluate_row(&self, row_index: usize) -> Result<Outcome, DomainError> {
        let record = self.table.record(row_index).ok_or_else(|| {
            DomainError::evaluation(format!(
                "row {} out of bounds for table '{}'",
                row_index, self.rule.table
            ))
        })?;
        if !self.applies_to(record) {
            return Ok(Outcome::Skip);
        }

        let outcome = self.judge(record)?;
        Ok(match outcome {
            Outcome::Fail(msg) => Outcome::Fail(self.with_context(msg, record)),
            other => other,
        })
    }

    fn cell<'r>(&self, record: &'r DataRecord, column: &str) -> &'r Value {
        record.get(column).unwrap_or(&NULL)
    }

    fn context<'r>(&'r self, record: &'r DataRecord) -> EvalContext<'r> {
        let ctx = EvalContext::new(&self.rule.table, self.table, record);
        if self.bind_value {
            let value = self.cell(record, &self.rule.column).clone();
            ctx.with_binding(VALUE_BINDING, value)
        } else {
            ctx
        }
    }

    fn judge(&self, record: &DataRecord) -> Result<Outcome, DomainError> {
        let column = self.rule.column.as_str();
        let value = self.cell(record, column);

        let outcome = match &self.check {
            Check::Required => Outcome::check(!value.is_blank(), || {
                format!("'{}' is required", column)
            }),
            Check::NotNull => Outcome::check(!value.is_null(), || {
                format!("'{}' must not be null", column)
            }),

            // Blank values are not judged by format-like checks.
            _ if value.is_blank() && self.skips_blank() => Outcome::pass(),

            Check::Range { min, max } => match value.as_number() {
                None => Outcome::Fail(format!("{} is not a number", value.describe())),
                Some(n) => Outcome::check(
                    min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m),
                    || {
                        format!(
                            "{} is outside [{}, {}]",
                            value.describe(),
                            bound_text(*min),
                            bound_text(*max)
                        )
                    },
                ),
            },
            Check::Length { min, max } => {
                let len = value.to_string().chars().count();
                Outcome::check(
                    min.is_none_or(|m| len >= m) && max.is_none_or(|m| len <= m),
                    || format!("length {} of {} is out of bounds", len, value.describe()),
                )
            }
            Check::Pattern { regex } => Outcome::check(regex.is_match(&value.to_string()), || {
                format!("{} does not match /{}/", value.describe(), regex.as_str())
            }),
            Check::Unique { counts } => {
                let key = composite_key(record, column, &self.rule.additional_columns);
                let seen = counts.get(&key).copied().unwrap_or(0);
                Outcome::check(seen <= 1, || {
                    format!("{} is not unique ({} occurrences)", value.describe(), seen)
                })
            }
            Check::Type(data_type) => Outcome::check(data_type.accepts(value), || {
                format!("{} is not of type {}", value.describe(), data_type.as_str())
            }),
            Check::Enum {
                allowed,
                case_sensitive,
            } => Outcome::check(allowed.contains(&enum_key(value, *case_sensitive)), || {
                format!("{} is not an allowed value", value.describe())
            }),
            Check::Dependency {
                depends_on,
                condition,
            } => {
                let depends_value = self.cell(record, depends_on).clone();
                let triggered = match condition {
                    Some(expr) => {
                        let ctx = self
                            .context(record)
                            .with_binding(DEPENDS_ON_BINDING, depends_value);
                        expr.evaluate(&ctx)?.is_truthy()
                    }
                    None => !depends_value.is_blank(),
                };
                if !triggered {
                    Outcome::Pass(format!("not applicable: condition on '{}' is false", depends_on))
                } else {
                    Outcome::check(!value.is_blank(), || {
                        format!("'{}' is required when '{}' is set", column, depends_on)
                    })
                }
            }
            Check::Compare {
                left,
                right,
                operator,
                allow_null,
            } => {
                let l = self.cell(record, left);
                let r = self.cell(record, right);
                if *allow_null && (l.is_blank() || r.is_blank()) {
                    Outcome::Pass("null allowed".to_string())
                } else {
                    Outcome::check(operator.compare(l, r), || {
                        format!(
                            "{} ({}) is not {} {} ({})",
                            left,
                            l.describe(),
                            operator,
                            right,
                            r.describe()
                        )
                    })
                }
            }
            Check::Lookup { keys, target } => {
                Outcome::check(keys.contains(&value.match_key()), || {
                    format!("{} not found in {}", value.describe(), target)
                })
            }
            Check::Formula { expr, expect } => {
                let result = expr.evaluate(&self.context(record))?;
                formula_outcome(expr, expect.as_ref(), &result)
            }
            Check::DateRange {
                lower,
                upper,
                strftime,
            } => self.judge_date(record, value, lower.as_ref(), upper.as_ref(), strftime.as_deref())?,
            Check::DateFormat { strftime, required } => {
                if value.is_blank() {
                    Outcome::check(!required, || format!("'{}' is required", column))
                } else {
                    let ok = matches!(value, Value::Date(_))
                        || dates::matches_format(&value.to_string(), strftime);
                    Outcome::check(ok, || {
                        format!("{} does not match date format '{}'", value.describe(), strftime)
                    })
                }
            }
            Check::GroupFormula { .. } => {
                return Err(DomainError::evaluation(
                    "dataset-level rule cannot be judged row by row",
                ));
            }
        };
        Ok(outcome)
    }

    fn skips_blank(&self) -> bool {
        matches!(
            self.check,
            Check::Range { .. }
                | Check::Length { .. }
                | Check::Pattern { .. }
                | Check::Unique { .. }
                | Check::Type(_)
                | Check::Enum { .. }
                | Check::Lookup { .. }
                | Check::DateRange { .. }
        )
    }

    fn judge_date(
        &self,
        record: &DataRecord,
        value: &Value,
        lower: Option<&DateBound>,
        upper: Option<&DateBound>,
        strftime: Option<&str>,
    ) -> Result<Outcome, DomainError> {
        let Some(date) = to_date(value, strftime) else {
            return Ok(Outcome::Fail(format!("{} is not a valid date", value.describe())));
        };

        let resolve = |bound: &DateBound| -> Result<Option<NaiveDate>, String> {
            match &bound.source {
                DateSource::Fixed(d) => Ok(Some(*d)),
                DateSource::Column(c) => {
                    let other = self.cell(record, c);
                    if other.is_blank() {
                        return Ok(None);
                    }
                    to_date(other, strftime)
                        .map(Some)
                        .ok_or_else(|| format!("'{}' has no valid date ({})", c, other.describe()))
                }
            }
        };

        if let Some(bound) = lower {
            match resolve(bound) {
                Err(msg) => return Ok(Outcome::Fail(msg)),
                Ok(Some(limit)) => {
                    let ok = if bound.inclusive { date >= limit } else { date > limit };
                    if !ok {
                        return Ok(Outcome::Fail(format!(
                            "{} is not after {}{}",
                            date,
                            limit,
                            if bound.inclusive { " (inclusive)" } else { "" }
                        )));
                    }
                }
                Ok(None) => {}
            }
        }
        if let Some(bound) = upper {
            match resolve(bound) {
                Err(msg) => return Ok(Outcome::Fail(msg)),
                Ok(Some(limit)) => {
                    let ok = if bound.inclusive { date <= limit } else { date < limit };
                    if !ok {
                        return Ok(Outcome::Fail(format!(
                            "{} is not before {}{}",
                            date,
                            limit,
                            if bound.inclusive { " (inclusive)" } else { "" }
                        )));
                    }
                }
                Ok(None) => {}
            }
        }
        Ok(Outcome::pass())
    }

    fn with_context(&self, message: String, record: &DataRecord) -> String {
        if self.rule.additional_columns.is_empty() {
            return message;
        }
        let context: Vec<String> = self
            .rule
            .additional_columns
            .iter()
            .map(|c| format!("{}={}", c, self.cell(record, c)))
            .collect();
        format!("{} [{}]", message, context.join(", "))
    }

    // --- DATASET-LEVEL ---

    fn group_verdicts(
        &self,
        expr: &Expression,
        expect: Option<&Expectation>,
        group_columns: &[String],
        result_handling: ResultHandling,
    ) -> Vec<RowVerdict> {
        let grouping = partition(self.table, group_columns);

        // One evaluation per group, using its first row as the current row.
        let judged: Vec<Result<(bool, String), DomainError>> = grouping
            .groups()
            .iter()
            .map(|group| -> Result<(bool, String), DomainError> {
                let first = group.rows.first().and_then(|&i| self.table.record(i)).ok_or_else(
                    || DomainError::evaluation(format!("group {} is empty", group.label)),
                )?;
                let ctx = self.context(first).with_scope(GroupScope {
                    group_columns,
                    rows: &group.rows,
                });
                let result = expr.evaluate(&ctx)?;
                let passed = match expect {
                    Some(e) => e.holds(&result),
                    None => result.is_truthy(),
                };
                Ok((passed, result.describe()))
            })
            .collect();

        let flags: Vec<bool> = judged
            .iter()
            .map(|j| j.as_ref().is_ok_and(|(passed, _)| *passed))
            .collect();
        let overall = result_handling.resolve(&flags);
        let passed_groups = flags.iter().filter(|f| **f).count();

        debug!(
            rule = %self.rule.id,
            groups = flags.len(),
            passed = passed_groups,
            overall,
            "Resolved group verdicts"
        );

        (0..self.table.len())
            .filter_map(|row_index| {
                let record = self.table.record(row_index)?;
                if !self.applies_to(record) {
                    return None;
                }
                let Some(g) = grouping.group_index_of(row_index) else {
                    let reason = grouping.ungrouped_reason(row_index).unwrap_or("no group");
                    return Some(RowVerdict {
                        row_index,
                        group: None,
                        outcome: Ok(Outcome::Fail(
                            self.with_context(format!("row has no group: {}", reason), record),
                        )),
                    });
                };
                let label = grouping.groups()[g].label.clone();
                let outcome = match &judged[g] {
                    Err(e) => Err(e.clone()),
                    Ok((group_passed, result)) => {
                        let detail = format!(
                            "{} = {} for group {} ({}); {}/{} groups passed, {} required",
                            expr,
                            result,
                            label,
                            if *group_passed { "pass" } else { "fail" },
                            passed_groups,
                            flags.len(),
                            result_handling.as_str()
                        );
                        if overall {
                            Ok(Outcome::Pass(detail))
                        } else {
                            Ok(Outcome::Fail(self.with_context(detail, record)))
                        }
                    }
                };
                Some(RowVerdict {
                    row_index,
                    group: Some(label),
                    outcome,
                })
            })
            .collect()
    }
}

fn bound_text(b: Option<f64>) -> String {
    b.map(|n| Value::Number(n).to_string())
        .unwrap_or_else(|| "..".to_string())
}

fn formula_outcome(expr: &Expression, expect: Option<&Expectation>, result: &Value) -> Outcome {
    match expect {
        Some(e) => Outcome::check(e.holds(result), || {
            format!(
                "{} = {}, expected {} {}",
                expr,
                result.describe(),
                e.operator,
                e.value.describe()
            )
        }),
        None => Outcome::check(result.is_truthy(), || {
            format!("{} evaluated to {}", expr, result.describe())
        }),
    }
}

fn to_date(value: &Value, strftime: Option<&str>) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::String(s) => dates::parse_date(s, strftime).ok(),
        _ => None,
    }
}

fn enum_key(value: &Value, case_sensitive: bool) -> String {
    match value {
        Value::String(s) if !case_sensitive => Value::String(s.to_lowercase()).match_key(),
        other => other.match_key(),
    }
}

fn composite_key(record: &DataRecord, column: &str, additional: &[String]) -> String {
    std::iter::once(column)
        .chain(additional.iter().map(String::as_str))
        .map(|c| record.get(c).unwrap_or(&NULL).match_key())
        .collect::<Vec<_>>()
        .join(&KEY_SEPARATOR.to_string())
}

// --- COMPILATION ---

struct Compiler<'a> {
    rule: &'a DataQualityRule,
    table: &'a DataTable,
    tables: &'a DataTables,
}

impl<'a> Compiler<'a> {
    fn invalid(&self, reason: impl Into<String>) -> DomainError {
        DomainError::InvalidRule {
            rule_id: self.rule.id.clone(),
            reason: reason.into(),
        }
    }

    fn require_columns<'c>(&self, columns: impl IntoIterator<Item = &'c str>) -> Result<(), DomainError> {
        // An empty table exposes no columns and has no rows to judge.
        if self.table.is_empty() {
            return Ok(());
        }
        for column in columns {
            if !self.table.has_column(column) {
                return Err(DomainError::missing_column(&self.rule.table, column));
            }
        }
        Ok(())
    }

    fn target_column(&self) -> Result<&'a str, DomainError> {
        let column = self.rule.column.as_str();
        if column.is_empty() {
            return Err(self.invalid(format!("{} rule needs a column", self.rule.rule_type())));
        }
        self.require_columns([column])?;
        Ok(column)
    }

    /// `value` is bound to the rule's column unless the table has a real
    /// column named `value`.
    fn binds_value(&self) -> bool {
        !self.rule.column.is_empty() && !self.table.has_column(VALUE_BINDING)
    }

    fn bindings(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.binds_value() {
            names.push(VALUE_BINDING);
        }
        if matches!(self.rule.kind, RuleKind::Dependency(_)) {
            names.push(DEPENDS_ON_BINDING);
        }
        names
    }

    fn expression(&self, source: &str) -> Result<Expression, DomainError> {
        let columns = self.table.columns();
        let expr = Expression::parse(source, &columns)?;
        let bindings = self.bindings();
        self.require_columns(
            expr.columns_referenced()
                .into_iter()
                .filter(|c| !bindings.iter().any(|b| b == c)),
        )?;
        Ok(expr)
    }

    fn check(&self) -> Result<Check, DomainError> {
        Ok(match &self.rule.kind {
            RuleKind::Required => {
                self.target_column()?;
                Check::Required
            }
            RuleKind::NotNull => {
                self.target_column()?;
                Check::NotNull
            }
            RuleKind::Range(p) => self.range(p)?,
            RuleKind::Length(p) => {
                self.target_column()?;
                if let (Some(min), Some(max)) = (p.min_length, p.max_length) {
                    if min > max {
                        return Err(self.invalid(format!("minLength {} exceeds maxLength {}", min, max)));
                    }
                }
                Check::Length {
                    min: p.min_length,
                    max: p.max_length,
                }
            }
            RuleKind::Regex(p) => {
                self.target_column()?;
                let pattern = p
                    .pattern
                    .as_deref()
                    .ok_or_else(|| self.invalid("regex rule needs a pattern"))?;
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(p.case_insensitive)
                    .build()
                    .map_err(|e| DomainError::parse(format!("invalid pattern '{}': {}", pattern, e)))?;
                Check::Pattern { regex }
            }
            RuleKind::Email => {
                self.target_column()?;
                let regex = Regex::new(EMAIL_PATTERN)
                    .map_err(|e| DomainError::parse(e.to_string()))?;
                Check::Pattern { regex }
            }
            RuleKind::Unique => self.unique()?,
            RuleKind::Type(p) => {
                self.target_column()?;
                let name = p
                    .data_type
                    .as_deref()
                    .ok_or_else(|| self.invalid("type rule needs a dataType"))?;
                Check::Type(name.parse().map_err(|e: String| self.invalid(e))?)
            }
            RuleKind::Enum(p) => {
                self.target_column()?;
                let values = p
                    .allowed_values
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| self.invalid("enum rule needs allowedValues"))?;
                Check::Enum {
                    allowed: values
                        .iter()
                        .map(|v| enum_key(v, p.case_sensitive))
                        .collect(),
                    case_sensitive: p.case_sensitive,
                }
            }
            RuleKind::Dependency(p) => {
                self.target_column()?;
                let depends_on = p
                    .depends_on
                    .clone()
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| self.invalid("dependency rule needs dependsOn"))?;
                self.require_columns([depends_on.as_str()])?;
                let condition = match p.condition.as_deref().map(str::trim) {
                    Some(src) if !src.is_empty() => Some(self.expression(src)?),
                    _ => None,
                };
                Check::Dependency {
                    depends_on,
                    condition,
                }
            }
            RuleKind::CrossColumn(p) | RuleKind::ColumnComparison(p) => self.compare(p)?,
            RuleKind::Lookup(p) => self.lookup(p)?,
            RuleKind::Custom(p) => {
                let source = p
                    .expression
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| self.invalid("custom rule needs an expression"))?;
                Check::Formula {
                    expr: self.expression(source)?,
                    expect: None,
                }
            }
            RuleKind::Formula(p) => self.formula(p)?,
            RuleKind::DateBefore(p) => {
                let strftime = self.date_format(p.format.as_deref())?;
                let bound = self.date_bound(p, strftime.as_deref())?;
                Check::DateRange {
                    lower: None,
                    upper: Some(bound),
                    strftime,
                }
            }
            RuleKind::DateAfter(p) => {
                let strftime = self.date_format(p.format.as_deref())?;
                let bound = self.date_bound(p, strftime.as_deref())?;
                Check::DateRange {
                    lower: Some(bound),
                    upper: None,
                    strftime,
                }
            }
            RuleKind::DateBetween(p) => self.date_between(p)?,
            RuleKind::DateFormat(p) => {
                self.target_column()?;
                let format = p
                    .format
                    .as_deref()
                    .ok_or_else(|| self.invalid("date-format rule needs a format"))?;
                Check::DateFormat {
                    strftime: dates::compile_format(format)?,
                    required: p.required,
                }
            }
        })
    }

    fn range(&self, p: &RangeParams) -> Result<Check, DomainError> {
        self.target_column()?;
        let number = |name: &str, v: &Option<Value>| -> Result<Option<f64>, DomainError> {
            match v {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v
                    .as_number()
                    .map(Some)
                    .ok_or_else(|| self.invalid(format!("{} {} is not a number", name, v.describe()))),
            }
        };
        let min = number("min", &p.min)?;
        let max = number("max", &p.max)?;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(self.invalid(format!("min {} exceeds max {}", lo, hi)));
            }
        }
        Ok(Check::Range { min, max })
    }

    fn unique(&self) -> Result<Check, DomainError> {
        let column = self.target_column()?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.table.records() {
            if record.get(column).unwrap_or(&NULL).is_blank() {
                continue;
            }
            let key = composite_key(record, column, &self.rule.additional_columns);
            *counts.entry(key).or_insert(0) += 1;
        }
        Ok(Check::Unique { counts })
    }

    fn compare(&self, p: &ColumnComparisonParams) -> Result<Check, DomainError> {
        let left = match p.left_column.as_deref().filter(|c| !c.is_empty()) {
            Some(c) => c.to_string(),
            None => self.target_column()?.to_string(),
        };
        let right = p
            .right_column
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| self.invalid("comparison rule needs rightColumn"))?;
        let operator = p
            .operator
            .ok_or_else(|| self.invalid("comparison rule needs an operator"))?;
        self.require_columns([left.as_str(), right.as_str()])?;
        Ok(Check::Compare {
            left,
            right,
            operator,
            allow_null: p.allow_null,
        })
    }

    fn lookup(&self, p: &LookupParams) -> Result<Check, DomainError> {
        self.target_column()?;
        let (Some(ref_table), Some(ref_column)) =
            (p.reference_table.as_deref(), p.reference_column.as_deref())
        else {
            return Err(self.invalid("lookup rule needs referenceTable and referenceColumn"));
        };
        let reference = self
            .tables
            .get(ref_table)
            .ok_or_else(|| DomainError::UnknownTable(ref_table.to_string()))?;
        if !reference.is_empty() && !reference.has_column(ref_column) {
            return Err(DomainError::missing_column(ref_table, ref_column));
        }
        let keys = reference
            .column_values(ref_column)
            .flatten()
            .filter(|v| !v.is_null())
            .map(Value::match_key)
            .collect();
        Ok(Check::Lookup {
            keys,
            target: format!("{}.{}", ref_table, ref_column),
        })
    }

    fn formula(&self, p: &FormulaParams) -> Result<Check, DomainError> {
        let source = p.formula.as_deref().map(str::trim).filter(|src| !src.is_empty());
        let expr = match source {
            Some(src) => self.expression(src)?,
            None => {
                let config = p
                    .aggregations
                    .first()
                    .ok_or_else(|| self.invalid("formula rule needs a formula or an aggregation"))?;
                let expr = aggregation_expression(config);
                self.require_columns(expr.columns_referenced())?;
                expr
            }
        };

        // A formula only reads group columns and quorum from its configs;
        // without one, only the first config is turned into an expression.
        let ignored = match source {
            Some(_) => p.aggregations.iter().filter(|c| !c.function.distinct_group).count(),
            None => p.aggregations.len().saturating_sub(1),
        };
        if ignored > 0 {
            warn!(
                rule_id = %self.rule.id,
                ignored,
                "aggregation entries not used by the formula are ignored"
            );
        }

        let result_handling = p
            .aggregations
            .first()
            .map(|c| c.result_handling)
            .unwrap_or_default();
        if let Some(other) = p.aggregations.iter().find(|c| c.result_handling != result_handling) {
            return Err(self.invalid(format!(
                "aggregations disagree on result handling ({} vs {})",
                result_handling.as_str(),
                other.result_handling.as_str()
            )));
        }

        let expect = match (p.operator, &p.value) {
            (None, None) => None,
            (operator, Some(value)) => Some(Expectation {
                operator: operator.unwrap_or(ComparisonOperator::Eq),
                value: value.clone(),
            }),
            (Some(op), None) => {
                return Err(self.invalid(format!("operator '{}' needs a value", op)));
            }
        };

        // Group columns declared by the formula itself and by its configs.
        let mut declared: Vec<&[String]> = expr
            .distinct_groups()
            .into_iter()
            .map(|g| g.group_columns.as_slice())
            .collect();
        declared.extend(
            p.aggregations
                .iter()
                .filter(|c| c.function.distinct_group)
                .map(|c| c.group_columns.as_slice()),
        );

        let Some(group_columns) = declared.first().copied() else {
            return Ok(Check::Formula { expr, expect });
        };
        if declared.iter().any(|g| *g != group_columns) {
            return Err(DomainError::parse(format!(
                "conflicting group columns in formula '{}'",
                expr
            )));
        }
        self.require_columns(group_columns.iter().map(String::as_str))?;
        let group_columns = group_columns.to_vec();

        Ok(Check::GroupFormula {
            expr,
            expect,
            group_columns,
            result_handling,
        })
    }

    fn date_format(&self, format: Option<&str>) -> Result<Option<String>, DomainError> {
        self.target_column()?;
        format
            .filter(|f| !f.trim().is_empty())
            .map(dates::compile_format)
            .transpose()
    }

    fn fixed_date(&self, raw: &str, strftime: Option<&str>) -> Result<NaiveDate, DomainError> {
        dates::parse_date(raw, strftime).or_else(|_| dates::parse_date(raw, None))
    }

    fn date_bound(&self, p: &DateCompareParams, strftime: Option<&str>) -> Result<DateBound, DomainError> {
        let source = match (p.compare_date.as_deref(), p.compare_column.as_deref()) {
            (Some(raw), _) if !raw.trim().is_empty() => DateSource::Fixed(self.fixed_date(raw, strftime)?),
            (_, Some(column)) if !column.is_empty() => {
                self.require_columns([column])?;
                DateSource::Column(column.to_string())
            }
            _ => {
                return Err(self.invalid(format!(
                    "{} rule needs compareDate or compareColumn",
                    self.rule.rule_type()
                )));
            }
        };
        Ok(DateBound {
            source,
            inclusive: p.inclusive,
        })
    }

    fn date_between(&self, p: &DateBetweenParams) -> Result<Check, DomainError> {
        let strftime = self.date_format(p.format.as_deref())?;
        let (Some(start), Some(end)) = (p.start_date.as_deref(), p.end_date.as_deref()) else {
            return Err(self.invalid("date-between rule needs startDate and endDate"));
        };
        let start = self.fixed_date(start, strftime.as_deref())?;
        let end = self.fixed_date(end, strftime.as_deref())?;
        if start > end {
            return Err(self.invalid(format!("startDate {} is after endDate {}", start, end)));
        }
        Ok(Check::DateRange {
            lower: Some(DateBound {
                source: DateSource::Fixed(start),
                inclusive: p.inclusive,
            }),
            upper: Some(DateBound {
                source: DateSource::Fixed(end),
                inclusive: p.inclusive,
            }),
            strftime,
        })
    }
}

/// Turns a declarative aggregation into the equivalent formula call.
fn aggregation_expression(config: &AggregationConfig) -> Expression {
    let distinct = config.function.distinct_group.then(|| DistinctGroup {
        group_columns: config.group_columns.clone(),
        distinct_column: config.distinct_column.clone(),
    });
    let source = match &distinct {
        Some(d) => format!(
            "{}(\"{}\", [{}], \"{}\")",
            config.function,
            config.column,
            d.group_columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", "),
            d.distinct_column
        ),
        None => format!("{}(\"{}\")", config.function, config.column),
    };
    Expression::from_parts(
        source,
        Expr::Aggregate(AggregateCall {
            function: config.function.function,
            column: config.column.clone(),
            distinct,
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::aggregation::{AggregateFunction, AggregationFunction};
    use crate::domain::condition::{Condition, ConditionOperator};
    use crate::domain::data::record;
    use anyhow::Result;

    fn tables(name: &str, table: DataTable) -> DataTables {
        let mut tables = DataTables::new();
        tables.insert(name.to_string(), table);
        tables
    }

    fn outcomes(rule: &DataQualityRule, tables: &DataTables) -> Result<Vec<Outcome>> {
        let compiled = CompiledRule::compile(rule, tables)?;
        compiled
            .verdicts()
            .into_iter()
            .map(|v| v.outcome.map_err(anyhow::Error::from))
            .collect()
    }

    fn passed(outcomes: &[Outcome]) -> Vec<bool> {
        outcomes.iter().map(|o| matches!(o, Outcome::Pass(_))).collect()
    }

    fn people() -> DataTable {
        DataTable::new(vec![
            record([
                ("name", Value::from("Ada")),
                ("email", Value::from("ada@example.com")),
                ("age", Value::from(36)),
                ("born", Value::from("1815-12-10")),
            ]),
            record([
                ("name", Value::from("")),
                ("email", Value::from("not-an-email")),
                ("age", Value::from("abc")),
                ("born", Value::from("10/12/1815")),
            ]),
            record([
                ("name", Value::Null),
                ("email", Value::Null),
                ("age", Value::from(1)),
                ("born", Value::Null),
            ]),
        ])
    }

    #[test]
    fn test_required_fails_on_null_and_empty() -> Result<()> {
        let t = tables("people", people());
        let rule = DataQualityRule::new("r", "people", "name", RuleKind::Required);
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, false]);

        let rule = DataQualityRule::new("r", "people", "name", RuleKind::NotNull);
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, true, false]);
        Ok(())
    }

    #[test]
    fn test_range_boundaries() -> Result<()> {
        let table = DataTable::new(
            [-0.5, 0.0, 0.5, 1.0, 1.5]
                .iter()
                .map(|n| record([("ratio", *n)]))
                .collect(),
        );
        let t = tables("m", table);
        let rule = DataQualityRule::new(
            "range",
            "m",
            "ratio",
            RuleKind::Range(RangeParams {
                min: Some(Value::from(0)),
                max: Some(Value::from(1)),
            }),
        );
        assert_eq!(
            passed(&outcomes(&rule, &t)?),
            vec![false, true, true, true, false]
        );
        Ok(())
    }

    #[test]
    fn test_non_numeric_range_value_fails() -> Result<()> {
        let t = tables("people", people());
        let rule = DataQualityRule::new(
            "age",
            "people",
            "age",
            RuleKind::Range(RangeParams {
                min: Some(Value::from(0)),
                max: None,
            }),
        );
        let out = outcomes(&rule, &t)?;
        assert_eq!(passed(&out), vec![true, false, true]);
        assert_eq!(out[1], Outcome::Fail("'abc' is not a number".to_string()));
        Ok(())
    }

    #[test]
    fn test_regex_and_email() -> Result<()> {
        let t = tables("people", people());
        let rule = DataQualityRule::new("e", "people", "email", RuleKind::Email);
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, true]);

        let rule = DataQualityRule::new(
            "n",
            "people",
            "name",
            RuleKind::Regex(RegexParams {
                pattern: Some("^ada$".to_string()),
                case_insensitive: true,
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, true, true]);
        Ok(())
    }

    #[test]
    fn test_invalid_regex_is_rule_level_parse_error() {
        let t = tables("people", people());
        let rule = DataQualityRule::new(
            "bad",
            "people",
            "name",
            RuleKind::Regex(RegexParams {
                pattern: Some("([a-z".to_string()),
                case_insensitive: false,
            }),
        );
        let err = CompiledRule::compile(&rule, &t).unwrap_err();
        assert!(matches!(err, DomainError::Parse(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_missing_parameters_are_invalid_rule() {
        let t = tables("people", people());
        let rule = DataQualityRule::new("bad", "people", "name", RuleKind::Regex(RegexParams::default()));
        assert!(matches!(
            CompiledRule::compile(&rule, &t),
            Err(DomainError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_unique_with_composite_key() -> Result<()> {
        let table = DataTable::new(vec![
            record([("sku", "A"), ("store", "1")]),
            record([("sku", "A"), ("store", "2")]),
            record([("sku", "A"), ("store", "1")]),
            record([("sku", ""), ("store", "1")]),
            record([("sku", ""), ("store", "1")]),
        ]);
        let t = tables("stock", table);
        let mut rule = DataQualityRule::new("u", "stock", "sku", RuleKind::Unique);
        assert_eq!(
            passed(&outcomes(&rule, &t)?),
            vec![false, false, false, true, true]
        );

        rule.additional_columns = vec!["store".to_string()];
        assert_eq!(
            passed(&outcomes(&rule, &t)?),
            vec![false, true, false, true, true]
        );
        Ok(())
    }

    #[test]
    fn test_type_and_enum() -> Result<()> {
        let table = DataTable::new(vec![
            record([("v", Value::from("Gold"))]),
            record([("v", Value::from("silver"))]),
            record([("v", Value::from(3))]),
            record([("v", Value::from(r#"{"a":1}"#))]),
        ]);
        let t = tables("t", table);
        let rule = DataQualityRule::new(
            "type",
            "t",
            "v",
            RuleKind::Type(TypeParams {
                data_type: Some("number".to_string()),
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![false, false, true, false]);

        let rule = DataQualityRule::new(
            "obj",
            "t",
            "v",
            RuleKind::Type(TypeParams {
                data_type: Some("object".to_string()),
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![false, false, false, true]);

        let allowed = Some(vec![Value::from("gold"), Value::from("silver"), Value::from("3")]);
        let rule = DataQualityRule::new(
            "enum",
            "t",
            "v",
            RuleKind::Enum(EnumParams {
                allowed_values: allowed.clone(),
                case_sensitive: true,
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![false, true, true, false]);

        let rule = DataQualityRule::new(
            "enum",
            "t",
            "v",
            RuleKind::Enum(EnumParams {
                allowed_values: allowed,
                case_sensitive: false,
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, true, true, false]);
        Ok(())
    }

    #[test]
    fn test_dependency() -> Result<()> {
        let table = DataTable::new(vec![
            record([("country", "US"), ("state", "CA")]),
            record([("country", "US"), ("state", "")]),
            record([("country", "FR"), ("state", "")]),
            record([("country", ""), ("state", "")]),
        ]);
        let t = tables("addr", table);
        let rule = DataQualityRule::new(
            "dep",
            "addr",
            "state",
            RuleKind::Dependency(DependencyParams {
                depends_on: Some("country".to_string()),
                condition: Some("dependsOnValue == \"US\"".to_string()),
            }),
        );
        let out = outcomes(&rule, &t)?;
        assert_eq!(passed(&out), vec![true, false, true, true]);
        assert!(matches!(&out[2], Outcome::Pass(m) if m.starts_with("not applicable")));

        let rule = DataQualityRule::new(
            "dep",
            "addr",
            "state",
            RuleKind::Dependency(DependencyParams {
                depends_on: Some("country".to_string()),
                condition: None,
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, false, true]);
        Ok(())
    }

    #[test]
    fn test_column_comparison_allow_null() -> Result<()> {
        let table = DataTable::new(vec![
            record([("start", Value::from(1)), ("end", Value::from(2))]),
            record([("start", Value::from(3)), ("end", Value::from(2))]),
            record([("start", Value::from(3)), ("end", Value::Null)]),
        ]);
        let t = tables("spans", table);
        let params = ColumnComparisonParams {
            left_column: Some("start".to_string()),
            right_column: Some("end".to_string()),
            operator: Some(ComparisonOperator::Le),
            allow_null: true,
        };
        let rule = DataQualityRule::new("cmp", "spans", "", RuleKind::ColumnComparison(params.clone()));
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, true]);

        let strict = ColumnComparisonParams {
            allow_null: false,
            ..params
        };
        let rule = DataQualityRule::new("cmp", "spans", "", RuleKind::CrossColumn(strict));
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, false]);
        Ok(())
    }

    #[test]
    fn test_lookup() -> Result<()> {
        let mut t = tables(
            "orders",
            DataTable::new(vec![
                record([("customer", Value::from(1))]),
                record([("customer", Value::from(9))]),
                record([("customer", Value::Null)]),
            ]),
        );
        t.insert(
            "customers".to_string(),
            DataTable::new(vec![record([("id", "1")]), record([("id", "2")])]),
        );
        let rule = DataQualityRule::new(
            "fk",
            "orders",
            "customer",
            RuleKind::Lookup(LookupParams {
                reference_table: Some("customers".to_string()),
                reference_column: Some("id".to_string()),
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, true]);

        let rule = DataQualityRule::new(
            "fk",
            "orders",
            "customer",
            RuleKind::Lookup(LookupParams {
                reference_table: Some("clients".to_string()),
                reference_column: Some("id".to_string()),
            }),
        );
        assert!(matches!(
            CompiledRule::compile(&rule, &t),
            Err(DomainError::UnknownTable(_))
        ));
        Ok(())
    }

    #[test]
    fn test_custom_and_formula() -> Result<()> {
        let table = DataTable::new(vec![
            record([("qty", Value::from(2)), ("price", Value::from(5))]),
            record([("qty", Value::from(0)), ("price", Value::from(5))]),
        ]);
        let t = tables("lines", table);
        let rule = DataQualityRule::new(
            "custom",
            "lines",
            "qty",
            RuleKind::Custom(CustomParams {
                expression: Some("value > 0 && price > 0".to_string()),
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false]);

        let rule = DataQualityRule::new(
            "formula",
            "lines",
            "",
            RuleKind::Formula(FormulaParams {
                formula: Some("qty * price".to_string()),
                operator: Some(ComparisonOperator::Ge),
                value: Some(Value::from(10)),
                aggregations: vec![],
            }),
        );
        let out = outcomes(&rule, &t)?;
        assert_eq!(passed(&out), vec![true, false]);
        assert_eq!(
            out[1],
            Outcome::Fail("qty * price = 0, expected >= 10".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_formula_with_unknown_column_is_rule_level() {
        let t = tables("lines", DataTable::new(vec![record([("qty", 1)])]));
        let rule = DataQualityRule::new(
            "formula",
            "lines",
            "",
            RuleKind::Formula(FormulaParams {
                formula: Some("qty * discount > 0".to_string()),
                ..Default::default()
            }),
        );
        let err = CompiledRule::compile(&rule, &t).unwrap_err();
        assert_eq!(err, DomainError::missing_column("lines", "discount"));
    }

    #[test]
    fn test_row_level_evaluation_error_is_isolated() -> Result<()> {
        let table = DataTable::new(vec![
            record([("a", Value::from(4)), ("b", Value::from(2))]),
            record([("a", Value::from(4)), ("b", Value::from(0))]),
            record([("a", Value::from(9)), ("b", Value::from(3))]),
        ]);
        let t = tables("t", table);
        let rule = DataQualityRule::new(
            "div",
            "t",
            "",
            RuleKind::Formula(FormulaParams {
                formula: Some("a / b".to_string()),
                operator: Some(ComparisonOperator::Ge),
                value: Some(Value::from(2)),
                aggregations: vec![],
            }),
        );
        let verdicts = CompiledRule::compile(&rule, &t)?.verdicts();
        assert!(matches!(verdicts[0].outcome, Ok(Outcome::Pass(_))));
        assert!(matches!(verdicts[1].outcome, Err(DomainError::Evaluation(_))));
        assert!(matches!(verdicts[2].outcome, Ok(Outcome::Pass(_))));
        Ok(())
    }

    fn sales() -> DataTable {
        let rows = [
            ("A", "North", 100),
            ("A", "South", 150),
            ("A", "East", 120),
            ("B", "North", 60),
            ("B", "North", 60),
            ("B", "West", 10),
            ("C", "South", 75),
            ("C", "East", 80),
            ("C", "East", 1),
        ];
        DataTable::new(
            rows.iter()
                .map(|(c, r, a)| {
                    record([
                        ("category", Value::from(*c)),
                        ("region", Value::from(*r)),
                        ("amount", Value::from(*a)),
                    ])
                })
                .collect(),
        )
    }

    fn distinct_rule(threshold: i32, handling: ResultHandling) -> DataQualityRule {
        DataQualityRule::new(
            "dg",
            "sales",
            "amount",
            RuleKind::Formula(FormulaParams {
                formula: Some(format!(
                    r#"DISTINCT_GROUP_SUM("amount", ["category"], "region") > {}"#,
                    threshold
                )),
                operator: None,
                value: None,
                aggregations: vec![AggregationConfig {
                    function: AggregationFunction::distinct_group(AggregateFunction::Sum),
                    column: "amount".to_string(),
                    group_columns: vec!["category".to_string()],
                    distinct_column: "region".to_string(),
                    result_handling: handling,
                }],
            }),
        )
    }

    #[test]
    fn test_distinct_group_all_groups_pass() -> Result<()> {
        let t = tables("sales", sales());
        let rule = distinct_rule(50, ResultHandling::All);
        let compiled = CompiledRule::compile(&rule, &t)?;
        assert!(compiled.is_dataset_level());

        let verdicts = compiled.verdicts();
        assert_eq!(verdicts.len(), 9);
        assert!(verdicts.iter().all(|v| matches!(v.outcome, Ok(Outcome::Pass(_)))));
        assert_eq!(verdicts[0].group.as_deref(), Some("category=A"));
        match &verdicts[0].outcome {
            Ok(Outcome::Pass(msg)) => assert!(msg.contains("group category=A (pass); 3/3 groups passed")),
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_distinct_group_quorum() -> Result<()> {
        let t = tables("sales", sales());
        // Sums: A=370, B=70, C=155.
        let all = passed(&outcomes(&distinct_rule(100, ResultHandling::All), &t)?);
        assert!(all.iter().all(|p| !p));

        let majority = passed(&outcomes(&distinct_rule(100, ResultHandling::Majority), &t)?);
        assert!(majority.iter().all(|p| *p));

        let majority = passed(&outcomes(&distinct_rule(200, ResultHandling::Majority), &t)?);
        assert!(majority.iter().all(|p| !p));

        let any = passed(&outcomes(&distinct_rule(200, ResultHandling::Any), &t)?);
        assert!(any.iter().all(|p| *p));
        Ok(())
    }

    #[test]
    fn test_row_without_group_key_fails() -> Result<()> {
        let mut rows = sales().records().to_vec();
        rows.push(record([
            ("category", Value::Null),
            ("region", Value::from("North")),
            ("amount", Value::from(5)),
        ]));
        let t = tables("sales", DataTable::new(rows));
        let out = outcomes(&distinct_rule(50, ResultHandling::All), &t)?;
        assert_eq!(out.len(), 10);
        assert!(matches!(&out[9], Outcome::Fail(m) if m.contains("no group")));
        Ok(())
    }

    #[test]
    fn test_blank_group_value_fails_instead_of_grouping() -> Result<()> {
        let mut rows = sales().records().to_vec();
        rows.push(record([
            ("category", Value::from("")),
            ("region", Value::from("North")),
            ("amount", Value::from(500)),
        ]));
        let t = tables("sales", DataTable::new(rows));
        let rule = distinct_rule(50, ResultHandling::All);
        let compiled = CompiledRule::compile(&rule, &t)?;
        let verdicts = compiled.verdicts();

        assert_eq!(verdicts.len(), 10);
        assert_eq!(verdicts[9].group, None);
        assert!(matches!(
            &verdicts[9].outcome,
            Ok(Outcome::Fail(m)) if m.contains("row has no group: group column 'category' is blank")
        ));
        // The other groups keep their 3/3 verdict.
        assert!(verdicts[..9].iter().all(|v| matches!(v.outcome, Ok(Outcome::Pass(_)))));
        Ok(())
    }

    #[test]
    fn test_aggregation_config_without_formula() -> Result<()> {
        let t = tables("sales", sales());
        let mut rule = distinct_rule(0, ResultHandling::All);
        if let RuleKind::Formula(p) = &mut rule.kind {
            p.formula = None;
            p.operator = Some(ComparisonOperator::Ge);
            p.value = Some(Value::from(70));
        }
        let verdicts = CompiledRule::compile(&rule, &t)?.verdicts();
        assert!(verdicts.iter().all(|v| matches!(v.outcome, Ok(Outcome::Pass(_)))));
        Ok(())
    }

    #[test]
    fn test_conflicting_group_columns() {
        let t = tables("sales", sales());
        let mut rule = distinct_rule(50, ResultHandling::All);
        if let RuleKind::Formula(p) = &mut rule.kind {
            p.aggregations[0].group_columns = vec!["region".to_string()];
        }
        assert!(matches!(
            CompiledRule::compile(&rule, &t),
            Err(DomainError::Parse(_))
        ));
    }

    #[test]
    fn test_conflicting_result_handling_is_invalid() {
        let t = tables("sales", sales());
        let mut rule = distinct_rule(50, ResultHandling::All);
        if let RuleKind::Formula(p) = &mut rule.kind {
            let mut second = p.aggregations[0].clone();
            second.result_handling = ResultHandling::Any;
            p.aggregations.push(second);
        }
        assert!(matches!(
            CompiledRule::compile(&rule, &t),
            Err(DomainError::InvalidRule { reason, .. }) if reason.contains("ALL vs ANY")
        ));
    }

    #[test]
    fn test_unused_aggregation_entry_does_not_change_verdict() -> Result<()> {
        let t = tables("sales", sales());
        let mut rule = distinct_rule(50, ResultHandling::All);
        if let RuleKind::Formula(p) = &mut rule.kind {
            p.aggregations.push(AggregationConfig {
                function: AggregationFunction::plain(AggregateFunction::Max),
                column: "amount".to_string(),
                group_columns: Vec::new(),
                distinct_column: String::new(),
                result_handling: ResultHandling::All,
            });
        }
        let out = outcomes(&rule, &t)?;
        assert_eq!(out.len(), 9);
        assert!(out.iter().all(|o| matches!(o, Outcome::Pass(_))));
        Ok(())
    }

    #[test]
    fn test_condition_chain_gates_rule() -> Result<()> {
        let table = DataTable::new(vec![
            record([("cat", Value::from("D")), ("score", Value::from(80)), ("note", Value::from(""))]),
            record([("cat", Value::from("D")), ("score", Value::from(50)), ("note", Value::from(""))]),
        ]);
        let t = tables("t", table);
        let mut rule = DataQualityRule::new("gated", "t", "note", RuleKind::Required);
        rule.conditions = vec![Condition {
            column: "score".to_string(),
            operator: ConditionOperator::Gt,
            value: Value::from(75),
            logical_operator: None,
        }];
        let out = outcomes(&rule, &t)?;
        assert!(matches!(out[0], Outcome::Fail(_)));
        assert_eq!(out[1], Outcome::Skip);
        Ok(())
    }

    #[test]
    fn test_dates() -> Result<()> {
        let t = tables("people", people());
        let rule = DataQualityRule::new(
            "before",
            "people",
            "born",
            RuleKind::DateBefore(DateCompareParams {
                compare_date: Some("1900-01-01".to_string()),
                ..Default::default()
            }),
        );
        let out = outcomes(&rule, &t)?;
        // Row 1 does not parse with the default formats.
        assert_eq!(passed(&out), vec![true, false, true]);

        let rule = DataQualityRule::new(
            "between",
            "people",
            "born",
            RuleKind::DateBetween(DateBetweenParams {
                start_date: Some("10/12/1815".to_string()),
                end_date: Some("31/12/1815".to_string()),
                format: Some("DD/MM/YYYY".to_string()),
                ..Default::default()
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![false, true, true]);

        let rule = DataQualityRule::new(
            "fmt",
            "people",
            "born",
            RuleKind::DateFormat(DateFormatParams {
                format: Some("YYYY-MM-DD".to_string()),
                required: true,
            }),
        );
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, false]);
        Ok(())
    }

    #[test]
    fn test_date_format_rejects_impossible_calendar_days() -> Result<()> {
        let table = DataTable::new(vec![
            record([("due", "2024-02-29")]),
            record([("due", "2023-02-30")]),
            record([("due", "2023-13-01")]),
        ]);
        let t = tables("t", table);
        let rule = DataQualityRule::new(
            "fmt",
            "t",
            "due",
            RuleKind::DateFormat(DateFormatParams {
                format: Some("YYYY-MM-DD".to_string()),
                required: true,
            }),
        );
        let out = outcomes(&rule, &t)?;
        assert_eq!(passed(&out), vec![true, false, false]);
        assert_eq!(
            out[1],
            Outcome::Fail("'2023-02-30' does not match date format '%Y-%m-%d'".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_date_after_column() -> Result<()> {
        let table = DataTable::new(vec![
            record([("start", "2024-01-01"), ("end", "2024-02-01")]),
            record([("start", "2024-03-01"), ("end", "2024-02-01")]),
            record([("start", "2024-03-01"), ("end", "2024-03-01")]),
        ]);
        let t = tables("t", table);
        let mut params = DateCompareParams {
            compare_column: Some("start".to_string()),
            ..Default::default()
        };
        let rule = DataQualityRule::new("after", "t", "end", RuleKind::DateAfter(params.clone()));
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, false]);

        params.inclusive = true;
        let rule = DataQualityRule::new("after", "t", "end", RuleKind::DateAfter(params));
        assert_eq!(passed(&outcomes(&rule, &t)?), vec![true, false, true]);
        Ok(())
    }

    #[test]
    fn test_additional_columns_in_failure_message() -> Result<()> {
        let table = DataTable::new(vec![record([("id", Value::from(7)), ("name", Value::Null)])]);
        let t = tables("t", table);
        let mut rule = DataQualityRule::new("r", "t", "name", RuleKind::Required);
        rule.additional_columns = vec!["id".to_string()];
        let out = outcomes(&rule, &t)?;
        assert_eq!(out[0], Outcome::Fail("'name' is required [id=7]".to_string()));
        Ok(())
    }
}
