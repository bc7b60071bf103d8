// assay-core/src/domain/expression/eval.rs

use super::parser::{AggregateCall, BinaryOp, Expr, ScalarFunction, UnaryOp};
use crate::domain::aggregation::distinct::{aggregate_distinct, rows_matching};
use crate::domain::data::{ComparisonOperator, DataRecord, DataTable, Value};
use crate::domain::error::DomainError;

static NULL: Value = Value::Null;

/// Rows an evaluation is restricted to while a group filter is active.
#[derive(Debug, Clone, Copy)]
pub struct GroupScope<'a> {
    pub group_columns: &'a [String],
    pub rows: &'a [usize],
}

/// Everything a formula can see: the current row, its table, named
/// bindings (e.g. `value`, `dependsOnValue`) and an optional group filter.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub table_name: &'a str,
    pub table: &'a DataTable,
    pub row: &'a DataRecord,
    bindings: Vec<(&'a str, Value)>,
    scope: Option<GroupScope<'a>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(table_name: &'a str, table: &'a DataTable, row: &'a DataRecord) -> Self {
        Self {
            table_name,
            table,
            row,
            bindings: Vec::new(),
            scope: None,
        }
    }

    pub fn with_binding(mut self, name: &'a str, value: Value) -> Self {
        self.bindings.push((name, value));
        self
    }

    pub fn with_scope(mut self, scope: GroupScope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.iter().any(|(n, _)| *n == name)
    }

    fn lookup(&self, name: &str) -> Result<Value, DomainError> {
        if let Some((_, v)) = self.bindings.iter().find(|(n, _)| *n == name) {
            return Ok(v.clone());
        }
        self.row
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::missing_column(self.table_name, name))
    }

    fn require_column(&self, column: &str) -> Result<(), DomainError> {
        if self.table.has_column(column) {
            Ok(())
        } else {
            Err(DomainError::missing_column(self.table_name, column))
        }
    }
}

pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, DomainError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => ctx.lookup(name),
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, ctx)?;
            unary(*op, value)
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                if !evaluate(left, ctx)?.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(evaluate(right, ctx)?.is_truthy()))
            }
            BinaryOp::Or => {
                if evaluate(left, ctx)?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(evaluate(right, ctx)?.is_truthy()))
            }
            _ => {
                let l = evaluate(left, ctx)?;
                let r = evaluate(right, ctx)?;
                binary(*op, &l, &r)
            }
        },
        Expr::Aggregate(call) => match aggregate(call, ctx)? {
            Value::Number(n) => finite(n, || format!("{}(\"{}\")", call.function, call.column)),
            other => Ok(other),
        },
        Expr::Scalar { function, args } => {
            let values = args
                .iter()
                .map(|a| evaluate(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            scalar(*function, &values)
        }
    }
}

fn numeric(value: &Value, op: &str) -> Result<f64, DomainError> {
    value.as_number().ok_or_else(|| {
        DomainError::type_mismatch(format!(
            "operator '{}' cannot be applied to {} {}",
            op,
            value.type_name(),
            value.describe()
        ))
    })
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, DomainError> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
        UnaryOp::Neg if value.is_null() => Ok(Value::Null),
        UnaryOp::Neg => Ok(Value::Number(-numeric(&value, "-")?)),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, DomainError> {
    let comparison = match op {
        BinaryOp::Eq => Some(ComparisonOperator::Eq),
        BinaryOp::Ne => Some(ComparisonOperator::Ne),
        BinaryOp::Gt => Some(ComparisonOperator::Gt),
        BinaryOp::Ge => Some(ComparisonOperator::Ge),
        BinaryOp::Lt => Some(ComparisonOperator::Lt),
        BinaryOp::Le => Some(ComparisonOperator::Le),
        _ => None,
    };
    if let Some(cmp) = comparison {
        return Ok(Value::Boolean(cmp.compare(l, r)));
    }

    // Null propagates through arithmetic, so that a comparison downstream fails.
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    let a = numeric(l, op.symbol())?;
    let b = numeric(r, op.symbol())?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(DomainError::evaluation(format!("division by zero ({} / 0)", l)));
            }
            a / b
        }
        _ => return Err(DomainError::evaluation(format!("unsupported operator '{}'", op.symbol()))),
    };
    finite(result, || format!("{} {} {}", l.describe(), op.symbol(), r.describe()))
}

/// Overflow and NaN never reach a comparison.
fn finite(result: f64, origin: impl FnOnce() -> String) -> Result<Value, DomainError> {
    if result.is_finite() {
        Ok(Value::Number(result))
    } else {
        Err(DomainError::evaluation(format!(
            "{} is not a finite number",
            origin()
        )))
    }
}

fn aggregate(call: &AggregateCall, ctx: &EvalContext<'_>) -> Result<Value, DomainError> {
    ctx.require_column(&call.column)?;

    let Some(distinct) = &call.distinct else {
        let values: Vec<&Value> = match ctx.scope {
            Some(scope) => scope
                .rows
                .iter()
                .map(|&i| ctx.table.record(i).and_then(|r| r.get(&call.column)).unwrap_or(&NULL))
                .collect(),
            None => ctx
                .table
                .column_values(&call.column)
                .map(|v| v.unwrap_or(&NULL))
                .collect(),
        };
        return call.function.apply(values);
    };

    for column in &distinct.group_columns {
        ctx.require_column(column)?;
    }
    ctx.require_column(&distinct.distinct_column)?;

    let scoped = ctx
        .scope
        .filter(|s| s.group_columns == distinct.group_columns.as_slice());
    let matching;
    let rows: &[usize] = match scoped {
        Some(scope) => scope.rows,
        None => {
            matching = rows_matching(ctx.table, ctx.row, &distinct.group_columns)
                .map_err(|reason| DomainError::evaluation(format!("row has no group: {}", reason)))?;
            &matching
        }
    };

    aggregate_distinct(
        ctx.table,
        rows,
        call.function,
        &call.column,
        &distinct.distinct_column,
    )
}

fn scalar(function: ScalarFunction, args: &[Value]) -> Result<Value, DomainError> {
    let first = args.first().unwrap_or(&NULL);
    match function {
        ScalarFunction::Len => match first {
            Value::Null => Ok(Value::Null),
            v => Ok(Value::Number(v.to_string().chars().count() as f64)),
        },
        _ if first.is_null() => Ok(Value::Null),
        ScalarFunction::Abs => Ok(Value::Number(numeric(first, "ABS")?.abs())),
        ScalarFunction::Round => {
            let x = numeric(first, "ROUND")?;
            let digits = match args.get(1) {
                Some(d) => numeric(d, "ROUND")?.trunc() as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            let rounded = (x * factor).round() / factor;
            // Past f64 precision, rounding is the identity (or zero for huge negative digits).
            let rounded = match rounded.is_finite() {
                true => rounded,
                false if digits > 0 => x,
                false => 0.0,
            };
            finite(rounded, || format!("ROUND({}, {})", x, digits))
        }
    }
}
