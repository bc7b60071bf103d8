// assay-core/src/domain/expression/mod.rs

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{EvalContext, GroupScope};
pub use parser::{AggregateCall, BinaryOp, DistinctGroup, Expr, ScalarFunction, UnaryOp};

use crate::domain::data::Value;
use crate::domain::error::DomainError;
use lexer::Lexer;
use parser::Parser;

/// A parsed formula, ready to be evaluated against many rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parses `source`. `columns` are the column names of the target table,
    /// used to recognise identifiers that contain spaces or other columns
    /// as prefixes.
    pub fn parse<'a>(source: &'a str, columns: &[&'a str]) -> Result<Self, DomainError> {
        let tokens = Lexer::new(source, columns).tokenize()?;
        let root = Parser::new(source, tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Wraps an already built tree; `source` is used for display only.
    pub fn from_parts(source: impl Into<String>, root: Expr) -> Self {
        Self {
            source: source.into(),
            root,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, DomainError> {
        eval::evaluate(&self.root, ctx)
    }

    /// Every column name the formula reads, in first-use order, without
    /// duplicates. Includes aggregate arguments.
    pub fn columns_referenced(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        visit(&self.root, &mut |expr| {
            let names: Vec<&str> = match expr {
                Expr::Column(name) => vec![name.as_str()],
                Expr::Aggregate(call) => {
                    let mut names = vec![call.column.as_str()];
                    if let Some(d) = &call.distinct {
                        names.extend(d.group_columns.iter().map(String::as_str));
                        names.push(&d.distinct_column);
                    }
                    names
                }
                _ => Vec::new(),
            };
            for name in names {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        });
        out
    }

    /// The `DISTINCT_GROUP_*` calls of the formula.
    pub fn distinct_groups(&self) -> Vec<&DistinctGroup> {
        let mut out = Vec::new();
        visit(&self.root, &mut |expr| {
            if let Expr::Aggregate(AggregateCall {
                distinct: Some(d), ..
            }) = expr
            {
                out.push(d);
            }
        });
        out
    }
}

fn visit<'e>(expr: &'e Expr, f: &mut impl FnMut(&'e Expr)) {
    f(expr);
    match expr {
        Expr::Unary { expr, .. } => visit(expr, f),
        Expr::Binary { left, right, .. } => {
            visit(left, f);
            visit(right, f);
        }
        Expr::Scalar { args, .. } => args.iter().for_each(|a| visit(a, f)),
        Expr::Literal(_) | Expr::Column(_) | Expr::Aggregate(_) => {}
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}
