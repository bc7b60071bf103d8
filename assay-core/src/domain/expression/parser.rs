// assay-core/src/domain/expression/parser.rs

use super::lexer::{Spanned, Token};
use crate::domain::aggregation::AggregateFunction;
use crate::domain::data::Value;
use crate::domain::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Abs,
    Round,
    Len,
}

/// Group-wise part of a `DISTINCT_GROUP_*` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DistinctGroup {
    pub group_columns: Vec<String>,
    pub distinct_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub column: String,
    pub distinct: Option<DistinctGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Aggregate(AggregateCall),
    Scalar {
        function: ScalarFunction,
        args: Vec<Expr>,
    },
}

enum Callee {
    Aggregate(AggregateFunction),
    DistinctGroup(AggregateFunction),
    Scalar(ScalarFunction),
}

// Closed function registry. Anything else is rejected at parse time.
fn resolve_function(name: &str) -> Option<Callee> {
    let upper = name.to_uppercase();
    if let Some(base) = upper.strip_prefix("DISTINCT_GROUP_") {
        return base.parse().ok().map(Callee::DistinctGroup);
    }
    match upper.as_str() {
        "ABS" => Some(Callee::Scalar(ScalarFunction::Abs)),
        "ROUND" => Some(Callee::Scalar(ScalarFunction::Round)),
        "LEN" => Some(Callee::Scalar(ScalarFunction::Len)),
        other => other.parse().ok().map(Callee::Aggregate),
    }
}

/// Recursive-descent parser. Precedence, lowest first:
/// `||`, `&&`, comparison, additive, multiplicative, unary, primary.
pub struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
        }
    }

    pub fn parse(mut self) -> Result<Expr, DomainError> {
        if self.tokens.is_empty() {
            return Err(DomainError::parse("empty expression"));
        }
        let expr = self.or()?;
        if let Some(extra) = self.tokens.get(self.pos) {
            return Err(self.error_at(extra.offset, format!("unexpected {:?}", extra.token)));
        }
        Ok(expr)
    }

    fn error_at(&self, offset: usize, msg: impl std::fmt::Display) -> DomainError {
        DomainError::parse(format!("{} at offset {} in '{}'", msg, offset, self.src))
    }

    fn error_here(&self, msg: impl std::fmt::Display) -> DomainError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|t| t.offset)
            .unwrap_or(self.src.len());
        self.error_at(offset, msg)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), DomainError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {:?}", expected)))
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn or(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.comparison()?;
        while self.eat(&Token::And) {
            let right = self.comparison()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Self::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Self::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, DomainError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Self::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, DomainError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Not) => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.pos += 1;
        let expr = self.unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn primary(&mut self) -> Result<Expr, DomainError> {
        let Some(token) = self.advance() else {
            return Err(self.error_here("unexpected end of expression"));
        };

        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Boolean(true))),
            Token::False => Ok(Expr::Literal(Value::Boolean(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => {
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => self.call(name),
            Token::Ident(name) => Ok(Expr::Column(name)),
            other => {
                self.pos -= 1;
                Err(self.error_here(format!("unexpected {:?}", other)))
            }
        }
    }

    fn call(&mut self, name: String) -> Result<Expr, DomainError> {
        let Some(callee) = resolve_function(&name) else {
            return Err(self.error_here(format!("unknown function '{}'", name)));
        };
        self.expect(Token::LParen)?;

        let expr = match callee {
            Callee::Aggregate(function) => {
                let column = self.column_arg(&name)?;
                Expr::Aggregate(AggregateCall {
                    function,
                    column,
                    distinct: None,
                })
            }
            Callee::DistinctGroup(function) => {
                let column = self.column_arg(&name)?;
                self.expect(Token::Comma)?;
                let group_columns = self.column_list_arg(&name)?;
                self.expect(Token::Comma)?;
                let distinct_column = self.column_arg(&name)?;
                Expr::Aggregate(AggregateCall {
                    function,
                    column,
                    distinct: Some(DistinctGroup {
                        group_columns,
                        distinct_column,
                    }),
                })
            }
            Callee::Scalar(function) => {
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    args.push(self.or()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.or()?);
                    }
                }
                let arity_ok = match function {
                    ScalarFunction::Abs | ScalarFunction::Len => args.len() == 1,
                    ScalarFunction::Round => (1..=2).contains(&args.len()),
                };
                if !arity_ok {
                    return Err(self.error_here(format!(
                        "wrong number of arguments for {}",
                        name.to_uppercase()
                    )));
                }
                Expr::Scalar { function, args }
            }
        };

        self.expect(Token::RParen)?;
        Ok(expr)
    }

    /// Column name argument: a string literal or a bare identifier.
    fn column_arg(&mut self, function: &str) -> Result<String, DomainError> {
        let start = self.pos;
        match self.advance() {
            Some(Token::Str(s)) | Some(Token::Ident(s)) if !s.is_empty() => Ok(s),
            _ => {
                self.pos = start;
                Err(self.error_here(format!(
                    "{} expects a column name",
                    function.to_uppercase()
                )))
            }
        }
    }

    /// `["a", "b"]` or a single column name.
    fn column_list_arg(&mut self, function: &str) -> Result<Vec<String>, DomainError> {
        if !self.eat(&Token::LBracket) {
            return Ok(vec![self.column_arg(function)?]);
        }
        let mut columns = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(columns);
        }
        loop {
            columns.push(self.column_arg(function)?);
            if self.eat(&Token::RBracket) {
                return Ok(columns);
            }
            self.expect(Token::Comma)?;
        }
    }
}
