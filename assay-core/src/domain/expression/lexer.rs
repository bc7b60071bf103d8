// assay-core/src/domain/expression/lexer.rs

use crate::domain::error::DomainError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Splits a formula into tokens.
///
/// Known column names are matched before generic identifiers, longest name
/// first, so a column such as `Unit Price` or `amount_total` is never cut
/// short by a shorter column that happens to be its prefix.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    columns: Vec<&'a str>,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, columns: &[&'a str]) -> Self {
        let mut columns: Vec<&'a str> = columns
            .iter()
            .copied()
            .filter(|c| c.chars().next().is_some_and(is_ident_start))
            .collect();
        columns.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            src,
            pos: 0,
            columns,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, DomainError> {
        let mut tokens = Vec::new();
        while let Some(spanned) = self.next_token()? {
            tokens.push(spanned);
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, msg: impl std::fmt::Display) -> DomainError {
        DomainError::parse(format!("{} at offset {} in '{}'", msg, self.pos, self.src))
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, DomainError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let offset = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            ',' => self.single(Token::Comma),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '=' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                }
                Token::Eq
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ne
                } else {
                    Token::Not
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Token::Le
                    }
                    Some('>') => {
                        self.bump();
                        Token::Ne
                    }
                    _ => Token::Lt,
                }
            }
            '&' => self.double('&', Token::And)?,
            '|' => self.double('|', Token::Or)?,
            '"' | '\'' => self.string(c)?,
            '`' => self.quoted_ident()?,
            c if c.is_ascii_digit() || c == '.' => self.number()?,
            c if is_ident_start(c) => self.ident(),
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };

        Ok(Some(Spanned { token, offset }))
    }

    fn single(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn double(&mut self, expected: char, token: Token) -> Result<Token, DomainError> {
        self.bump();
        if self.peek() == Some(expected) {
            self.bump();
            Ok(token)
        } else {
            Err(self.error(format!("expected '{}{}'", expected, expected)))
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, DomainError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => return Err(self.error("unterminated escape sequence")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn quoted_ident(&mut self) -> Result<Token, DomainError> {
        self.bump();
        let start = self.pos;
        while let Some(c) = self.bump() {
            if c == '`' {
                let name = &self.src[start..self.pos - 1];
                return Ok(Token::Ident(name.to_string()));
            }
        }
        Err(self.error("unterminated quoted identifier"))
    }

    fn number(&mut self) -> Result<Token, DomainError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }

    fn ident(&mut self) -> Token {
        let rest = self.rest();
        let known = self.columns.iter().copied().find(|col| {
            rest.starts_with(*col) && !rest[col.len()..].chars().next().is_some_and(is_ident_char)
        });
        if let Some(col) = known {
            self.pos += col.len();
            return Token::Ident(col.to_string());
        }

        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        let word = &self.src[start..self.pos];
        match word.to_ascii_lowercase().as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Ident(word.to_string()),
        }
    }
}
