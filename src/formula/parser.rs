//! Formula parser
//!
//! Converts a sequence of tokens into an Abstract Syntax Tree (AST).
//! Uses recursive descent parsing with spreadsheet operator precedence.
//! `Display` on [`Expr`] turns a tree back into formula text.

use super::evaluator::Value;
use super::tokenizer::{tokenize, Token};
use crate::coordinates::{
    format_range, is_cell_reference, is_column_only, parse_range, sheet_prefix, RangeBounds,
};
use crate::types::{GenericRange, RowSpan, SeriesId, SeriesRange};
use std::fmt;

/// A cell or range operand as written in the formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRef {
    /// Sheet qualifier, `None` when the formula's own sheet is meant
    pub sheet: Option<String>,
    pub bounds: RangeBounds,
}

/// Abstract Syntax Tree node for formula expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Cell range in A1 notation
    Range(RangeRef),
    /// Cell range resolved to series
    Series(SeriesRange),
    /// Series reference parameterized by row index
    Generic(GenericRange),
    /// Literal block of values, one inner vector per column
    Array(Vec<Vec<Value>>),
    /// Function call: NAME(arg1, arg2, ...)
    FunctionCall { name: String, args: Vec<Expr> },
    /// Binary operation: left op right
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation: -expr
    UnaryOp { op: String, operand: Box<Expr> },
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Parser for formula tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser for the given tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the tokens into an AST
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("Empty expression", 0));
        }
        let expr = self.expression()?;

        if !self.is_at_end() {
            return Err(ParseError::new(
                format!("Unexpected token after expression: {:?}", self.peek()),
                self.position,
            ));
        }

        Ok(expr)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any_operator(&mut self, ops: &[&str]) -> Option<String> {
        if let Some(Token::Operator(s)) = self.peek() {
            if ops.contains(&s.as_str()) {
                let op = s.clone();
                self.advance();
                return Some(op);
            }
        }
        None
    }

    fn binary_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;

        while let Some(op) = self.match_any_operator(ops) {
            let right = next(self)?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.comparison()
    }

    /// Comparison: concat (( "=" | "<>" | "<" | ">" | "<=" | ">=" ) concat)*
    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["=", "<>", "<", ">", "<=", ">="], Self::concat)
    }

    /// Concat: term ( "&" term )*
    fn concat(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["&"], Self::term)
    }

    /// Term: factor (( "+" | "-" ) factor)*
    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["+", "-"], Self::factor)
    }

    /// Factor: power (( "*" | "/" ) power)*
    fn factor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["*", "/"], Self::power)
    }

    /// Power: unary ( "^" power )?   (right-associative)
    fn power(&mut self) -> Result<Expr, ParseError> {
        let left = self.unary()?;

        if self.match_any_operator(&["^"]).is_some() {
            let right = self.power()?;
            Ok(Expr::BinaryOp {
                op: "^".to_string(),
                left: Box::new(left),
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    /// Unary: ( "-" | "+" ) unary | primary
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(op) = self.match_any_operator(&["-", "+"]) {
            let operand = self.unary()?;
            if op == "+" {
                return Ok(operand);
            }
            Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            })
        } else {
            self.primary()
        }
    }

    /// Arguments: ( expr ( "," expr )* )?
    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if let Some(Token::CloseParen) = self.peek() {
            return Ok(args);
        }

        args.push(self.expression()?);
        while self.match_token(&Token::Comma) {
            args.push(self.expression()?);
        }

        Ok(args)
    }

    /// Primary: NUMBER | STRING | BOOLEAN | call | reference | "(" expr ")"
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.position;

        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::Identifier(name)) => {
                if self.match_token(&Token::OpenParen) {
                    let args = self.arguments()?;
                    if !self.match_token(&Token::CloseParen) {
                        return Err(ParseError::new(
                            "Expected ')' after function arguments",
                            self.position,
                        ));
                    }
                    return Ok(Expr::FunctionCall { name, args });
                }
                match name.to_uppercase().as_str() {
                    "TRUE" => Ok(Expr::Boolean(true)),
                    "FALSE" => Ok(Expr::Boolean(false)),
                    _ => self.reference(None, name, start),
                }
            }
            Some(Token::Sheet(sheet)) => match self.advance() {
                Some(Token::Identifier(name)) => self.reference(Some(sheet), name, start),
                _ => Err(ParseError::new(
                    format!("Expected a cell reference after '{}!'", sheet),
                    self.position,
                )),
            },
            Some(Token::OpenParen) => {
                let expr = self.expression()?;
                if !self.match_token(&Token::CloseParen) {
                    return Err(ParseError::new(
                        "Expected ')' after expression",
                        self.position,
                    ));
                }
                Ok(expr)
            }
            Some(token) => Err(ParseError::new(
                format!("Unexpected token: {:?}", token),
                start,
            )),
            None => Err(ParseError::new("Unexpected end of expression", start)),
        }
    }

    /// Cell address, optionally followed by ":" and a second corner
    fn reference(
        &mut self,
        sheet: Option<String>,
        first: String,
        start: usize,
    ) -> Result<Expr, ParseError> {
        let text = if self.match_token(&Token::Colon) {
            // Excel tolerates a repeated qualifier on the second corner
            if let Some(Token::Sheet(_)) = self.peek() {
                self.advance();
            }
            match self.advance() {
                Some(Token::Identifier(second)) => format!("{}:{}", first, second),
                Some(Token::Number(n)) if n.fract() == 0.0 => {
                    return Err(ParseError::new(
                        format!("Row ranges are not supported: {}:{}", first, n),
                        start,
                    ))
                }
                _ => {
                    return Err(ParseError::new(
                        "Expected a cell reference after ':'",
                        self.position,
                    ))
                }
            }
        } else if is_cell_reference(&first) {
            first
        } else {
            return Err(ParseError::new(format!("Unknown name: {}", first), start));
        };

        let (a, b) = text
            .split_once(':')
            .unwrap_or((text.as_str(), text.as_str()));
        let valid = (is_cell_reference(a) && is_cell_reference(b))
            || (is_column_only(a.trim_start_matches('$'))
                && is_column_only(b.trim_start_matches('$')));
        if !valid {
            return Err(ParseError::new(format!("Invalid range: {}", text), start));
        }

        let bounds = parse_range(&text)
            .map_err(|_| ParseError::new(format!("Invalid range: {}", text), start))?;
        Ok(Expr::Range(RangeRef { sheet, bounds }))
    }
}

/// Convenience function to parse tokens into an AST
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    Parser::new(tokens).parse()
}

/// Tokenize and parse formula text in one step
pub fn parse_formula(formula: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(formula).map_err(|e| ParseError::new(e.message, e.position))?;
    parse(tokens)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

fn binary_precedence(op: &str) -> u8 {
    match op {
        "&" => 2,
        "+" | "-" => 3,
        "*" | "/" => 4,
        "^" => 5,
        _ => 1,
    }
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::BinaryOp { op, .. } => binary_precedence(op),
            Expr::UnaryOp { .. } => 6,
            _ => 7,
        }
    }

    /// Walk every node, parents before children
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::FunctionCall { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Expr::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::UnaryOp { operand, .. } => operand.visit(f),
            _ => {}
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn write_ids(f: &mut fmt::Formatter<'_>, ids: &[SeriesId]) -> fmt::Result {
    let joined: Vec<String> = ids.iter().map(SeriesId::to_string).collect();
    write!(f, "{{{}}}", joined.join("|"))
}

fn write_span(f: &mut fmt::Formatter<'_>, span: &RowSpan) -> fmt::Result {
    match span {
        RowSpan::Offsets { start, end } => write!(f, "[{}:{}]", start, end),
        RowSpan::WholeColumn => write!(f, "[*]"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write_number(f, *n),
            Expr::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Expr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Range(range) => {
                if let Some(sheet) = &range.sheet {
                    write!(f, "{}", sheet_prefix(sheet))?;
                }
                write!(f, "{}", format_range(&range.bounds))
            }
            Expr::Series(range) => {
                write_ids(f, &range.series)?;
                write_span(f, &range.span)
            }
            Expr::Generic(range) => {
                write_ids(f, &range.series)?;
                write_span(f, &range.span)?;
                if let Some((ds, de)) = range.row_delta {
                    write!(f, "+n*[{}:{}]", ds, de)?;
                }
                let moved: Vec<String> = range
                    .position_deltas
                    .iter()
                    .map(|(r, c)| format!("{},{}", r, c))
                    .collect();
                if range.position_deltas.iter().any(|d| *d != (0, 0)) {
                    write!(f, "@n*({})", moved.join("|"))?;
                }
                Ok(())
            }
            Expr::Array(columns) => {
                let height = columns.iter().map(Vec::len).max().unwrap_or(0);
                let rows: Vec<String> = (0..height)
                    .map(|r| {
                        columns
                            .iter()
                            .map(|col| col.get(r).map(Value::literal).unwrap_or_default())
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .collect();
                write!(f, "{{{}}}", rows.join(";"))
            }
            Expr::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::BinaryOp { op, left, right } => {
                let prec = binary_precedence(op);
                let (left_parens, right_parens) = if op == "^" {
                    (left.precedence() <= prec, right.precedence() < prec)
                } else {
                    (left.precedence() < prec, right.precedence() <= prec)
                };
                write_operand(f, left, left_parens)?;
                write!(f, "{}", op)?;
                write_operand(f, right, right_parens)
            }
            Expr::UnaryOp { op, operand } => {
                write!(f, "{}", op)?;
                write_operand(f, operand, operand.precedence() < 6)
            }
        }
    }
}
