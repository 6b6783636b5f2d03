//! Formula tokenizer
//!
//! Converts spreadsheet formula text like `=SUM(Data!A2:A9)*1.1` into a
//! sequence of tokens that can be parsed into an AST.

use std::iter::Peekable;
use std::str::Chars;

/// A token in a formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal (e.g., 123, 45.67, 1.5e10)
    Number(f64),
    /// A double-quoted string literal
    Text(String),
    /// Function name, cell address, column letters or boolean
    Identifier(String),
    /// Sheet qualifier preceding a reference: `Data!` or `'My Sheet'!`
    Sheet(String),
    /// Binary/comparison operators: + - * / ^ & = <> >= <= < >
    Operator(String),
    OpenParen,
    CloseParen,
    Comma,
    /// Colon for ranges (A1:B2)
    Colon,
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub position: usize,
}

impl TokenizeError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tokenize error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for TokenizeError {}

/// Tokenizer for formula expressions
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given formula string
    pub fn new(formula: &'a str) -> Self {
        let formula = formula.trim_start();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        Self {
            chars: formula.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire formula into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' => self.read_string()?,
            '\'' => self.read_quoted_sheet()?,

            '(' => self.single(Token::OpenParen),
            ')' => self.single(Token::CloseParen),
            ',' => self.single(Token::Comma),
            ':' => self.single(Token::Colon),

            '+' | '-' | '*' | '/' | '^' | '&' | '=' => {
                self.advance();
                Token::Operator(c.to_string())
            }
            '<' => self.read_less_than_operator(),
            '>' => self.read_greater_than_operator(),

            c if c.is_ascii_digit() || c == '.' => self.read_number()?,

            c if c.is_alphabetic() || c == '_' || c == '$' => self.read_identifier(),

            c => {
                return Err(TokenizeError::new(
                    format!("Unexpected character: '{}'", c),
                    self.position,
                ));
            }
        };
        Ok(Some(token))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Consume characters while the predicate holds
    fn take_while(&mut self, pred: impl Fn(char) -> bool, out: &mut String) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.advance();
        }
    }

    /// Read text up to the closing quote; a doubled quote is an escaped quote
    fn read_quoted(&mut self, quote: char) -> Result<String, TokenizeError> {
        self.advance();
        let start_pos = self.position;
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(TokenizeError::new("Unterminated quoted text", start_pos));
                }
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        value.push(quote);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }

        Ok(value)
    }

    fn read_string(&mut self) -> Result<Token, TokenizeError> {
        self.read_quoted('"').map(Token::Text)
    }

    /// `'Sheet name'!`; single quotes only ever delimit sheet names
    fn read_quoted_sheet(&mut self) -> Result<Token, TokenizeError> {
        let name = self.read_quoted('\'')?;
        if self.peek() != Some('!') {
            return Err(TokenizeError::new(
                format!("Expected '!' after sheet name '{}'", name),
                self.position,
            ));
        }
        self.advance();
        Ok(Token::Sheet(name))
    }

    /// Read a number (integer, decimal, or scientific notation)
    fn read_number(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        let mut num_str = String::new();

        self.take_while(|c| c.is_ascii_digit(), &mut num_str);

        if self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.take_while(|c| c.is_ascii_digit(), &mut num_str);
        }

        if let Some(e @ ('e' | 'E')) = self.peek() {
            num_str.push(e);
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.take_while(|c| c.is_ascii_digit(), &mut num_str);
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| TokenizeError::new(format!("Invalid number: {}", num_str), start_pos))
    }

    /// Identifier, or a sheet qualifier when directly followed by '!'
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        self.take_while(
            |c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$',
            &mut ident,
        );

        if self.peek() == Some('!') {
            self.advance();
            return Token::Sheet(ident);
        }

        Token::Identifier(ident)
    }

    fn read_less_than_operator(&mut self) -> Token {
        self.advance();

        match self.peek() {
            Some('=') => self.single(Token::Operator("<=".to_string())),
            Some('>') => self.single(Token::Operator("<>".to_string())),
            _ => Token::Operator("<".to_string()),
        }
    }

    fn read_greater_than_operator(&mut self) -> Token {
        self.advance();

        match self.peek() {
            Some('=') => self.single(Token::Operator(">=".to_string())),
            _ => Token::Operator(">".to_string()),
        }
    }
}

/// Convenience function to tokenize a formula string
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(formula).tokenize()
}
