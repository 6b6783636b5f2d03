//! Formula language: tokenizer, recursive-descent parser, serializer and a
//! restricted evaluator.

pub mod evaluator;
pub mod parser;
pub mod tokenizer;

pub use evaluator::{evaluate, EvalError, Value, ALLOWED_FUNCTIONS};
pub use parser::{parse_formula, Expr, ParseError, RangeRef};
pub use tokenizer::{tokenize, Token};

use crate::error::{ForgeError, ForgeResult};

/// Parse formula text, reporting failures as [`ForgeError::Parse`]
pub fn parse(formula: &str) -> ForgeResult<Expr> {
    parse_formula(formula).map_err(|e| ForgeError::Parse {
        formula: formula.to_string(),
        message: e.to_string(),
    })
}
