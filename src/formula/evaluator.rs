//! Formula evaluator
//!
//! Evaluates a fully substituted AST to a value. The evaluator has no
//! environment: every reference must already have been replaced by literal
//! values, and only an allow-listed set of functions can be called.

use super::parser::Expr;
use crate::types::CellValue;
use std::cmp::Ordering;

/// Functions the evaluator will run; anything else is rejected
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "SUM",
    "AVERAGE",
    "MIN",
    "MAX",
    "COUNT",
    "IF",
    "AND",
    "OR",
    "NOT",
    "IFERROR",
    "ABS",
    "ROUND",
    "ROUNDUP",
    "ROUNDDOWN",
    "VLOOKUP",
];

/// Value type that can be returned from evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Block of values, one inner vector per column
    Array(Vec<Vec<Value>>),
    /// Empty cell
    Null,
}

impl Value {
    /// Numeric view of a scalar; empty counts as zero
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            Value::Array(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Null => String::new(),
            Value::Array(cols) => {
                let strs: Vec<String> = cols.iter().flatten().map(Value::as_text).collect();
                format!("[{}]", strs.join(", "))
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            Value::Null => Some(false),
            Value::Text(s) => match s.to_uppercase().as_str() {
                "TRUE" => Some(true),
                "FALSE" => Some(false),
                _ => None,
            },
            Value::Array(_) => None,
        }
    }

    /// Text form usable inside an array literal
    pub fn literal(&self) -> String {
        match self {
            Value::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
            other => other.as_text(),
        }
    }

    /// Convert back to the cell representation
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            Value::Number(n) => CellValue::Float(*n),
            Value::Text(s) => CellValue::Text(s.clone()),
            Value::Boolean(b) => CellValue::Bool(*b),
            Value::Null => CellValue::Empty,
            Value::Array(cols) => match single(cols) {
                Some(v) => v.to_cell_value(),
                None => CellValue::Text(self.as_text()),
            },
        }
    }

    /// A 1×1 array collapses to its only value
    fn into_scalar(self) -> Result<Value, EvalError> {
        match self {
            Value::Array(cols) => match single(&cols) {
                Some(v) => Ok(v.clone()),
                None => Err(EvalError::new("A multi-cell range cannot be used as a single value")),
            },
            other => Ok(other),
        }
    }
}

fn single(cols: &[Vec<Value>]) -> Option<&Value> {
    match cols {
        [col] if col.len() == 1 => col.first(),
        _ => None,
    }
}

impl From<&CellValue> for Value {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Null,
            CellValue::Int(i) => Value::Number(*i as f64),
            CellValue::Float(f) => Value::Number(*f),
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::Bool(b) => Value::Boolean(*b),
        }
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Eval error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Evaluate an expression whose references have all been substituted
pub fn evaluate(expr: &Expr) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Array(cols) => Ok(Value::Array(cols.clone())),

        Expr::Range(_) | Expr::Series(_) | Expr::Generic(_) => Err(EvalError::new(format!(
            "Reference {} has no values bound",
            expr
        ))),

        Expr::FunctionCall { name, args } => evaluate_function(name, args),

        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate_scalar(left)?;
            let right_val = evaluate_scalar(right)?;
            evaluate_binary_op(op, &left_val, &right_val)
        }

        Expr::UnaryOp { op, operand } => {
            let val = evaluate_scalar(operand)?;
            evaluate_unary_op(op, &val)
        }
    }
}

fn evaluate_scalar(expr: &Expr) -> Result<Value, EvalError> {
    evaluate(expr)?.into_scalar()
}

fn number(value: &Value, what: &str) -> Result<f64, EvalError> {
    value
        .as_number()
        .ok_or_else(|| EvalError::new(format!("{} must be a number, got '{}'", what, value.as_text())))
}

/// Evaluate a binary operation
fn evaluate_binary_op(op: &str, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if op == "&" {
        return Ok(Value::Text(format!("{}{}", left.as_text(), right.as_text())));
    }

    if let Some(result) = comparison(op, compare_values(left, right)) {
        return Ok(Value::Boolean(result));
    }

    let l = number(left, "Left operand")?;
    let r = number(right, "Right operand")?;
    match op {
        "+" => Ok(Value::Number(l + r)),
        "-" => Ok(Value::Number(l - r)),
        "*" => Ok(Value::Number(l * r)),
        "/" => {
            if r == 0.0 {
                Err(EvalError::new("Division by zero"))
            } else {
                Ok(Value::Number(l / r))
            }
        }
        "^" => {
            let result = l.powf(r);
            if result.is_finite() {
                Ok(Value::Number(result))
            } else {
                Err(EvalError::new(format!("{}^{} is not a finite number", l, r)))
            }
        }
        _ => Err(EvalError::new(format!("Unknown operator: {}", op))),
    }
}

/// Outcome of a comparison operator, `None` for any other operator
fn comparison(op: &str, ordering: Ordering) -> Option<bool> {
    match op {
        "=" => Some(ordering == Ordering::Equal),
        "<>" => Some(ordering != Ordering::Equal),
        "<" => Some(ordering == Ordering::Less),
        ">" => Some(ordering == Ordering::Greater),
        "<=" => Some(ordering != Ordering::Greater),
        ">=" => Some(ordering != Ordering::Less),
        _ => None,
    }
}

/// Spreadsheet ordering: numbers < text < booleans, text case-insensitive
fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) | Value::Null => 0,
            Value::Text(_) => 1,
            Value::Boolean(_) => 2,
            Value::Array(_) => 3,
        }
    }

    match (left, right) {
        (Value::Text(l), Value::Null) => l.to_lowercase().as_str().cmp(""),
        (Value::Null, Value::Text(r)) => "".cmp(r.to_lowercase().as_str()),
        (Value::Text(l), Value::Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
        (l, r) if rank(l) == 0 && rank(r) == 0 => {
            let a = l.as_number().unwrap_or(0.0);
            let b = r.as_number().unwrap_or(0.0);
            if (a - b).abs() < 1e-10 {
                Ordering::Equal
            } else {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(op: &str, operand: &Value) -> Result<Value, EvalError> {
    match op {
        "-" => Ok(Value::Number(-number(operand, "Operand")?)),
        _ => Err(EvalError::new(format!("Unknown unary operator: {}", op))),
    }
}

/// Evaluate a function call
fn evaluate_function(name: &str, args: &[Expr]) -> Result<Value, EvalError> {
    let upper_name = name.to_uppercase();
    let upper_name = upper_name.trim_start_matches("_XLFN.");

    match upper_name {
        // ═══════════════════════════════════════════════════════════════════════
        // MATH FUNCTIONS
        // ═══════════════════════════════════════════════════════════════════════
        "ABS" => {
            require_args(upper_name, args, 1)?;
            let val = number(&evaluate_scalar(&args[0])?, "ABS argument")?;
            Ok(Value::Number(val.abs()))
        }

        "ROUND" | "ROUNDUP" | "ROUNDDOWN" => {
            require_args_range(upper_name, args, 1, 2)?;
            let val = number(&evaluate_scalar(&args[0])?, "Rounded value")?;
            let decimals = if args.len() > 1 {
                number(&evaluate_scalar(&args[1])?, "Digit count")?.trunc() as i32
            } else {
                0
            };
            let multiplier = 10_f64.powi(decimals);
            let scaled = val.abs() * multiplier;
            let rounded = match upper_name {
                "ROUND" => scaled.round(),
                "ROUNDUP" => scaled.ceil(),
                _ => scaled.floor(),
            };
            Ok(Value::Number(val.signum() * rounded / multiplier))
        }

        // ═══════════════════════════════════════════════════════════════════════
        // AGGREGATION FUNCTIONS
        // ═══════════════════════════════════════════════════════════════════════
        "SUM" => {
            let values = collect_numeric_values(upper_name, args)?;
            Ok(Value::Number(values.iter().sum()))
        }

        "AVERAGE" => {
            let values = collect_numeric_values(upper_name, args)?;
            if values.is_empty() {
                Err(EvalError::new("AVERAGE of empty set"))
            } else {
                Ok(Value::Number(
                    values.iter().sum::<f64>() / values.len() as f64,
                ))
            }
        }

        "MIN" => {
            let values = collect_numeric_values(upper_name, args)?;
            values
                .into_iter()
                .reduce(f64::min)
                .map(Value::Number)
                .ok_or_else(|| EvalError::new("MIN of empty set"))
        }

        "MAX" => {
            let values = collect_numeric_values(upper_name, args)?;
            values
                .into_iter()
                .reduce(f64::max)
                .map(Value::Number)
                .ok_or_else(|| EvalError::new("MAX of empty set"))
        }

        "COUNT" => {
            let mut count = 0;
            for arg in args {
                match evaluate(arg)? {
                    Value::Array(cols) => {
                        count += cols
                            .iter()
                            .flatten()
                            .filter(|v| matches!(v, Value::Number(_)))
                            .count();
                    }
                    Value::Number(_) => count += 1,
                    _ => {}
                }
            }
            Ok(Value::Number(count as f64))
        }

        // ═══════════════════════════════════════════════════════════════════════
        // LOGICAL FUNCTIONS
        // ═══════════════════════════════════════════════════════════════════════
        "IF" => {
            require_args_range(upper_name, args, 2, 3)?;
            if truthy(&evaluate_scalar(&args[0])?)? {
                evaluate(&args[1])
            } else if args.len() > 2 {
                evaluate(&args[2])
            } else {
                Ok(Value::Boolean(false))
            }
        }

        "AND" | "OR" => {
            require_args_range(upper_name, args, 1, usize::MAX)?;
            let flags = collect_flags(args)?;
            if flags.is_empty() {
                return Err(EvalError::new(format!("{} has no logical values", upper_name)));
            }
            Ok(Value::Boolean(if upper_name == "AND" {
                flags.iter().all(|f| *f)
            } else {
                flags.iter().any(|f| *f)
            }))
        }

        "NOT" => {
            require_args(upper_name, args, 1)?;
            Ok(Value::Boolean(!truthy(&evaluate_scalar(&args[0])?)?))
        }

        "IFERROR" => {
            require_args(upper_name, args, 2)?;
            match evaluate(&args[0]) {
                Ok(val) => Ok(val),
                Err(_) => evaluate(&args[1]),
            }
        }

        // ═══════════════════════════════════════════════════════════════════════
        // LOOKUP FUNCTIONS
        // ═══════════════════════════════════════════════════════════════════════
        "VLOOKUP" => {
            require_args_range(upper_name, args, 3, 4)?;
            let needle = evaluate_scalar(&args[0])?;
            let table = match evaluate(&args[1])? {
                Value::Array(cols) => cols,
                scalar => vec![vec![scalar]],
            };
            let index = number(&evaluate_scalar(&args[2])?, "VLOOKUP column index")?;
            let exact = if args.len() > 3 {
                !truthy(&evaluate_scalar(&args[3])?)?
            } else {
                false
            };
            vlookup(&needle, &table, index, exact)
        }

        _ => Err(EvalError::new(format!("Unknown function: {}", name))),
    }
}

fn vlookup(needle: &Value, table: &[Vec<Value>], index: f64, exact: bool) -> Result<Value, EvalError> {
    if index < 1.0 || index.trunc() as usize > table.len() {
        return Err(EvalError::new(format!(
            "VLOOKUP column index {} outside 1..={}",
            index,
            table.len()
        )));
    }
    let column = index.trunc() as usize - 1;
    let keys = table.first().map(Vec::as_slice).unwrap_or_default();

    let row = if exact {
        keys.iter()
            .position(|k| compare_values(k, needle) == Ordering::Equal)
    } else {
        // Approximate match assumes ascending keys: last key not above the needle
        keys.iter()
            .take_while(|k| compare_values(k, needle) != Ordering::Greater)
            .enumerate()
            .last()
            .map(|(i, _)| i)
    };

    row.and_then(|r| table[column].get(r).cloned())
        .ok_or_else(|| EvalError::new(format!("VLOOKUP found no match for '{}'", needle.as_text())))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Require exact number of arguments
fn require_args(func: &str, args: &[Expr], count: usize) -> Result<(), EvalError> {
    if args.len() != count {
        Err(EvalError::new(format!(
            "{} requires {} argument(s), got {}",
            func,
            count,
            args.len()
        )))
    } else {
        Ok(())
    }
}

/// Require arguments in range
fn require_args_range(func: &str, args: &[Expr], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        Err(EvalError::new(format!(
            "{} requires {}-{} arguments, got {}",
            func,
            min,
            max,
            args.len()
        )))
    } else {
        Ok(())
    }
}

fn truthy(value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| {
        EvalError::new(format!("'{}' is not a logical value", value.as_text()))
    })
}

/// Numbers from ranges are taken as-is (other content skipped); direct
/// arguments must coerce
fn collect_numeric_values(func: &str, args: &[Expr]) -> Result<Vec<f64>, EvalError> {
    let mut values = Vec::new();

    for arg in args {
        match evaluate(arg)? {
            Value::Array(cols) => {
                values.extend(cols.iter().flatten().filter_map(|v| match v {
                    Value::Number(n) => Some(*n),
                    _ => None,
                }));
            }
            scalar => values.push(number(&scalar, &format!("{} argument", func))?),
        }
    }

    Ok(values)
}

fn collect_flags(args: &[Expr]) -> Result<Vec<bool>, EvalError> {
    let mut flags = Vec::new();
    for arg in args {
        match evaluate(arg)? {
            Value::Array(cols) => {
                flags.extend(cols.iter().flatten().filter_map(|v| match v {
                    Value::Boolean(b) => Some(*b),
                    Value::Number(n) => Some(*n != 0.0),
                    _ => None,
                }));
            }
            scalar => flags.push(truthy(&scalar)?),
        }
    }
    Ok(flags)
}
