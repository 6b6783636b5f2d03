//! Expands generic formulas row by row and evaluates them against the values
//! of the series they read.

use super::generalizer::specialize;
use super::rewriter::to_cell_syntax;
use crate::error::{ForgeError, ForgeResult};
use crate::extraction::SeriesIndex;
use crate::formula::{evaluate, Expr, Value};
use crate::types::{CellValue, RowSpan, Series, SeriesDataType, SeriesId, SeriesRange};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Value arrays per series, indexed by offset
pub type SeriesValues = BTreeMap<SeriesId, Vec<CellValue>>;

/// Evaluate a generic formula for data rows `lo..=hi` (1-based)
pub fn materialize(
    series: &Series,
    generic: &Expr,
    lo: usize,
    hi: usize,
    values: &SeriesValues,
    index: &SeriesIndex,
) -> ForgeResult<Vec<CellValue>> {
    let mut out = Vec::with_capacity(hi.saturating_sub(lo) + 1);

    for n in lo..=hi {
        let concrete = specialize(generic, n, index);
        let failed = |message: String| ForgeError::Evaluation {
            series: series.id.clone(),
            row: n,
            formula: cell_text(&concrete, series.sheet(), index),
            message,
        };

        let bound = substitute(&concrete, values).map_err(|e| match e {
            Missing::Series(err) => {
                err.in_series(&series.id, n, &cell_text(&concrete, series.sheet(), index))
            }
            Missing::Offsets(message) => failed(message),
        })?;
        let value = evaluate(&bound).map_err(|e| failed(e.message))?;
        out.push(to_series_value(&value, series.data_type));
    }

    Ok(out)
}

/// Evaluate every generic series in `order`, committing each value array
/// before any later series reads it. `values` must already hold the raw
/// values of series without a generic formula.
pub fn evaluate_in_order(
    all: &[Series],
    order: &[SeriesId],
    index: &SeriesIndex,
    values: &mut SeriesValues,
) -> ForgeResult<()> {
    let by_id: HashMap<&SeriesId, &Series> = all.iter().map(|s| (&s.id, s)).collect();
    let mut evaluated = 0;

    for id in order {
        let Some(series) = by_id.get(id) else {
            continue;
        };
        let Some(generic) = &series.generic_formula else {
            continue;
        };
        if series.length == 0 {
            values.insert(id.clone(), Vec::new());
            continue;
        }

        let computed = materialize(series, generic, 1, series.length, values, index)?;
        debug!(series = %id, rows = computed.len(), "materialized");
        values.insert(id.clone(), computed);
        evaluated += 1;
    }

    info!(series = evaluated, "evaluated generic formulas");
    Ok(())
}

enum Missing {
    Series(ForgeError),
    Offsets(String),
}

/// Replace each series reference with the literal values it covers
fn substitute(expr: &Expr, values: &SeriesValues) -> Result<Expr, Missing> {
    match expr {
        Expr::FunctionCall { name, args } => Ok(Expr::FunctionCall {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| substitute(a, values))
                .collect::<Result<_, _>>()?,
        }),
        Expr::BinaryOp { op, left, right } => Ok(Expr::BinaryOp {
            op: op.clone(),
            left: Box::new(substitute(left, values)?),
            right: Box::new(substitute(right, values)?),
        }),
        Expr::UnaryOp { op, operand } => Ok(Expr::UnaryOp {
            op: op.clone(),
            operand: Box::new(substitute(operand, values)?),
        }),
        Expr::Series(range) => slice(range, values),
        other => Ok(other.clone()),
    }
}

fn slice(range: &SeriesRange, values: &SeriesValues) -> Result<Expr, Missing> {
    let mut columns = Vec::with_capacity(range.series.len());

    for id in &range.series {
        let data = values.get(id).ok_or_else(|| {
            Missing::Series(ForgeError::unresolved(
                id.sheet.clone(),
                Expr::Series(range.clone()).to_string(),
            ))
        })?;

        let cells = match range.span {
            RowSpan::WholeColumn => data.as_slice(),
            RowSpan::Offsets { start, end } => {
                let in_range = start >= 0 && end >= start && (end as usize) < data.len();
                if !in_range {
                    return Err(Missing::Offsets(format!(
                        "offsets {}..={} outside {} (length {})",
                        start,
                        end,
                        id,
                        data.len()
                    )));
                }
                &data[start as usize..=end as usize]
            }
        };
        columns.push(cells.iter().map(Value::from).collect::<Vec<_>>());
    }

    Ok(match columns.as_slice() {
        [column] if column.len() == 1 => match &column[0] {
            Value::Number(n) => Expr::Number(*n),
            Value::Text(s) => Expr::Text(s.clone()),
            Value::Boolean(b) => Expr::Boolean(*b),
            _ => Expr::Array(columns),
        },
        _ => Expr::Array(columns),
    })
}

fn to_series_value(value: &Value, data_type: SeriesDataType) -> CellValue {
    match (value, data_type) {
        (Value::Number(n), SeriesDataType::Int) if n.fract() == 0.0 && n.abs() < 1e15 => {
            CellValue::Int(*n as i64)
        }
        _ => value.to_cell_value(),
    }
}

/// Formula text in A1 notation when possible, for error messages
fn cell_text(expr: &Expr, sheet: &str, index: &SeriesIndex) -> String {
    to_cell_syntax(expr, sheet, index)
        .map(|e| format!("={}", e))
        .unwrap_or_else(|_| expr.to_string())
}
