//! Formula generalization.
//!
//! Two rewritten sample formulas from consecutive data cells of a series are
//! walked in lockstep. Every series reference pair yields the per-row change
//! of its offsets and of its series' header positions; everything else must
//! match structurally. The result is one formula parameterized by the row
//! index n, accepted only if re-specializing it at n = 1 and n = 2
//! reproduces both samples exactly.

use super::rewriter::rewrite;
use crate::error::{ForgeError, ForgeResult};
use crate::extraction::SeriesIndex;
use crate::formula::{self, Expr};
use crate::types::{GenericRange, RowSpan, Series, SeriesId, SeriesRange};
use tracing::debug;

/// Parse, rewrite, generalize and verify the sample formulas of a series.
///
/// Returns `Ok(None)` when the first data cell holds no formula; a seed
/// value followed by formulas keeps its raw cells. A missing second sample
/// reuses the first, which yields a row-invariant formula.
pub fn generalize_series(series: &Series, index: &SeriesIndex) -> ForgeResult<Option<Expr>> {
    let (first, second) = match &series.formulas {
        [Some(a), Some(b)] => (a, b),
        [Some(a), None] => (a, a),
        [None, _] => return Ok(None),
    };

    let sheet = series.sheet();
    let sample = |row: usize, text: &str| -> ForgeResult<Expr> {
        rewrite(&formula::parse(text)?, sheet, index)
            .map_err(|e| e.in_series(&series.id, row, text))
    };
    let a1 = sample(1, first)?;
    let a2 = sample(2, second)?;

    let generic = generalize(&series.id, &a1, &a2)?;
    verify(&series.id, &generic, [&a1, &a2], index)?;

    debug!(series = %series.id, formula = %generic, "generalized");
    Ok(Some(generic))
}

/// Build the generic formula from two isomorphic rewritten samples
pub fn generalize(series: &SeriesId, first: &Expr, second: &Expr) -> ForgeResult<Expr> {
    let mismatch = |detail: String| ForgeError::StructuralMismatch {
        series: series.clone(),
        detail,
    };

    match (first, second) {
        (
            Expr::FunctionCall { name, args },
            Expr::FunctionCall {
                name: name2,
                args: args2,
            },
        ) => {
            if !name.eq_ignore_ascii_case(name2) {
                return Err(mismatch(format!("function {} vs {}", name, name2)));
            }
            if args.len() != args2.len() {
                return Err(mismatch(format!(
                    "{} called with {} vs {} arguments",
                    name,
                    args.len(),
                    args2.len()
                )));
            }
            Ok(Expr::FunctionCall {
                name: name.clone(),
                args: args
                    .iter()
                    .zip(args2)
                    .map(|(a, b)| generalize(series, a, b))
                    .collect::<ForgeResult<_>>()?,
            })
        }

        (
            Expr::BinaryOp { op, left, right },
            Expr::BinaryOp {
                op: op2,
                left: left2,
                right: right2,
            },
        ) => {
            if op != op2 {
                return Err(mismatch(format!("operator {} vs {}", op, op2)));
            }
            Ok(Expr::BinaryOp {
                op: op.clone(),
                left: Box::new(generalize(series, left, left2)?),
                right: Box::new(generalize(series, right, right2)?),
            })
        }

        (
            Expr::UnaryOp { op, operand },
            Expr::UnaryOp {
                op: op2,
                operand: operand2,
            },
        ) => {
            if op != op2 {
                return Err(mismatch(format!("operator {} vs {}", op, op2)));
            }
            Ok(Expr::UnaryOp {
                op: op.clone(),
                operand: Box::new(generalize(series, operand, operand2)?),
            })
        }

        (Expr::Series(r1), Expr::Series(r2)) => generic_range(r1, r2).map_err(mismatch),

        (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => Ok(a.clone()),

        (a, b) => Err(mismatch(format!("'{}' vs '{}'", a, b))),
    }
}

fn generic_range(r1: &SeriesRange, r2: &SeriesRange) -> Result<Expr, String> {
    if r1.series.len() != r2.series.len() {
        return Err(format!(
            "reference to {} vs {} series",
            r1.series.len(),
            r2.series.len()
        ));
    }

    let position_deltas = r1
        .series
        .iter()
        .zip(&r2.series)
        .map(|(a, b)| {
            (
                i64::from(b.header_row) - i64::from(a.header_row),
                i64::from(b.header_column) - i64::from(a.header_column),
            )
        })
        .collect();

    let row_delta = match (r1.span, r2.span) {
        (RowSpan::WholeColumn, RowSpan::WholeColumn) => None,
        (RowSpan::Offsets { start, end }, RowSpan::Offsets { start: s2, end: e2 }) => {
            Some((s2 - start, e2 - end))
        }
        _ => return Err("whole-column vs bounded reference".to_string()),
    };

    Ok(Expr::Generic(GenericRange {
        series: r1.series.clone(),
        span: r1.span,
        row_delta,
        position_deltas,
    }))
}

/// Concrete formula for data row n (1-based)
pub fn specialize(expr: &Expr, n: usize, index: &SeriesIndex) -> Expr {
    let steps = n.saturating_sub(1) as i64;

    match expr {
        Expr::FunctionCall { name, args } => Expr::FunctionCall {
            name: name.clone(),
            args: args.iter().map(|a| specialize(a, n, index)).collect(),
        },
        Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
            op: op.clone(),
            left: Box::new(specialize(left, n, index)),
            right: Box::new(specialize(right, n, index)),
        },
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op: op.clone(),
            operand: Box::new(specialize(operand, n, index)),
        },
        Expr::Generic(range) => {
            let mut series: Vec<SeriesId> = range
                .series
                .iter()
                .zip(&range.position_deltas)
                .map(|(id, delta)| shifted_series(id, *delta, steps, index))
                .collect();
            series.sort();
            series.dedup();
            let span = match (range.span, range.row_delta) {
                (RowSpan::Offsets { start, end }, Some((ds, de))) => RowSpan::Offsets {
                    start: start + ds * steps,
                    end: end + de * steps,
                },
                (span, _) => span,
            };
            Expr::Series(SeriesRange { series, span })
        }
        other => other.clone(),
    }
}

/// Series found by moving the header position `steps` times by `delta`.
///
/// Moving along both axes at once is not a pattern a sheet can express
/// consistently, so such references, like ones pointing at a missing
/// series, stay on the original series.
fn shifted_series(id: &SeriesId, delta: (i64, i64), steps: i64, index: &SeriesIndex) -> SeriesId {
    let (dr, dc) = delta;
    if (dr == 0 && dc == 0) || (dr != 0 && dc != 0) || steps == 0 {
        return id.clone();
    }

    let row = i64::from(id.header_row) + dr * steps;
    let column = i64::from(id.header_column) + dc * steps;
    match (u32::try_from(row), u32::try_from(column)) {
        (Ok(row), Ok(column)) => index
            .at_position(&id.sheet, row, column)
            .cloned()
            .unwrap_or_else(|| id.clone()),
        _ => id.clone(),
    }
}

/// Re-specialize at n = 1 and n = 2 and require exact agreement with the samples
pub fn verify(
    series: &SeriesId,
    generic: &Expr,
    samples: [&Expr; 2],
    index: &SeriesIndex,
) -> ForgeResult<()> {
    for (i, sample) in samples.iter().enumerate() {
        let expected = sample.to_string();
        let actual = specialize(generic, i + 1, index).to_string();
        if expected != actual {
            return Err(ForgeError::VerificationFailure {
                series: series.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}
