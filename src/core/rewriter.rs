//! Rewrites cell ranges inside formula trees into series references, and
//! back again.

use crate::coordinates::RangeBounds;
use crate::error::{ForgeError, ForgeResult};
use crate::extraction::SeriesIndex;
use crate::formula::{Expr, RangeRef};
use crate::types::{CellAddress, CellRange, RowSpan, SeriesId, SeriesRange};
use std::collections::BTreeSet;

/// Replace every cell range operand with the series that own its cells.
///
/// Unqualified ranges belong to `sheet`. Cells outside any series are
/// dropped; a range left with no series at all is an error. Operands that
/// are already series references are returned unchanged.
pub fn rewrite(expr: &Expr, sheet: &str, index: &SeriesIndex) -> ForgeResult<Expr> {
    match expr {
        Expr::FunctionCall { name, args } => Ok(Expr::FunctionCall {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| rewrite(a, sheet, index))
                .collect::<ForgeResult<_>>()?,
        }),
        Expr::BinaryOp { op, left, right } => Ok(Expr::BinaryOp {
            op: op.clone(),
            left: Box::new(rewrite(left, sheet, index)?),
            right: Box::new(rewrite(right, sheet, index)?),
        }),
        Expr::UnaryOp { op, operand } => Ok(Expr::UnaryOp {
            op: op.clone(),
            operand: Box::new(rewrite(operand, sheet, index)?),
        }),
        Expr::Range(range) => resolve_range(range, sheet, index).map(Expr::Series),
        other => Ok(other.clone()),
    }
}

fn resolve_range(range: &RangeRef, context: &str, index: &SeriesIndex) -> ForgeResult<SeriesRange> {
    let sheet = range.sheet.as_deref().unwrap_or(context);
    let bounds = &range.bounds;

    let unresolved = || ForgeError::unresolved(sheet, Expr::Range(range.clone()).to_string());

    if bounds.whole_column {
        let ids: Vec<SeriesId> = index
            .in_columns(sheet, bounds.start.column, bounds.end.column)
            .into_iter()
            .cloned()
            .collect();
        if ids.is_empty() {
            return Err(unresolved());
        }
        return Ok(SeriesRange {
            series: ids,
            span: RowSpan::WholeColumn,
        });
    }

    let mut ids = BTreeSet::new();
    let mut offsets: Option<(usize, usize)> = None;
    for address in CellRange::new(sheet, bounds.start, bounds.end).addresses() {
        if let Some((offset, id)) = index.lookup(sheet, address) {
            ids.insert(id.clone());
            offsets = Some(match offsets {
                Some((lo, hi)) => (lo.min(offset), hi.max(offset)),
                None => (offset, offset),
            });
        }
    }

    let (start, end) = offsets.ok_or_else(unresolved)?;
    Ok(SeriesRange {
        series: ids.into_iter().collect(),
        span: RowSpan::Offsets {
            start: start as i64,
            end: end as i64,
        },
    })
}

/// Turn series references back into A1 ranges as seen from `sheet`
pub fn to_cell_syntax(expr: &Expr, sheet: &str, index: &SeriesIndex) -> ForgeResult<Expr> {
    match expr {
        Expr::FunctionCall { name, args } => Ok(Expr::FunctionCall {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| to_cell_syntax(a, sheet, index))
                .collect::<ForgeResult<_>>()?,
        }),
        Expr::BinaryOp { op, left, right } => Ok(Expr::BinaryOp {
            op: op.clone(),
            left: Box::new(to_cell_syntax(left, sheet, index)?),
            right: Box::new(to_cell_syntax(right, sheet, index)?),
        }),
        Expr::UnaryOp { op, operand } => Ok(Expr::UnaryOp {
            op: op.clone(),
            operand: Box::new(to_cell_syntax(operand, sheet, index)?),
        }),
        Expr::Series(range) => cell_range(range, sheet, index).map(Expr::Range),
        other => Ok(other.clone()),
    }
}

fn cell_range(range: &SeriesRange, context: &str, index: &SeriesIndex) -> ForgeResult<RangeRef> {
    let unresolved = || ForgeError::unresolved(context, Expr::Series(range.clone()).to_string());

    let first = range.series.first().ok_or_else(unresolved)?;
    let target_sheet = first.sheet.clone();

    let mut corners: Vec<CellAddress> = Vec::new();
    for id in &range.series {
        let series = index.get(id).ok_or_else(unresolved)?;
        match range.span {
            RowSpan::WholeColumn => {
                corners.push(series.starting_cell);
            }
            RowSpan::Offsets { start, end } => {
                if start < 0 || end < start {
                    return Err(unresolved());
                }
                corners.push(series.cell_at(start as usize));
                corners.push(series.cell_at(end as usize));
            }
        }
    }

    let start = CellAddress::new(
        corners.iter().map(|c| c.column).min().unwrap_or(1),
        corners.iter().map(|c| c.row).min().unwrap_or(1),
    );
    let end = CellAddress::new(
        corners.iter().map(|c| c.column).max().unwrap_or(1),
        corners.iter().map(|c| c.row).max().unwrap_or(1),
    );

    let whole_column = range.span == RowSpan::WholeColumn;
    let bounds = if whole_column {
        RangeBounds {
            start: CellAddress::new(start.column, 1),
            end: CellAddress::new(end.column, 1),
            whole_column,
        }
    } else {
        RangeBounds {
            start,
            end,
            whole_column,
        }
    };

    Ok(RangeRef {
        sheet: (target_sheet != context).then_some(target_sheet),
        bounds,
    })
}
