//! Table discovery: clusters the non-empty cells of a sheet into maximal
//! 8-connected blocks and reports each block's bounding box.

use crate::types::{CellAddress, CellRange, SheetData};
use std::collections::BTreeSet;
use tracing::debug;

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Bounding boxes of the connected cell blocks of a sheet.
///
/// Blocks come out in the order of their smallest address (column, then
/// row), so repeated runs name tables identically. Each cell is removed from
/// the unvisited set once and probes its eight neighbours once, keeping the
/// walk linear in the number of non-empty cells.
pub fn locate_tables(sheet: &SheetData) -> Vec<CellRange> {
    let mut remaining: BTreeSet<CellAddress> = sheet
        .cells
        .values()
        .filter(|c| !c.is_blank())
        .map(|c| c.address)
        .collect();

    let mut tables = Vec::new();

    while let Some(seed) = remaining.pop_first() {
        let (mut min, mut max) = (seed, seed);
        let mut frontier = vec![seed];

        while let Some(cell) = frontier.pop() {
            min = CellAddress::new(min.column.min(cell.column), min.row.min(cell.row));
            max = CellAddress::new(max.column.max(cell.column), max.row.max(cell.row));

            for (dc, dr) in NEIGHBOURS {
                if let Some(next) = cell.offset(dc, dr) {
                    if remaining.remove(&next) {
                        frontier.push(next);
                    }
                }
            }
        }

        let range = CellRange::new(sheet.name.clone(), min, max);
        debug!(sheet = %sheet.name, range = %range, "located table");
        tables.push(range);
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::parse_cell;

    fn sheet_with(cells: &[&str]) -> SheetData {
        let mut sheet = SheetData::new("S");
        for c in cells {
            sheet.set_value(parse_cell(c).unwrap(), 1i64);
        }
        sheet
    }

    fn bounds(range: &CellRange) -> (String, String) {
        (range.start.to_string(), range.end.to_string())
    }

    #[test]
    fn test_single_block() {
        let sheet = sheet_with(&["A1", "B1", "A2", "B2", "A3", "B3"]);
        let tables = locate_tables(&sheet);
        assert_eq!(tables.len(), 1);
        assert_eq!(bounds(&tables[0]), ("A1".to_string(), "B3".to_string()));
    }

    #[test]
    fn test_diagonal_cells_connect() {
        let sheet = sheet_with(&["A1", "B2", "C3"]);
        let tables = locate_tables(&sheet);
        assert_eq!(tables.len(), 1);
        assert_eq!(bounds(&tables[0]), ("A1".to_string(), "C3".to_string()));
    }

    #[test]
    fn test_gap_of_two_separates_blocks() {
        let sheet = sheet_with(&["A1", "A2", "D1", "D2", "A5"]);
        let tables = locate_tables(&sheet);
        let found: Vec<_> = tables.iter().map(bounds).collect();
        assert_eq!(
            found,
            vec![
                ("A1".to_string(), "A2".to_string()),
                ("A5".to_string(), "A5".to_string()),
                ("D1".to_string(), "D2".to_string()),
            ]
        );
    }

    #[test]
    fn test_lone_cell_is_a_table() {
        let sheet = sheet_with(&["C7"]);
        let tables = locate_tables(&sheet);
        assert_eq!(bounds(&tables[0]), ("C7".to_string(), "C7".to_string()));
    }

    #[test]
    fn test_l_shape_spans_bounding_box() {
        let sheet = sheet_with(&["A1", "A2", "A3", "B3", "C3"]);
        let tables = locate_tables(&sheet);
        assert_eq!(tables.len(), 1);
        assert_eq!(bounds(&tables[0]), ("A1".to_string(), "C3".to_string()));
    }

    #[test]
    fn test_empty_sheet() {
        assert!(locate_tables(&SheetData::new("S")).is_empty());
    }
}
