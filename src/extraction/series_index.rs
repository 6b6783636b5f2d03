//! Lookup structures over the extracted series of a workbook.

use crate::types::{CellAddress, Series, SeriesId};
use std::collections::{BTreeSet, HashMap};

/// Maps cells, identities and header positions to series.
///
/// Built once per workbook; read-only afterwards.
#[derive(Debug, Default)]
pub struct SeriesIndex {
    cells: HashMap<(String, CellAddress), (usize, SeriesId)>,
    positions: HashMap<(String, u32, u32), SeriesId>,
    series: HashMap<SeriesId, Series>,
}

impl SeriesIndex {
    pub fn build<'a>(all: impl IntoIterator<Item = &'a Series>) -> Self {
        let mut index = SeriesIndex::default();

        for series in all {
            for (offset, address) in series.cells().enumerate() {
                index.cells.insert(
                    (series.sheet().to_string(), address),
                    (offset, series.id.clone()),
                );
            }
            index.positions.insert(
                (
                    series.sheet().to_string(),
                    series.id.header_row,
                    series.id.header_column,
                ),
                series.id.clone(),
            );
            index.series.insert(series.id.clone(), series.clone());
        }

        index
    }

    /// Owning series of a cell and the cell's offset within it
    pub fn lookup(&self, sheet: &str, address: CellAddress) -> Option<(usize, &SeriesId)> {
        self.cells
            .get(&(sheet.to_string(), address))
            .map(|(offset, id)| (*offset, id))
    }

    /// Series whose header cell sits at the given position
    pub fn at_position(&self, sheet: &str, header_row: u32, header_column: u32) -> Option<&SeriesId> {
        self.positions
            .get(&(sheet.to_string(), header_row, header_column))
    }

    pub fn get(&self, id: &SeriesId) -> Option<&Series> {
        self.series.get(id)
    }

    /// Distinct series owning any cell of the given columns
    pub fn in_columns(&self, sheet: &str, first: u32, last: u32) -> BTreeSet<&SeriesId> {
        self.cells
            .iter()
            .filter(|((s, address), _)| {
                s == sheet && (first..=last).contains(&address.column)
            })
            .map(|(_, (_, id))| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HeaderLocation, SeriesDataType};

    fn series(header: &str, column: u32, length: usize) -> Series {
        Series {
            id: SeriesId::new("S", header, 1, column),
            header_location: HeaderLocation::Top,
            starting_cell: CellAddress::new(column, 2),
            length,
            formulas: [None, None],
            sample_values: vec![],
            data_type: SeriesDataType::Float,
            generic_formula: None,
        }
    }

    #[test]
    fn test_lookup_returns_offset() {
        let all = vec![series("a", 1, 3), series("b", 2, 3)];
        let index = SeriesIndex::build(&all);

        let (offset, id) = index.lookup("S", CellAddress::new(2, 4)).unwrap();
        assert_eq!(offset, 2);
        assert_eq!(id.header, "b");
    }

    #[test]
    fn test_lookup_outside_series_is_none() {
        let all = vec![series("a", 1, 3)];
        let index = SeriesIndex::build(&all);
        assert!(index.lookup("S", CellAddress::new(1, 1)).is_none());
        assert!(index.lookup("S", CellAddress::new(1, 5)).is_none());
        assert!(index.lookup("Other", CellAddress::new(1, 2)).is_none());
    }

    #[test]
    fn test_position_and_identity_lookup() {
        let all = vec![series("a", 1, 3), series("b", 2, 3)];
        let index = SeriesIndex::build(&all);
        assert_eq!(index.at_position("S", 1, 2).unwrap().header, "b");
        assert!(index.at_position("S", 1, 3).is_none());
        assert_eq!(index.get(&all[0].id).unwrap().length, 3);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_in_columns() {
        let all = vec![series("a", 1, 3), series("b", 2, 3), series("c", 3, 3)];
        let index = SeriesIndex::build(&all);
        let found: Vec<_> = index
            .in_columns("S", 2, 3)
            .into_iter()
            .map(|id| id.header.clone())
            .collect();
        assert_eq!(found, vec!["b", "c"]);
    }
}
