//! Header classification and series slicing.

use super::table_locator::locate_tables;
use crate::types::{
    CellAddress, CellRange, CellValue, HeaderLocation, Series, SeriesDataType, SeriesId,
    SheetData, Table,
};
use tracing::debug;

/// Locate and classify every table of a sheet, named `{sheet}_{k}`
pub fn find_tables(sheet: &SheetData) -> Vec<Table> {
    locate_tables(sheet)
        .into_iter()
        .enumerate()
        .map(|(i, range)| classify_table(sheet, format!("{}_{}", sheet.name, i + 1), range))
        .collect()
}

/// Headers sit on top when every cell of the first row is text; otherwise
/// the first column is the header column.
pub fn classify_table(sheet: &SheetData, name: String, range: CellRange) -> Table {
    let first_row: Vec<Option<&CellValue>> = (range.start.column..=range.end.column)
        .map(|column| {
            sheet
                .get(CellAddress::new(column, range.start.row))
                .map(|c| &c.value)
        })
        .collect();

    let all_text = first_row
        .iter()
        .all(|value| value.is_some_and(CellValue::is_text));

    let (header_location, header_values) = if all_text {
        let values = first_row
            .iter()
            .map(|v| v.map(CellValue::display_text).unwrap_or_default())
            .collect();
        (HeaderLocation::Top, values)
    } else {
        let values = (range.start.row..=range.end.row)
            .map(|row| {
                sheet
                    .get(CellAddress::new(range.start.column, row))
                    .map(|c| c.value.display_text())
                    .unwrap_or_default()
            })
            .collect();
        (HeaderLocation::Left, values)
    };

    Table {
        name,
        range,
        header_location,
        header_values,
    }
}

/// One series per header entry, running from just past the header to the
/// table edge. Only the first two data cells are read.
pub fn extract_series(sheet: &SheetData, table: &Table) -> Vec<Series> {
    let range = &table.range;

    table
        .header_values
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let index = i as u32;
            let (header_cell, starting_cell, length) = match table.header_location {
                HeaderLocation::Top => {
                    let column = range.start.column + index;
                    (
                        CellAddress::new(column, range.start.row),
                        CellAddress::new(column, range.start.row + 1),
                        (range.end.row - range.start.row) as usize,
                    )
                }
                HeaderLocation::Left => {
                    let row = range.start.row + index;
                    (
                        CellAddress::new(range.start.column, row),
                        CellAddress::new(range.start.column + 1, row),
                        (range.end.column - range.start.column) as usize,
                    )
                }
            };

            let mut series = Series {
                id: SeriesId::new(&sheet.name, header, header_cell.row, header_cell.column),
                header_location: table.header_location,
                starting_cell,
                length,
                formulas: [None, None],
                sample_values: Vec::new(),
                data_type: SeriesDataType::Str,
                generic_formula: None,
            };

            for offset in 0..length.min(2) {
                let cell = sheet.get(series.cell_at(offset));
                series.formulas[offset] = cell.and_then(|c| c.formula.clone());
                series
                    .sample_values
                    .push(cell.map(|c| c.value.clone()).unwrap_or_default());
            }
            if let Some(first) = series.sample_values.first() {
                series.data_type = SeriesDataType::of(first);
            }

            debug!(series = %series.id, length, "extracted series");
            series
        })
        .collect()
}

/// Full data run of a series as cached in the sheet
pub fn read_values(series: &Series, sheet: &SheetData) -> Vec<CellValue> {
    series
        .cells()
        .map(|address| {
            sheet
                .get(address)
                .map(|c| c.value.clone())
                .unwrap_or_default()
        })
        .collect()
}
