//! Excel importer: .xlsx → sparse per-sheet cell grids

use crate::error::{ForgeError, ForgeResult};
use crate::types::{CellAddress, CellValue, SheetData, WorkbookData};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads every worksheet with both its cached values and its formulas
pub struct ExcelImporter {
    path: PathBuf,
}

impl ExcelImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn import(&self) -> ForgeResult<WorkbookData> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            ForgeError::Workbook(format!(
                "Failed to open Excel file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut data = WorkbookData::new();

        for sheet_name in workbook.sheet_names().to_vec() {
            let values = workbook.worksheet_range(&sheet_name).map_err(|e| {
                ForgeError::Workbook(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?;
            // Sheets without any formula part are fine
            let formulas = workbook.worksheet_formula(&sheet_name).ok();

            let sheet = build_sheet(&sheet_name, &values, formulas.as_ref());
            debug!(sheet = %sheet_name, cells = sheet.cells.len(), "imported sheet");
            data.add_sheet(sheet);
        }

        info!(
            path = %self.path.display(),
            sheets = data.sheets.len(),
            "imported workbook"
        );
        Ok(data)
    }
}

/// Merge the value and formula grids of one sheet, at absolute positions
fn build_sheet(name: &str, values: &Range<Data>, formulas: Option<&Range<String>>) -> SheetData {
    let mut sheet = SheetData::new(name);

    if let Some((row0, col0)) = values.start() {
        for (r, c, data) in values.cells() {
            let address = absolute(row0, col0, r, c);
            sheet.set_value(address, convert(data));
        }
    }

    if let Some(formulas) = formulas {
        if let Some((row0, col0)) = formulas.start() {
            for (r, c, formula) in formulas.cells() {
                if formula.is_empty() {
                    continue;
                }
                let address = absolute(row0, col0, r, c);
                let cached = sheet
                    .get(address)
                    .map(|cell| cell.value.clone())
                    .unwrap_or_default();
                let text = if formula.starts_with('=') {
                    formula.clone()
                } else {
                    format!("={}", formula)
                };
                sheet.set_formula(address, text, cached);
            }
        }
    }

    sheet
}

fn absolute(row0: u32, col0: u32, r: usize, c: usize) -> CellAddress {
    CellAddress::new(col0 + c as u32 + 1, row0 + r as u32 + 1)
}

/// calamine cell → cell value; dates become their serial number
fn convert(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_scalars() {
        assert_eq!(convert(&Data::Int(3)), CellValue::Int(3));
        assert_eq!(convert(&Data::Float(2.5)), CellValue::Float(2.5));
        assert_eq!(
            convert(&Data::String("x".to_string())),
            CellValue::Text("x".to_string())
        );
        assert_eq!(convert(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_build_sheet_uses_absolute_positions() {
        let mut values: Range<Data> = Range::new((1, 2), (2, 2));
        values.set_value((1, 2), Data::String("Total".to_string()));
        values.set_value((2, 2), Data::Float(9.0));
        let mut formulas: Range<String> = Range::new((2, 2), (2, 2));
        formulas.set_value((2, 2), "A3-B3".to_string());

        let sheet = build_sheet("S", &values, Some(&formulas));
        let header = sheet.get(CellAddress::new(3, 2)).unwrap();
        assert_eq!(header.value, CellValue::Text("Total".to_string()));
        let total = sheet.get(CellAddress::new(3, 3)).unwrap();
        assert_eq!(total.formula.as_deref(), Some("=A3-B3"));
        assert_eq!(total.value, CellValue::Float(9.0));
    }

    #[test]
    fn test_missing_file() {
        let err = ExcelImporter::new("does/not/exist.xlsx").import().unwrap_err();
        assert!(matches!(err, ForgeError::Workbook(_)));
    }
}
