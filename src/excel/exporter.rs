//! Excel exporter: converted series → .xlsx

use crate::core::generalizer::specialize;
use crate::core::pipeline::ConversionOutcome;
use crate::core::rewriter::to_cell_syntax;
use crate::error::{ForgeError, ForgeResult};
use crate::formula::Expr;
use crate::types::{CellAddress, CellValue, Series, WorkbookData};
use rust_xlsxwriter::{Formula, Workbook, Worksheet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Writes one worksheet per sheet that owns series.
///
/// Generic series get one re-materialized formula per row. Series without a
/// generic formula are copied cell by cell from the source workbook.
pub struct ExcelExporter<'a> {
    outcome: &'a ConversionOutcome,
    source: &'a WorkbookData,
    write_formulas: bool,
}

impl<'a> ExcelExporter<'a> {
    pub fn new(outcome: &'a ConversionOutcome, source: &'a WorkbookData) -> Self {
        Self {
            outcome,
            source,
            write_formulas: true,
        }
    }

    /// Write computed values instead of formulas
    pub fn values_only(mut self, values_only: bool) -> Self {
        self.write_formulas = !values_only;
        self
    }

    pub fn export(&self, output_path: &Path) -> ForgeResult<()> {
        let mut workbook = Workbook::new();

        for sheet_name in self.sheet_names() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet_name).map_err(|e| {
                ForgeError::Workbook(format!("Failed to set worksheet name '{}': {}", sheet_name, e))
            })?;

            for series in self.outcome.series.iter().filter(|s| s.sheet() == sheet_name) {
                self.export_series(worksheet, series)?;
            }
            debug!(sheet = %sheet_name, "exported sheet");
        }

        workbook.save(output_path).map_err(|e| {
            ForgeError::Workbook(format!("Failed to save Excel file: {}", e))
        })?;

        info!(path = %output_path.display(), "wrote workbook");
        Ok(())
    }

    /// Sheets with at least one series, in source workbook order
    fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .source
            .sheets
            .iter()
            .map(|s| s.name.clone())
            .filter(|name| self.outcome.series.iter().any(|s| s.sheet() == name))
            .collect();
        for series in &self.outcome.series {
            if !names.iter().any(|n| n == series.sheet()) {
                names.push(series.sheet().to_string());
            }
        }
        names
    }

    fn export_series(&self, worksheet: &mut Worksheet, series: &Series) -> ForgeResult<()> {
        let header = series.id.header_cell();
        write_value(worksheet, header, &CellValue::Text(series.header().to_string()))?;

        let computed = self.outcome.values.get(&series.id);

        for (offset, address) in series.cells().enumerate() {
            let source = self
                .source
                .sheet(series.sheet())
                .and_then(|sheet| sheet.get(address));
            let value = computed
                .and_then(|values| values.get(offset))
                .cloned()
                .or_else(|| source.map(|c| c.value.clone()))
                .unwrap_or_default();

            if !self.write_formulas {
                write_value(worksheet, address, &value)?;
                continue;
            }

            let formula = match &series.generic_formula {
                Some(generic) => self.row_formula(series, generic, offset + 1),
                None => None,
            }
            .or_else(|| source.and_then(|c| c.formula.clone()));

            match formula {
                Some(text) => write_formula(worksheet, address, &text, &value)?,
                None => write_value(worksheet, address, &value)?,
            }
        }

        Ok(())
    }

    /// A1 formula of data row n, or None when it cannot be expressed
    fn row_formula(&self, series: &Series, generic: &Expr, n: usize) -> Option<String> {
        let concrete = specialize(generic, n, &self.outcome.index);
        match to_cell_syntax(&concrete, series.sheet(), &self.outcome.index) {
            Ok(expr) => Some(format!("={}", expr)),
            Err(e) => {
                warn!(series = %series.id, row = n, error = %e, "writing source formula instead");
                None
            }
        }
    }
}

fn position(address: CellAddress) -> ForgeResult<(u32, u16)> {
    let column = u16::try_from(address.column.saturating_sub(1))
        .map_err(|_| ForgeError::Workbook(format!("Column of {} is out of range", address)))?;
    Ok((address.row.saturating_sub(1), column))
}

fn write_value(worksheet: &mut Worksheet, address: CellAddress, value: &CellValue) -> ForgeResult<()> {
    let (row, col) = position(address)?;
    let result = match value {
        CellValue::Empty => return Ok(()),
        CellValue::Int(i) => worksheet.write_number(row, col, *i as f64),
        CellValue::Float(f) => worksheet.write_number(row, col, *f),
        CellValue::Text(s) => worksheet.write_string(row, col, s),
        CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
    };
    result
        .map(|_| ())
        .map_err(|e| ForgeError::Workbook(format!("Failed to write {}: {}", address, e)))
}

fn write_formula(
    worksheet: &mut Worksheet,
    address: CellAddress,
    text: &str,
    cached: &CellValue,
) -> ForgeResult<()> {
    let (row, col) = position(address)?;
    let mut formula = Formula::new(text);
    if !cached.is_empty() {
        formula = formula.set_result(cached.display_text());
    }
    worksheet
        .write_formula(row, col, formula)
        .map(|_| ())
        .map_err(|e| ForgeError::Workbook(format!("Failed to write formula at {}: {}", address, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_is_zero_based() {
        assert_eq!(position(CellAddress::new(1, 1)).unwrap(), (0, 0));
        assert_eq!(position(CellAddress::new(3, 10)).unwrap(), (9, 2));
    }

    #[test]
    fn test_position_rejects_huge_columns() {
        assert!(position(CellAddress::new(70_000, 1)).is_err());
    }
}
