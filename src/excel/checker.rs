//! Workbook comparison: cell-by-cell equivalence and header compatibility.

use super::importer::ExcelImporter;
use crate::error::{ForgeError, ForgeResult};
use crate::extraction::find_tables;
use crate::types::{CellAddress, CellValue, SheetData, WorkbookData};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// One cell whose value differs between two workbooks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub sheet: String,
    pub cell: String,
    pub left: CellValue,
    pub right: CellValue,
}

/// Load two .xlsx files and compare every cell
pub fn check_equivalence(left: &Path, right: &Path, tolerance: f64) -> ForgeResult<Vec<Mismatch>> {
    let a = ExcelImporter::new(left).import()?;
    let b = ExcelImporter::new(right).import()?;
    let mismatches = compare_workbooks(&a, &b, tolerance);
    info!(mismatches = mismatches.len(), "compared workbooks");
    Ok(mismatches)
}

/// Numbers agree within `tolerance`; everything else must match exactly.
/// A sheet missing on one side counts as empty.
pub fn compare_workbooks(left: &WorkbookData, right: &WorkbookData, tolerance: f64) -> Vec<Mismatch> {
    let empty = SheetData::default();
    let mut mismatches = Vec::new();

    for name in sheet_names(left, right) {
        let a = left.sheet(&name).unwrap_or(&empty);
        let b = right.sheet(&name).unwrap_or(&empty);

        let addresses: BTreeSet<CellAddress> =
            a.cells.keys().chain(b.cells.keys()).copied().collect();
        for address in addresses {
            let x = a.get(address).map(|c| &c.value).unwrap_or(&CellValue::Empty);
            let y = b.get(address).map(|c| &c.value).unwrap_or(&CellValue::Empty);
            if !values_match(x, y, tolerance) {
                mismatches.push(Mismatch {
                    sheet: name.clone(),
                    cell: address.to_string(),
                    left: x.clone(),
                    right: y.clone(),
                });
            }
        }
    }

    mismatches
}

fn values_match(a: &CellValue, b: &CellValue, tolerance: f64) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= tolerance,
        _ => a == b,
    }
}

fn sheet_names(left: &WorkbookData, right: &WorkbookData) -> Vec<String> {
    let mut names: Vec<String> = left.sheets.iter().map(|s| s.name.clone()).collect();
    for sheet in &right.sheets {
        if !names.contains(&sheet.name) {
            names.push(sheet.name.clone());
        }
    }
    names
}

/// Both workbook variants must expose the same header set on every sheet
pub fn check_compatibility(left: &WorkbookData, right: &WorkbookData) -> ForgeResult<()> {
    let a = header_sets(left);
    let b = header_sets(right);
    let mut problems = Vec::new();

    for name in sheet_names(left, right) {
        let empty = BTreeSet::new();
        let x = a.get(&name).unwrap_or(&empty);
        let y = b.get(&name).unwrap_or(&empty);
        if x == y {
            continue;
        }
        let only_left: Vec<&str> = x.difference(y).map(String::as_str).collect();
        let only_right: Vec<&str> = y.difference(x).map(String::as_str).collect();
        problems.push(format!(
            "sheet '{}': only in first [{}], only in second [{}]",
            name,
            only_left.join(", "),
            only_right.join(", ")
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ForgeError::Compatibility(problems.join("; ")))
    }
}

fn header_sets(workbook: &WorkbookData) -> BTreeMap<String, BTreeSet<String>> {
    workbook
        .sheets
        .iter()
        .map(|sheet| {
            let headers = find_tables(sheet)
                .into_iter()
                .flat_map(|t| t.header_values)
                .collect();
            (sheet.name.clone(), headers)
        })
        .collect()
}
