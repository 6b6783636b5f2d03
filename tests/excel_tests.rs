//! Excel import/export round trips through real .xlsx files

use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Formula, Workbook};
use series_forge::config::ConversionConfig;
use series_forge::coordinates::parse_cell;
use series_forge::core::convert_workbook;
use series_forge::excel::{check_equivalence, ExcelExporter, ExcelImporter};
use series_forge::types::CellValue;
use std::path::Path;
use tempfile::TempDir;

/// Model sheet: a | b | c=a-b over four rows, plus total=SUM(C:C) in column E
fn write_model(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Model").unwrap();

    sheet.write_string(0, 0, "a").unwrap();
    sheet.write_string(0, 1, "b").unwrap();
    sheet.write_string(0, 2, "c").unwrap();
    sheet.write_string(0, 4, "total").unwrap();
    for r in 1..=4u32 {
        let a = f64::from(r + 1) * 10.0;
        let b = f64::from(r + 1);
        sheet.write_number(r, 0, a).unwrap();
        sheet.write_number(r, 1, b).unwrap();
        let formula =
            Formula::new(format!("=$A{}-B{}", r + 1, r + 1)).set_result(format!("{}", a - b));
        sheet.write_formula(r, 2, formula).unwrap();
    }
    sheet
        .write_formula(1, 4, Formula::new("=SUM(C:C)").set_result("126"))
        .unwrap();
    sheet
        .write_formula(2, 4, Formula::new("=SUM(C:C)").set_result("126"))
        .unwrap();

    workbook.save(path).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// IMPORTER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_import_reads_values_and_formulas() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.xlsx");
    write_model(&path);

    let workbook = ExcelImporter::new(&path).import().unwrap();
    assert_eq!(workbook.sheets.len(), 1);
    let sheet = workbook.sheet("Model").unwrap();

    let header = sheet.get(parse_cell("C1").unwrap()).unwrap();
    assert_eq!(header.value, CellValue::Text("c".to_string()));

    let a3 = sheet.get(parse_cell("A3").unwrap()).unwrap();
    assert_eq!(a3.value.as_f64(), Some(30.0));
    assert!(a3.formula.is_none());

    let c3 = sheet.get(parse_cell("C3").unwrap()).unwrap();
    assert_eq!(c3.formula.as_deref(), Some("=$A3-B3"));
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND TRIP TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_convert_export_and_reimport() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("model.xlsx");
    let output = dir.path().join("model.series.xlsx");
    write_model(&input);

    let source = ExcelImporter::new(&input).import().unwrap();
    let outcome = convert_workbook(&source, None, &ConversionConfig::default()).unwrap();
    assert_eq!(outcome.generic_count(), 2);
    assert!(outcome.degraded.is_empty());

    ExcelExporter::new(&outcome, &source).export(&output).unwrap();
    assert!(output.exists());

    let written = ExcelImporter::new(&output).import().unwrap();
    let sheet = written.sheet("Model").unwrap();
    let formula_at = |cell: &str| {
        sheet
            .get(parse_cell(cell).unwrap())
            .and_then(|c| c.formula.clone())
    };

    // Anchors are gone, one concrete formula per row
    assert_eq!(formula_at("C2").as_deref(), Some("=A2-B2"));
    assert_eq!(formula_at("C5").as_deref(), Some("=A5-B5"));
    assert_eq!(formula_at("E3").as_deref(), Some("=SUM(C:C)"));

    let header = sheet.get(parse_cell("E1").unwrap()).unwrap();
    assert_eq!(header.value, CellValue::Text("total".to_string()));
    assert_eq!(
        sheet.get(parse_cell("B4").unwrap()).unwrap().value.as_f64(),
        Some(4.0)
    );
}

#[test]
fn test_values_only_export_writes_computed_values() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("model.xlsx");
    let output = dir.path().join("values.xlsx");
    write_model(&input);

    let source = ExcelImporter::new(&input).import().unwrap();
    let outcome = convert_workbook(&source, None, &ConversionConfig::default()).unwrap();
    ExcelExporter::new(&outcome, &source)
        .values_only(true)
        .export(&output)
        .unwrap();

    let written = ExcelImporter::new(&output).import().unwrap();
    let sheet = written.sheet("Model").unwrap();
    assert!(sheet.cells.values().all(|c| c.formula.is_none()));
    assert_eq!(
        sheet.get(parse_cell("C4").unwrap()).unwrap().value.as_f64(),
        Some(36.0)
    );
    assert_eq!(
        sheet.get(parse_cell("E2").unwrap()).unwrap().value.as_f64(),
        Some(126.0)
    );

    // Writing the same outcome twice gives equivalent files
    let again = dir.path().join("again.xlsx");
    ExcelExporter::new(&outcome, &source)
        .values_only(true)
        .export(&again)
        .unwrap();
    assert!(check_equivalence(&output, &again, 0.0).unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// CHECKER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_identical_files_are_equivalent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.xlsx");
    write_model(&path);

    assert!(check_equivalence(&path, &path, 1e-4).unwrap().is_empty());
}

#[test]
fn test_perturbed_value_is_reported() {
    let dir = TempDir::new().unwrap();
    let left = dir.path().join("left.xlsx");
    let right = dir.path().join("right.xlsx");
    write_model(&left);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Model").unwrap();
    sheet.write_string(0, 0, "a").unwrap();
    sheet.write_number(1, 0, 20.5).unwrap();
    workbook.save(&right).unwrap();

    let mismatches = check_equivalence(&left, &right, 1e-4).unwrap();
    let a2 = mismatches.iter().find(|m| m.cell == "A2").unwrap();
    assert_eq!(a2.left.as_f64(), Some(20.0));
    assert_eq!(a2.right.as_f64(), Some(20.5));
    // Cells only present on the left are reported too
    assert!(mismatches.iter().any(|m| m.cell == "B1"));
}

#[test]
fn test_import_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let result = ExcelImporter::new(dir.path().join("missing.xlsx")).import();
    assert!(result.is_err());
}
