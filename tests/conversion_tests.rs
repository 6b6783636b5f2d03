//! End-to-end conversion tests over in-memory workbooks

use pretty_assertions::assert_eq;
use series_forge::config::ConversionConfig;
use series_forge::coordinates::parse_cell;
use series_forge::core::generalizer::{generalize_series, specialize};
use series_forge::core::rewriter::{rewrite, to_cell_syntax};
use series_forge::core::{convert_workbook, DependencyGraph};
use series_forge::error::ForgeError;
use series_forge::extraction::{extract_series, find_tables, SeriesIndex};
use series_forge::formula::parse;
use series_forge::types::{CellValue, SeriesId, SheetData, WorkbookData};

fn set(sheet: &mut SheetData, cell: &str, value: impl Into<CellValue>) {
    sheet.set_value(parse_cell(cell).unwrap(), value);
}

fn set_formula(sheet: &mut SheetData, cell: &str, formula: &str) {
    sheet.set_formula(parse_cell(cell).unwrap(), formula, 0.0);
}

fn single(sheet: SheetData) -> WorkbookData {
    let mut workbook = WorkbookData::new();
    workbook.add_sheet(sheet);
    workbook
}

/// a | b | c=a-b over ten data rows
fn difference_sheet(rows: u32) -> SheetData {
    let mut sheet = SheetData::new("Model");
    set(&mut sheet, "A1", "a");
    set(&mut sheet, "B1", "b");
    set(&mut sheet, "C1", "c");
    for row in 2..=rows + 1 {
        set(&mut sheet, &format!("A{}", row), row as f64 * 10.0);
        set(&mut sheet, &format!("B{}", row), row as f64);
        set_formula(&mut sheet, &format!("C{}", row), &format!("=A{}-B{}", row, row));
    }
    sheet
}

fn c_id() -> SeriesId {
    SeriesId::new("Model", "c", 1, 3)
}

// ═══════════════════════════════════════════════════════════════════════════
// GENERALIZATION SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_row_wise_difference_reproduces_every_row() {
    let outcome =
        convert_workbook(&single(difference_sheet(10)), None, &ConversionConfig::default())
            .unwrap();
    let c = outcome.get(&c_id()).unwrap();
    let generic = c.generic_formula.as_ref().unwrap();

    for n in 1..=10 {
        let concrete = specialize(generic, n, &outcome.index);
        let text = to_cell_syntax(&concrete, "Model", &outcome.index)
            .unwrap()
            .to_string();
        assert_eq!(text, format!("A{}-B{}", n + 1, n + 1));
    }
}

#[test]
fn test_whole_column_sum_is_row_invariant() {
    let mut sheet = difference_sheet(4);
    set(&mut sheet, "E1", "total");
    set_formula(&mut sheet, "E2", "=SUM(C:C)");
    set_formula(&mut sheet, "E3", "=SUM(C:C)");

    let outcome = convert_workbook(&single(sheet), None, &ConversionConfig::default()).unwrap();
    let total_id = SeriesId::new("Model", "total", 1, 5);
    let total = outcome.get(&total_id).unwrap();
    let generic = total.generic_formula.as_ref().unwrap();

    let first = specialize(generic, 1, &outcome.index);
    for n in [2, 7, 100] {
        assert_eq!(specialize(generic, n, &outcome.index), first);
    }
    assert_eq!(
        to_cell_syntax(&first, "Model", &outcome.index)
            .unwrap()
            .to_string(),
        "SUM(C:C)"
    );

    // c = 18, 27, 36, 45
    assert_eq!(
        outcome.values[&total_id],
        vec![CellValue::Float(126.0), CellValue::Float(126.0)]
    );
}

#[test]
fn test_structurally_different_samples_stay_raw() {
    let mut sheet = difference_sheet(3);
    set_formula(&mut sheet, "C2", "=A2+B2");
    set_formula(&mut sheet, "C3", "=A3*B3");

    let workbook = single(sheet);
    let tables = find_tables(&workbook.sheets[0]);
    let series = extract_series(&workbook.sheets[0], &tables[0]);
    let index = SeriesIndex::build(&series);
    let err = generalize_series(&series[2], &index).unwrap_err();
    assert!(matches!(err, ForgeError::StructuralMismatch { .. }));

    let outcome = convert_workbook(&workbook, None, &ConversionConfig::default()).unwrap();
    assert!(outcome.get(&c_id()).unwrap().generic_formula.is_none());
    assert_eq!(outcome.degraded.len(), 1);
    assert_eq!(outcome.degraded[0].series, c_id());
}

#[test]
fn test_chain_sorts_in_dependency_order() {
    let mut sheet = SheetData::new("Model");
    set(&mut sheet, "A1", "a");
    set(&mut sheet, "B1", "b");
    set(&mut sheet, "C1", "c");
    for row in 2..=4 {
        set(&mut sheet, &format!("A{}", row), row as f64);
        set_formula(&mut sheet, &format!("B{}", row), &format!("=A{}*2", row));
        set_formula(&mut sheet, &format!("C{}", row), &format!("=B{}+1", row));
    }

    let outcome = convert_workbook(&single(sheet), None, &ConversionConfig::default()).unwrap();
    let position = |header: &str| {
        outcome
            .order
            .iter()
            .position(|id| id.header == header)
            .unwrap()
    };
    assert!(position("a") < position("b"));
    assert!(position("b") < position("c"));

    let c = SeriesId::new("Model", "c", 1, 3);
    assert_eq!(
        outcome.values[&c],
        vec![
            CellValue::Float(5.0),
            CellValue::Float(7.0),
            CellValue::Float(9.0)
        ]
    );
}

#[test]
fn test_average_window_evaluates() {
    let mut sheet = SheetData::new("Model");
    set(&mut sheet, "A1", "a");
    set(&mut sheet, "A2", 1.0);
    set(&mut sheet, "A3", 2.0);
    set(&mut sheet, "A4", 3.0);
    set(&mut sheet, "C1", "avg");
    set_formula(&mut sheet, "C2", "=AVERAGE(A2:A4)");

    let outcome = convert_workbook(&single(sheet), None, &ConversionConfig::default()).unwrap();
    let avg = SeriesId::new("Model", "avg", 1, 3);
    match outcome.values[&avg][0] {
        CellValue::Float(v) => assert!((v - 2.0).abs() < 1e-4),
        ref other => panic!("Expected float, got {:?}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_generalization_is_deterministic() {
    let render = || {
        let outcome =
            convert_workbook(&single(difference_sheet(5)), None, &ConversionConfig::default())
                .unwrap();
        outcome
            .get(&c_id())
            .and_then(|s| s.generic_formula.as_ref())
            .map(ToString::to_string)
            .unwrap()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_rewrite_is_a_fixed_point() {
    let workbook = single(difference_sheet(3));
    let tables = find_tables(&workbook.sheets[0]);
    let series = extract_series(&workbook.sheets[0], &tables[0]);
    let index = SeriesIndex::build(&series);

    let once = rewrite(&parse("=SUM(A2:B3)").unwrap(), "Model", &index).unwrap();
    let twice = rewrite(&once, "Model", &index).unwrap();
    assert_eq!(once.to_string(), twice.to_string());
}

#[test]
fn test_every_cell_belongs_to_one_series_or_header() {
    let workbook = single(difference_sheet(4));
    let sheet = &workbook.sheets[0];
    let tables = find_tables(sheet);
    let series: Vec<_> = tables
        .iter()
        .flat_map(|t| extract_series(sheet, t))
        .collect();

    for address in sheet.cells.keys() {
        let owners = series
            .iter()
            .filter(|s| s.id.header_cell() == *address || s.cells().any(|c| c == *address))
            .count();
        assert_eq!(owners, 1, "{} is covered {} times", address, owners);
    }
}

#[test]
fn test_sorted_order_respects_every_edge() {
    let mut sheet = difference_sheet(3);
    set(&mut sheet, "D1", "d");
    for row in 2..=4 {
        set_formula(&mut sheet, &format!("D{}", row), &format!("=C{}+A{}", row, row));
    }

    let outcome = convert_workbook(&single(sheet), None, &ConversionConfig::default()).unwrap();
    let graph = DependencyGraph::build(&outcome.series, &outcome.index);
    for id in &outcome.order {
        let at = outcome.order.iter().position(|x| x == id).unwrap();
        for dep in graph.dependencies(id) {
            let dep_at = outcome.order.iter().position(|x| x == dep).unwrap();
            assert!(dep_at < at, "{} must come before {}", dep, id);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_division_by_zero_aborts_with_context() {
    let mut sheet = difference_sheet(3);
    set(&mut sheet, "B3", 0.0);
    set(&mut sheet, "D1", "ratio");
    for row in 2..=4 {
        set_formula(&mut sheet, &format!("D{}", row), &format!("=A{}/B{}", row, row));
    }

    let err = convert_workbook(&single(sheet), None, &ConversionConfig::default()).unwrap_err();
    match err {
        ForgeError::Evaluation {
            series,
            row,
            formula,
            ..
        } => {
            assert_eq!(series.header, "ratio");
            assert_eq!(row, 2);
            assert_eq!(formula, "=A3/B3");
        }
        other => panic!("Expected evaluation failure, got {:?}", other),
    }
}

#[test]
fn test_unknown_function_fails_evaluation() {
    let mut sheet = difference_sheet(2);
    set(&mut sheet, "D1", "x");
    set_formula(&mut sheet, "D2", "=SQRT(A2)");
    set_formula(&mut sheet, "D3", "=SQRT(A3)");

    let err = convert_workbook(&single(sheet), None, &ConversionConfig::default()).unwrap_err();
    assert!(matches!(err, ForgeError::Evaluation { row: 1, .. }));
}

#[test]
fn test_cross_sheet_references_resolve() {
    let mut inputs = SheetData::new("Inputs");
    set(&mut inputs, "A1", "rate");
    set(&mut inputs, "A2", 0.5);
    set(&mut inputs, "A3", 0.25);

    let mut model = SheetData::new("Model");
    set(&mut model, "A1", "base");
    set(&mut model, "B1", "scaled");
    for row in 2..=3 {
        set(&mut model, &format!("A{}", row), 100.0);
        set_formula(
            &mut model,
            &format!("B{}", row),
            &format!("=A{}*Inputs!A{}", row, row),
        );
    }

    let mut workbook = WorkbookData::new();
    workbook.add_sheet(inputs);
    workbook.add_sheet(model);

    let outcome = convert_workbook(&workbook, None, &ConversionConfig::default()).unwrap();
    let scaled = SeriesId::new("Model", "scaled", 1, 2);
    assert_eq!(
        outcome.values[&scaled],
        vec![CellValue::Float(50.0), CellValue::Float(25.0)]
    );
}
