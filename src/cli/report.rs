//! JSON conversion report

use crate::core::{ConversionOutcome, DegradedSeries, DependencyGraph};
use crate::types::{CellValue, HeaderLocation, SeriesDataType, SeriesId};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct ConversionReport {
    pub input: String,
    pub output: Option<String>,
    pub tables: Vec<TableReport>,
    pub series: Vec<SeriesReport>,
    pub order: Vec<SeriesId>,
    pub degraded: Vec<DegradedSeries>,
}

#[derive(Debug, Serialize)]
pub struct TableReport {
    pub name: String,
    pub range: String,
    pub header_location: HeaderLocation,
    pub headers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SeriesReport {
    pub id: SeriesId,
    pub header_location: HeaderLocation,
    pub starting_cell: String,
    pub length: usize,
    pub data_type: SeriesDataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_formula: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<SeriesId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<CellValue>>,
}

impl ConversionReport {
    pub fn new(input: &Path, output: Option<&Path>, outcome: &ConversionOutcome) -> Self {
        let graph = DependencyGraph::build(&outcome.series, &outcome.index);

        let tables = outcome
            .tables
            .iter()
            .map(|t| TableReport {
                name: t.name.clone(),
                range: t.range.to_string(),
                header_location: t.header_location,
                headers: t.header_values.clone(),
            })
            .collect();

        let series = outcome
            .series
            .iter()
            .map(|s| SeriesReport {
                id: s.id.clone(),
                header_location: s.header_location,
                starting_cell: s.starting_cell.to_string(),
                length: s.length,
                data_type: s.data_type,
                generic_formula: s.generic_formula.as_ref().map(|f| format!("={}", f)),
                dependencies: graph.dependencies(&s.id).into_iter().cloned().collect(),
                values: outcome.values.get(&s.id).cloned(),
            })
            .collect();

        Self {
            input: input.display().to_string(),
            output: output.map(|p| p.display().to_string()),
            tables,
            series,
            order: outcome.order.clone(),
            degraded: outcome.degraded.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::core::convert_workbook;
    use crate::coordinates::parse_cell;
    use crate::types::{SheetData, WorkbookData};

    #[test]
    fn test_report_serializes_generic_formulas() {
        let mut sheet = SheetData::new("S");
        sheet.set_value(parse_cell("A1").unwrap(), "a");
        sheet.set_value(parse_cell("B1").unwrap(), "b");
        for row in 2..=3 {
            sheet.set_value(parse_cell(&format!("A{}", row)).unwrap(), row as f64);
            sheet.set_formula(
                parse_cell(&format!("B{}", row)).unwrap(),
                format!("=A{}*2", row),
                row as f64 * 2.0,
            );
        }
        let mut workbook = WorkbookData::new();
        workbook.add_sheet(sheet);

        let outcome = convert_workbook(&workbook, None, &ConversionConfig::default()).unwrap();
        let report = ConversionReport::new(Path::new("in.xlsx"), None, &outcome);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["tables"][0]["range"], "S!A1:B3");
        assert_eq!(json["series"][1]["id"], "S!R1C2:b");
        assert_eq!(json["series"][1]["dependencies"][0], "S!R1C1:a");
        assert!(json["series"][1]["generic_formula"].is_string());
        assert_eq!(json["series"][1]["values"][1], 6.0);
        assert!(json["series"][0].get("generic_formula").is_none());
    }
}
