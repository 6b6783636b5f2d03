//! One workbook conversion: tables → series → generic formulas → sorted
//! evaluation.

use super::dependencies::DependencyGraph;
use super::generalizer::generalize_series;
use super::materializer::{evaluate_in_order, SeriesValues};
use crate::config::ConversionConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::excel::{check_compatibility, FormulaCleaner};
use crate::extraction::{extract_series, find_tables, read_values, SeriesIndex};
use crate::types::{Series, SeriesId, Table, WorkbookData};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A series whose formulas could not be generalized and kept its raw cells
#[derive(Debug, Clone, Serialize)]
pub struct DegradedSeries {
    pub series: SeriesId,
    pub reason: String,
}

/// Everything one conversion produces
#[derive(Debug)]
pub struct ConversionOutcome {
    pub tables: Vec<Table>,
    /// Every series, generic formulas attached where generalization succeeded
    pub series: Vec<Series>,
    /// Dependencies first
    pub order: Vec<SeriesId>,
    /// Empty when evaluation is disabled
    pub values: SeriesValues,
    pub degraded: Vec<DegradedSeries>,
    pub index: SeriesIndex,
}

impl ConversionOutcome {
    pub fn generic_count(&self) -> usize {
        self.series
            .iter()
            .filter(|s| s.generic_formula.is_some())
            .count()
    }

    pub fn get(&self, id: &SeriesId) -> Option<&Series> {
        self.series.iter().find(|s| &s.id == id)
    }
}

/// Convert a loaded workbook. `reference`, when given, must expose the same
/// header sets or nothing is converted.
pub fn convert_workbook(
    workbook: &WorkbookData,
    reference: Option<&WorkbookData>,
    config: &ConversionConfig,
) -> ForgeResult<ConversionOutcome> {
    config.validate()?;

    let cleaned;
    let workbook = if config.clean_formulas {
        cleaned = FormulaCleaner::new()?.clean_workbook(workbook);
        &cleaned
    } else {
        workbook
    };

    if let Some(reference) = reference {
        check_compatibility(workbook, reference)?;
        info!("reference workbook is compatible");
    }

    // Tables and series
    let mut tables = Vec::new();
    let mut series = Vec::new();
    for sheet in &workbook.sheets {
        if !config.includes_sheet(&sheet.name) {
            debug!(sheet = %sheet.name, "skipped sheet");
            continue;
        }
        for table in find_tables(sheet) {
            series.extend(extract_series(sheet, &table));
            tables.push(table);
        }
    }
    info!(tables = tables.len(), series = series.len(), "extracted series");

    let index = SeriesIndex::build(&series);

    // Generalization; local failures degrade the series only
    let mut generic = Vec::with_capacity(series.len());
    let mut degraded = Vec::new();
    for s in &series {
        match generalize_series(s, &index) {
            Ok(formula) => generic.push(formula),
            Err(e) if e.is_local() => {
                warn!(series = %s.id, error = %e, "keeping raw formulas");
                degraded.push(DegradedSeries {
                    series: s.id.clone(),
                    reason: e.to_string(),
                });
                generic.push(None);
            }
            Err(e) => return Err(e),
        }
    }
    for (s, formula) in series.iter_mut().zip(generic) {
        s.generic_formula = formula;
    }
    let index = SeriesIndex::build(&series);
    info!(
        generic = series.iter().filter(|s| s.generic_formula.is_some()).count(),
        degraded = degraded.len(),
        "generalized formulas"
    );

    let order = DependencyGraph::build(&series, &index).sorted();

    let mut values = SeriesValues::new();
    if config.evaluate {
        for s in series.iter().filter(|s| s.generic_formula.is_none()) {
            let sheet = workbook.sheet(s.sheet()).ok_or_else(|| {
                ForgeError::Workbook(format!("Sheet '{}' disappeared during conversion", s.sheet()))
            })?;
            values.insert(s.id.clone(), read_values(s, sheet));
        }
        evaluate_in_order(&series, &order, &index, &mut values)?;
    }

    Ok(ConversionOutcome {
        tables,
        series,
        order,
        values,
        degraded,
        index,
    })
}
