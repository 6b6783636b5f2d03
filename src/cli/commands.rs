use super::report::ConversionReport;
use crate::config::ConversionConfig;
use crate::core::{convert_workbook, ConversionOutcome};
use crate::error::{ForgeError, ForgeResult};
use crate::excel::{check_equivalence, ExcelExporter, ExcelImporter};
use crate::types::{CellValue, Series};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file when given, defaults otherwise
fn load_config(path: Option<&Path>) -> ForgeResult<ConversionConfig> {
    match path {
        Some(path) => ConversionConfig::load(path),
        None => Ok(ConversionConfig::default()),
    }
}

/// `model.xlsx` → `model.series.xlsx`
fn default_output(input: &Path) -> PathBuf {
    input.with_extension("series.xlsx")
}

fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Float(f) => {
            let rounded = (f * 1e6).round() / 1e6;
            format!("{:.6}", rounded)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        }
        other => other.display_text(),
    }
}

fn describe(series: &Series) -> String {
    match &series.generic_formula {
        Some(formula) => format!("={}", formula),
        None if series.has_formula() => "(raw formulas)".to_string(),
        None => "(values)".to_string(),
    }
}

fn print_summary(outcome: &ConversionOutcome) {
    println!(
        "   Found {} tables, {} series, {} generic formulas",
        outcome.tables.len(),
        outcome.series.len(),
        outcome.generic_count()
    );
    if !outcome.degraded.is_empty() {
        println!(
            "{}",
            format!("   ⚠️  {} series kept their raw formulas:", outcome.degraded.len()).yellow()
        );
        for d in &outcome.degraded {
            println!("      {} {}", d.series.to_string().bright_blue(), d.reason.dimmed());
        }
    }
}

/// Execute the convert command
#[allow(clippy::too_many_arguments)]
pub fn convert(
    input: PathBuf,
    output: Option<PathBuf>,
    values_only: bool,
    reference: Option<PathBuf>,
    no_eval: bool,
    report: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: bool,
) -> ForgeResult<()> {
    let output = output.unwrap_or_else(|| default_output(&input));

    println!("{}", "🔥 Series Forge - Converting workbook".bold().green());
    println!("   Input:  {}", input.display());
    println!("   Output: {}\n", output.display());

    let mut config = load_config(config.as_deref())?;
    if no_eval {
        config.evaluate = false;
    }
    if values_only {
        config.write_formulas = false;
    }

    if verbose {
        println!("{}", "📖 Reading Excel file...".cyan());
    }
    let workbook = ExcelImporter::new(&input).import()?;
    let reference = match reference {
        Some(path) => {
            if verbose {
                println!("   Reference: {}", path.display());
            }
            Some(ExcelImporter::new(&path).import()?)
        }
        None => None,
    };

    if verbose {
        println!("{}", "🧮 Generalizing formulas...".cyan());
    }
    let outcome = convert_workbook(&workbook, reference.as_ref(), &config)?;
    print_summary(&outcome);

    if verbose {
        println!("\n{}", "📊 Writing Excel file...".cyan());
    }
    ExcelExporter::new(&outcome, &workbook)
        .values_only(!config.write_formulas)
        .export(&output)?;

    if let Some(report_path) = report {
        let report = ConversionReport::new(&input, Some(&output), &outcome);
        fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
        println!("   Report: {}", report_path.display());
    }

    println!("\n{}", "✅ Conversion Complete!".bold().green());
    println!("   Excel file: {}\n", output.display());
    Ok(())
}

/// Execute the inspect command
pub fn inspect(input: PathBuf, config: Option<PathBuf>, verbose: bool) -> ForgeResult<()> {
    println!("{}", "🔍 Series Forge - Inspect".bold().green());
    println!("   File: {}\n", input.display());

    let config = load_config(config.as_deref())?;
    let workbook = ExcelImporter::new(&input).import()?;
    let outcome = convert_workbook(&workbook, None, &config)?;

    println!("{}", "📋 Tables:".bold().cyan());
    for table in &outcome.tables {
        println!(
            "   {} {} ({:?} headers)",
            table.name.bright_blue().bold(),
            table.range,
            table.header_location
        );
        for series in outcome
            .series
            .iter()
            .filter(|s| table.range.contains(s.id.header_cell()) && s.sheet() == table.range.sheet)
        {
            println!(
                "      {} [{} rows] {}",
                series.header().cyan(),
                series.length,
                describe(series).bright_yellow()
            );
            if verbose {
                if let Some(values) = outcome.values.get(&series.id) {
                    let shown: Vec<String> = values.iter().take(5).map(format_value).collect();
                    let more = if values.len() > 5 { ", ..." } else { "" };
                    println!("         = [{}{}]", shown.join(", "), more);
                }
            }
        }
    }
    println!();

    println!("{}", "🌳 Evaluation order:".bold().cyan());
    for (i, id) in outcome
        .order
        .iter()
        .filter(|id| outcome.get(id).is_some_and(|s| s.generic_formula.is_some()))
        .enumerate()
    {
        println!("   {}. {}", i + 1, id);
    }
    println!();

    print_summary(&outcome);
    Ok(())
}

/// Execute the check command
pub fn check(left: PathBuf, right: PathBuf, tolerance: f64) -> ForgeResult<()> {
    println!("{}", "⚖️  Series Forge - Check".bold().green());
    println!("   Left:  {}", left.display());
    println!("   Right: {}\n", right.display());

    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(ForgeError::Config(format!(
            "tolerance must be a non-negative number, got {}",
            tolerance
        )));
    }

    let mismatches = check_equivalence(&left, &right, tolerance)?;
    if mismatches.is_empty() {
        println!("{}", "✅ Workbooks are equivalent!".bold().green());
        return Ok(());
    }

    println!(
        "{}",
        format!("❌ Found {} differing cells!", mismatches.len())
            .bold()
            .red()
    );
    for m in &mismatches {
        println!(
            "   {}!{}: {} vs {}",
            m.sheet,
            m.cell.bright_blue(),
            format_value(&m.left).red(),
            format_value(&m.right).green()
        );
    }
    println!();

    Err(ForgeError::Equivalence(format!(
        "{} cells differ beyond tolerance {}",
        mismatches.len(),
        tolerance
    )))
}
