//! Series Forge - spreadsheet to series converter
//!
//! Converts spreadsheets whose formulas repeat row after row into a
//! column-addressed form: every table is sliced into series, each series'
//! formula is inferred from its first two data cells as one formula
//! parameterized by the row index, and those formulas are re-evaluated in
//! dependency order.
//!
//! # Features
//!
//! - Table discovery by 8-connected clustering of non-empty cells
//! - Header orientation detection (top or left)
//! - Cell ranges rewritten into canonical series references
//! - Generic formulas verified against both samples before use
//! - Dependency-ordered evaluation over a small function set
//! - Excel import/export and workbook comparison
//!
//! # Example
//!
//! ```no_run
//! use series_forge::config::ConversionConfig;
//! use series_forge::core::convert_workbook;
//! use series_forge::excel::ExcelImporter;
//!
//! let workbook = ExcelImporter::new("model.xlsx").import()?;
//! let outcome = convert_workbook(&workbook, None, &ConversionConfig::default())?;
//!
//! for series in &outcome.series {
//!     if let Some(formula) = &series.generic_formula {
//!         println!("{} = {}", series.id, formula);
//!     }
//! }
//! # Ok::<(), series_forge::error::ForgeError>(())
//! ```

pub mod cli;
pub mod config;
pub mod coordinates;
pub mod core;
pub mod error;
pub mod excel;
pub mod extraction;
pub mod formula;
pub mod types;

// Re-export commonly used types
pub use error::{ForgeError, ForgeResult};
pub use types::{CellAddress, CellValue, Series, SeriesId, SheetData, Table, WorkbookData};
