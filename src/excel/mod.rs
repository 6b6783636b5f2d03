//! Excel collaborators
//!
//! - Import: .xlsx → sparse cell grids with formulas and cached values
//! - Clean: cosmetic formula normalization
//! - Export: converted series → .xlsx with per-row formulas
//! - Check: cell-by-cell equivalence and header compatibility

mod checker;
mod cleaner;
mod exporter;
mod importer;

pub use checker::{check_compatibility, check_equivalence, compare_workbooks, Mismatch};
pub use cleaner::FormulaCleaner;
pub use exporter::ExcelExporter;
pub use importer::ExcelImporter;
