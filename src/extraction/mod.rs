//! Turns a sparse cell grid into tables and series.

pub mod series_extractor;
pub mod series_index;
pub mod table_locator;

pub use series_extractor::{classify_table, extract_series, find_tables, read_values};
pub use series_index::SeriesIndex;
pub use table_locator::locate_tables;
