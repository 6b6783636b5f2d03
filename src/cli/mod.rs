//! CLI command handlers

pub mod commands;
pub mod report;

pub use commands::{check, convert, inspect};
pub use report::ConversionReport;
