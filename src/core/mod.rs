//! Conversion engine: rewriting, generalization, ordering and evaluation

pub mod dependencies;
pub mod generalizer;
pub mod materializer;
pub mod pipeline;
pub mod rewriter;

pub use dependencies::DependencyGraph;
pub use materializer::SeriesValues;
pub use pipeline::{convert_workbook, ConversionOutcome, DegradedSeries};
