//! Conversion settings, read from YAML and overridable from the command line.

use crate::error::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    /// Evaluate generic formulas after generalization
    pub evaluate: bool,
    /// Strip `$` anchors and needless sheet quotes before parsing
    pub clean_formulas: bool,
    /// Numeric tolerance for workbook comparison
    pub tolerance: f64,
    /// Sheets to convert; empty means all
    pub sheets: Vec<String>,
    /// Write per-row formulas (false writes values only)
    pub write_formulas: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            evaluate: true,
            clean_formulas: true,
            tolerance: 1e-4,
            sheets: Vec::new(),
            write_formulas: true,
        }
    }
}

impl ConversionConfig {
    pub fn load(path: &Path) -> ForgeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> ForgeResult<Self> {
        let config: ConversionConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ForgeResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ForgeError::Config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Whether a sheet takes part in the conversion
    pub fn includes_sheet(&self, name: &str) -> bool {
        self.sheets.is_empty() || self.sheets.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::default();
        assert!(config.evaluate);
        assert!(config.clean_formulas);
        assert_eq!(config.tolerance, 1e-4);
        assert!(config.includes_sheet("anything"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ConversionConfig::from_yaml("evaluate: false\nsheets: [Model]\n").unwrap();
        assert!(!config.evaluate);
        assert!(config.clean_formulas);
        assert!(config.includes_sheet("Model"));
        assert!(!config.includes_sheet("Notes"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(ConversionConfig::from_yaml("evaluat: false\n").is_err());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let err = ConversionConfig::from_yaml("tolerance: -1\n").unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }
}
