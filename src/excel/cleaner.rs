//! Cosmetic formula normalization applied before parsing.

use crate::error::{ForgeError, ForgeResult};
use crate::types::WorkbookData;
use regex::Regex;

/// Removes `$` anchors and quotes around sheet names that do not need them
pub struct FormulaCleaner {
    anchors: Regex,
    quoted_sheet: Regex,
}

impl FormulaCleaner {
    pub fn new() -> ForgeResult<Self> {
        let anchors = Regex::new(r"\$([A-Za-z]{1,3}|[0-9]+)")
            .map_err(|e| ForgeError::Config(format!("Invalid anchor pattern: {}", e)))?;
        let quoted_sheet = Regex::new(r"'([\p{L}_][\p{L}\p{N}_]*)'!")
            .map_err(|e| ForgeError::Config(format!("Invalid sheet pattern: {}", e)))?;
        Ok(Self {
            anchors,
            quoted_sheet,
        })
    }

    /// Clean one formula; text inside string literals is left alone
    pub fn clean(&self, formula: &str) -> String {
        formula
            .split('"')
            .enumerate()
            .map(|(i, segment)| {
                if i % 2 == 1 {
                    return segment.to_string();
                }
                let unanchored = self.anchors.replace_all(segment, "$1");
                self.quoted_sheet
                    .replace_all(&unanchored, "$1!")
                    .into_owned()
            })
            .collect::<Vec<_>>()
            .join("\"")
    }

    /// Copy of the workbook with every formula cleaned
    pub fn clean_workbook(&self, workbook: &WorkbookData) -> WorkbookData {
        let mut cleaned = workbook.clone();
        for sheet in &mut cleaned.sheets {
            for cell in sheet.cells.values_mut() {
                if let Some(formula) = &cell.formula {
                    cell.formula = Some(self.clean(formula));
                }
            }
        }
        cleaned
    }
}
