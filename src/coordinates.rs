//! Conversions between spreadsheet addresses ("B7", "A1:C3", "D:D") and
//! numeric (column, row) pairs.

use crate::error::{ForgeError, ForgeResult};
use crate::types::CellAddress;

/// Bounds of a parsed range reference.
///
/// For whole-column references (`C:E`) only the columns are meaningful and
/// the rows are pinned to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBounds {
    pub start: CellAddress,
    pub end: CellAddress,
    pub whole_column: bool,
}

/// 1 → "A", 27 → "AA"
pub fn column_to_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// "A" → 1, "aa" → 27
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_uppercase()) - u32::from('A') + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Parse a single cell address, ignoring `$` anchors
pub fn parse_cell(text: &str) -> ForgeResult<CellAddress> {
    let cleaned: String = text.chars().filter(|c| *c != '$').collect();
    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| invalid(text))?;
    let (letters, digits) = cleaned.split_at(split);
    let column = letters_to_column(letters).ok_or_else(|| invalid(text))?;
    let row: u32 = digits.parse().map_err(|_| invalid(text))?;
    if row == 0 {
        return Err(invalid(text));
    }
    Ok(CellAddress::new(column, row))
}

/// Parse "A1", "A1:B3" or "C:E"; a single cell is a 1×1 range
pub fn parse_range(text: &str) -> ForgeResult<RangeBounds> {
    let (first, second) = match text.split_once(':') {
        Some((a, b)) => (a, b),
        None => (text, text),
    };
    let strip = |s: &str| s.chars().filter(|c| *c != '$').collect::<String>();
    let (first, second) = (strip(first), strip(second));

    if is_column_only(&first) && is_column_only(&second) {
        let a = letters_to_column(&first).ok_or_else(|| invalid(text))?;
        let b = letters_to_column(&second).ok_or_else(|| invalid(text))?;
        return Ok(RangeBounds {
            start: CellAddress::new(a.min(b), 1),
            end: CellAddress::new(a.max(b), 1),
            whole_column: true,
        });
    }

    let a = parse_cell(&first)?;
    let b = parse_cell(&second)?;
    Ok(RangeBounds {
        start: CellAddress::new(a.column.min(b.column), a.row.min(b.row)),
        end: CellAddress::new(a.column.max(b.column), a.row.max(b.row)),
        whole_column: false,
    })
}

/// True for "C", "AB" (a column with no row part)
pub fn is_column_only(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphabetic())
}

/// True when the text is a cell address such as "B7" or "$B$7"
pub fn is_cell_reference(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| *c != '$').collect();
    let letters = cleaned.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let digits = &cleaned[letters..];
    (1..=3).contains(&letters)
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}

/// Sheet names made of letters, digits and underscores need no quoting
pub fn is_plain_sheet_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// "Data" → "Data!", "My Sheet" → "'My Sheet'!"
pub fn sheet_prefix(name: &str) -> String {
    if is_plain_sheet_name(name) {
        format!("{}!", name)
    } else {
        format!("'{}'!", name.replace('\'', "''"))
    }
}

/// Render bounds back to "A1", "A1:B3" or "C:E"
pub fn format_range(bounds: &RangeBounds) -> String {
    if bounds.whole_column {
        return format!(
            "{}:{}",
            column_to_letters(bounds.start.column),
            column_to_letters(bounds.end.column)
        );
    }
    if bounds.start == bounds.end {
        bounds.start.to_string()
    } else {
        format!("{}:{}", bounds.start, bounds.end)
    }
}

fn invalid(text: &str) -> ForgeError {
    ForgeError::Parse {
        formula: text.to_string(),
        message: "not a cell address".to_string(),
    }
}
