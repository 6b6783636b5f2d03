use crate::coordinates::column_to_letters;
use crate::formula::Expr;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

//==============================================================================
// Cells
//==============================================================================

/// A 1-based (column, row) position on a sheet, ordered by column then row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub column: u32,
    pub row: u32,
}

impl CellAddress {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Move by a signed delta, refusing to leave the sheet
    pub fn offset(&self, columns: i64, rows: i64) -> Option<CellAddress> {
        let column = i64::from(self.column) + columns;
        let row = i64::from(self.row) + rows;
        if column < 1 || row < 1 {
            return None;
        }
        Some(CellAddress::new(
            u32::try_from(column).ok()?,
            u32::try_from(row).ok()?,
        ))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.column), self.row)
    }
}

/// Last computed content of a cell, as read from the workbook
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text used when the value serves as a header
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// One non-empty cell: its position, cached value and formula text
#[derive(Debug, Clone)]
pub struct Cell {
    pub sheet: String,
    pub address: CellAddress,
    pub value: CellValue,
    pub formula: Option<String>,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.sheet == other.sheet && self.address == other.address
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sheet.hash(state);
        self.address.hash(state);
    }
}

/// Rectangular block of cells on one sheet, bounds inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub sheet: String,
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Build a range from two corners in any order
    pub fn new(sheet: impl Into<String>, a: CellAddress, b: CellAddress) -> Self {
        Self {
            sheet: sheet.into(),
            start: CellAddress::new(a.column.min(b.column), a.row.min(b.row)),
            end: CellAddress::new(a.column.max(b.column), a.row.max(b.row)),
        }
    }

    pub fn contains(&self, address: CellAddress) -> bool {
        (self.start.column..=self.end.column).contains(&address.column)
            && (self.start.row..=self.end.row).contains(&address.row)
    }

    /// Every address in the block, column by column
    pub fn addresses(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.column..=self.end.column).flat_map(move |column| {
            (self.start.row..=self.end.row).map(move |row| CellAddress::new(column, row))
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}:{}", self.sheet, self.start, self.end)
    }
}

//==============================================================================
// Workbook contents
//==============================================================================

/// Sparse cell grid of one worksheet
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub name: String,
    pub cells: BTreeMap<CellAddress, Cell>,
}

impl SheetData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, address: CellAddress) -> Option<&Cell> {
        self.cells.get(&address)
    }

    pub fn set_value(&mut self, address: CellAddress, value: impl Into<CellValue>) {
        self.insert(address, value.into(), None);
    }

    /// Store a formula together with its last computed value
    pub fn set_formula(
        &mut self,
        address: CellAddress,
        formula: impl Into<String>,
        cached: impl Into<CellValue>,
    ) {
        self.insert(address, cached.into(), Some(formula.into()));
    }

    fn insert(&mut self, address: CellAddress, value: CellValue, formula: Option<String>) {
        let cell = Cell {
            sheet: self.name.clone(),
            address,
            value,
            formula,
        };
        if cell.is_blank() {
            self.cells.remove(&address);
        } else {
            self.cells.insert(address, cell);
        }
    }
}

/// All sheets of a workbook, in workbook order
#[derive(Debug, Clone, Default)]
pub struct WorkbookData {
    pub sheets: Vec<SheetData>,
}

impl WorkbookData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: SheetData) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut SheetData> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }
}

//==============================================================================
// Tables and series
//==============================================================================

/// Which side of the data run carries the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderLocation {
    Top,
    Left,
}

/// A maximal 8-connected block of non-empty cells
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub range: CellRange,
    pub header_location: HeaderLocation,
    pub header_values: Vec<String>,
}

/// Content-addressed identity of a series, stable across runs.
///
/// Ordering is by sheet, then header column, then header row, so sorting a
/// list of ids yields the "by column then row" order used for canonical
/// series references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct SeriesId {
    pub sheet: String,
    pub header: String,
    pub header_row: u32,
    pub header_column: u32,
}

impl SeriesId {
    pub fn new(sheet: impl Into<String>, header: impl Into<String>, row: u32, column: u32) -> Self {
        Self {
            sheet: sheet.into(),
            header: header.into(),
            header_row: row,
            header_column: column,
        }
    }

    pub fn header_cell(&self) -> CellAddress {
        CellAddress::new(self.header_column, self.header_row)
    }
}

impl Ord for SeriesId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sheet
            .cmp(&other.sheet)
            .then(self.header_column.cmp(&other.header_column))
            .then(self.header_row.cmp(&other.header_row))
            .then_with(|| self.header.cmp(&other.header))
    }
}

impl PartialOrd for SeriesId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!R{}C{}:{}",
            self.sheet, self.header_row, self.header_column, self.header
        )
    }
}

impl Serialize for SeriesId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Data type of a series, taken from its first sample value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesDataType {
    Int,
    Float,
    Str,
    Bool,
}

impl SeriesDataType {
    pub fn of(value: &CellValue) -> Self {
        match value {
            CellValue::Int(_) => SeriesDataType::Int,
            CellValue::Float(_) => SeriesDataType::Float,
            CellValue::Bool(_) => SeriesDataType::Bool,
            CellValue::Text(_) | CellValue::Empty => SeriesDataType::Str,
        }
    }
}

/// A run of data cells sharing one header
#[derive(Debug, Clone)]
pub struct Series {
    pub id: SeriesId,
    pub header_location: HeaderLocation,
    pub starting_cell: CellAddress,
    pub length: usize,
    /// Formulas of the first two data cells
    pub formulas: [Option<String>; 2],
    /// Cached values of the first two data cells
    pub sample_values: Vec<CellValue>,
    pub data_type: SeriesDataType,
    /// Set once the two sample formulas have been generalized
    pub generic_formula: Option<Expr>,
}

impl Series {
    pub fn sheet(&self) -> &str {
        &self.id.sheet
    }

    pub fn header(&self) -> &str {
        &self.id.header
    }

    /// Address of the data cell at a 0-based offset along the run
    pub fn cell_at(&self, offset: usize) -> CellAddress {
        let step = u32::try_from(offset).unwrap_or(u32::MAX);
        match self.header_location {
            HeaderLocation::Top => CellAddress::new(
                self.starting_cell.column,
                self.starting_cell.row.saturating_add(step),
            ),
            HeaderLocation::Left => CellAddress::new(
                self.starting_cell.column.saturating_add(step),
                self.starting_cell.row,
            ),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (0..self.length).map(move |offset| self.cell_at(offset))
    }

    pub fn has_formula(&self) -> bool {
        self.formulas.iter().any(Option::is_some)
    }
}

//==============================================================================
// Canonical series references
//==============================================================================

/// Offset span of a series reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSpan {
    /// 0-based offsets into the series, inclusive
    Offsets { start: i64, end: i64 },
    /// Entire column, independent of the row being computed
    WholeColumn,
}

/// A cell range resolved to the series that own its cells
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesRange {
    /// Sorted, unique
    pub series: Vec<SeriesId>,
    pub span: RowSpan,
}

/// A series reference parameterized by the row index n.
///
/// `span` and `series` are the values at n = 1. `row_delta` is the change of
/// (start, end) offsets per row and is `None` for whole-column spans.
/// `position_deltas` holds, per series, the (row, column) shift of the header
/// cell per row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericRange {
    pub series: Vec<SeriesId>,
    pub span: RowSpan,
    pub row_delta: Option<(i64, i64)>,
    pub position_deltas: Vec<(i64, i64)>,
}
