use std::fmt;

use chrono::NaiveDate;

/// Name of the sheet in the upload template that receives bills.
pub const TEMPLATE_SHEET: &str = "Add Bills-Non Electric";
/// Expected header of the identity column.
pub const IDENTITY_HEADER: &str = "Meter Name (Pre-filled)";

/// Column letters of the upload template layout.
///
/// Only the columns the tool reads or writes are named. Column B is left
/// empty on synthesized rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
}

impl Column {
    /// Zero-based offset of the column inside a row.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Column holding the meter identity.
pub const IDENTITY_COLUMN: Column = Column::E;
pub const START_DATE_COLUMN: Column = Column::G;
pub const END_DATE_COLUMN: Column = Column::H;
pub const QUANTITY_COLUMN: Column = Column::I;
pub const COST_COLUMN: Column = Column::K;
pub const ESTIMATION_COLUMN: Column = Column::L;

/// Template-specific columns with no counterpart in the billing export. New
/// rows copy them from the anchor row.
pub const TEMPLATE_ONLY_COLUMNS: [Column; 5] =
    [Column::A, Column::C, Column::D, Column::F, Column::J];

/// A single cell value as read from, or written to, a worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl CellValue {
    /// Renders the cell the way a spreadsheet user would read it. Integral
    /// numbers are printed without a fractional part.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(value) => value.clone(),
            CellValue::Number(value) => format_number(*value),
            CellValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            CellValue::Bool(value) => value.to_string(),
        }
    }

    /// Numeric view of the cell. Empty cells read as NaN, mirroring a missing
    /// amount in the billing export.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Empty => Some(f64::NAN),
            CellValue::Number(value) => Some(*value),
            CellValue::Text(value) if value.trim().is_empty() => Some(f64::NAN),
            CellValue::Text(value) => value.trim().parse().ok(),
            CellValue::Date(_) | CellValue::Bool(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(value) => Some(*value),
            CellValue::Text(value) => parse_date(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => f.write_str("<empty>"),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            CellValue::Empty
        } else {
            CellValue::Number(value)
        }
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Accepts ISO dates, ISO timestamps and US-style `m/d/Y` dates.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.split([' ', 'T']).next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%m/%d/%Y"))
        .ok()
}

/// A worksheet held in memory as a grid of cells. Row `i` of the grid is
/// spreadsheet row `i + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Every sheet of a workbook, in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookData {
    pub sheets: Vec<Sheet>,
}

impl WorkbookData {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }
}

/// How the closing meter read of a billing cycle was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReadType {
    Actual,
    Estimate,
}

impl EndReadType {
    /// Anything other than an actual read counts as an estimate.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("actual") {
            EndReadType::Actual
        } else {
            EndReadType::Estimate
        }
    }

    /// Value of the template's estimation column for this read type.
    pub fn estimation_flag(self) -> &'static str {
        match self {
            EndReadType::Actual => "No",
            EndReadType::Estimate => "Yes",
        }
    }
}

impl fmt::Display for EndReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReadType::Actual => f.write_str("Actual"),
            EndReadType::Estimate => f.write_str("Estimate"),
        }
    }
}

/// One billing cycle of one meter, as exported by the billing provider.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingRecord {
    pub customer_id: String,
    pub meter_number: String,
    pub cycle_start: NaiveDate,
    pub cycle_end: NaiveDate,
    pub fee_volume: f64,
    /// NaN when the export leaves the charge blank.
    pub total_charges: f64,
    pub end_read_type: EndReadType,
}

impl BillingRecord {
    /// `"No"` for actual reads, `"Yes"` otherwise.
    pub fn actual_or_estimated(&self) -> &'static str {
        self.end_read_type.estimation_flag()
    }
}
