use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate};

use crate::error::{Result, ToolError};
use crate::model::{BillingRecord, CellValue, Sheet, WorkbookData};

use super::billing::parse_billing_rows;

/// Reads every sheet of a workbook as cell values. Sheets keep their
/// workbook order and their rows keep spreadsheet positions, so row 1 of the
/// workbook is always `rows[0]` even when it is blank.
pub fn read_workbook(path: &Path) -> Result<WorkbookData> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let names = workbook.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = read_required_sheet(&mut workbook, &name)?;
        sheets.push(Sheet::new(name, range_to_rows(&range)));
    }
    Ok(WorkbookData { sheets })
}

/// Reads a single named sheet.
pub fn read_sheet(path: &Path, name: &str) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = read_required_sheet(&mut workbook, name)?;
    Ok(Sheet::new(name, range_to_rows(&range)))
}

/// Reads billing records from the first sheet of an exported workbook.
pub fn read_billing_export(path: &Path) -> Result<Vec<BillingRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("{} has no sheets", path.display())))?;
    let range = read_required_sheet(&mut workbook, &first)?;
    parse_billing_rows(&first, &range_to_rows(&range))
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

/// Expands a calamine range into a grid anchored at A1.
fn range_to_rows(range: &Range<DataType>) -> Vec<Vec<CellValue>> {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_value));
        while cells.last().is_some_and(CellValue::is_empty) {
            cells.pop();
        }
        rows.push(cells);
    }

    while rows.last().is_some_and(Vec::is_empty) {
        rows.pop();
    }
    rows
}

fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Empty,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(serial) => serial_date(*serial)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(*serial)),
        other => CellValue::Text(other.to_string()),
    }
}

/// Converts an Excel date serial (days since 1899-12-30) to a calendar date,
/// discarding the time of day.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}
