use std::path::Path;

use crate::error::Result;
use crate::model::{BillingRecord, CellValue};

use super::billing::parse_billing_rows;

/// Reads billing records from a CSV export. Every field is read as text and
/// converted by the same rules as a workbook export.
pub fn read_billing_csv(path: &Path) -> Result<Vec<BillingRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect::<Vec<_>>());
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_billing_rows(&name, &rows)
}

fn text_cell(field: &str) -> CellValue {
    if field.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(field.to_string())
    }
}
