use crate::error::{Result, ToolError};
use crate::identity::METER_NUMBER_DIGITS;
use crate::model::{BillingRecord, CellValue, EndReadType};

const CUSTOMER_ID: &str = "CustomerId";
const METER_NUMBER: &str = "MeterNumber";
const CYCLE_START: &str = "CycleStartDate";
const CYCLE_END: &str = "CycleEndDate";
const FEE_VOLUME: &str = "FeeVolume";
const TOTAL_CHARGES: &str = "TotalCharges";
const END_READ_TYPE: &str = "EndReadType";

struct ColumnIndex {
    customer_id: usize,
    meter_number: usize,
    cycle_start: usize,
    cycle_end: usize,
    fee_volume: usize,
    total_charges: usize,
    end_read_type: usize,
}

/// Converts the rows of a billing export into records. The first row is the
/// header; columns are located by name so their order does not matter.
/// Blank rows are skipped.
pub fn parse_billing_rows(sheet: &str, rows: &[Vec<CellValue>]) -> Result<Vec<BillingRecord>> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell.to_text().trim().to_string())
        .collect();

    let idx = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ToolError::MissingColumn {
                sheet: sheet.to_string(),
                column: name.to_string(),
            })
    };

    let columns = ColumnIndex {
        customer_id: idx(CUSTOMER_ID)?,
        meter_number: idx(METER_NUMBER)?,
        cycle_start: idx(CYCLE_START)?,
        cycle_end: idx(CYCLE_END)?,
        fee_volume: idx(FEE_VOLUME)?,
        total_charges: idx(TOTAL_CHARGES)?,
        end_read_type: idx(END_READ_TYPE)?,
    };

    body.iter()
        .filter(|row| !row.iter().all(CellValue::is_empty))
        .map(|row| parse_record(row, &columns))
        .collect()
}

fn parse_record(row: &[CellValue], columns: &ColumnIndex) -> Result<BillingRecord> {
    let cell = |index: usize| row.get(index).cloned().unwrap_or_default();

    Ok(BillingRecord {
        customer_id: cell(columns.customer_id).to_text().trim().to_string(),
        meter_number: canonical_meter_number(&cell(columns.meter_number)),
        cycle_start: required_date(CYCLE_START, &cell(columns.cycle_start))?,
        cycle_end: required_date(CYCLE_END, &cell(columns.cycle_end))?,
        fee_volume: required_number(FEE_VOLUME, &cell(columns.fee_volume))?,
        total_charges: required_number(TOTAL_CHARGES, &cell(columns.total_charges))?,
        end_read_type: EndReadType::parse(&cell(columns.end_read_type).to_text()),
    })
}

/// Meter numbers stored as numbers lose their leading zeros; all-digit
/// values are padded back to the canonical width.
fn canonical_meter_number(cell: &CellValue) -> String {
    let text = cell.to_text().trim().to_string();
    if !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit()) {
        format!("{text:0>width$}", width = METER_NUMBER_DIGITS)
    } else {
        text
    }
}

fn required_date(column: &str, cell: &CellValue) -> Result<chrono::NaiveDate> {
    cell.as_date().ok_or_else(|| invalid(column, cell))
}

fn required_number(column: &str, cell: &CellValue) -> Result<f64> {
    cell.as_number().ok_or_else(|| invalid(column, cell))
}

fn invalid(column: &str, cell: &CellValue) -> ToolError {
    ToolError::InvalidLiteral {
        column: column.to_string(),
        value: cell.to_text(),
    }
}
