use std::path::Path;

use chrono::Datelike;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use crate::error::Result;
use crate::model::{CellValue, WorkbookData};

/// Number format applied to date cells.
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

/// Writes the provided workbook data to the given path, one worksheet per
/// sheet. Empty cells and NaN numbers are left blank.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for sheet in &workbook.sheets {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (row_idx, row) in sheet.rows.iter().enumerate() {
            let row_num = row_idx as u32;
            for (col_idx, cell) in row.iter().enumerate() {
                let col_num = col_idx as u16;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(value) if value.is_empty() => {}
                    CellValue::Text(value) => {
                        worksheet.write_string(row_num, col_num, value)?;
                    }
                    CellValue::Number(value) if value.is_nan() => {}
                    CellValue::Number(value) => {
                        worksheet.write_number(row_num, col_num, *value)?;
                    }
                    CellValue::Bool(value) => {
                        worksheet.write_boolean(row_num, col_num, *value)?;
                    }
                    CellValue::Date(date) => {
                        let datetime = ExcelDateTime::from_ymd(
                            date.year() as u16,
                            date.month() as u8,
                            date.day() as u8,
                        )?;
                        worksheet.write_datetime_with_format(
                            row_num,
                            col_num,
                            &datetime,
                            &date_format,
                        )?;
                    }
                }
            }
        }
    }

    workbook_writer.save(path)?;
    Ok(())
}
