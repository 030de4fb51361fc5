//! File adapters for the billing export and the upload template.

pub mod billing;
pub mod csv_read;
pub mod excel_read;
pub mod excel_write;

use std::path::Path;

use crate::error::Result;
use crate::model::BillingRecord;

/// Reads a billing export, choosing the reader from the file extension.
/// `.csv` files go through the CSV reader; anything else is opened as a
/// workbook.
pub fn read_billing_records(path: &Path) -> Result<Vec<BillingRecord>> {
    let is_csv = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
    if is_csv {
        csv_read::read_billing_csv(path)
    } else {
        excel_read::read_billing_export(path)
    }
}
