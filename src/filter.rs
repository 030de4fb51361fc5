use tracing::{debug, instrument};

use crate::identity::TEMPLATE_PREFIX;
use crate::model::IDENTITY_COLUMN;
use crate::sheet::{HEADER_ROW, TabularSheet};

/// Removes every data row whose identity cell does not start with
/// `Constellation__RG-`. The header row is always kept.
///
/// Rows to delete are collected first and removed bottom-up so that earlier
/// deletions never shift a row that is still pending. Returns the number of
/// removed rows.
#[instrument(level = "debug", skip_all, fields(rows = sheet.row_count()))]
pub fn retain_convention_rows<S: TabularSheet + ?Sized>(sheet: &mut S) -> usize {
    let rejected = rejected_rows(sheet);
    for &row in rejected.iter().rev() {
        sheet.delete_row(row);
    }
    debug!(removed = rejected.len(), remaining = sheet.row_count(), "filtered template rows");
    rejected.len()
}

/// Ascending row numbers of the data rows that fail the naming convention.
pub fn rejected_rows<S: TabularSheet + ?Sized>(sheet: &S) -> Vec<usize> {
    (1..=sheet.row_count())
        .filter(|&row| row != HEADER_ROW)
        .filter(|&row| !sheet.cell(row, IDENTITY_COLUMN).to_text().starts_with(TEMPLATE_PREFIX))
        .collect()
}
