//! Row-addressed access to a worksheet.
//!
//! Rows are numbered from 1 like in a spreadsheet; row 1 is the header.

use crate::model::{CellValue, Column, Sheet};

/// Spreadsheet row holding the column headers.
pub const HEADER_ROW: usize = 1;
/// First row carrying data.
pub const FIRST_DATA_ROW: usize = 2;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Mutable, row-addressed view of a worksheet used by the filter and the
/// row synthesizer.
pub trait TabularSheet {
    /// Number of rows including the header row.
    fn row_count(&self) -> usize;

    /// Value at the given row and column; cells outside the used area read
    /// as empty.
    fn cell(&self, row: usize, column: Column) -> &CellValue;

    fn set_cell(&mut self, row: usize, column: Column, value: CellValue);

    /// Inserts an empty row at `row`, shifting that row and every row below
    /// it down by one.
    fn insert_row(&mut self, row: usize);

    /// Removes `row`, shifting every row below it up by one.
    fn delete_row(&mut self, row: usize);

    /// Row numbers of all data rows, top to bottom.
    fn data_rows(&self) -> std::ops::RangeInclusive<usize> {
        FIRST_DATA_ROW..=self.row_count()
    }
}

impl TabularSheet for Sheet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: Column) -> &CellValue {
        row.checked_sub(1)
            .and_then(|offset| self.rows.get(offset))
            .and_then(|cells| cells.get(column.index()))
            .unwrap_or(&EMPTY_CELL)
    }

    fn set_cell(&mut self, row: usize, column: Column, value: CellValue) {
        let Some(offset) = row.checked_sub(1) else {
            return;
        };
        if self.rows.len() <= offset {
            self.rows.resize_with(offset + 1, Vec::new);
        }
        let cells = &mut self.rows[offset];
        if cells.len() <= column.index() {
            cells.resize(column.index() + 1, CellValue::Empty);
        }
        cells[column.index()] = value;
    }

    fn insert_row(&mut self, row: usize) {
        let offset = row.saturating_sub(1).min(self.rows.len());
        self.rows.insert(offset, Vec::new());
    }

    fn delete_row(&mut self, row: usize) {
        if let Some(offset) = row.checked_sub(1) {
            if offset < self.rows.len() {
                self.rows.remove(offset);
            }
        }
    }
}
