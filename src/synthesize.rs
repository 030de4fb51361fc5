use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::identity::MeterIdentity;
use crate::matcher::{MatchSet, MeterGroup, insertion_point, matched_records};
use crate::model::{
    BillingRecord, COST_COLUMN, END_DATE_COLUMN, ESTIMATION_COLUMN, IDENTITY_COLUMN,
    QUANTITY_COLUMN, START_DATE_COLUMN, TEMPLATE_ONLY_COLUMNS,
};
use crate::sheet::TabularSheet;

/// Result of a synthesis pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOutcome {
    /// Canonical identities that received at least one new row.
    pub meters: BTreeSet<String>,
    pub rows_inserted: usize,
    /// Records skipped because the template does not track their meter.
    pub records_skipped: usize,
}

/// Inserts one row per matched record into `sheet`.
///
/// Records are processed group by group in export order. Each new row lands
/// directly below the most recent row with the same identity, so the rows of
/// one meter stay contiguous and in export order.
#[instrument(
    level = "info",
    skip_all,
    fields(groups = groups.len(), template_meters = match_set.len())
)]
pub fn synthesize_rows<S: TabularSheet + ?Sized>(
    sheet: &mut S,
    groups: &[MeterGroup],
    match_set: &MatchSet,
) -> Result<SynthesisOutcome> {
    let mut outcome = SynthesisOutcome::default();
    for record in matched_records(groups, match_set) {
        let identity = insert_record(sheet, record)?;
        outcome.meters.insert(identity);
        outcome.rows_inserted += 1;
    }

    let total: usize = groups.iter().map(|group| group.records.len()).sum();
    outcome.records_skipped = total - outcome.rows_inserted;
    info!(
        rows_inserted = outcome.rows_inserted,
        meters = outcome.meters.len(),
        records_skipped = outcome.records_skipped,
        "synthesized bill rows"
    );
    Ok(outcome)
}

/// Inserts a single record below its anchor row and returns the canonical
/// identity written to the new row.
pub fn insert_record<S: TabularSheet + ?Sized>(
    sheet: &mut S,
    record: &BillingRecord,
) -> Result<String> {
    let identity = MeterIdentity::from_record(record);
    let row = insertion_point(sheet, &identity)?;
    sheet.insert_row(row);
    populate_row(sheet, row, record, &identity);
    debug!(row, meter = %identity, "inserted bill row");
    Ok(identity.canonical())
}

/// Fills a freshly inserted row. Template-only columns are copied from the
/// row above; the remaining columns come from the billing record.
fn populate_row<S: TabularSheet + ?Sized>(
    sheet: &mut S,
    row: usize,
    record: &BillingRecord,
    identity: &MeterIdentity,
) {
    let anchor = row - 1;
    for column in TEMPLATE_ONLY_COLUMNS {
        let value = sheet.cell(anchor, column).clone();
        sheet.set_cell(row, column, value);
    }

    sheet.set_cell(row, IDENTITY_COLUMN, identity.canonical().into());
    sheet.set_cell(row, START_DATE_COLUMN, record.cycle_start.into());
    sheet.set_cell(row, END_DATE_COLUMN, record.cycle_end.into());
    sheet.set_cell(row, QUANTITY_COLUMN, record.fee_volume.into());
    sheet.set_cell(row, COST_COLUMN, record.total_charges.into());
    sheet.set_cell(row, ESTIMATION_COLUMN, record.actual_or_estimated().into());
}
