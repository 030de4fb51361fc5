use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{Result, ToolError};
use crate::identity::MeterIdentity;
use crate::model::{BillingRecord, IDENTITY_COLUMN};
use crate::sheet::TabularSheet;

/// Billing records of one meter, in export order.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterGroup {
    pub meter_number: String,
    pub records: Vec<BillingRecord>,
}

/// Groups records by meter number. Groups appear in order of first
/// occurrence and keep the export order of their records.
pub fn group_by_meter(records: &[BillingRecord]) -> Vec<MeterGroup> {
    let mut groups: IndexMap<&str, Vec<BillingRecord>> = IndexMap::new();
    for record in records {
        groups
            .entry(record.meter_number.as_str())
            .or_default()
            .push(record.clone());
    }
    groups
        .into_iter()
        .map(|(meter_number, records)| MeterGroup {
            meter_number: meter_number.to_string(),
            records,
        })
        .collect()
}

/// Identities present in the filtered template. Built once per run.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    identities: HashSet<MeterIdentity>,
}

impl MatchSet {
    /// Collects the identity of every data row that follows the naming
    /// convention.
    pub fn from_sheet<S: TabularSheet + ?Sized>(sheet: &S) -> Self {
        let identities = sheet
            .data_rows()
            .filter_map(|row| row_identity(sheet, row))
            .collect();
        Self { identities }
    }

    pub fn contains(&self, identity: &MeterIdentity) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl FromIterator<MeterIdentity> for MatchSet {
    fn from_iter<T: IntoIterator<Item = MeterIdentity>>(iter: T) -> Self {
        Self {
            identities: iter.into_iter().collect(),
        }
    }
}

/// Records whose identity appears in the template, in group order. Records
/// for meters the template does not track are skipped.
pub fn matched_records<'a>(
    groups: &'a [MeterGroup],
    match_set: &'a MatchSet,
) -> impl Iterator<Item = &'a BillingRecord> + 'a {
    groups
        .iter()
        .flat_map(|group| group.records.iter())
        .filter(|record| match_set.contains(&MeterIdentity::from_record(record)))
}

/// Row at which the next record for `identity` must be inserted: directly
/// below the last row currently carrying that identity.
pub fn insertion_point<S: TabularSheet + ?Sized>(
    sheet: &S,
    identity: &MeterIdentity,
) -> Result<usize> {
    sheet
        .data_rows()
        .rev()
        .find(|&row| row_identity(sheet, row).as_ref() == Some(identity))
        .map(|anchor| anchor + 1)
        .ok_or_else(|| ToolError::MissingAnchorRow {
            identity: identity.canonical(),
        })
}

pub(crate) fn row_identity<S: TabularSheet + ?Sized>(
    sheet: &S,
    row: usize,
) -> Option<MeterIdentity> {
    MeterIdentity::parse_template(&sheet.cell(row, IDENTITY_COLUMN).to_text())
}
