//! Cross-checks a synthesized upload template against the billing export it
//! was built from.
//!
//! The check runs in four stages: derive customer id and meter number from
//! each output identity, compare meter coverage, compute the overlapping
//! meters, and compare the most recent bill of every overlapping meter field
//! by field. Coverage gaps are warnings; field disagreements are errors. Only
//! an empty overlap or an unreadable template meter number aborts the check.
//! Export meter numbers that are not numeric only show up as coverage gaps.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ToolError};
use crate::identity::{MeterIdentity, SEGMENT_SEPARATOR};
use crate::model::{
    BillingRecord, COST_COLUMN, CellValue, END_DATE_COLUMN, ESTIMATION_COLUMN, IDENTITY_COLUMN,
    QUANTITY_COLUMN, START_DATE_COLUMN, format_number,
};
use crate::sheet::TabularSheet;

/// Appended to reports that contain at least one error.
pub const ERROR_ADVISORY: &str = "\n\nThere are ERRORS in this report, so values are not \
lining up where they should be between the billing export and the upload template.\n\
**DOUBLE CHECK** that the right files are being used, and if so contact your data lead \
before uploading.\n\n";

/// Data row of the synthesized template, reduced to the fields the validator
/// compares.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub customer_id: String,
    pub meter_number: u64,
    pub start_date: CellValue,
    pub end_date: CellValue,
    pub quantity: CellValue,
    pub cost: CellValue,
    pub estimation: CellValue,
}

/// Field compared between a billing record and an output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CustomerId,
    StartDate,
    EndDate,
    Quantity,
    Estimation,
    Cost,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::CustomerId => "Customer ID",
            Field::StartDate => "Start Date",
            Field::EndDate => "End Date",
            Field::Quantity => "Quantity",
            Field::Estimation => "Estimation value",
            Field::Cost => "Cost",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single diagnostic produced by the validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// Meters in the billing export that the template does not contain.
    /// Export meter numbers that are not numeric can never be in the
    /// template and are listed separately.
    MissingFromTemplate {
        meters: BTreeSet<u64>,
        unnumbered: BTreeSet<String>,
    },
    /// Template meters that received no bills, usually a naming problem.
    NotUpdated { meters: BTreeSet<u64> },
    /// A field of the latest bill disagrees between the two files.
    FieldMismatch {
        meter: u64,
        field: Field,
        source: String,
        output: String,
    },
    /// An overlapping meter has no synthesized row after its template row.
    MissingSynthesizedRow { meter: u64 },
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::MissingFromTemplate { .. } | Finding::NotUpdated { .. } => Severity::Warning,
            Finding::FieldMismatch { .. } | Finding::MissingSynthesizedRow { .. } => {
                Severity::Error
            }
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MissingFromTemplate { meters, unnumbered } => {
                let mut listed: Vec<String> =
                    meters.iter().map(|meter| format!("{meter:010}")).collect();
                listed.extend(unnumbered.iter().cloned());
                write!(
                    f,
                    "WARNING: There are **{}** more unique meters in the billing export than in \
                     the upload template.\nThis can be caused by unfinished meter mapping, \
                     non-gas meters, or outdated meters.\nSome difference is expected; these \
                     meters are in the billing export but not in the template:\n{{{}}}\n\n",
                    listed.len(),
                    listed.join(", ")
                )
            }
            Finding::NotUpdated { meters } => write!(
                f,
                "WARNING: Meter(s) {} are not having their data updated, likely because of a \
                 meter naming error.\nDouble check the meter is named correctly in the template \
                 and that its number is 10 digits.\n\n",
                format_meters(meters)
            ),
            Finding::FieldMismatch {
                meter,
                field,
                source,
                output,
            } => write!(
                f,
                "\nERROR: {field} mismatch, meter #{meter:010}\n\
                 \tExport {field}: {source}\n\tTemplate {field}: {output}\n"
            ),
            Finding::MissingSynthesizedRow { meter } => write!(
                f,
                "\nERROR: No bill row follows the template row, meter #{meter:010}\n"
            ),
        }
    }
}

/// Ordered findings of one validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// Meters present in both files.
    pub overlap: BTreeSet<u64>,
}

impl ValidationReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity() == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity() == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.findings {
            write!(f, "{finding}")?;
        }
        if self.has_errors() {
            f.write_str(ERROR_ADVISORY)?;
        }
        Ok(())
    }
}

/// Runs all validation stages over the billing export and the synthesized
/// template sheet.
#[instrument(
    level = "info",
    skip_all,
    fields(records = records.len(), rows = sheet.row_count())
)]
pub fn validate<S: TabularSheet + ?Sized>(
    records: &[BillingRecord],
    sheet: &S,
) -> Result<ValidationReport> {
    let output_rows = derive_output_rows(sheet)?;
    let (keyed_records, unnumbered) = key_records(records);
    if !unnumbered.is_empty() {
        debug!(count = unnumbered.len(), "export meter numbers are not numeric");
    }

    let source_meters: BTreeSet<u64> = keyed_records.iter().map(|(meter, _)| *meter).collect();
    let output_meters: BTreeSet<u64> = output_rows.iter().map(|row| row.meter_number).collect();

    let mut report = ValidationReport::default();
    report
        .findings
        .extend(check_coverage(&source_meters, &unnumbered, &output_meters));

    let (overlap, not_updated) = check_overlap(&source_meters, &output_meters)?;
    report.findings.extend(not_updated);

    for &meter in &overlap {
        let Some(record) = keyed_records
            .iter()
            .rev()
            .find(|(key, _)| *key == meter)
            .map(|(_, record)| *record)
        else {
            continue;
        };
        match output_rows.iter().filter(|row| row.meter_number == meter).nth(1) {
            Some(row) => report.findings.extend(compare_fields(meter, record, row)),
            None => report.findings.push(Finding::MissingSynthesizedRow { meter }),
        }
    }
    report.overlap = overlap;

    let error_count = report.errors().count();
    if error_count > 0 {
        warn!(errors = error_count, "billing export and template disagree");
    }
    info!(
        overlap = report.overlap.len(),
        warnings = report.warnings().count(),
        errors = error_count,
        "validation finished"
    );
    Ok(report)
}

/// Splits every identity cell on `__` into customer id (segment 1) and
/// numeric meter number (segment 2), after dropping anything from the first
/// comma on. Identities that follow the naming convention take their meter
/// number from the ten meter digits, so trailing text is ignored. Rows with
/// an empty identity cell are ignored.
pub fn derive_output_rows<S: TabularSheet + ?Sized>(sheet: &S) -> Result<Vec<OutputRow>> {
    let mut rows = Vec::new();
    for row in sheet.data_rows() {
        let identity = sheet.cell(row, IDENTITY_COLUMN).to_text();
        if identity.trim().is_empty() {
            debug!(row, "skipping row without identity");
            continue;
        }
        let head = identity.split(',').next().unwrap_or_default();
        let segments: Vec<&str> = head.split(SEGMENT_SEPARATOR).collect();
        let customer_id = segments.get(1).copied().unwrap_or_default();
        let meter_number = match MeterIdentity::parse_template(&identity) {
            Some(parsed) => parse_meter_number(parsed.meter_number(), "the upload template")?,
            None => {
                let meter_segment = segments.get(2).copied().unwrap_or_default();
                parse_meter_number(meter_segment, "the upload template")?
            }
        };

        rows.push(OutputRow {
            customer_id: customer_id.to_string(),
            meter_number,
            start_date: sheet.cell(row, START_DATE_COLUMN).clone(),
            end_date: sheet.cell(row, END_DATE_COLUMN).clone(),
            quantity: sheet.cell(row, QUANTITY_COLUMN).clone(),
            cost: sheet.cell(row, COST_COLUMN).clone(),
            estimation: sheet.cell(row, ESTIMATION_COLUMN).clone(),
        });
    }
    Ok(rows)
}

/// Meters in the billing export but not in the template. `unnumbered`
/// holds export meter numbers that did not parse and so cannot match.
pub fn check_coverage(
    source: &BTreeSet<u64>,
    unnumbered: &BTreeSet<String>,
    output: &BTreeSet<u64>,
) -> Option<Finding> {
    let missing: BTreeSet<u64> = source.difference(output).copied().collect();
    (!missing.is_empty() || !unnumbered.is_empty()).then(|| Finding::MissingFromTemplate {
        meters: missing,
        unnumbered: unnumbered.clone(),
    })
}

/// Returns the overlapping meters together with a warning for template
/// meters outside the overlap. Fails when nothing overlaps.
pub fn check_overlap(
    source: &BTreeSet<u64>,
    output: &BTreeSet<u64>,
) -> Result<(BTreeSet<u64>, Option<Finding>)> {
    let overlap: BTreeSet<u64> = source.intersection(output).copied().collect();
    if overlap.is_empty() {
        return Err(ToolError::NoOverlappingMeters);
    }
    let not_updated: BTreeSet<u64> = output.difference(&overlap).copied().collect();
    let warning =
        (!not_updated.is_empty()).then_some(Finding::NotUpdated { meters: not_updated });
    Ok((overlap, warning))
}

/// Compares one billing record with one output row. A blank charge on both
/// sides counts as agreement.
pub fn compare_fields(meter: u64, record: &BillingRecord, row: &OutputRow) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut mismatch = |field: Field, source: String, output: &dyn fmt::Display| {
        findings.push(Finding::FieldMismatch {
            meter,
            field,
            source,
            output: output.to_string(),
        });
    };

    if record.customer_id != row.customer_id {
        mismatch(Field::CustomerId, record.customer_id.clone(), &row.customer_id);
    }
    if row.start_date.as_date() != Some(record.cycle_start) {
        mismatch(Field::StartDate, record.cycle_start.to_string(), &row.start_date);
    }
    if row.end_date.as_date() != Some(record.cycle_end) {
        mismatch(Field::EndDate, record.cycle_end.to_string(), &row.end_date);
    }
    if row.quantity.as_number() != Some(record.fee_volume) {
        mismatch(Field::Quantity, format_amount(record.fee_volume), &row.quantity);
    }
    let expected_flag = record.actual_or_estimated();
    if row.estimation.to_text().trim() != expected_flag {
        let source = format!("{} ({expected_flag})", record.end_read_type);
        mismatch(Field::Estimation, source, &row.estimation);
    }
    if !amounts_agree(record.total_charges, row.cost.as_number()) {
        mismatch(Field::Cost, format_amount(record.total_charges), &row.cost);
    }
    findings
}

/// Equality that treats two missing amounts as equal.
pub fn amounts_agree(source: f64, output: Option<f64>) -> bool {
    match output {
        Some(output) if source.is_nan() && output.is_nan() => true,
        Some(output) => source == output,
        None => false,
    }
}

/// Pairs each export record with its numeric meter number. Meter numbers
/// that do not parse are returned separately.
fn key_records(records: &[BillingRecord]) -> (Vec<(u64, &BillingRecord)>, BTreeSet<String>) {
    let mut keyed = Vec::with_capacity(records.len());
    let mut unnumbered = BTreeSet::new();
    for record in records {
        match record.meter_number.trim().parse() {
            Ok(meter) => keyed.push((meter, record)),
            Err(_) => {
                unnumbered.insert(record.meter_number.clone());
            }
        }
    }
    (keyed, unnumbered)
}

fn parse_meter_number(value: &str, origin: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| ToolError::InvalidMeterNumber {
            origin: origin.to_string(),
            value: value.to_string(),
        })
}

fn format_amount(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format_number(value)
    }
}

fn format_meters(meters: &BTreeSet<u64>) -> String {
    let listed: Vec<String> = meters.iter().map(|meter| format!("{meter:010}")).collect();
    format!("{{{}}}", listed.join(", "))
}
