use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, ToolError};
use crate::filter::retain_convention_rows;
use crate::io::{self, excel_read, excel_write};
use crate::matcher::{MatchSet, group_by_meter};
use crate::model::{IDENTITY_COLUMN, IDENTITY_HEADER, Sheet, WorkbookData};
use crate::sheet::{HEADER_ROW, TabularSheet};
use crate::synthesize::{SynthesisOutcome, synthesize_rows};
use crate::validate::{ValidationReport, validate};

/// What an injection run did.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectSummary {
    /// Template rows dropped for not following the naming convention.
    pub rows_removed: usize,
    /// Distinct identities left in the filtered template.
    pub template_meters: usize,
    pub outcome: SynthesisOutcome,
    pub output: PathBuf,
}

/// Injects the billing export into the upload template and saves the result.
///
/// The output workbook keeps every sheet of the template; only the bills
/// sheet is filtered and extended. Nothing is written if a fatal error
/// occurs before the final save.
#[instrument(level = "info", skip_all, fields(sheet = config.sheet()))]
pub fn inject_bills(config: &PipelineConfig) -> Result<InjectSummary> {
    let source = existing(config.source()?)?;
    let template = existing(config.template()?)?;
    let output = config.output();
    let sheet_name = config.sheet();

    let records = io::read_billing_records(source)?;
    info!(records = records.len(), source = %source.display(), "read billing export");

    let mut workbook = excel_read::read_workbook(template)?;
    info!(sheets = workbook.sheets.len(), template = %template.display(), "read upload template");

    let rows_removed = {
        let sheet = template_sheet(&mut workbook, sheet_name)?;
        check_identity_header(sheet);
        retain_convention_rows(sheet)
    };
    info!(rows_removed, "removed rows outside the naming convention");

    if let Some(snapshot) = &config.filtered_snapshot {
        excel_write::write_workbook(snapshot, &workbook)?;
        debug!(path = %snapshot.display(), "wrote filtered snapshot");
    }

    let sheet = template_sheet(&mut workbook, sheet_name)?;
    let match_set = MatchSet::from_sheet(sheet);
    let groups = group_by_meter(&records);
    let outcome = synthesize_rows(sheet, &groups, &match_set)?;

    excel_write::write_workbook(&output, &workbook)?;
    info!(output = %output.display(), "saved synthesized workbook");

    if let Some(path) = &config.meter_set {
        write_meter_set(path, &outcome.meters)?;
        debug!(path = %path.display(), "wrote meter set");
    }

    Ok(InjectSummary {
        rows_removed,
        template_meters: match_set.len(),
        outcome,
        output,
    })
}

/// Validates a synthesized workbook against the billing export. A non-empty
/// report is also written to the configured report path.
#[instrument(level = "info", skip_all, fields(sheet = config.sheet()))]
pub fn validate_output(config: &PipelineConfig) -> Result<ValidationReport> {
    let source = existing(config.source()?)?;
    let output = config.output();
    let output = existing(&output)?;

    let records = io::read_billing_records(source)?;
    let sheet = excel_read::read_sheet(output, config.sheet())?;
    let report = validate(&records, &sheet)?;

    if report.is_empty() {
        info!("billing export and template agree");
    } else {
        let path = config.report();
        write_report(&path, &report)?;
        info!(path = %path.display(), "wrote validation report");
    }
    Ok(report)
}

/// Writes the rendered report as plain text.
pub fn write_report(path: &Path, report: &ValidationReport) -> Result<()> {
    fs::write(path, report.to_string())?;
    Ok(())
}

/// Writes the synthesized identities as a sorted JSON array.
pub fn write_meter_set(path: &Path, meters: &BTreeSet<String>) -> Result<()> {
    let json = serde_json::to_string_pretty(meters)?;
    fs::write(path, json)?;
    Ok(())
}

fn existing(path: &Path) -> Result<&Path> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ToolError::MissingInput(path.to_path_buf()))
    }
}

fn template_sheet<'a>(workbook: &'a mut WorkbookData, name: &str) -> Result<&'a mut Sheet> {
    workbook
        .sheet_mut(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))
}

fn check_identity_header(sheet: &Sheet) {
    let header = sheet.cell(HEADER_ROW, IDENTITY_COLUMN).to_text();
    let normalized = header.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized != IDENTITY_HEADER {
        warn!(header = %header, expected = IDENTITY_HEADER, "unexpected identity column header");
    }
}
