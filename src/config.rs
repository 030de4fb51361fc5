use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, ToolError};
use crate::model::TEMPLATE_SHEET;

/// Default file name of the synthesized workbook.
pub const DEFAULT_OUTPUT: &str = "Output_file.xlsx";
/// Default file name of the validation report.
pub const DEFAULT_REPORT: &str = "warnings_and_errors.txt";

/// File locations for a run. Every field is optional so the same structure
/// can be loaded from a JSON file and overlaid with command line flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct PipelineConfig {
    /// Billing export (`.xlsx` or `.csv`).
    pub source: Option<PathBuf>,
    /// Upload template to inject bills into.
    pub template: Option<PathBuf>,
    /// Synthesized workbook; also the input of validation.
    pub output: Option<PathBuf>,
    /// Name of the sheet receiving bills.
    pub sheet: Option<String>,
    /// Where the validation report is written when it is not empty.
    pub report: Option<PathBuf>,
    /// Optional JSON export of the meters that received rows.
    pub meter_set: Option<PathBuf>,
    /// Optional copy of the template after filtering, before synthesis.
    pub filtered_snapshot: Option<PathBuf>,
}

impl PipelineConfig {
    /// Loads a configuration file. Relative paths inside it are kept as
    /// written and resolve against the working directory.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Values set in `overrides` replace the ones in `self`.
    pub fn merged_with(self, overrides: PipelineConfig) -> Self {
        Self {
            source: overrides.source.or(self.source),
            template: overrides.template.or(self.template),
            output: overrides.output.or(self.output),
            sheet: overrides.sheet.or(self.sheet),
            report: overrides.report.or(self.report),
            meter_set: overrides.meter_set.or(self.meter_set),
            filtered_snapshot: overrides.filtered_snapshot.or(self.filtered_snapshot),
        }
    }

    pub fn source(&self) -> Result<&Path> {
        self.source.as_deref().ok_or(ToolError::MissingSetting("source"))
    }

    pub fn template(&self) -> Result<&Path> {
        self.template.as_deref().ok_or(ToolError::MissingSetting("template"))
    }

    pub fn output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    pub fn sheet(&self) -> &str {
        self.sheet.as_deref().unwrap_or(TEMPLATE_SHEET)
    }

    pub fn report(&self) -> PathBuf {
        self.report.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT))
    }
}
