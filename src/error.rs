use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool reads the billing export, rewrites the upload template, or validates
/// the result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors bubbled up from the CSV reader.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a named column is absent from a header row.
    #[error("sheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },

    /// Raised when a cell cannot be converted into the type its column requires.
    #[error("invalid literal value '{value}' in column {column}")]
    InvalidLiteral { column: String, value: String },

    /// The billing export and the upload template share no meter numbers.
    #[error(
        "there are no overlapping meters between the billing export and the upload template; \
         double check that these are the right files"
    )]
    NoOverlappingMeters,

    /// A meter number could not be read as an integer.
    #[error("meter number '{value}' in {origin} is not numeric")]
    InvalidMeterNumber { origin: String, value: String },

    /// A matched identity has no anchor row in the template sheet.
    #[error("no anchor row for matched meter '{identity}' in the template sheet")]
    MissingAnchorRow { identity: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when a required path was given neither on the command line nor
    /// in the configuration file.
    #[error("missing required setting '{0}'")]
    MissingSetting(&'static str),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
