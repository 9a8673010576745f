use thiserror::Error;

/// Rejection of a test configuration before the test starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrent users must be at least 1")]
    NoUsers,
    #[error("queries per user must be at least 1")]
    NoQueries,
    #[error("snapshot interval must be a positive number of seconds, got {0}")]
    InvalidSnapshotInterval(f64),
    #[error("custom complexity requires a non-empty query list")]
    EmptyCustomQueries,
}

/// Failure while rendering a report. The underlying test result is unaffected.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer could not be flushed: {0}")]
    CsvBuffer(String),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spreadsheet encoding failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
