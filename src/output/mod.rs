//! Output writers and file layout

use crate::exporter::merge::DeviceTable;
use chrono::DateTime;

pub mod csv;
pub mod path;

pub use csv::CsvTableWriter;
pub use path::{OutputLayout, OutputPathBuilder};

/// Format of the derived `utc` column and of "last seen" report lines
pub const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Timestamp cannot be represented as a UTC date
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing a merged device table
pub trait TableWriter: OutputWriter {
    /// Write header and all rows, returning the number of data rows written
    fn write_table(&mut self, table: &DeviceTable) -> OutputResult<u64>;
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS` in UTC
pub fn format_utc(timestamp_ms: i64) -> OutputResult<String> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format(UTC_FORMAT).to_string())
        .ok_or(OutputError::InvalidTimestamp(timestamp_ms))
}
