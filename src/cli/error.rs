//! CLI error types and conversions

use crate::exporter::ExportError;
use crate::fetcher::FetcherError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Login or platform error before the export started
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Export error
    #[error("export error: {0}")]
    ExportError(#[from] ExportError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
