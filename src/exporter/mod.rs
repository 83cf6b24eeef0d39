//! Export orchestration
//!
//! The pipeline for one run:
//!
//! 1. **Configuration**: [`config::ExportConfig`] lists devices, keys, window and layout
//! 2. **Key resolution**: explicit keys, or discovery per device
//! 3. **Pagination**: every key is collected with [`crate::fetcher::BackwardPaginator`]
//! 4. **Merge**: [`merge::DeviceTable`] outer-joins the key series on timestamp
//! 5. **Output**: the table is written to CSV and reported
//!
//! Devices, keys and chunks are processed strictly one after another.

pub mod config;
pub mod executor;
pub mod merge;

pub use config::{ExportConfig, FailurePolicy};
pub use executor::{ExportExecutor, ExportSummary};
pub use merge::{merge, DeviceTable};

use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Platform request failed
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Writing the device table failed
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Writing the console report failed
    #[error("report error: {0}")]
    ReportError(#[from] std::io::Error),

    /// Some devices were skipped after failing
    #[error("{failed} of {total} devices failed")]
    DevicesFailed {
        /// Number of failed devices
        failed: usize,
        /// Number of devices in the run
        total: usize,
        /// Devices written and devices skipped
        summary: ExportSummary,
    },
}
