//! Export configuration
//!
//! Everything a run needs is carried in [`ExportConfig`]; there is no
//! process-wide state.

use crate::fetcher::DEFAULT_CHUNK_LIMIT;
use crate::output::OutputLayout;
use crate::TimeWindow;

/// What to do when a device cannot be exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run at the first failed device
    #[default]
    Abort,
    /// Log the failure, write nothing for that device and continue
    Skip,
}

/// Parameters of one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Devices to export, in order
    pub devices: Vec<String>,
    /// Keys to export; `None` discovers them per device
    pub keys: Option<Vec<String>>,
    /// Time window applied to every key
    pub window: TimeWindow,
    /// Rows requested per chunk
    pub chunk_limit: usize,
    /// Label used in file names
    pub label: String,
    /// Output directory layout
    pub layout: OutputLayout,
    /// Emit the derived `utc` column
    pub include_utc: bool,
    /// Behaviour on device failure
    pub failure_policy: FailurePolicy,
}

impl ExportConfig {
    /// Create a configuration with default window, limit and policy
    pub fn new(devices: Vec<String>, label: impl Into<String>, layout: OutputLayout) -> Self {
        Self {
            devices,
            keys: None,
            window: TimeWindow::default(),
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            label: label.into(),
            layout,
            include_utc: true,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Export exactly these keys instead of discovering them
    ///
    /// An empty list falls back to discovery.
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = if keys.is_empty() { None } else { Some(keys) };
        self
    }

    /// Set the time window
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Set the per-request row limit
    pub fn with_chunk_limit(mut self, chunk_limit: usize) -> Self {
        self.chunk_limit = chunk_limit;
        self
    }

    /// Enable or disable the `utc` column
    pub fn with_utc_column(mut self, include_utc: bool) -> Self {
        self.include_utc = include_utc;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}
