//! # ThingsBoard Telemetry Exporter
//!
//! Pulls historical time-series telemetry for one or more devices out of a
//! ThingsBoard instance and writes one CSV file per device.
//!
//! ## Features
//!
//! - **Backward Pagination**: Walks each key's window from the newest sample
//!   towards the oldest, so the platform's per-request row limit never drops data
//! - **Key Discovery**: Exports every registered timeseries key when none are given
//! - **Outer-Join Merge**: Keys with disjoint timestamps share one table per device
//! - **Operator Report**: Row count and "last seen" age for every device
//!
//! ## Quick Start
//!
//! ```no_run
//! use tb_exporter::exporter::{ExportConfig, ExportExecutor};
//! use tb_exporter::fetcher::session::TelemetrySession;
//! use tb_exporter::output::OutputLayout;
//! use tb_exporter::report::{Reporter, ReportStyle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session =
//!     TelemetrySession::authenticate("https://tb.example.com", "tenant@example.com", "secret")
//!         .await?;
//!
//! let config = ExportConfig::new(
//!     vec!["7f3c1b40-0000-11ee-9f6a-1d2c3b4a5f60".to_string()],
//!     "greenhouse",
//!     OutputLayout::tagged("data", "2024-spring"),
//! );
//!
//! let executor = ExportExecutor::new(session, config);
//! let mut reporter = Reporter::new(std::io::stdout(), ReportStyle::Human, true);
//! executor.run(&mut reporter).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Platform session, response parsing and the backward paginator
//! - [`exporter`] - Export pipeline: configuration, series merge, per-device execution
//! - [`output`] - Output path layout and CSV serialization
//! - [`report`] - Console progress and completion report
//! - [`cli`] - Command-line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Export orchestration
pub mod exporter;

/// Platform access and pagination
pub mod fetcher;

/// Output writers
pub mod output;

/// Console reporting
pub mod report;

/// A single telemetry value as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// Text value (ThingsBoard returns most values as strings)
    Text(String),
    /// Numeric value
    Number(serde_json::Number),
    /// Boolean value
    Bool(bool),
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleValue::Text(s) => write!(f, "{s}"),
            SampleValue::Number(n) => write!(f, "{n}"),
            SampleValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// One (timestamp, value) pair for a key
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Timestamp (Unix timestamp in milliseconds)
    pub ts: i64,
    /// Reported value
    pub value: SampleValue,
}

impl Sample {
    /// Create a sample with a text value
    pub fn text(ts: i64, value: impl Into<String>) -> Self {
        Self {
            ts,
            value: SampleValue::Text(value.into()),
        }
    }
}

/// Half-open time range `[start, stop)` in Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive lower bound
    pub start: i64,
    /// Exclusive upper bound
    pub stop: i64,
}

impl TimeWindow {
    /// Create a window from its bounds
    pub fn new(start: i64, stop: i64) -> Self {
        Self { start, stop }
    }

    /// True when no timestamp satisfies `start <= ts < stop`
    pub fn is_empty(&self) -> bool {
        self.start >= self.stop
    }

    /// True when `ts` lies inside the window
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.stop
    }

    /// Last timestamp inside the window, or `None` for an empty window
    pub fn last_inclusive(&self) -> Option<i64> {
        if self.is_empty() {
            None
        } else {
            Some(self.stop - 1)
        }
    }
}

impl Default for TimeWindow {
    /// From the epoch to the end of representable time
    fn default() -> Self {
        Self::new(0, i64::MAX)
    }
}

/// All samples collected for one (device, key) pair, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct KeySeries {
    /// Telemetry key name
    pub key: String,
    /// Samples, newest first
    pub samples: Vec<Sample>,
}

impl KeySeries {
    /// Create an empty series for `key`
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            samples: Vec::new(),
        }
    }

    /// Number of samples collected
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples were collected
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
