//! Console progress and completion report
//!
//! The human style mirrors the operator workflow: keys are listed as they are
//! fetched (indented, comma separated, wrapped at [`MAX_LINE_WIDTH`]), then a
//! green completion line with the row count and a yellow "last seen" age.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::output::format_utc;

/// Wrap width of the key listing
pub const MAX_LINE_WIDTH: usize = 120;

const INDENT: &str = "    ";

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// How progress and results are reported on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    /// Key listing and coloured completion lines
    Human,
    /// One JSON object per device
    Json,
    /// Nothing on stdout
    Quiet,
}

impl FromStr for ReportStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(ReportStyle::Human),
            "json" => Ok(ReportStyle::Json),
            "quiet" => Ok(ReportStyle::Quiet),
            _ => Err(format!(
                "Invalid report style: {s}. Valid options: human, json, quiet"
            )),
        }
    }
}

/// Result of exporting one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    /// Device identifier
    pub device: String,
    /// File the table was written to
    pub output_path: PathBuf,
    /// Number of data rows written
    pub rows: usize,
    /// Timestamp of the most recent row
    #[serde(rename = "last_seen_ts")]
    pub newest_ts: Option<i64>,
}

/// One line of the JSON report
#[derive(Serialize)]
struct DeviceLine<'a> {
    #[serde(flatten)]
    report: &'a DeviceReport,
    last_seen_utc: Option<String>,
}

/// Most recent sample and its age
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSeen {
    /// Sample time as `YYYY-MM-DD HH:MM:SS` UTC
    pub utc: String,
    /// Whole hours since the sample
    pub hours: i64,
    /// Remaining whole minutes since the sample
    pub minutes: i64,
}

impl std::fmt::Display for LastSeen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} UTC, {}h {}m ago.", self.utc, self.hours, self.minutes)
    }
}

impl DeviceReport {
    /// Rows as reported to the operator
    ///
    /// A single row is reported as zero, matching the "last seen" guard.
    pub fn reported_rows(&self) -> usize {
        if self.rows > 1 {
            self.rows
        } else {
            0
        }
    }

    /// Age of the most recent sample, only when at least two rows exist
    ///
    /// Samples stamped in the future report an age of zero.
    pub fn last_seen(&self, now: DateTime<Utc>) -> Option<LastSeen> {
        if self.rows < 2 {
            return None;
        }
        let ts = self.newest_ts?;
        let utc = format_utc(ts).ok()?;
        let age_ms = now.timestamp_millis().saturating_sub(ts).max(0);

        Some(LastSeen {
            utc,
            hours: age_ms / MS_PER_HOUR,
            minutes: (age_ms % MS_PER_HOUR) / MS_PER_MINUTE,
        })
    }
}

/// Writes export progress to a terminal or any other sink
pub struct Reporter<W: Write> {
    out: W,
    style: ReportStyle,
    color: bool,
    line_length: usize,
}

impl<W: Write> Reporter<W> {
    /// Create a reporter
    ///
    /// # Arguments
    /// * `out` - Destination, usually stdout
    /// * `style` - Report style
    /// * `color` - Emit ANSI colours in the human style
    pub fn new(out: W, style: ReportStyle, color: bool) -> Self {
        Self {
            out,
            style,
            color,
            line_length: 0,
        }
    }

    /// Report style in use
    pub fn style(&self) -> ReportStyle {
        self.style
    }

    /// Consume the reporter and return the sink
    pub fn into_inner(self) -> W {
        self.out
    }

    /// A device export begins
    pub fn device_started(&mut self, device: &str) -> io::Result<()> {
        if self.style != ReportStyle::Human {
            return Ok(());
        }
        writeln!(self.out, "{device}")
    }

    /// The device has no telemetry keys
    pub fn no_keys(&mut self) -> io::Result<()> {
        if self.style != ReportStyle::Human {
            return Ok(());
        }
        write!(self.out, "{INDENT}No data available.")?;
        self.out.flush()
    }

    /// A key is about to be fetched
    ///
    /// # Arguments
    /// * `key` - Key name
    /// * `index` - Position of the key in the fetch order
    /// * `total` - Number of keys for the device
    pub fn key_started(&mut self, key: &str, index: usize, total: usize) -> io::Result<()> {
        if self.style != ReportStyle::Human {
            return Ok(());
        }

        if index == 0 {
            write!(self.out, "{INDENT}")?;
            self.line_length = INDENT.len();
        }

        let comma = if index + 1 < total { "," } else { "" };
        let width = key.chars().count() + comma.len();

        if self.line_length + width > MAX_LINE_WIDTH {
            write!(self.out, "\n{INDENT}")?;
            self.line_length = INDENT.len();
        }

        write!(self.out, "{key}{comma} ")?;
        self.line_length += width + 1;
        self.out.flush()
    }

    /// The device table has been written
    pub fn device_finished(&mut self, report: &DeviceReport, now: DateTime<Utc>) -> io::Result<()> {
        let last_seen = report.last_seen(now);

        match self.style {
            ReportStyle::Quiet => Ok(()),
            ReportStyle::Json => {
                let line = serde_json::to_string(&DeviceLine {
                    report,
                    last_seen_utc: report.newest_ts.and_then(|ts| format_utc(ts).ok()),
                })?;
                writeln!(self.out, "{line}")
            }
            ReportStyle::Human => {
                let done = format!("Done: pulled {} rows.", report.reported_rows());
                match last_seen {
                    Some(seen) => {
                        let seen = format!("Last seen: {seen}");
                        if self.color {
                            writeln!(self.out, "\n{INDENT}{} {}", done.green(), seen.yellow())
                        } else {
                            writeln!(self.out, "\n{INDENT}{done} {seen}")
                        }
                    }
                    None => {
                        if self.color {
                            writeln!(self.out, "\n{INDENT}{}", done.green())
                        } else {
                            writeln!(self.out, "\n{INDENT}{done}")
                        }
                    }
                }
            }
        }
    }

    /// The device export failed and was skipped
    pub fn device_failed(&mut self, device: &str, error: &str) -> io::Result<()> {
        match self.style {
            ReportStyle::Quiet => Ok(()),
            ReportStyle::Json => {
                let line = serde_json::json!({ "device": device, "error": error });
                writeln!(self.out, "{line}")
            }
            ReportStyle::Human => {
                let message = format!("Failed: {error}");
                if self.color {
                    writeln!(self.out, "\n{INDENT}{}", message.red())
                } else {
                    writeln!(self.out, "\n{INDENT}{message}")
                }
            }
        }
    }
}
