//! Export command implementation

use crate::exporter::{ExportConfig, ExportExecutor, ExportSummary, FailurePolicy};
use crate::fetcher::{TelemetrySession, DEFAULT_CHUNK_LIMIT};
use crate::output::OutputLayout;
use crate::report::{ReportStyle, Reporter};
use crate::TimeWindow;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use super::CliError;

/// Parse and validate the per-request row limit
fn parse_chunk_limit(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("chunk limit must be at least 1".to_string());
    }
    Ok(value)
}

/// ThingsBoard telemetry exporter CLI
#[derive(Parser, Debug)]
#[command(name = "tb-exporter")]
#[command(about = "Fetch device telemetry from ThingsBoard into per-device CSV files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the ThingsBoard API
    pub url: String,

    /// ThingsBoard username
    #[arg(short, long)]
    pub username: String,

    /// ThingsBoard password
    #[arg(short, long)]
    pub password: String,

    /// Device id to fetch data of (repeatable)
    #[arg(short = 'd', long = "device", required = true)]
    pub devices: Vec<String>,

    /// Telemetry key to fetch (repeatable; all registered keys when omitted)
    #[arg(short = 'k', long = "key")]
    pub keys: Vec<String>,

    /// Start time as millisecond UNIX timestamp (inclusive)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub start: i64,

    /// Stop time as millisecond UNIX timestamp (exclusive)
    #[arg(long, default_value_t = i64::MAX, allow_negative_numbers = true)]
    pub stop: i64,

    /// Label used in file names
    #[arg(long)]
    pub label: String,

    /// Tag used as output subdirectory; files go directly into the output folder when omitted
    #[arg(long, visible_alias = "project")]
    pub tag: Option<String>,

    /// Output data folder
    #[arg(long, default_value = "data")]
    pub output: PathBuf,

    /// Maximum rows requested per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_LIMIT, value_parser = parse_chunk_limit)]
    pub chunk_limit: usize,

    /// Omit the derived UTC timestamp column
    #[arg(long, default_value_t = false)]
    pub no_utc: bool,

    /// Console report: human, json or quiet
    #[arg(long, default_value = "human")]
    pub report: ReportStyle,

    /// Disable ANSI colours in the human report
    #[arg(long, default_value_t = false)]
    pub no_color: bool,

    /// Skip devices that fail instead of aborting the run
    #[arg(long, default_value_t = false)]
    pub skip_failed: bool,
}

impl Cli {
    /// Build the export configuration from the parsed arguments
    pub fn to_config(&self) -> Result<ExportConfig, CliError> {
        if self.url.trim().is_empty() {
            return Err(CliError::InvalidArgument("url must not be empty".to_string()));
        }
        if self.label.is_empty() {
            return Err(CliError::InvalidArgument("label must not be empty".to_string()));
        }
        if self.devices.iter().any(|d| d.trim().is_empty()) {
            return Err(CliError::InvalidArgument(
                "device ids must not be empty".to_string(),
            ));
        }

        let window = TimeWindow::new(self.start, self.stop);
        if window.is_empty() {
            warn!(
                "Empty time window [{}, {}): no samples will be requested",
                self.start, self.stop
            );
        }

        let layout = match &self.tag {
            Some(tag) if !tag.is_empty() => OutputLayout::tagged(self.output.clone(), tag.clone()),
            _ => OutputLayout::flat(self.output.clone()),
        };

        let failure_policy = if self.skip_failed {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        };

        Ok(ExportConfig::new(self.devices.clone(), self.label.clone(), layout)
            .with_keys(self.keys.clone())
            .with_window(window)
            .with_chunk_limit(self.chunk_limit)
            .with_utc_column(!self.no_utc)
            .with_failure_policy(failure_policy))
    }

    /// Log in and export every requested device
    pub async fn execute(&self) -> Result<ExportSummary, CliError> {
        let config = self.to_config()?;

        let session = TelemetrySession::authenticate(&self.url, &self.username, &self.password).await?;
        info!("Authenticated against {}", session.base_url());

        let executor = ExportExecutor::new(session, config);
        let mut reporter = Reporter::new(std::io::stdout(), self.report, !self.no_color);

        Ok(executor.run(&mut reporter).await?)
    }
}
