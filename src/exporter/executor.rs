//! Export executor: devices → keys → chunks → table → CSV → report

use crate::exporter::config::{ExportConfig, FailurePolicy};
use crate::exporter::merge::DeviceTable;
use crate::exporter::ExportError;
use crate::fetcher::{BackwardPaginator, FetcherResult, TelemetrySource};
use crate::output::csv::write_table_file;
use crate::output::OutputPathBuilder;
use crate::report::{DeviceReport, Reporter};
use chrono::Utc;
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, error, info, warn};

/// Outcome of a run that did not abort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Devices written successfully
    pub reports: Vec<DeviceReport>,
    /// Devices skipped under [`FailurePolicy::Skip`], with their error
    pub failed: Vec<(String, String)>,
}

/// Runs an export against a telemetry source
pub struct ExportExecutor<S> {
    source: S,
    config: ExportConfig,
    paginator: BackwardPaginator,
    paths: OutputPathBuilder,
}

impl<S: TelemetrySource> ExportExecutor<S> {
    /// Create an executor for `config`
    pub fn new(source: S, config: ExportConfig) -> Self {
        let paginator = BackwardPaginator::new(config.chunk_limit);
        let paths = OutputPathBuilder::new(config.layout.clone(), &config.label);
        Self {
            source,
            config,
            paginator,
            paths,
        }
    }

    /// Telemetry source in use
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Configuration in use
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export every configured device
    ///
    /// # Errors
    /// Under [`FailurePolicy::Abort`] the first device error is returned. Under
    /// [`FailurePolicy::Skip`] all devices are attempted and
    /// [`ExportError::DevicesFailed`], carrying the summary, is returned if
    /// any of them failed.
    pub async fn run<W: Write>(
        &self,
        reporter: &mut Reporter<W>,
    ) -> Result<ExportSummary, ExportError> {
        let total = self.config.devices.len();
        let mut summary = ExportSummary::default();

        info!(
            "Exporting {} devices, window [{}, {}), chunk limit {}",
            total,
            self.config.window.start,
            self.config.window.stop,
            self.paginator.limit()
        );

        for device in &self.config.devices {
            reporter.device_started(device)?;

            match self.export_device(device, reporter).await {
                Ok(report) => {
                    reporter.device_finished(&report, Utc::now())?;
                    summary.reports.push(report);
                }
                Err(e) => {
                    if let Err(report_err) = reporter.device_failed(device, &e.to_string()) {
                        warn!("Could not report failure of device {}: {}", device, report_err);
                    }
                    match self.config.failure_policy {
                        FailurePolicy::Abort => {
                            error!("Export of device {} failed: {}", device, e);
                            return Err(e);
                        }
                        FailurePolicy::Skip => {
                            warn!("Skipping device {} after failure: {}", device, e);
                            summary.failed.push((device.clone(), e.to_string()));
                        }
                    }
                }
            }
        }

        if !summary.failed.is_empty() {
            return Err(ExportError::DevicesFailed {
                failed: summary.failed.len(),
                total,
                summary,
            });
        }

        info!("Export finished: {} devices written", summary.reports.len());
        Ok(summary)
    }

    /// Fetch, merge and write one device
    ///
    /// The file is only written once every key has been fetched, so a failed
    /// key never leaves a partial file behind.
    pub async fn export_device<W: Write>(
        &self,
        device: &str,
        reporter: &mut Reporter<W>,
    ) -> Result<DeviceReport, ExportError> {
        let keys = self.resolve_keys(device).await?;
        info!("Device {}: {} keys", device, keys.len());

        if keys.is_empty() {
            reporter.no_keys()?;
        }

        let mut table = DeviceTable::new();
        for (index, key) in keys.iter().enumerate() {
            reporter.key_started(key, index, keys.len())?;
            let series = self
                .paginator
                .fetch_series(&self.source, device, key, self.config.window)
                .await?;
            debug!("Device {} key {}: {} samples", device, key, series.len());
            table.add_series(series);
        }

        self.paths.ensure_directories()?;
        let output_path = self.paths.device_path(device);
        write_table_file(&output_path, &table, self.config.include_utc)?;

        info!(
            "Device {}: wrote {} rows to {}",
            device,
            table.len(),
            output_path.display()
        );

        Ok(DeviceReport {
            device: device.to_string(),
            output_path,
            rows: table.len(),
            newest_ts: table.newest_ts(),
        })
    }

    async fn resolve_keys(&self, device: &str) -> FetcherResult<Vec<String>> {
        let keys = match &self.config.keys {
            Some(keys) => keys.clone(),
            None => {
                debug!("Discovering keys for device {}", device);
                self.source.list_keys(device).await?
            }
        };
        Ok(dedup_preserving_order(keys))
    }
}

fn dedup_preserving_order(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
