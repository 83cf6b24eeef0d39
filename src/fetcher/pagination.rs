//! Backward pagination over a key's time window
//!
//! The platform answers a values query with the newest `limit` samples in the
//! window and drops the older ones. Collecting a full window therefore walks
//! from the top down: after every chunk the inclusive upper bound moves to one
//! millisecond below the oldest sample received, while the lower bound stays
//! fixed.
//!
//! Termination:
//! - the platform omits the key (no rows left below the bound), or
//! - the upper bound drops below the window start.
//!
//! Every chunk must lie inside `[start, upper]` and be strictly descending.
//! That makes the upper bound strictly decreasing, so the loop always ends and
//! no timestamp is collected twice.

use crate::fetcher::{FetcherError, FetcherResult, TelemetrySource};
use crate::{KeySeries, Sample, TimeWindow};
use tracing::debug;

/// Per-request row limit used when none is configured
pub const DEFAULT_CHUNK_LIMIT: usize = 10_000;

/// Collects complete key series through bounded chunk requests
#[derive(Debug, Clone, Copy)]
pub struct BackwardPaginator {
    limit: usize,
}

impl Default for BackwardPaginator {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LIMIT)
    }
}

impl BackwardPaginator {
    /// Create a paginator requesting at most `limit` rows per chunk
    ///
    /// A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Rows requested per chunk
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fetch every sample of `key` inside `window`
    ///
    /// # Arguments
    /// * `source` - Platform to query
    /// * `device` - Device identifier
    /// * `key` - Telemetry key
    /// * `window` - Half-open range `[start, stop)`; a sample at exactly
    ///   `start` is included, one at exactly `stop` is not
    ///
    /// # Returns
    /// The key's samples, newest first
    ///
    /// # Errors
    /// Any chunk failure aborts the whole key; a partial series is never returned
    pub async fn fetch_series<S>(
        &self,
        source: &S,
        device: &str,
        key: &str,
        window: TimeWindow,
    ) -> FetcherResult<KeySeries>
    where
        S: TelemetrySource + ?Sized,
    {
        let mut series = KeySeries::empty(key);
        let start = window.start;
        let Some(mut upper) = window.last_inclusive() else {
            debug!("Empty window for {}/{}, nothing to fetch", device, key);
            return Ok(series);
        };
        let mut iteration = 0usize;

        while start <= upper {
            debug!(
                "Fetching chunk {} of {}/{} in [{}, {}]",
                iteration + 1,
                device,
                key,
                start,
                upper
            );

            let Some(chunk) = source
                .fetch_chunk(device, key, start, upper, self.limit)
                .await?
            else {
                debug!(
                    "No rows left for {}/{} at or below {}. Total samples: {}",
                    device,
                    key,
                    upper,
                    series.len()
                );
                break;
            };

            let oldest = validate_chunk(&chunk, start, upper, key)?;
            debug!("Received {} samples in chunk {}", chunk.len(), iteration + 1);

            series.samples.extend(chunk);
            iteration += 1;

            // nothing older remains once the window start is reached
            if oldest == start {
                break;
            }
            upper = oldest - 1;
        }

        debug!(
            "Pagination of {}/{} completed after {} chunks. Total samples: {}",
            device,
            key,
            iteration,
            series.len()
        );

        Ok(series)
    }
}

/// Check chunk bounds and order, returning the oldest timestamp
fn validate_chunk(chunk: &[Sample], start: i64, upper: i64, key: &str) -> FetcherResult<i64> {
    let mut previous: Option<i64> = None;

    for sample in chunk {
        if sample.ts < start || sample.ts > upper {
            return Err(FetcherError::InvalidResponse(format!(
                "sample for key '{key}' at ts={} lies outside the requested range [{start}, {upper}]",
                sample.ts
            )));
        }
        if let Some(prev) = previous {
            if sample.ts >= prev {
                return Err(FetcherError::InvalidResponse(format!(
                    "samples for key '{key}' are not strictly descending ({prev} then {})",
                    sample.ts
                )));
            }
        }
        previous = Some(sample.ts);
    }

    previous.ok_or_else(|| {
        FetcherError::InvalidResponse(format!("empty chunk returned for key '{key}'"))
    })
}
