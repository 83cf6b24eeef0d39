//! Platform access: authenticated session, response parsing and pagination

use crate::Sample;
use async_trait::async_trait;

pub mod pagination;
pub mod parser;
pub mod session;

pub use pagination::{BackwardPaginator, DEFAULT_CHUNK_LIMIT};
pub use session::{Credential, TelemetrySession};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Login rejected or platform unreachable during login
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// Non-success HTTP status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Transport failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Response body does not match the expected schema
    #[error("parse error: {0}")]
    ParseError(String),

    /// Response is well-formed but violates the request contract
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Read access to a device's telemetry
///
/// Implemented by [`TelemetrySession`] for a live platform; tests plug in
/// in-memory platforms.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// List the timeseries keys registered for a device
    ///
    /// An empty list means the device has no telemetry at all.
    async fn list_keys(&self, device: &str) -> FetcherResult<Vec<String>>;

    /// Fetch at most `limit` samples of `key` with `start <= ts <= end`
    ///
    /// # Returns
    /// Samples sorted newest first, or `None` when the platform reports no
    /// matching rows for the key.
    async fn fetch_chunk(
        &self,
        device: &str,
        key: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> FetcherResult<Option<Vec<Sample>>>;
}
