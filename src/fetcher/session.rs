//! Authenticated ThingsBoard session
//!
//! Logs in once and attaches the resulting bearer token to every telemetry
//! request. There is no token refresh and no retry: a failed request fails
//! the operation that issued it.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::fetcher::parser::TelemetryParser;
use crate::fetcher::{FetcherError, FetcherResult, TelemetrySource};
use crate::Sample;

const LOGIN_PATH: &str = "/api/auth/login";
const TELEMETRY_SEGMENTS: [&str; 4] = ["api", "plugins", "telemetry", "DEVICE"];
const AUTH_HEADER: &str = "x-authorization";

/// Opaque bearer token for one run
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token issued by the platform
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Value of the `x-authorization` header
    pub fn header_value(&self) -> String {
        format!("bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// HTTP session against a ThingsBoard instance
pub struct TelemetrySession {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl TelemetrySession {
    /// Log in and build a session with a default HTTP client
    ///
    /// # Errors
    /// Returns `FetcherError::AuthError` if the platform is unreachable,
    /// rejects the credentials, or answers without a token
    pub async fn authenticate(
        base_url: &str,
        username: &str,
        password: &str,
    ) -> FetcherResult<Self> {
        Self::authenticate_with_client(Client::new(), base_url, username, password).await
    }

    /// Log in using a caller-provided HTTP client
    pub async fn authenticate_with_client(
        client: Client,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> FetcherResult<Self> {
        let base_url = normalize_base_url(base_url);
        let url = format!("{base_url}{LOGIN_PATH}");
        info!("Logging in to {} as {}", base_url, username);

        let response = client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| FetcherError::AuthError(format!("platform unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetcherError::AuthError(format!(
                "login rejected with status {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetcherError::AuthError(format!("unreadable login response: {e}")))?;

        let token = TelemetryParser::parse_token(&body)?;
        debug!("Login succeeded");

        Ok(Self::with_credential(client, base_url, Credential::new(token)))
    }

    /// Build a session around an existing credential
    pub fn with_credential(client: Client, base_url: String, credential: Credential) -> Self {
        Self {
            client,
            base_url: normalize_base_url(&base_url),
            credential,
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self) -> FetcherResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&self.credential.header_value()).map_err(|e| {
            FetcherError::AuthError(format!("token is not a valid header value: {e}"))
        })?;
        headers.insert(AUTH_HEADER, value);
        Ok(headers)
    }

    /// `{base}/api/plugins/telemetry/DEVICE/{device}/{kind}/timeseries`
    ///
    /// The device id is percent-encoded as a single path segment.
    fn device_url(&self, device: &str, kind: &str) -> FetcherResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            FetcherError::NetworkError(format!("invalid base URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                FetcherError::NetworkError(format!("base URL {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(TELEMETRY_SEGMENTS)
            .extend([device, kind, "timeseries"]);
        Ok(url)
    }

    async fn get_json(&self, url: Url, params: &[(&str, String)]) -> FetcherResult<Value> {
        debug!("GET {} with {} params", url, params.len());

        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .query(params)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetcherError::HttpError(format!("{status}: {error_text}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))
    }
}

#[async_trait]
impl TelemetrySource for TelemetrySession {
    async fn list_keys(&self, device: &str) -> FetcherResult<Vec<String>> {
        let url = self.device_url(device, "keys")?;
        let body = self.get_json(url, &[]).await?;
        TelemetryParser::parse_keys(body)
    }

    async fn fetch_chunk(
        &self,
        device: &str,
        key: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> FetcherResult<Option<Vec<Sample>>> {
        let url = self.device_url(device, "values")?;
        let params = [
            ("keys", key.to_string()),
            ("startTs", start.to_string()),
            ("endTs", end.to_string()),
            ("limit", limit.to_string()),
            ("agg", "NONE".to_string()),
        ];
        let body = self.get_json(url, &params).await?;
        TelemetryParser::parse_chunk(body, key)
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
