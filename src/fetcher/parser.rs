//! ThingsBoard response parser
//!
//! Stateless functions converting raw JSON bodies into typed values. Anything
//! that does not match the documented schema is rejected with
//! [`FetcherError::ParseError`] instead of being written out as a corrupt row.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::{Sample, SampleValue};
use serde_json::Value;

/// Stateless parser for ThingsBoard telemetry responses
pub struct TelemetryParser;

impl TelemetryParser {
    /// Parse the login response `{"token": "..."}`
    ///
    /// # Errors
    /// Returns `FetcherError::AuthError` when no usable token is present
    pub fn parse_token(body: &Value) -> FetcherResult<String> {
        match body.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(FetcherError::AuthError(
                "login response did not contain a token".to_string(),
            )),
        }
    }

    /// Parse the key discovery response, a plain array of key names
    pub fn parse_keys(body: Value) -> FetcherResult<Vec<String>> {
        let items = match body {
            Value::Array(items) => items,
            other => {
                return Err(FetcherError::ParseError(format!(
                    "expected an array of key names, got {}",
                    json_kind(&other)
                )))
            }
        };

        items
            .into_iter()
            .map(|item| match item {
                Value::String(key) => Ok(key),
                other => Err(FetcherError::ParseError(format!(
                    "key name must be a string, got {}",
                    json_kind(&other)
                ))),
            })
            .collect()
    }

    /// Parse a timeseries values response for a single key
    ///
    /// # Format
    /// `{"<key>": [{"ts": 1700000000000, "value": "21.5"}, ...]}`
    ///
    /// # Returns
    /// `None` when the key is missing from the response or has no records;
    /// the platform leaves keys out when nothing matches the query.
    pub fn parse_chunk(body: Value, key: &str) -> FetcherResult<Option<Vec<Sample>>> {
        let mut map = match body {
            Value::Object(map) => map,
            other => {
                return Err(FetcherError::ParseError(format!(
                    "expected an object keyed by telemetry key, got {}",
                    json_kind(&other)
                )))
            }
        };

        let records = match map.remove(key) {
            None => return Ok(None),
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(FetcherError::ParseError(format!(
                    "records for key '{key}' must be an array, got {}",
                    json_kind(&other)
                )))
            }
        };

        if records.is_empty() {
            return Ok(None);
        }

        let mut samples = Vec::with_capacity(records.len());
        for record in &records {
            samples.push(Self::parse_record(record, key)?);
        }

        Ok(Some(samples))
    }

    fn parse_record(record: &Value, key: &str) -> FetcherResult<Sample> {
        let ts = record
            .get("ts")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                FetcherError::ParseError(format!("record for key '{key}' has no integer ts"))
            })?;

        let raw = record.get("value").ok_or_else(|| {
            FetcherError::ParseError(format!("record for key '{key}' at ts={ts} has no value"))
        })?;

        let value = Self::parse_value(raw).ok_or_else(|| {
            FetcherError::ParseError(format!(
                "record for key '{key}' at ts={ts} has unsupported value type {}",
                json_kind(raw)
            ))
        })?;

        Ok(Sample { ts, value })
    }

    fn parse_value(raw: &Value) -> Option<SampleValue> {
        match raw {
            Value::String(s) => Some(SampleValue::Text(s.clone())),
            Value::Number(n) => Some(SampleValue::Number(n.clone())),
            Value::Bool(b) => Some(SampleValue::Bool(*b)),
            _ => None,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
