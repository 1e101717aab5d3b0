//! Client for the external live-data source.
//!
//! The source is a spreadsheet-backed JSON endpoint returning
//! `{latest: {temperature, humidity, aqi, category}, history: [...]}`.
//! Field types are not guaranteed, so numbers go through [`coerce_float`].

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::LiveDataError;
use crate::models::coerce_float;
use crate::LiveReading;

// ---

/// Shared outbound client with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct LiveDataClient {
    client: reqwest::Client,
    url: String,
}

impl LiveDataClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LiveDataError> {
        // ---
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Fetch and normalize the latest reading.
    pub async fn fetch(&self) -> Result<LiveReading, LiveDataError> {
        // ---
        debug!("Fetching live data from: {}", self.url);

        let payload: Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_payload(&payload)
    }
}

/// Validate and normalize an upstream payload.
pub fn parse_payload(payload: &Value) -> Result<LiveReading, LiveDataError> {
    // ---
    let root = payload
        .as_object()
        .ok_or(LiveDataError::Malformed("response is not a JSON object"))?;
    let latest = root
        .get("latest")
        .and_then(Value::as_object)
        .ok_or(LiveDataError::Malformed("missing 'latest' object"))?;

    let category = match latest.get("category") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => "Unknown".to_string(),
        Some(other) => other.to_string(),
    };

    let history = match root.get("history") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    Ok(LiveReading {
        temperature: coerce_float(latest.get("temperature"), 0.0),
        humidity: coerce_float(latest.get("humidity"), 0.0),
        aqi: coerce_float(latest.get("aqi"), 0.0),
        category,
        history,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_formed_payload() {
        // ---
        let payload = json!({
            "latest": {"temperature": 21.5, "humidity": 60, "aqi": 42, "category": "Good"},
            "history": [{"temperature": 20.0, "humidity": 62, "aqi": 40}]
        });

        let reading = parse_payload(&payload).unwrap();

        assert_eq!(reading.temperature, 21.5);
        assert_eq!(reading.humidity, 60.0);
        assert_eq!(reading.aqi, 42.0);
        assert_eq!(reading.category, "Good");
        assert_eq!(reading.history.len(), 1);
        assert!(reading.error.is_none());
    }

    #[test]
    fn test_sloppy_fields_are_coerced() {
        // ---
        let payload = json!({
            "latest": {"temperature": "23.1", "humidity": null, "aqi": "#N/A"}
        });

        let reading = parse_payload(&payload).unwrap();

        assert_eq!(reading.temperature, 23.1);
        assert_eq!(reading.humidity, 0.0);
        assert_eq!(reading.aqi, 0.0);
        assert_eq!(reading.category, "Unknown");
        assert!(reading.history.is_empty());
    }

    #[test]
    fn test_missing_latest() {
        // ---
        let err = parse_payload(&json!({"history": []})).unwrap_err();
        assert!(matches!(err, LiveDataError::Malformed(_)));

        let err = parse_payload(&json!({"latest": [1, 2, 3]})).unwrap_err();
        assert!(matches!(err, LiveDataError::Malformed(_)));
    }

    #[test]
    fn test_non_object_root() {
        // ---
        let err = parse_payload(&json!(["latest"])).unwrap_err();
        assert_eq!(err.to_string(), "malformed live data: response is not a JSON object");
    }
}
