//! Wire types for the AQI service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---

/// Body of `POST /predict`: a window of feature rows, expected `5 x 3`.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub values: Vec<Vec<f64>>,
}

/// Body returned by `POST /predict`.
///
/// `predicted_aqi` is always present (null on failure); `error` only when
/// something went wrong.
#[derive(Debug, Serialize, PartialEq)]
pub struct PredictResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub predicted_aqi: Option<f64>,
}

impl PredictResponse {
    pub fn ok(value: f64) -> Self {
        Self {
            error: None,
            predicted_aqi: Some(value),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            predicted_aqi: None,
        }
    }
}

/// Body returned by `GET /`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub scaler_loaded: bool,
}

/// One row of the historical dataset.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryRecord {
    /// Formatted as `YYYY-MM-DD HH:MM`.
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub aqi: f64,
    pub category: String,
}

/// Body returned by `GET /history` when the dataset cannot be converted.
#[derive(Debug, Serialize)]
pub struct HistoryFailure {
    pub error: &'static str,
    pub details: String,
}

/// Body returned by `GET /data`.
#[derive(Debug, Serialize, PartialEq)]
pub struct LiveReading {
    pub temperature: f64,
    pub humidity: f64,
    pub aqi: f64,
    pub category: String,
    pub history: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LiveReading {
    /// Zeroed payload returned when the upstream source is unusable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            aqi: 0.0,
            category: "Unavailable".to_string(),
            history: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Convert a loosely typed JSON value to `f64`, never failing.
///
/// - numbers convert directly
/// - strings are trimmed and parsed; unparsable strings give `default`
/// - booleans map to `1.0` / `0.0`
/// - `null`, arrays, objects and non-finite results give `default`
pub fn coerce_float(value: Option<&Value>, default: f64) -> f64 {
    // ---
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    parsed.filter(|v| v.is_finite()).unwrap_or(default)
}
