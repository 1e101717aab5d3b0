//! Configuration loader for the `aqi-forecast` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

use crate::ScalingPolicy;

/// Parse an optional environment variable into `$ty`, falling back to a default.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,

    /// Serialized model weights.
    pub model_path: PathBuf,

    /// Serialized fitted scaler.
    pub scaler_path: PathBuf,

    /// Local CSV dataset served by `/history`.
    pub history_path: PathBuf,

    /// External JSON endpoint served through `/data`.
    pub live_data_url: String,

    /// Timeout for the outbound live-data request, in seconds.
    pub live_data_timeout_secs: u32,

    /// Where the scaler sits in the inference pipeline.
    pub scaling_policy: ScalingPolicy,

    /// Scaler column holding AQI, used to invert the model output.
    pub aqi_target_feature: usize,

    /// Allow every origin, method and header.
    pub cors_permissive: bool,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `LIVE_DATA_URL` – external live-data JSON endpoint
///
/// Optional:
/// - `BIND_ADDR` – listener address (default: `0.0.0.0:8000`)
/// - `MODEL_PATH` – model weights (default: `model/lstm_aqi_model.json`)
/// - `SCALER_PATH` – fitted scaler (default: `model/aqi_scaler.json`)
/// - `HISTORY_CSV_PATH` – history dataset (default: `data/aqi_history.csv`)
/// - `LIVE_DATA_TIMEOUT_SECS` – outbound timeout (default: 10)
/// - `SCALING_POLICY` – `inverse_output` or `scale_input` (default: `inverse_output`)
/// - `AQI_TARGET_FEATURE` – AQI column of the scaler (default: 2)
/// - `CORS_PERMISSIVE` – allow-all CORS layer (default: true)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_with(|key| env::var(key).ok())
}

/// Same as [`load_from_env`], reading values through `lookup`.
pub fn load_with<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let live_data_url = require_env!(lookup, "LIVE_DATA_URL");
    let bind_addr = parse_env!(
        lookup,
        "BIND_ADDR",
        SocketAddr,
        SocketAddr::from(([0, 0, 0, 0], 8000))
    );
    let model_path = parse_env!(
        lookup,
        "MODEL_PATH",
        PathBuf,
        PathBuf::from("model/lstm_aqi_model.json")
    );
    let scaler_path = parse_env!(
        lookup,
        "SCALER_PATH",
        PathBuf,
        PathBuf::from("model/aqi_scaler.json")
    );
    let history_path = parse_env!(
        lookup,
        "HISTORY_CSV_PATH",
        PathBuf,
        PathBuf::from("data/aqi_history.csv")
    );
    let live_data_timeout_secs = parse_env!(lookup, "LIVE_DATA_TIMEOUT_SECS", u32, 10);
    let scaling_policy = parse_env!(
        lookup,
        "SCALING_POLICY",
        ScalingPolicy,
        ScalingPolicy::InverseOutput
    );
    let aqi_target_feature = parse_env!(lookup, "AQI_TARGET_FEATURE", usize, 2);
    let cors_permissive = parse_env!(lookup, "CORS_PERMISSIVE", bool, true);

    Ok(Config {
        bind_addr,
        model_path,
        scaler_path,
        history_path,
        live_data_url,
        live_data_timeout_secs,
        scaling_policy,
        aqi_target_feature,
        cors_permissive,
    })
}

impl Config {
    /// Outbound live-data timeout as a [`Duration`].
    pub fn live_data_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.live_data_timeout_secs))
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR              : {}", self.bind_addr);
        tracing::info!("  MODEL_PATH             : {}", self.model_path.display());
        tracing::info!("  SCALER_PATH            : {}", self.scaler_path.display());
        tracing::info!("  HISTORY_CSV_PATH       : {}", self.history_path.display());
        tracing::info!("  LIVE_DATA_URL          : {}", self.live_data_url);
        tracing::info!("  LIVE_DATA_TIMEOUT_SECS : {}", self.live_data_timeout_secs);
        tracing::info!("  SCALING_POLICY         : {}", self.scaling_policy);
        tracing::info!("  AQI_TARGET_FEATURE     : {}", self.aqi_target_feature);
        tracing::info!("  CORS_PERMISSIVE        : {}", self.cors_permissive);
    }
}
