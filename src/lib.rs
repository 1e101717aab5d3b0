//! `aqi-forecast`: HTTP inference service for the AQI forecaster.
//!
//! The crate is split along the Explicit Module Boundary Pattern (EMBP):
//! each module owns one concern and the crate root re-exports what the
//! route handlers need, so `routes/*.rs` only ever import from `crate`.
//!
//! - `config`    – environment-driven configuration
//! - `model`     – LSTM regressor rebuilt from exported weights
//! - `scaler`    – fitted feature scaler
//! - `artifacts` – loads model + scaler as one unit, runs the pipeline
//! - `history`   – CSV dataset behind `/history`
//! - `live`      – outbound client behind `/data`
//! - `routes`    – the HTTP surface

pub mod artifacts;
pub mod config;
pub mod error;
pub mod history;
pub mod live;
pub mod model;
pub mod models;
pub mod routes;
pub mod scaler;

pub use artifacts::{load_artifacts, ArtifactBundle, Artifacts, ScalingPolicy};
pub use config::Config;
pub use error::{HistoryError, LiveDataError, PredictError};
pub use history::HistoryTable;
pub use live::LiveDataClient;
pub use models::{
    HealthResponse, HistoryFailure, HistoryRecord, LiveReading, PredictRequest, PredictResponse,
};
pub use routes::{router, AppState, ROUTE_PATHS};
