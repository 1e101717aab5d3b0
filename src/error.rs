//! Error types for the `aqi-forecast` service.
//!
//! Each failure class gets its own enum so handlers can decide how to
//! surface it. None of these ever escape a request handler: the routes
//! convert them into in-band JSON payloads (see `routes/*`).

use std::path::PathBuf;

use thiserror::Error;

// ---

/// Failure while reading an artifact from disk.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode artifact '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Scaler(#[from] ScalerError),

    #[error("model and scaler are incompatible: {0}")]
    Incompatible(String),
}

/// Structural or runtime failure of the regression model.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("invalid model weights: {0}")]
    InvalidWeights(String),

    #[error("model expects input of shape (1, {timesteps}, {features}), got {actual:?}")]
    InputShape {
        timesteps: usize,
        features: usize,
        actual: Vec<usize>,
    },
}

/// Failure of the fitted feature scaler.
#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("invalid scaler parameters: {0}")]
    InvalidParameters(String),

    #[error("X has {actual} features, but the scaler is expecting {expected} features")]
    FeatureCount { expected: usize, actual: usize },

    #[error("feature index {index} out of range for scaler with {features} features")]
    FeatureIndex { index: usize, features: usize },
}

/// Everything that can go wrong while serving `POST /predict`.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model or scaler not loaded")]
    NotLoaded,

    #[error("Input must be shape (5, 3)")]
    InvalidShape,

    #[error("Input values must be finite")]
    NonFiniteInput,

    #[error("Model produced a non-finite prediction")]
    NonFiniteOutput,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Scaler(#[from] ScalerError),
}

/// Failure while turning the history dataset into records.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history dataset '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("history dataset is missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    Number {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' is missing")]
    ShortRow { row: usize, column: &'static str },
}

/// Failure while fetching or validating the external live-data payload.
#[derive(Debug, Error)]
pub enum LiveDataError {
    #[error("live data request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed live data: {0}")]
    Malformed(&'static str),
}
