//! Artifact loading and the inference pipeline.
//!
//! The model and the scaler are loaded together, once, before the listener
//! starts. They are only ever exposed as a pair: if either fails to load
//! (or they do not fit together) the bundle holds neither, and every
//! prediction reports the "not loaded" error in-band.

use std::{fmt, path::Path, str::FromStr};

use ndarray::{Array2, Array3};
use tracing::{error, info};

use crate::error::{ArtifactError, PredictError};
use crate::model::LstmRegressor;
use crate::scaler::Scaler;

/// Timesteps per input window.
pub const WINDOW: usize = 5;

/// Features per timestep (temperature, humidity, AQI).
pub const FEATURES: usize = 3;

// ---

/// Where the scaler is applied around the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingPolicy {
    /// Feed raw input to the model, inverse-scale its output.
    InverseOutput,
    /// Scale the input rows, return the model output as-is.
    ScaleInput,
}

impl fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingPolicy::InverseOutput => f.write_str("inverse_output"),
            ScalingPolicy::ScaleInput => f.write_str("scale_input"),
        }
    }
}

impl FromStr for ScalingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inverse_output" => Ok(ScalingPolicy::InverseOutput),
            "scale_input" => Ok(ScalingPolicy::ScaleInput),
            other => Err(format!(
                "unknown scaling policy '{other}' (expected inverse_output or scale_input)"
            )),
        }
    }
}

/// A model and the scaler it was trained with.
#[derive(Debug)]
pub struct Artifacts {
    model: LstmRegressor,
    scaler: Scaler,
    policy: ScalingPolicy,
    target_feature: usize,
}

impl Artifacts {
    /// Pair a model with a scaler, checking they fit the pipeline.
    pub fn new(
        model: LstmRegressor,
        scaler: Scaler,
        policy: ScalingPolicy,
        target_feature: usize,
    ) -> Result<Self, ArtifactError> {
        // ---
        if model.timesteps() != WINDOW || model.features() != FEATURES {
            return Err(ArtifactError::Incompatible(format!(
                "model input is ({}, {}), expected ({WINDOW}, {FEATURES})",
                model.timesteps(),
                model.features()
            )));
        }

        let n = scaler.n_features();
        match policy {
            ScalingPolicy::ScaleInput if n != FEATURES => {
                return Err(ArtifactError::Incompatible(format!(
                    "scaler has {n} features, input scaling needs {FEATURES}"
                )));
            }
            ScalingPolicy::InverseOutput if n != 1 && target_feature >= n => {
                return Err(ArtifactError::Incompatible(format!(
                    "AQI feature index {target_feature} is outside the scaler's {n} features"
                )));
            }
            _ => {}
        }

        Ok(Self {
            model,
            scaler,
            policy,
            target_feature,
        })
    }

    /// Run one `WINDOW x FEATURES` window through the pipeline.
    pub fn predict(&self, window: &Array2<f32>) -> Result<f64, PredictError> {
        // ---
        if window.dim() != (WINDOW, FEATURES) {
            return Err(PredictError::InvalidShape);
        }

        let rows = match self.policy {
            ScalingPolicy::ScaleInput => self.scaler.transform(window)?,
            ScalingPolicy::InverseOutput => window.clone(),
        };
        let input: Array3<f32> = rows.insert_axis(ndarray::Axis(0));

        let output = self.model.predict(&input)?;
        let raw = output[[0, 0]];

        let value = match self.policy {
            ScalingPolicy::ScaleInput => raw,
            ScalingPolicy::InverseOutput if self.scaler.n_features() == 1 => {
                self.scaler.inverse_transform(&output)?[[0, 0]]
            }
            ScalingPolicy::InverseOutput => self
                .scaler
                .inverse_transform_feature(raw, self.target_feature)?,
        };

        if !value.is_finite() {
            return Err(PredictError::NonFiniteOutput);
        }
        Ok(f64::from(value))
    }
}

/// Process-wide, read-only artifact state shared by every handler.
#[derive(Debug, Default)]
pub struct ArtifactBundle {
    loaded: Option<Artifacts>,
}

impl ArtifactBundle {
    /// A bundle with nothing loaded.
    pub fn unloaded() -> Self {
        Self { loaded: None }
    }

    pub fn from_artifacts(artifacts: Artifacts) -> Self {
        Self {
            loaded: Some(artifacts),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn scaler_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Coerce a request matrix to `f32` and run the pipeline.
    pub fn predict(&self, values: &[Vec<f64>]) -> Result<f64, PredictError> {
        // ---
        let artifacts = self.loaded.as_ref().ok_or(PredictError::NotLoaded)?;

        if values.len() != WINDOW || values.iter().any(|row| row.len() != FEATURES) {
            return Err(PredictError::InvalidShape);
        }

        let flat: Vec<f32> = values.iter().flatten().map(|&v| v as f32).collect();
        if flat.iter().any(|v| !v.is_finite()) {
            return Err(PredictError::NonFiniteInput);
        }
        let window = Array2::from_shape_vec((WINDOW, FEATURES), flat)
            .map_err(|_| PredictError::InvalidShape)?;

        artifacts.predict(&window)
    }
}

/// Load the model and scaler from disk.
///
/// Never fails: any error is logged and yields an unloaded bundle, so a
/// model that loaded is never paired with a scaler that did not.
pub fn load_artifacts(
    model_path: &Path,
    scaler_path: &Path,
    policy: ScalingPolicy,
    target_feature: usize,
) -> ArtifactBundle {
    // ---
    info!("Loading model from {}", model_path.display());

    let result = LstmRegressor::load(model_path).and_then(|model| {
        info!("Loading scaler from {}", scaler_path.display());
        let scaler = Scaler::load(scaler_path)?;
        Artifacts::new(model, scaler, policy, target_feature)
    });

    match result {
        Ok(artifacts) => {
            info!(policy = %policy, "Model and scaler loaded successfully");
            ArtifactBundle::from_artifacts(artifacts)
        }
        Err(e) => {
            error!("Failed to load model or scaler: {}", e);
            ArtifactBundle::unloaded()
        }
    }
}
