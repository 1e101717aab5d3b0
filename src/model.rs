//! Pre-trained AQI regression model.
//!
//! The training pipeline exports a stacked LSTM followed by dense layers as
//! plain JSON weights in Keras layout. This module rebuilds the forward pass
//! with `ndarray`:
//!
//! - `kernel` is `features x 4*units`, `recurrent_kernel` is `units x 4*units`
//! - gates are concatenated in the order input, forget, cell, output
//! - gate activation is the logistic sigmoid, cell activation is `tanh`
//! - every LSTM layer but the last feeds its full sequence to the next one
//!
//! The model is immutable once loaded, so a single instance can be shared by
//! every request without locking.

use std::path::Path;

use ndarray::{s, Array1, Array2, Array3, Axis};
use serde::Deserialize;

use crate::error::{ArtifactError, ModelError};

// ---

#[derive(Debug, Deserialize)]
struct LstmSpec {
    units: usize,
    kernel: Vec<Vec<f32>>,
    recurrent_kernel: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct DenseSpec {
    kernel: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default)]
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct ModelSpec {
    timesteps: usize,
    features: usize,
    lstm: Vec<LstmSpec>,
    #[serde(default)]
    dense: Vec<DenseSpec>,
}

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
}

#[derive(Debug, Clone)]
struct LstmLayer {
    units: usize,
    kernel: Array2<f32>,
    recurrent_kernel: Array2<f32>,
    bias: Array1<f32>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    kernel: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

/// LSTM regressor mapping `(1, timesteps, features)` to `(1, 1)`.
#[derive(Debug, Clone)]
pub struct LstmRegressor {
    timesteps: usize,
    features: usize,
    lstm: Vec<LstmLayer>,
    dense: Vec<DenseLayer>,
}

impl LstmRegressor {
    /// Read a model exported by the training pipeline.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        // ---
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: ModelSpec =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_spec(spec)?)
    }

    fn from_spec(spec: ModelSpec) -> Result<Self, ModelError> {
        // ---
        if spec.timesteps == 0 || spec.features == 0 {
            return Err(ModelError::InvalidWeights(
                "timesteps and features must be positive".into(),
            ));
        }
        if spec.lstm.is_empty() {
            return Err(ModelError::InvalidWeights("no LSTM layers".into()));
        }

        let mut width = spec.features;
        let mut lstm = Vec::with_capacity(spec.lstm.len());
        for (i, layer) in spec.lstm.into_iter().enumerate() {
            let units = layer.units;
            let name = format!("lstm[{i}]");
            let gates = units
                .checked_mul(4)
                .filter(|_| units > 0)
                .ok_or_else(|| {
                    ModelError::InvalidWeights(format!("{name}: invalid units {units}"))
                })?;
            let kernel = matrix(&layer.kernel, width, gates, &format!("{name}.kernel"))?;
            let recurrent_kernel = matrix(
                &layer.recurrent_kernel,
                units,
                gates,
                &format!("{name}.recurrent_kernel"),
            )?;
            let bias = vector(layer.bias, gates, &format!("{name}.bias"))?;
            lstm.push(LstmLayer {
                units,
                kernel,
                recurrent_kernel,
                bias,
            });
            width = units;
        }

        let mut dense = Vec::with_capacity(spec.dense.len());
        for (i, layer) in spec.dense.into_iter().enumerate() {
            let outputs = layer.bias.len();
            let name = format!("dense[{i}]");
            let kernel = matrix(&layer.kernel, width, outputs, &format!("{name}.kernel"))?;
            let bias = vector(layer.bias, outputs, &format!("{name}.bias"))?;
            dense.push(DenseLayer {
                kernel,
                bias,
                activation: layer.activation,
            });
            width = outputs;
        }

        if width != 1 {
            return Err(ModelError::InvalidWeights(format!(
                "model must produce a single value, final layer has {width} outputs"
            )));
        }

        Ok(Self {
            timesteps: spec.timesteps,
            features: spec.features,
            lstm,
            dense,
        })
    }

    /// Number of timesteps per input window.
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// Number of features per timestep.
    pub fn features(&self) -> usize {
        self.features
    }

    /// Run the forward pass over a single window.
    ///
    /// Returns a `(1, 1)` array holding the predicted value.
    pub fn predict(&self, input: &Array3<f32>) -> Result<Array2<f32>, ModelError> {
        // ---
        if input.dim() != (1, self.timesteps, self.features) {
            return Err(ModelError::InputShape {
                timesteps: self.timesteps,
                features: self.features,
                actual: input.shape().to_vec(),
            });
        }

        let mut sequence: Array2<f32> = input.index_axis(Axis(0), 0).to_owned();
        for layer in &self.lstm {
            sequence = layer.forward(&sequence);
        }

        // The last LSTM layer only hands its final state to the dense head.
        let mut out: Array1<f32> = sequence.row(sequence.nrows() - 1).to_owned();
        for layer in &self.dense {
            out = layer.forward(&out);
        }

        Ok(out.insert_axis(Axis(0)))
    }
}

impl LstmLayer {
    /// Returns the hidden state at every timestep, `timesteps x units`.
    fn forward(&self, sequence: &Array2<f32>) -> Array2<f32> {
        // ---
        let n = self.units;
        let mut h = Array1::<f32>::zeros(n);
        let mut c = Array1::<f32>::zeros(n);
        let mut outputs = Array2::<f32>::zeros((sequence.nrows(), n));

        for (t, x) in sequence.outer_iter().enumerate() {
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;

            let i = z.slice(s![0..n]).mapv(sigmoid);
            let f = z.slice(s![n..2 * n]).mapv(sigmoid);
            let g = z.slice(s![2 * n..3 * n]).mapv(f32::tanh);
            let o = z.slice(s![3 * n..4 * n]).mapv(sigmoid);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f32::tanh);
            outputs.row_mut(t).assign(&h);
        }

        outputs
    }
}

impl DenseLayer {
    fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        // ---
        let y = x.dot(&self.kernel) + &self.bias;
        match self.activation {
            Activation::Linear => y,
            Activation::Relu => y.mapv(|v| v.max(0.0)),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn matrix(
    rows: &[Vec<f32>],
    nrows: usize,
    ncols: usize,
    name: &str,
) -> Result<Array2<f32>, ModelError> {
    // ---
    if rows.len() != nrows || rows.iter().any(|r| r.len() != ncols) {
        return Err(ModelError::InvalidWeights(format!(
            "{name} must be {nrows} x {ncols}"
        )));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| ModelError::InvalidWeights(format!("{name}: {e}")))
}

fn vector(values: Vec<f32>, len: usize, name: &str) -> Result<Array1<f32>, ModelError> {
    if values.len() != len {
        return Err(ModelError::InvalidWeights(format!(
            "{name} must have {len} entries, got {}",
            values.len()
        )));
    }
    Ok(Array1::from(values))
}
