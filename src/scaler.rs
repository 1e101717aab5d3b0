//! Fitted feature scaler.
//!
//! The scaler is exported from the training pipeline as JSON and mirrors
//! the two scalers the pipeline uses: min-max and standardization. Both are
//! per-column affine maps, so the forward and inverse transforms are exact
//! inverses of each other up to floating-point rounding.

use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;

use crate::error::{ArtifactError, ScalerError};

// ---

/// On-disk representation, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScalerSpec {
    MinMax {
        data_min: Vec<f32>,
        data_max: Vec<f32>,
        #[serde(default = "default_feature_range")]
        feature_range: [f32; 2],
    },
    Standard {
        mean: Vec<f32>,
        scale: Vec<f32>,
    },
}

fn default_feature_range() -> [f32; 2] {
    [0.0, 1.0]
}

/// A fitted per-column affine transform: `x * scale + offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    scale: Array1<f32>,
    offset: Array1<f32>,
}

impl Scaler {
    /// Min-max scaler fitted on columns with the given observed ranges.
    pub fn min_max(
        data_min: &[f32],
        data_max: &[f32],
        feature_range: [f32; 2],
    ) -> Result<Self, ScalerError> {
        // ---
        if data_min.len() != data_max.len() {
            return Err(ScalerError::InvalidParameters(format!(
                "data_min has {} entries but data_max has {}",
                data_min.len(),
                data_max.len()
            )));
        }
        let [lo, hi] = feature_range;
        if lo >= hi {
            return Err(ScalerError::InvalidParameters(format!(
                "feature_range [{lo}, {hi}] is empty"
            )));
        }

        let scale: Array1<f32> = data_min
            .iter()
            .zip(data_max)
            .map(|(&min, &max)| (hi - lo) / non_zero(max - min))
            .collect();
        let offset: Array1<f32> = data_min
            .iter()
            .zip(scale.iter())
            .map(|(&min, &s)| lo - min * s)
            .collect();

        Self::checked(scale, offset)
    }

    /// Standardization scaler: `(x - mean) / scale`.
    pub fn standard(mean: &[f32], scale: &[f32]) -> Result<Self, ScalerError> {
        // ---
        if mean.len() != scale.len() {
            return Err(ScalerError::InvalidParameters(format!(
                "mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            )));
        }

        let mul: Array1<f32> = scale.iter().map(|&s| 1.0 / non_zero(s)).collect();
        let offset: Array1<f32> = mean.iter().zip(mul.iter()).map(|(&m, &k)| -m * k).collect();

        Self::checked(mul, offset)
    }

    /// Read a scaler exported by the training pipeline.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        // ---
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: ScalerSpec =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        let scaler = match spec {
            ScalerSpec::MinMax {
                data_min,
                data_max,
                feature_range,
            } => Self::min_max(&data_min, &data_max, feature_range)?,
            ScalerSpec::Standard { mean, scale } => Self::standard(&mean, &scale)?,
        };
        Ok(scaler)
    }

    fn checked(scale: Array1<f32>, offset: Array1<f32>) -> Result<Self, ScalerError> {
        // ---
        if scale.is_empty() {
            return Err(ScalerError::InvalidParameters("no features".into()));
        }
        if scale.iter().chain(offset.iter()).any(|v| !v.is_finite()) {
            return Err(ScalerError::InvalidParameters(
                "parameters must be finite".into(),
            ));
        }
        Ok(Self { scale, offset })
    }

    /// Number of feature columns the scaler was fitted on.
    pub fn n_features(&self) -> usize {
        self.scale.len()
    }

    /// Forward transform of `rows x n_features` data.
    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>, ScalerError> {
        // ---
        self.check_width(x)?;
        Ok(x * &self.scale + &self.offset)
    }

    /// Inverse transform of `rows x n_features` data.
    pub fn inverse_transform(&self, x: &Array2<f32>) -> Result<Array2<f32>, ScalerError> {
        // ---
        self.check_width(x)?;
        Ok((x - &self.offset) / &self.scale)
    }

    /// Invert a single value that lives in column `index`.
    pub fn inverse_transform_feature(&self, value: f32, index: usize) -> Result<f32, ScalerError> {
        // ---
        match (self.scale.get(index), self.offset.get(index)) {
            (Some(&s), Some(&o)) => Ok((value - o) / s),
            _ => Err(ScalerError::FeatureIndex {
                index,
                features: self.n_features(),
            }),
        }
    }

    fn check_width(&self, x: &Array2<f32>) -> Result<(), ScalerError> {
        let actual = x.len_of(Axis(1));
        if actual != self.n_features() {
            return Err(ScalerError::FeatureCount {
                expected: self.n_features(),
                actual,
            });
        }
        Ok(())
    }
}

/// Constant columns get a unit range so they map to the lower bound.
fn non_zero(v: f32) -> f32 {
    if v == 0.0 {
        1.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use ndarray::array;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_min_max_maps_range_onto_unit_interval() {
        // ---
        let scaler = Scaler::min_max(&[0.0, 10.0, 0.0], &[40.0, 110.0, 500.0], [0.0, 1.0]).unwrap();
        let x = array![[20.0, 60.0, 250.0], [0.0, 10.0, 500.0]];

        let scaled = scaler.transform(&x).unwrap();

        assert!(approx(scaled[[0, 0]], 0.5));
        assert!(approx(scaled[[0, 1]], 0.5));
        assert!(approx(scaled[[0, 2]], 0.5));
        assert!(approx(scaled[[1, 0]], 0.0));
        assert!(approx(scaled[[1, 2]], 1.0));
    }

    #[test]
    fn test_inverse_undoes_transform() {
        // ---
        let scaler = Scaler::standard(&[25.0, 55.0, 80.0], &[5.0, 12.0, 40.0]).unwrap();
        let x = array![[31.5, 48.0, 143.0], [19.0, 70.0, 12.0]];

        let back = scaler
            .inverse_transform(&scaler.transform(&x).unwrap())
            .unwrap();

        for (a, b) in back.iter().zip(x.iter()) {
            assert!(approx(*a, *b), "{a} != {b}");
        }
    }

    #[test]
    fn test_constant_column_uses_unit_range() {
        // ---
        let scaler = Scaler::min_max(&[5.0], &[5.0], [0.0, 1.0]).unwrap();
        let scaled = scaler.transform(&array![[5.0], [6.0]]).unwrap();

        assert!(approx(scaled[[0, 0]], 0.0));
        assert!(approx(scaled[[1, 0]], 1.0));
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        // ---
        let scaler = Scaler::min_max(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0], [0.0, 1.0]).unwrap();

        let err = scaler.inverse_transform(&array![[0.3]]).unwrap_err();
        assert_eq!(
            err,
            ScalerError::FeatureCount {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_inverse_single_feature() {
        // ---
        let scaler = Scaler::min_max(&[0.0, 0.0, 0.0], &[40.0, 100.0, 500.0], [0.0, 1.0]).unwrap();

        assert!(approx(scaler.inverse_transform_feature(0.1, 2).unwrap(), 50.0));
        assert!(matches!(
            scaler.inverse_transform_feature(0.1, 3),
            Err(ScalerError::FeatureIndex { index: 3, features: 3 })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        // ---
        assert!(Scaler::min_max(&[0.0], &[1.0, 2.0], [0.0, 1.0]).is_err());
        assert!(Scaler::min_max(&[0.0], &[1.0], [1.0, 0.0]).is_err());
        assert!(Scaler::standard(&[], &[]).is_err());
    }

    #[test]
    fn test_load_from_json() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(
            &path,
            r#"{"kind": "min_max", "data_min": [0.0], "data_max": [200.0]}"#,
        )
        .unwrap();

        let scaler = Scaler::load(&path).unwrap();
        assert_eq!(scaler.n_features(), 1);
        assert!(approx(scaler.inverse_transform_feature(0.25, 0).unwrap(), 50.0));
    }

    #[test]
    fn test_load_missing_file() {
        // ---
        let err = Scaler::load("/nonexistent/scaler.json").unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
