use ndarray::{Array1, Array2, Axis};

use super::error::PredictorError;

/// Standard scaling (z-score normalization): (x - mean) / std, per column.
///
/// The standard deviation is the population one. Columns with zero variance
/// get a scale of 1.0 so they map to zero instead of NaN.
#[derive(Debug, Clone)]
pub struct FeatureScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl FeatureScaler {
    pub fn fit(matrix: &Array2<f64>) -> Result<Self, PredictorError> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(PredictorError::Dataset(
                "cannot fit scaler on an empty feature matrix".into(),
            ));
        }

        let mean = matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| PredictorError::Dataset("cannot compute column means".into()))?;
        let scale = matrix
            .var_axis(Axis(0), 0.0)
            .mapv(|var| if var > 0.0 { var.sqrt() } else { 1.0 });

        let bad = (0..mean.len()).find(|&i| !mean[i].is_finite() || !scale[i].is_finite());
        if let Some(column) = bad {
            return Err(PredictorError::Dataset(format!(
                "feature column {} has non-finite statistics (mean {}, scale {})",
                column, mean[column], scale[column]
            )));
        }

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, PredictorError> {
        if matrix.ncols() != self.n_features() {
            return Err(PredictorError::ShapeMismatch {
                expected: self.n_features(),
                actual: matrix.ncols(),
            });
        }
        Ok((matrix - &self.mean) / &self.scale)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}
