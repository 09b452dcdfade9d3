use ndarray::{Array2, ArrayD};

use super::error::PredictorError;
use super::record::YieldClass;
use crate::models::InputLayout;

/// Reshapes a (rows, features) matrix into the layout the model consumes:
/// flat layouts pass through, sequence layouts become (rows, steps, width).
pub fn shape_for_model(
    features: Array2<f32>,
    layout: InputLayout,
) -> Result<ArrayD<f32>, PredictorError> {
    match layout {
        InputLayout::Flat { .. } => Ok(features.into_dyn()),
        InputLayout::Sequence { steps, width } => {
            let rows = features.nrows();
            let actual = features.ncols();
            features
                .into_shape_with_order((rows, steps, width))
                .map(|x| x.into_dyn())
                .map_err(|_| PredictorError::ShapeMismatch {
                    expected: steps * width,
                    actual,
                })
        }
    }
}

/// Picks the index of the highest score in every row. A row holding a
/// non-finite score has no meaningful argmax and fails the batch.
pub(crate) fn decode_rows(scores: &Array2<f32>) -> Result<Vec<YieldClass>, PredictorError> {
    if scores.ncols() != 2 {
        return Err(PredictorError::Inference(format!(
            "expected 2 class scores per row, got {}",
            scores.ncols()
        )));
    }
    scores
        .rows()
        .into_iter()
        .enumerate()
        .map(|(r, row)| {
            if row.iter().any(|v| !v.is_finite()) {
                return Err(PredictorError::Inference(format!(
                    "row {} has non-finite scores {:?}",
                    r,
                    row.to_vec()
                )));
            }
            let best = row
                .iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0;
            YieldClass::from_index(best).ok_or_else(|| {
                PredictorError::Inference(format!("class index {} out of range", best))
            })
        })
        .collect()
}
