use std::collections::HashMap;
use std::path::Path;

use log::info;
use ndarray::{Array2, ArrayD, Ix2};
use ort::session::Session;
use ort::value::{Tensor, ValueType};

use super::topology::InputLayout;
use super::YieldModel;
use crate::predictor::PredictorError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A classifier exported to ONNX, run through ONNX Runtime. Weights are
/// embedded in the graph.
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    input_name: String,
    input: InputLayout,
    output_units: usize,
}

impl OnnxModel {
    pub fn load(
        path: &Path,
        config: &RuntimeConfig,
        features: usize,
    ) -> Result<Self, PredictorError> {
        let session = create_session_builder(config)
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| PredictorError::Topology(format!("failed to load ONNX model: {}", e)))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| PredictorError::Topology("ONNX model has no inputs".into()))?;
        let input_name = input.name.clone();
        let input_layout = match &input.input_type {
            ValueType::Tensor { dimensions, .. } if dimensions.len() == 3 => {
                InputLayout::Sequence { steps: features, width: 1 }
            }
            ValueType::Tensor { dimensions, .. } if dimensions.len() == 2 => {
                InputLayout::Flat { features }
            }
            other => {
                return Err(PredictorError::Topology(format!(
                    "unsupported ONNX input {:?}",
                    other
                )))
            }
        };

        let output_units = match session.outputs.first().map(|o| &o.output_type) {
            Some(ValueType::Tensor { dimensions, .. }) => match dimensions.last() {
                Some(&units) if units > 0 => units as usize,
                _ => 2,
            },
            _ => {
                return Err(PredictorError::Topology("ONNX model must have a tensor output".into()))
            }
        };

        info!("ONNX model loaded (input {:?}, layout {})", input_name, input_layout);
        Ok(Self {
            session,
            input_name,
            input: input_layout,
            output_units,
        })
    }
}

impl YieldModel for OnnxModel {
    fn input_layout(&self) -> InputLayout {
        self.input
    }

    fn output_units(&self) -> usize {
        self.output_units
    }

    fn forward(&self, input: ArrayD<f32>) -> Result<Array2<f32>, PredictorError> {
        let tensor = Tensor::from_array(input).map_err(|e| {
            PredictorError::Inference(format!("failed to create input tensor: {}", e))
        })?;

        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.as_str(), tensor);

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| PredictorError::Inference(format!("failed to run model: {}", e)))?;
        let scores = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            PredictorError::Inference(format!("failed to extract output tensor: {}", e))
        })?;

        scores
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(|e| PredictorError::Inference(format!("expected a 2-D output: {}", e)))
    }
}
