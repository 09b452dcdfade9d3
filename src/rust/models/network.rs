use std::collections::BTreeSet;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Linear, LSTMConfig, Module, RNN, LSTM};
use ndarray::{Array2, ArrayD};

use super::topology::{Activation, InputLayout, LayerSpec, Topology};
use super::weights::WeightStore;
use super::YieldModel;
use crate::predictor::PredictorError;

/// A topology with its weights attached, executed with candle on the CPU.
#[derive(Debug, Clone)]
pub struct Network {
    input: InputLayout,
    layers: Vec<Layer>,
    output_units: usize,
}

#[derive(Debug, Clone)]
enum Layer {
    Dense {
        linear: Linear,
        activation: Activation,
    },
    Lstm(LSTM),
    SimpleRnn {
        input: Linear,
        recurrent: Linear,
        activation: Activation,
        units: usize,
    },
    Dropout,
}

impl Network {
    /// Attaches weights to a topology. Every tensor of the weight manifest
    /// must be present with its exact shape and no other tensor may remain.
    pub fn build(topology: &Topology, weights: WeightStore) -> Result<Self, PredictorError> {
        let output_units = topology.validate().map_err(PredictorError::Topology)?;

        let manifest = topology.weight_manifest();
        let expected: BTreeSet<&str> = manifest.iter().map(|(name, _)| name.as_str()).collect();
        let mut extra: Vec<&str> = weights
            .names()
            .filter(|name| !expected.contains(name))
            .collect();
        if !extra.is_empty() {
            extra.sort_unstable();
            return Err(PredictorError::WeightShape(format!(
                "weight artifact has tensors the topology does not use: {}",
                extra.join(", ")
            )));
        }

        let vb = weights.into_var_builder();
        let mut width = match topology.input {
            InputLayout::Flat { features } => features,
            InputLayout::Sequence { width, .. } => width,
        };
        let mut n = 0;
        let mut layers = Vec::with_capacity(topology.layers.len());
        for spec in &topology.layers {
            let vb = vb.pp(format!("layers.{}", n));
            let (layer, units) = match *spec {
                LayerSpec::Dense { units, activation } => {
                    let linear = candle_nn::linear(width, units, vb).map_err(weight_error)?;
                    (Layer::Dense { linear, activation }, units)
                }
                LayerSpec::Lstm { units } => {
                    let lstm = candle_nn::lstm(width, units, LSTMConfig::default(), vb)
                        .map_err(weight_error)?;
                    (Layer::Lstm(lstm), units)
                }
                LayerSpec::SimpleRnn { units, activation } => {
                    let input = Linear::new(
                        vb.get((units, width), "weight_ih_l0").map_err(weight_error)?,
                        Some(vb.get(units, "bias_ih_l0").map_err(weight_error)?),
                    );
                    let recurrent = Linear::new(
                        vb.get((units, units), "weight_hh_l0").map_err(weight_error)?,
                        Some(vb.get(units, "bias_hh_l0").map_err(weight_error)?),
                    );
                    let layer = Layer::SimpleRnn {
                        input,
                        recurrent,
                        activation,
                        units,
                    };
                    (layer, units)
                }
                LayerSpec::Dropout { .. } => {
                    layers.push(Layer::Dropout);
                    continue;
                }
            };
            layers.push(layer);
            width = units;
            n += 1;
        }
        log::debug!("Attached {} tensors to {} layers", manifest.len(), layers.len());

        Ok(Self {
            input: topology.input,
            layers,
            output_units,
        })
    }

    fn run(&self, mut x: Tensor) -> candle_core::Result<Tensor> {
        for layer in &self.layers {
            x = match layer {
                Layer::Dropout => x,
                Layer::Dense { linear, activation } => activate(&linear.forward(&x)?, *activation)?,
                Layer::Lstm(lstm) => {
                    let states = lstm.seq(&x)?;
                    match states.last() {
                        Some(state) => state.h().clone(),
                        None => {
                            return Err(candle_core::Error::Msg("LSTM received no timesteps".into()))
                        }
                    }
                }
                Layer::SimpleRnn {
                    input,
                    recurrent,
                    activation,
                    units,
                } => simple_rnn(&x, input, recurrent, *activation, *units)?,
            };
        }
        Ok(x)
    }
}

impl YieldModel for Network {
    fn input_layout(&self) -> InputLayout {
        self.input
    }

    fn output_units(&self) -> usize {
        self.output_units
    }

    fn forward(&self, input: ArrayD<f32>) -> Result<Array2<f32>, PredictorError> {
        let shape = input.shape().to_vec();
        match (self.input, shape.as_slice()) {
            (InputLayout::Flat { features }, [_, actual]) => check_width(*actual, features)?,
            (InputLayout::Sequence { steps, width }, [_, actual_steps, actual_width]) => {
                check_width(*actual_steps, steps)?;
                check_width(*actual_width, width)?;
            }
            (layout, _) => {
                return Err(PredictorError::Inference(format!(
                    "expected input {}, got shape {:?}",
                    layout, shape
                )))
            }
        }

        let values: Vec<f32> = input.iter().copied().collect();
        let x = Tensor::from_vec(values, shape, &Device::Cpu).map_err(inference_error)?;
        let scores = self.run(x).map_err(inference_error)?;

        let (rows, classes) = scores.dims2().map_err(inference_error)?;
        let values = scores
            .flatten_all()
            .and_then(|flat| flat.to_vec1::<f32>())
            .map_err(inference_error)?;
        Array2::from_shape_vec((rows, classes), values)
            .map_err(|e| PredictorError::Inference(e.to_string()))
    }
}

fn check_width(actual: usize, expected: usize) -> Result<(), PredictorError> {
    if actual != expected {
        return Err(PredictorError::ShapeMismatch { expected, actual });
    }
    Ok(())
}

fn weight_error(e: candle_core::Error) -> PredictorError {
    PredictorError::WeightShape(e.to_string())
}

fn inference_error(e: candle_core::Error) -> PredictorError {
    PredictorError::Inference(e.to_string())
}

fn activate(x: &Tensor, activation: Activation) -> candle_core::Result<Tensor> {
    match activation {
        Activation::Linear => Ok(x.clone()),
        Activation::Relu => x.relu(),
        Activation::Sigmoid => candle_nn::ops::sigmoid(x),
        Activation::Tanh => x.tanh(),
        Activation::Softmax => candle_nn::ops::softmax(x, D::Minus1),
    }
}

/// Runs an Elman RNN over (batch, steps, width) and returns the last hidden state
fn simple_rnn(
    x: &Tensor,
    input: &Linear,
    recurrent: &Linear,
    activation: Activation,
    units: usize,
) -> candle_core::Result<Tensor> {
    let (batch, steps, _) = x.dims3()?;
    let mut h = Tensor::zeros((batch, units), DType::F32, x.device())?;
    for step in 0..steps {
        let xt = x.narrow(1, step, 1)?.squeeze(1)?.contiguous()?;
        h = activate(&(input.forward(&xt)? + recurrent.forward(&h)?)?, activation)?;
    }
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::ModelKind;
    use crate::models::topology::tensor_name;
    use ndarray::{array, Array};

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    fn tensor(values: &[f32], shape: &[usize]) -> Tensor {
        Tensor::from_vec(values.to_vec(), shape.to_vec(), &Device::Cpu).unwrap()
    }

    fn filled(topology: &Topology, value: f32) -> WeightStore {
        let mut store = WeightStore::new();
        for (name, shape) in topology.weight_manifest() {
            let len = shape.iter().product::<usize>();
            store.insert(name, tensor(&vec![value; len], &shape));
        }
        store
    }

    #[test]
    fn test_dense_forward_matches_hand_computation() {
        let topology = Topology {
            input: InputLayout::Flat { features: 2 },
            layers: vec![LayerSpec::Dense { units: 2, activation: Activation::Softmax }],
        };
        let mut store = WeightStore::new();
        store.insert(tensor_name(0, "weight"), tensor(&[1.0, 0.0, 0.0, 1.0], &[2, 2]));
        store.insert(tensor_name(0, "bias"), tensor(&[0.0, 0.0], &[2]));
        let network = Network::build(&topology, store).unwrap();

        let out = network.forward(array![[0.0f32, 2.0f32.ln()]].into_dyn()).unwrap();
        assert!((out[[0, 0]] - 1.0 / 3.0).abs() < 1e-6);
        assert!((out[[0, 1]] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_lstm_single_step_matches_hand_computation() {
        let topology = Topology {
            input: InputLayout::Sequence { steps: 1, width: 1 },
            layers: vec![
                LayerSpec::Lstm { units: 1 },
                LayerSpec::Dense { units: 1, activation: Activation::Linear },
            ],
        };
        let mut store = WeightStore::new();
        store.insert(tensor_name(0, "weight_ih_l0"), tensor(&[1.0; 4], &[4, 1]));
        store.insert(tensor_name(0, "weight_hh_l0"), tensor(&[0.0; 4], &[4, 1]));
        store.insert(tensor_name(0, "bias_ih_l0"), tensor(&[0.0; 4], &[4]));
        store.insert(tensor_name(0, "bias_hh_l0"), tensor(&[0.0; 4], &[4]));
        store.insert(tensor_name(1, "weight"), tensor(&[1.0], &[1, 1]));
        store.insert(tensor_name(1, "bias"), tensor(&[0.0], &[1]));
        let network = Network::build(&topology, store).unwrap();

        let out = network.forward(Array::from_elem((1, 1, 1), 0.5f32).into_dyn()).unwrap();
        let c = sigmoid(0.5) * 0.5f32.tanh();
        let expected = sigmoid(0.5) * c.tanh();
        assert!((out[[0, 0]] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_simple_rnn_carries_state_across_steps() {
        let topology = Topology {
            input: InputLayout::Sequence { steps: 2, width: 1 },
            layers: vec![
                LayerSpec::SimpleRnn { units: 1, activation: Activation::Linear },
                LayerSpec::Dense { units: 1, activation: Activation::Linear },
            ],
        };
        let mut store = WeightStore::new();
        store.insert(tensor_name(0, "weight_ih_l0"), tensor(&[2.0], &[1, 1]));
        store.insert(tensor_name(0, "weight_hh_l0"), tensor(&[0.5], &[1, 1]));
        store.insert(tensor_name(0, "bias_ih_l0"), tensor(&[0.0], &[1]));
        store.insert(tensor_name(0, "bias_hh_l0"), tensor(&[1.0], &[1]));
        store.insert(tensor_name(1, "weight"), tensor(&[1.0], &[1, 1]));
        store.insert(tensor_name(1, "bias"), tensor(&[0.0], &[1]));
        let network = Network::build(&topology, store).unwrap();

        // h1 = 2*1 + 1 = 3, h2 = 2*3 + 0.5*3 + 1 = 8.5
        let out = network.forward(array![[[1.0f32], [3.0]]].into_dyn()).unwrap();
        assert!((out[[0, 0]] - 8.5).abs() < 1e-5);
    }

    #[test]
    fn test_registry_networks_emit_probabilities() {
        for kind in ModelKind::ALL {
            let topology = kind.architecture(6);
            let network = Network::build(&topology, filled(&topology, 0.01)).unwrap();
            let input = match topology.input {
                InputLayout::Flat { .. } => Array::from_elem((3, 6), 0.3f32).into_dyn(),
                InputLayout::Sequence { .. } => Array::from_elem((3, 6, 1), 0.3f32).into_dyn(),
            };
            let out = network.forward(input).unwrap();
            assert_eq!(out.dim(), (3, 2));
            for row in out.rows() {
                assert!((row.sum() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_extra_tensor_is_rejected() {
        let topology = ModelKind::FeedForward.architecture(6);
        let mut store = filled(&topology, 0.1);
        store.insert("layers.9.weight", tensor(&[1.0], &[1, 1]));
        assert!(matches!(
            Network::build(&topology, store),
            Err(PredictorError::WeightShape(_))
        ));
    }

    #[test]
    fn test_wrong_tensor_shape_is_rejected() {
        let topology = ModelKind::FeedForward.architecture(6);
        let mut store = filled(&topology, 0.1);
        store.insert(tensor_name(0, "weight"), tensor(&[0.1; 6 * 63], &[63, 6]));
        assert!(matches!(
            Network::build(&topology, store),
            Err(PredictorError::WeightShape(_))
        ));
    }

    #[test]
    fn test_wrong_input_width_is_rejected() {
        let topology = ModelKind::FeedForward.architecture(6);
        let network = Network::build(&topology, filled(&topology, 0.1)).unwrap();
        assert!(matches!(
            network.forward(Array::from_elem((1, 5), 0.0f32).into_dyn()),
            Err(PredictorError::ShapeMismatch { expected: 6, actual: 5 })
        ));
    }
}
