//! Declared model structure, independent of learned weights.
//!
//! A [`Topology`] is either taken from the architecture registry or parsed
//! from a Keras-style JSON descriptor:
//!
//! ```json
//! {"class_name": "Sequential",
//!  "config": {"layers": [
//!     {"class_name": "InputLayer", "config": {"batch_input_shape": [null, 6]}},
//!     {"class_name": "Dense", "config": {"units": 64, "activation": "relu"}}
//!  ]}}
//! ```
//!
//! Parsing separates two failure classes. Text that is not JSON at all is a
//! fatal [`PredictorError::Topology`]. Well-formed JSON that describes a
//! structure this runtime cannot execute yields [`DirectLoad::NeedsRebuild`],
//! which the loader answers by rebuilding from the registry.

use std::fmt;

use serde::Deserialize;

use crate::predictor::PredictorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "relu" => Some(Self::Relu),
            "sigmoid" => Some(Self::Sigmoid),
            "tanh" => Some(Self::Tanh),
            "softmax" => Some(Self::Softmax),
            _ => None,
        }
    }
}

/// Shape of a single model input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// One flat feature vector per row
    Flat { features: usize },
    /// A sequence of `steps` timesteps, `width` values each
    Sequence { steps: usize, width: usize },
}

impl InputLayout {
    /// Number of scalar values per row
    pub fn values_per_row(&self) -> usize {
        match *self {
            Self::Flat { features } => features,
            Self::Sequence { steps, width } => steps * width,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence { .. })
    }
}

impl fmt::Display for InputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat { features } => write!(f, "(batch, {})", features),
            Self::Sequence { steps, width } => write!(f, "(batch, {}, {})", steps, width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerSpec {
    Dense { units: usize, activation: Activation },
    /// Recurrent layer emitting only its final hidden state
    Lstm { units: usize },
    SimpleRnn { units: usize, activation: Activation },
    /// Identity at inference time
    Dropout { rate: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub input: InputLayout,
    pub layers: Vec<LayerSpec>,
}

/// Outcome of parsing a topology descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectLoad {
    Parsed(Topology),
    /// The descriptor is well-formed but uses constructs this runtime does
    /// not execute; the reason is logged by the loader.
    NeedsRebuild(String),
}

impl Topology {
    /// Checks that the layer chain is executable and returns the output width.
    pub fn validate(&self) -> Result<usize, String> {
        if self.layers.is_empty() {
            return Err("topology has no layers".into());
        }
        if self.input.values_per_row() == 0 {
            return Err("topology declares an empty input".into());
        }

        let mut sequence = self.input.is_sequence();
        let mut width = match self.input {
            InputLayout::Flat { features } => features,
            InputLayout::Sequence { width, .. } => width,
        };
        for (i, layer) in self.layers.iter().enumerate() {
            match *layer {
                LayerSpec::Dense { units, .. } => {
                    if sequence {
                        return Err(format!("layer {}: dense layer applied to a sequence", i));
                    }
                    width = units;
                }
                LayerSpec::Lstm { units } | LayerSpec::SimpleRnn { units, .. } => {
                    if !sequence {
                        return Err(format!("layer {}: recurrent layer needs sequence input", i));
                    }
                    sequence = false;
                    width = units;
                }
                LayerSpec::Dropout { .. } => {}
            }
            if width == 0 {
                return Err(format!("layer {}: zero units", i));
            }
        }
        if sequence {
            return Err("topology ends on a sequence".into());
        }
        Ok(width)
    }

    /// Output width of the final layer, if the topology is executable
    pub fn output_units(&self) -> Option<usize> {
        self.validate().ok()
    }

    /// Ordered weight manifest: tensor name and expected shape for every
    /// parameter of the topology. Weights use the (units, inputs) layout and
    /// recurrent layers carry separate input and hidden biases.
    pub fn weight_manifest(&self) -> Vec<(String, Vec<usize>)> {
        let mut manifest = Vec::new();
        let mut width = match self.input {
            InputLayout::Flat { features } => features,
            InputLayout::Sequence { width, .. } => width,
        };
        let mut n = 0;
        for layer in &self.layers {
            let (units, rows) = match *layer {
                LayerSpec::Dense { units, .. } => {
                    manifest.push((tensor_name(n, "weight"), vec![units, width]));
                    manifest.push((tensor_name(n, "bias"), vec![units]));
                    width = units;
                    n += 1;
                    continue;
                }
                LayerSpec::Lstm { units } => (units, 4 * units),
                LayerSpec::SimpleRnn { units, .. } => (units, units),
                LayerSpec::Dropout { .. } => continue,
            };
            manifest.push((tensor_name(n, "weight_ih_l0"), vec![rows, width]));
            manifest.push((tensor_name(n, "weight_hh_l0"), vec![rows, units]));
            manifest.push((tensor_name(n, "bias_ih_l0"), vec![rows]));
            manifest.push((tensor_name(n, "bias_hh_l0"), vec![rows]));
            width = units;
            n += 1;
        }
        manifest
    }

    /// Parses a Keras-style JSON descriptor.
    pub fn from_keras_json(text: &str) -> Result<DirectLoad, PredictorError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| PredictorError::Topology(format!("descriptor is not valid JSON: {}", e)))?;

        let model: KerasModel = match serde_json::from_value(value) {
            Ok(model) => model,
            Err(e) => {
                return Ok(DirectLoad::NeedsRebuild(format!("unrecognised descriptor: {}", e)))
            }
        };
        Ok(match model.into_topology() {
            Ok(topology) => DirectLoad::Parsed(topology),
            Err(reason) => DirectLoad::NeedsRebuild(reason),
        })
    }
}

pub(crate) fn tensor_name(index: usize, part: &str) -> String {
    format!("layers.{}.{}", index, part)
}

#[derive(Deserialize)]
struct KerasModel {
    class_name: String,
    config: KerasModelConfig,
}

#[derive(Deserialize)]
struct KerasModelConfig {
    layers: Vec<KerasLayer>,
}

#[derive(Deserialize)]
struct KerasLayer {
    class_name: String,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Deserialize)]
struct InputShape {
    #[serde(default, alias = "batch_shape")]
    batch_input_shape: Option<Vec<Option<usize>>>,
}

#[derive(Deserialize)]
struct DenseConfig {
    units: usize,
    #[serde(default = "default_linear")]
    activation: String,
    #[serde(default = "default_true")]
    use_bias: bool,
}

#[derive(Deserialize)]
struct RecurrentConfig {
    units: usize,
    #[serde(default = "default_tanh")]
    activation: String,
    #[serde(default = "default_sigmoid")]
    recurrent_activation: String,
    #[serde(default)]
    return_sequences: bool,
    #[serde(default = "default_true")]
    use_bias: bool,
}

#[derive(Deserialize)]
struct DropoutConfig {
    rate: f32,
}

fn default_linear() -> String {
    "linear".into()
}

fn default_tanh() -> String {
    "tanh".into()
}

fn default_sigmoid() -> String {
    "sigmoid".into()
}

fn default_true() -> bool {
    true
}

impl KerasModel {
    fn into_topology(self) -> Result<Topology, String> {
        if self.class_name != "Sequential" {
            return Err(format!("unsupported model class {:?}", self.class_name));
        }

        let mut input = None;
        let mut layers = Vec::new();
        for layer in self.config.layers {
            if input.is_none() {
                if let Ok(shape) = serde_json::from_value::<InputShape>(layer.config.clone()) {
                    if let Some(dims) = shape.batch_input_shape {
                        input = Some(parse_input_shape(&dims)?);
                    }
                }
            }

            match layer.class_name.as_str() {
                "InputLayer" => {}
                "Dense" => {
                    let config: DenseConfig = parse_config(&layer)?;
                    if !config.use_bias {
                        return Err("dense layers without bias are not supported".into());
                    }
                    layers.push(LayerSpec::Dense {
                        units: config.units,
                        activation: parse_activation(&config.activation)?,
                    });
                }
                "Dropout" => {
                    let config: DropoutConfig = parse_config(&layer)?;
                    layers.push(LayerSpec::Dropout { rate: config.rate });
                }
                "LSTM" | "SimpleRNN" => {
                    let config: RecurrentConfig = parse_config(&layer)?;
                    if config.return_sequences {
                        return Err(format!(
                            "{} with return_sequences is not supported",
                            layer.class_name
                        ));
                    }
                    if !config.use_bias {
                        return Err("recurrent layers without bias are not supported".into());
                    }
                    let activation = parse_activation(&config.activation)?;
                    if layer.class_name == "LSTM" {
                        let default_gates = activation == Activation::Tanh
                            && config.recurrent_activation == "sigmoid";
                        if !default_gates {
                            return Err("LSTM with non-default activations is not supported".into());
                        }
                        layers.push(LayerSpec::Lstm { units: config.units });
                    } else {
                        layers.push(LayerSpec::SimpleRnn { units: config.units, activation });
                    }
                }
                other => return Err(format!("unsupported layer class {:?}", other)),
            }
        }

        let input = input.ok_or_else(|| "descriptor does not declare an input shape".to_string())?;
        let topology = Topology { input, layers };
        topology.validate()?;
        Ok(topology)
    }
}

fn parse_config<T: serde::de::DeserializeOwned>(layer: &KerasLayer) -> Result<T, String> {
    serde_json::from_value(layer.config.clone())
        .map_err(|e| format!("invalid {} config: {}", layer.class_name, e))
}

fn parse_activation(name: &str) -> Result<Activation, String> {
    Activation::parse(name).ok_or_else(|| format!("unsupported activation {:?}", name))
}

fn parse_input_shape(dims: &[Option<usize>]) -> Result<InputLayout, String> {
    match dims {
        [_, Some(features)] => Ok(InputLayout::Flat { features: *features }),
        [_, Some(steps), Some(width)] => Ok(InputLayout::Sequence { steps: *steps, width: *width }),
        _ => Err(format!("unsupported input shape {:?}", dims)),
    }
}
