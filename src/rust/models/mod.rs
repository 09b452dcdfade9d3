//! Model architectures, artifacts and the inference backends.

use std::fmt;

use ndarray::{Array2, ArrayD};

use crate::predictor::PredictorError;

pub mod loader;
pub mod network;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod registry;
pub mod topology;
pub mod weights;

pub use loader::{LoadPath, LoadedModel, ModelLoader};
pub use network::Network;
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use registry::ModelKind;
pub use topology::{Activation, DirectLoad, InputLayout, LayerSpec, Topology};
pub use weights::WeightStore;

/// A loaded classifier that maps a batch of scaled feature rows to per-class
/// scores.
///
/// Implementations are read-only after construction and shared between
/// threads behind an `Arc`.
pub trait YieldModel: Send + Sync + fmt::Debug {
    /// Shape of a single input row the model expects
    fn input_layout(&self) -> InputLayout;

    /// Number of output classes
    fn output_units(&self) -> usize;

    /// Runs inference on a (rows, features) or (rows, steps, width) batch and
    /// returns a (rows, classes) score matrix.
    fn forward(&self, input: ArrayD<f32>) -> Result<Array2<f32>, PredictorError>;
}
