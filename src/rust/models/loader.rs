use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use super::network::Network;
use super::registry::ModelKind;
use super::topology::{DirectLoad, Topology};
use super::weights::WeightStore;
use super::YieldModel;
use crate::predictor::{PredictorError, FEATURE_COLUMNS};
#[cfg(feature = "onnx")]
use crate::runtime::RuntimeConfig;

/// How a model came to be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    /// The topology artifact was deserialized and used as-is
    Direct,
    /// The topology was rebuilt from the architecture registry
    Rebuilt,
}

impl fmt::Display for LoadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Rebuilt => f.write_str("rebuilt from registry"),
        }
    }
}

/// A model ready for inference together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: Arc<dyn YieldModel>,
    pub path: LoadPath,
    /// Registered kind, `None` when an unregistered kind loaded directly
    pub kind: Option<ModelKind>,
    pub topology_path: PathBuf,
    pub weights_path: PathBuf,
}

enum Direct {
    Loaded(Arc<dyn YieldModel>),
    NeedsRebuild(String),
}

/// Loads (topology, weights) artifact pairs.
///
/// The topology is first deserialized directly. When the descriptor reports
/// that it needs a rebuild, the registry architecture for the requested kind
/// is built instead and the weights are loaded into it. Weight shape errors
/// are never a reason to rebuild.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    features: usize,
    #[cfg(feature = "onnx")]
    runtime_config: RuntimeConfig,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader {
    pub fn new() -> Self {
        Self {
            features: FEATURE_COLUMNS.len(),
            #[cfg(feature = "onnx")]
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Overrides the encoded feature count used for registry rebuilds
    pub fn with_features(mut self, features: usize) -> Self {
        self.features = features;
        self
    }

    /// Sets the runtime configuration for ONNX model execution
    #[cfg(feature = "onnx")]
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn load(
        &self,
        kind: &str,
        topology_path: impl AsRef<Path>,
        weights_path: impl AsRef<Path>,
    ) -> Result<LoadedModel, PredictorError> {
        let topology_path = topology_path.as_ref();
        let weights_path = weights_path.as_ref();
        for artifact in [topology_path, weights_path] {
            if !artifact.exists() {
                return Err(PredictorError::MissingArtifact(artifact.to_path_buf()));
            }
        }
        let registered = kind.parse::<ModelKind>().ok();

        info!("Loading {} model from {:?}", kind, topology_path);
        let (model, path) = match self.load_direct(topology_path, weights_path)? {
            Direct::Loaded(model) => {
                info!("Model loaded directly from {:?}", topology_path);
                (model, LoadPath::Direct)
            }
            Direct::NeedsRebuild(reason) => {
                warn!(
                    "Could not load {:?} directly ({}). Rebuilding model architecture...",
                    topology_path, reason
                );
                let kind = registered
                    .ok_or_else(|| PredictorError::UnknownModelKind(kind.to_string()))?;
                let topology = kind.architecture(self.features);
                let network = Network::build(&topology, WeightStore::load(weights_path)?)?;
                info!("Rebuilt {} architecture and loaded weights from {:?}", kind, weights_path);
                (Arc::new(network) as Arc<dyn YieldModel>, LoadPath::Rebuilt)
            }
        };

        Ok(LoadedModel {
            model,
            path,
            kind: registered,
            topology_path: topology_path.to_path_buf(),
            weights_path: weights_path.to_path_buf(),
        })
    }

    fn load_direct(
        &self,
        topology_path: &Path,
        weights_path: &Path,
    ) -> Result<Direct, PredictorError> {
        let is_onnx = topology_path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("onnx"));
        if is_onnx {
            return self.load_onnx(topology_path);
        }

        let text = std::fs::read_to_string(topology_path)?;
        match Topology::from_keras_json(&text)? {
            DirectLoad::Parsed(topology) => {
                let network = Network::build(&topology, WeightStore::load(weights_path)?)?;
                Ok(Direct::Loaded(Arc::new(network)))
            }
            DirectLoad::NeedsRebuild(reason) => Ok(Direct::NeedsRebuild(reason)),
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, topology_path: &Path) -> Result<Direct, PredictorError> {
        let model =
            super::onnx::OnnxModel::load(topology_path, &self.runtime_config, self.features)?;
        Ok(Direct::Loaded(Arc::new(model)))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, _topology_path: &Path) -> Result<Direct, PredictorError> {
        Ok(Direct::NeedsRebuild("ONNX topologies need the `onnx` feature".to_string()))
    }
}
