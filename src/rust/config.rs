use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::predictor::PredictorError;
#[cfg(feature = "onnx")]
use crate::runtime::RuntimeConfig;

pub const ENV_MODEL_KIND: &str = "CROPCAST_MODEL_KIND";
pub const ENV_MODELS_DIR: &str = "CROPCAST_MODELS_DIR";
pub const ENV_DATASET: &str = "CROPCAST_DATASET";

/// Everything needed to construct a predictor, passed explicitly instead of
/// living in process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Model kind: `ff`/`feedforward`, `rnn`/`simple-recurrent` or `lstm`
    pub model_kind: String,
    /// Directory searched for `<stem>model.*` artifacts
    pub models_dir: PathBuf,
    /// Reference dataset the encoders and scaler are fit on
    pub dataset_path: PathBuf,
    /// Explicit topology artifact, overriding `models_dir`
    pub topology_path: Option<PathBuf>,
    /// Explicit weights artifact, overriding `models_dir`
    pub weights_path: Option<PathBuf>,
    /// Session settings used when the topology artifact is an ONNX graph
    #[cfg(feature = "onnx")]
    pub runtime: RuntimeConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_kind: "rnn".to_string(),
            models_dir: PathBuf::from("model"),
            dataset_path: PathBuf::from("dataset/Agriculture In India.csv"),
            topology_path: None,
            weights_path: None,
            #[cfg(feature = "onnx")]
            runtime: RuntimeConfig::default(),
        }
    }
}

impl PredictorConfig {
    /// Defaults overridden by `CROPCAST_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Reads a JSON configuration file; absent keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PredictorError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(kind) = env::var(ENV_MODEL_KIND) {
            self.model_kind = kind;
        }
        if let Ok(dir) = env::var(ENV_MODELS_DIR) {
            self.models_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var(ENV_DATASET) {
            self.dataset_path = PathBuf::from(path);
        }
        self
    }
}
