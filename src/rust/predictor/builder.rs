use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use super::dataset::ReferenceDataset;
use super::encoder::EncoderBank;
use super::error::PredictorError;
use super::pipeline::Predictor;
use super::scaler::FeatureScaler;
use crate::config::PredictorConfig;
use crate::model_manager::ModelManager;
use crate::models::{ModelKind, ModelLoader, YieldModel};
#[cfg(feature = "onnx")]
use crate::runtime::RuntimeConfig;

/// A builder for constructing a Predictor with a fluent interface.
///
/// Construction fits the encoder bank and the scaler on the reference
/// dataset, then loads the model artifacts. Any failure leaves no usable
/// predictor behind.
#[derive(Debug, Default)]
pub struct PredictorBuilder {
    kind: Option<String>,
    models_dir: Option<PathBuf>,
    artifacts: Option<(PathBuf, PathBuf)>,
    dataset_path: Option<PathBuf>,
    dataset: Option<ReferenceDataset>,
    loader: ModelLoader,
}

impl PredictorBuilder {
    /// Creates a new empty PredictorBuilder instance with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-filled from a configuration
    pub fn from_config(config: &PredictorConfig) -> Result<Self, PredictorError> {
        let mut builder = Self::new()
            .with_kind(&config.model_kind)?
            .with_models_dir(&config.models_dir)
            .with_dataset_path(&config.dataset_path);
        if let (Some(topology), Some(weights)) = (&config.topology_path, &config.weights_path) {
            builder = builder.with_artifacts(topology, weights);
        }
        #[cfg(feature = "onnx")]
        {
            builder = builder.with_runtime_config(config.runtime);
        }
        Ok(builder)
    }

    /// Selects the model kind by name. Registered kinds may be given by
    /// canonical name or artifact stem; other names are only usable when the
    /// topology artifact loads directly.
    pub fn with_kind(mut self, kind: &str) -> Result<Self, PredictorError> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(PredictorError::validation("model_kind", "model kind cannot be empty"));
        }
        self.kind = Some(kind.to_string());
        Ok(self)
    }

    pub fn with_model(mut self, kind: ModelKind) -> Self {
        self.kind = Some(kind.artifact_stem().to_string());
        self
    }

    /// Directory holding `<stem>model.json` and `<stem>model_weights.safetensors`
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = Some(dir.into());
        self
    }

    /// Explicit artifact paths, overriding the models directory convention
    pub fn with_artifacts(
        mut self,
        topology: impl Into<PathBuf>,
        weights: impl Into<PathBuf>,
    ) -> Self {
        self.artifacts = Some((topology.into(), weights.into()));
        self
    }

    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    /// Uses an already loaded reference dataset instead of reading a file
    pub fn with_dataset(mut self, dataset: ReferenceDataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn with_loader(mut self, loader: ModelLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Sets the runtime configuration for ONNX model execution
    #[cfg(feature = "onnx")]
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.loader = self.loader.with_runtime_config(config);
        self
    }

    /// Builds and returns the final Predictor instance
    ///
    /// # Returns
    /// * `Result<Predictor, PredictorError>` - The constructed Predictor if successful,
    ///   or an error if:
    ///   - No model kind was set
    ///   - The reference dataset is missing or unreadable
    ///   - An artifact is missing, unloadable or has mismatched weights
    ///   - The model input does not match the fitted feature count
    pub fn build(self) -> Result<Predictor, PredictorError> {
        let kind = self
            .kind
            .ok_or_else(|| PredictorError::validation("model_kind", "model kind must be set"))?;

        let dataset = match (self.dataset, self.dataset_path) {
            (Some(dataset), _) => dataset,
            (None, Some(path)) => ReferenceDataset::from_path(path)?,
            (None, None) => {
                return Err(PredictorError::Dataset("no reference dataset configured".into()))
            }
        };

        let encoders = EncoderBank::fit(&dataset);
        let features = dataset.feature_matrix(&encoders)?;
        let scaler = FeatureScaler::fit(&features)?;
        info!(
            "Encoders and scaler fit on {} rows ({} features)",
            dataset.len(),
            scaler.n_features()
        );

        let (topology_path, weights_path) = match self.artifacts {
            Some(paths) => paths,
            None => {
                let manager = match self.models_dir {
                    Some(dir) => ModelManager::new(dir),
                    None => ModelManager::new_default(),
                };
                let stem = kind
                    .parse::<ModelKind>()
                    .map(ModelKind::artifact_stem)
                    .unwrap_or(kind.as_str());
                (manager.topology_path(stem), manager.weights_path(stem))
            }
        };

        let loaded = self
            .loader
            .with_features(scaler.n_features())
            .load(&kind, &topology_path, &weights_path)?;
        Self::validate_model(loaded.model.as_ref(), scaler.n_features())?;
        info!("{} model ready ({})", kind, loaded.path);

        Ok(Predictor {
            encoders: Arc::new(encoders),
            scaler: Arc::new(scaler),
            loaded,
            kind_label: kind,
        })
    }

    /// Validates that the model consumes the fitted features and emits two classes
    fn validate_model(model: &dyn YieldModel, features: usize) -> Result<(), PredictorError> {
        let width = model.input_layout().values_per_row();
        if width != features {
            return Err(PredictorError::ShapeMismatch {
                expected: features,
                actual: width,
            });
        }
        if model.output_units() != 2 {
            return Err(PredictorError::Topology(format!(
                "model must emit 2 classes, found {}",
                model.output_units()
            )));
        }
        Ok(())
    }
}
