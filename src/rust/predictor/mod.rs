use std::path::PathBuf;

use crate::models::{InputLayout, LoadPath, ModelKind};

pub mod builder;
mod dataset;
mod encoder;
mod error;
mod handle;
mod pipeline;
mod record;
mod scaler;
mod utils;

pub use builder::PredictorBuilder;
pub use dataset::{ReferenceDataset, ReferenceRow};
pub use encoder::{EncodedCategories, EncoderBank, LabelEncoder};
pub use error::{PredictorError, Stage};
pub use handle::PredictorHandle;
pub use pipeline::Predictor;
pub use record::{Column, InputRecord, InputTable, YieldClass, CATEGORICAL_COLUMNS, FEATURE_COLUMNS};
pub use scaler::FeatureScaler;
pub use utils::shape_for_model;

/// Information about the current state and configuration of a predictor
#[derive(Debug, Clone)]
pub struct PredictorInfo {
    /// Model kind as requested
    pub kind: String,
    /// Registry kind, if the requested kind is registered
    pub registered_kind: Option<ModelKind>,
    /// Whether the topology loaded directly or was rebuilt
    pub load_path: LoadPath,
    pub topology_path: PathBuf,
    pub weights_path: PathBuf,
    /// Number of encoded feature columns
    pub num_features: usize,
    pub input_layout: InputLayout,
    /// Vocabulary size of every categorical encoder
    pub vocabulary_sizes: Vec<(Column, usize)>,
}
