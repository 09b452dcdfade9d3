use std::fmt;
use std::path::PathBuf;

use super::record::Column;

/// Pipeline stage in which a prediction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Input records were rejected before encoding
    Validate,
    /// A categorical value could not be encoded
    Encode,
    /// Feature scaling failed
    Scale,
    /// The model forward pass or output decoding failed
    Infer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::Encode => "encode",
            Self::Scale => "scale",
            Self::Infer => "infer",
        };
        f.write_str(name)
    }
}

/// Represents the different types of errors that can occur while building or
/// running the predictor.
#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    /// A categorical value was absent from the fitted vocabulary
    #[error("unknown {column} value {value:?}")]
    UnknownCategory { column: Column, value: String },

    /// Feature matrix width disagrees with the fitted dimensionality
    #[error("shape mismatch: expected {expected} feature columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Model kind is not registered and the artifact could not be loaded directly
    #[error("unknown model kind: {0}")]
    UnknownModelKind(String),

    /// Weight artifact does not match the topology
    #[error("weight shape error: {0}")]
    WeightShape(String),

    /// Topology or weights file absent on disk
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Invalid input record or table
    #[error("invalid field {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Reference dataset could not be read or fit
    #[error("reference dataset error: {0}")]
    Dataset(String),

    /// Topology descriptor is malformed or unusable
    #[error("topology error: {0}")]
    Topology(String),

    /// Forward pass failed
    #[error("inference error: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failure annotated with the pipeline stage that raised it
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PredictorError>,
    },
}

impl PredictorError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Annotates the error with the stage it happened in. Errors that already
    /// carry a stage are returned unchanged.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the failing pipeline stage, if known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the underlying error with any stage annotation removed
    pub fn root(&self) -> &PredictorError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the name of the offending input field, if the error has one
    pub fn field(&self) -> Option<&str> {
        match self.root() {
            Self::UnknownCategory { column, .. } => Some(column.header()),
            Self::Validation { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}
