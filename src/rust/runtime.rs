//! ONNX Runtime settings for `.onnx` topology artifacts.

use std::sync::Once;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use serde::{Deserialize, Serialize};

static ENVIRONMENT: Once = Once::new();

/// Graph rewrites ONNX Runtime applies before the first inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphOptimization {
    Disable,
    Basic,
    Extended,
    #[default]
    All,
}

impl GraphOptimization {
    fn level(self) -> GraphOptimizationLevel {
        match self {
            Self::Disable => GraphOptimizationLevel::Disable,
            Self::Basic => GraphOptimizationLevel::Level1,
            Self::Extended => GraphOptimizationLevel::Level2,
            Self::All => GraphOptimizationLevel::Level3,
        }
    }
}

/// Session settings for ONNX graphs. A thread count of `0` leaves the choice
/// to ONNX Runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization: GraphOptimization,
}

impl RuntimeConfig {
    /// Single-threaded sessions, one per predictor
    pub fn single_threaded() -> Self {
        Self {
            inter_threads: 1,
            intra_threads: 1,
            ..Self::default()
        }
    }
}

/// Commits the named ORT environment the first time a session is created.
/// A failed commit is logged; sessions then run in ORT's default environment.
fn ensure_environment() {
    ENVIRONMENT.call_once(|| {
        if let Err(e) = ort::init().with_name("cropcast").commit() {
            log::error!("Failed to initialize ONNX Runtime environment: {}", e);
        }
    });
}

pub fn create_session_builder(config: &RuntimeConfig) -> ort::Result<SessionBuilder> {
    ensure_environment();
    let mut builder = Session::builder()?.with_optimization_level(config.optimization.level())?;
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }
    log::debug!("ONNX session settings: {:?}", config);
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"intra_threads": 4, "optimization": "basic"}"#).unwrap();
        assert_eq!(config.inter_threads, 0);
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.optimization, GraphOptimization::Basic);
        assert_eq!(RuntimeConfig::default().optimization, GraphOptimization::All);
    }

    #[test]
    fn test_session_builder_accepts_every_level() {
        for optimization in [
            GraphOptimization::Disable,
            GraphOptimization::Basic,
            GraphOptimization::Extended,
            GraphOptimization::All,
        ] {
            let config = RuntimeConfig {
                optimization,
                ..RuntimeConfig::single_threaded()
            };
            assert!(create_session_builder(&config).is_ok());
        }
    }
}
