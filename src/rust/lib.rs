//! A thread-safe crop-yield classifier with feed-forward, simple-recurrent and
//! LSTM backends.
//!
//! Records carry five features (state, district, year, season, crop) plus the
//! cultivated area. Categorical columns are label-encoded and all six columns
//! standardized against a reference dataset before the model labels each
//! record as high (`1`) or less (`0`) yield.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cropcast::{InputRecord, ModelKind, Predictor};
//!
//! let predictor = Predictor::builder()
//!     .with_model(ModelKind::SimpleRecurrent)
//!     .with_models_dir("model")
//!     .with_dataset_path("dataset/Agriculture In India.csv")
//!     .build()?;
//!
//! let record = InputRecord::new("Assam", "NAGAON", 2013, "Kharif", "Rice", 1000.0);
//! let class = predictor.predict_single(&record)?;
//! println!("Crop Yield will be {}", cropcast::yield_label(class));
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The predictor is read-only after construction and can be shared across
//! threads using `Arc`. Use [`PredictorHandle`] to swap in a retrained model
//! while requests are being served:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cropcast::{InputRecord, PredictorBuilder, PredictorConfig, PredictorHandle};
//! use std::thread;
//!
//! let config = PredictorConfig::from_env();
//! let handle = PredictorHandle::new(PredictorBuilder::from_config(&config)?.build()?);
//!
//! let mut workers = vec![];
//! for _ in 0..3 {
//!     let handle = handle.clone();
//!     workers.push(thread::spawn(move || {
//!         let record = InputRecord::new("Bihar", "PATNA", 2010, "Rabi", "Wheat", 250.0);
//!         handle.current().predict_single(&record).unwrap();
//!     }));
//! }
//!
//! handle.replace(PredictorBuilder::from_config(&config)?.build()?);
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod model_manager;
pub mod models;
pub mod predictor;
#[cfg(feature = "onnx")]
mod runtime;

pub use chat::{
    yield_label, ChatReply, ChatService, FieldExtractor, RecordPredictor, ResponseGenerator,
};
pub use config::PredictorConfig;
pub use model_manager::{ArtifactDigests, ArtifactSource, ModelError, ModelManager};
pub use models::{
    DirectLoad, InputLayout, LoadPath, ModelKind, ModelLoader, Topology, WeightStore, YieldModel,
};
pub use predictor::{
    InputRecord, InputTable, Predictor, PredictorBuilder, PredictorError, PredictorHandle,
    PredictorInfo, ReferenceDataset, Stage, YieldClass,
};
#[cfg(feature = "onnx")]
pub use runtime::{create_session_builder, GraphOptimization, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}
