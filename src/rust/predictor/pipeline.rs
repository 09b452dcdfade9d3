use std::sync::Arc;

use log::debug;
use ndarray::{Array2, ArrayD};

use super::encoder::EncoderBank;
use super::error::{PredictorError, Stage};
use super::record::{InputRecord, InputTable, YieldClass, FEATURE_COLUMNS};
use super::scaler::FeatureScaler;
use super::utils::{decode_rows, shape_for_model};
use crate::models::{LoadedModel, YieldModel};

/// Crop-yield predictor: encoder bank, scaler and model, all read-only after
/// construction.
///
/// # Thread Safety
///
/// `Predictor` is `Send + Sync`; share it across request handlers with `Arc`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use cropcast::{InputRecord, Predictor};
///
/// let predictor = Predictor::builder()
///     .with_kind("lstm")?
///     .with_models_dir("model")
///     .with_dataset_path("dataset/Agriculture In India.csv")
///     .build()?;
///
/// let record = InputRecord::new("Assam", "NAGAON", 2013, "Kharif", "Rice", 1000.0);
/// let class = predictor.predict_single(&record)?;
/// println!("predicted class index: {}", class.index());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Predictor {
    pub(crate) encoders: Arc<EncoderBank>,
    pub(crate) scaler: Arc<FeatureScaler>,
    pub(crate) loaded: LoadedModel,
    pub(crate) kind_label: String,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Predictor>();
    }
};

impl Predictor {
    /// Creates a new PredictorBuilder for fluent construction
    pub fn builder() -> super::builder::PredictorBuilder {
        super::builder::PredictorBuilder::new()
    }

    /// Returns information about the predictor's current state
    pub fn info(&self) -> super::PredictorInfo {
        super::PredictorInfo {
            kind: self.kind_label.clone(),
            registered_kind: self.loaded.kind,
            load_path: self.loaded.path,
            topology_path: self.loaded.topology_path.clone(),
            weights_path: self.loaded.weights_path.clone(),
            num_features: self.scaler.n_features(),
            input_layout: self.loaded.model.input_layout(),
            vocabulary_sizes: self.encoders.vocabulary_sizes().to_vec(),
        }
    }

    pub fn encoders(&self) -> &EncoderBank {
        &self.encoders
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn model(&self) -> &dyn YieldModel {
        self.loaded.model.as_ref()
    }

    /// Predicts one label per record. An empty batch yields an empty result.
    pub fn predict(&self, records: &[InputRecord]) -> Result<Vec<YieldClass>, PredictorError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let scores = self.predict_scores(records)?;
        decode_rows(&scores).map_err(|e| e.at(Stage::Infer))
    }

    /// Predicts every row of a table read from a batch file
    pub fn predict_table(&self, table: &InputTable) -> Result<Vec<YieldClass>, PredictorError> {
        self.predict(&table.records)
    }

    /// Wraps the record into a one-row batch and returns its label
    pub fn predict_single(&self, record: &InputRecord) -> Result<YieldClass, PredictorError> {
        self.predict(std::slice::from_ref(record))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PredictorError::Inference("model returned no rows".into()).at(Stage::Infer)
            })
    }

    /// Returns the raw (rows, 2) class scores
    pub fn predict_scores(&self, records: &[InputRecord]) -> Result<Array2<f32>, PredictorError> {
        let input = self.preprocess(records)?;
        debug!("Running {} model on input of shape {:?}", self.kind_label, input.shape());

        let scores = self
            .loaded
            .model
            .forward(input)
            .map_err(|e| e.at(Stage::Infer))?;
        if scores.nrows() != records.len() {
            return Err(PredictorError::Inference(format!(
                "model returned {} rows for {} records",
                scores.nrows(),
                records.len()
            ))
            .at(Stage::Infer));
        }
        Ok(scores)
    }

    /// Encodes, scales and shapes records into the model's input tensor
    pub fn preprocess(&self, records: &[InputRecord]) -> Result<ArrayD<f32>, PredictorError> {
        for record in records {
            record.validate().map_err(|e| e.at(Stage::Validate))?;
        }

        let mut features = Array2::<f64>::zeros((records.len(), FEATURE_COLUMNS.len()));
        for (mut row, record) in features.outer_iter_mut().zip(records) {
            let codes = self.encoders.encode(record).map_err(|e| e.at(Stage::Encode))?;
            row[0] = codes.state as f64;
            row[1] = codes.district as f64;
            row[2] = f64::from(record.crop_year);
            row[3] = codes.season as f64;
            row[4] = codes.crop as f64;
            row[5] = record.area;
        }

        let scaled = self
            .scaler
            .transform(&features)
            .map_err(|e| e.at(Stage::Scale))?
            .mapv(|v| v as f32);

        shape_for_model(scaled, self.loaded.model.input_layout()).map_err(|e| e.at(Stage::Infer))
    }
}
