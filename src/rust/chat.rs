//! Boundary for conversational front-ends.
//!
//! Field extraction and free-text answers are delegated to external services
//! behind [`FieldExtractor`] and [`ResponseGenerator`]. [`ChatService`] runs
//! the predictor on every extracted record and assembles the markdown reply.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::predictor::{InputRecord, Predictor, PredictorError, PredictorHandle, Stage, YieldClass};

/// Renders a label the way every front-end shows it
pub fn yield_label(class: YieldClass) -> &'static str {
    match class {
        YieldClass::High => "HIGH",
        YieldClass::Less => "LESS",
    }
}

/// Pulls zero or more crop records, as JSON objects keyed by column header,
/// out of a free-text message.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, message: &str) -> anyhow::Result<Vec<Value>>;
}

/// Produces the assistant's answer given the message and the model summary.
pub trait ResponseGenerator: Send + Sync {
    fn respond(&self, message: &str, ml_result: &str) -> anyhow::Result<String>;
}

/// Anything that can label a single record.
pub trait RecordPredictor: Send + Sync {
    fn predict_record(&self, record: &InputRecord) -> Result<YieldClass, PredictorError>;
}

impl RecordPredictor for Predictor {
    fn predict_record(&self, record: &InputRecord) -> Result<YieldClass, PredictorError> {
        self.predict_single(record)
    }
}

impl RecordPredictor for PredictorHandle {
    fn predict_record(&self, record: &InputRecord) -> Result<YieldClass, PredictorError> {
        self.current().predict_single(record)
    }
}

impl<T: RecordPredictor + ?Sized> RecordPredictor for Arc<T> {
    fn predict_record(&self, record: &InputRecord) -> Result<YieldClass, PredictorError> {
        (**self).predict_record(record)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// Markdown reply shown to the user
    pub response: String,
    /// One line per extracted record, success or failure
    #[serde(rename = "ml_result")]
    pub ml_results: Vec<String>,
    pub extracted: Vec<Value>,
}

pub struct ChatService<P, E, G> {
    predictor: P,
    extractor: E,
    generator: G,
}

impl<P, E, G> ChatService<P, E, G>
where
    P: RecordPredictor,
    E: FieldExtractor,
    G: ResponseGenerator,
{
    pub fn new(predictor: P, extractor: E, generator: G) -> Self {
        Self {
            predictor,
            extractor,
            generator,
        }
    }

    /// Handles one user message. A record the model cannot process is
    /// reported in its own result line and does not affect the others.
    pub fn handle(&self, message: &str) -> anyhow::Result<ChatReply> {
        let extracted = self.extractor.extract(message)?;
        debug!("Extracted {} crop records", extracted.len());

        let ml_results: Vec<String> = extracted.iter().map(|value| self.describe(value)).collect();
        let answer = self.generator.respond(message, &ml_results.join("\n"))?;

        Ok(ChatReply {
            response: format_markdown_response(&extracted, &ml_results, &answer),
            ml_results,
            extracted,
        })
    }

    fn describe(&self, value: &Value) -> String {
        let prediction = InputRecord::from_json(value)
            .map_err(|e| e.at(Stage::Validate))
            .and_then(|record| self.predictor.predict_record(&record));
        match prediction {
            Ok(class) => format!(
                "Based on the ML model, the predicted crop yield will be **{}**.",
                yield_label(class)
            ),
            Err(e) => {
                warn!("Record skipped by the model: {}", e);
                format!("ML model could not process this crop: {}", e)
            }
        }
    }
}

pub fn format_markdown_response(details: &[Value], ml_results: &[String], answer: &str) -> String {
    let mut md = String::from("### Details provided\n");
    if details.is_empty() {
        md.push_str("_No structured crop details provided._");
    } else {
        for (i, record) in details.iter().enumerate() {
            md.push_str(&format!("\n**Crop {}:**\n", i + 1));
            let lines: Vec<String> = match record.as_object() {
                Some(object) => object
                    .iter()
                    .map(|(key, value)| format!("- **{}**: {}", key, render_value(value)))
                    .collect(),
                None => vec![format!("- {}", record)],
            };
            md.push_str(&lines.join("\n"));
        }
    }

    md.push_str("\n\n### ML Model Analysis\n");
    if ml_results.is_empty() {
        md.push_str("_ML model was not used due to insufficient details._");
    } else {
        for (i, result) in ml_results.iter().enumerate() {
            md.push_str(&format!("\n**Crop {}:** {}", i + 1, result));
        }
    }

    md.push_str("\n\n### Combined Analysis\n");
    md.push_str(answer);
    md
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
