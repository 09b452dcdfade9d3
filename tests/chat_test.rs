mod common;

use std::sync::Arc;

use common::{assam_rice, Fixture};
use cropcast::{
    yield_label, ChatService, FieldExtractor, ModelKind, PredictorHandle, ResponseGenerator,
};
use serde_json::{json, Value};

struct FixedExtractor(Vec<Value>);

impl FieldExtractor for FixedExtractor {
    fn extract(&self, _message: &str) -> anyhow::Result<Vec<Value>> {
        Ok(self.0.clone())
    }
}

struct EchoGenerator;

impl ResponseGenerator for EchoGenerator {
    fn respond(&self, message: &str, ml_result: &str) -> anyhow::Result<String> {
        Ok(format!("You said {:?}.\n{}", message, ml_result))
    }
}

struct FailingExtractor;

impl FieldExtractor for FailingExtractor {
    fn extract(&self, _message: &str) -> anyhow::Result<Vec<Value>> {
        anyhow::bail!("extraction service unavailable")
    }
}

#[test]
fn test_failures_are_isolated_per_record() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let predictor = Arc::new(fixture.predictor(ModelKind::FeedForward));
    let expected = yield_label(predictor.predict_single(&assam_rice())?);

    let records = vec![
        json!({"State_Name": "Assam", "District_Name": "X", "Crop_Year": 2013,
               "Season": "Kharif", "Crop": "Rice", "Area": 1000.0}),
        json!({"State_Name": "Assam", "District_Name": "X", "Crop_Year": 2013,
               "Season": "Kharif", "Crop": "Saffron", "Area": 10.0}),
        json!({"State_Name": "Bihar", "Crop": "Wheat"}),
    ];
    let service = ChatService::new(Arc::clone(&predictor), FixedExtractor(records), EchoGenerator);
    let reply = service.handle("How will my crops do?")?;

    assert_eq!(reply.extracted.len(), 3);
    assert_eq!(reply.ml_results.len(), 3);
    assert_eq!(
        reply.ml_results[0],
        format!("Based on the ML model, the predicted crop yield will be **{}**.", expected)
    );
    assert!(reply.ml_results[1].starts_with("ML model could not process this crop:"));
    assert!(reply.ml_results[1].contains("Saffron"));
    assert!(reply.ml_results[2].starts_with("ML model could not process this crop:"));

    assert!(reply.response.starts_with("### Details provided\n"));
    assert!(reply.response.contains("**Crop 3:**"));
    assert!(reply.response.contains("### ML Model Analysis"));
    assert!(reply.response.contains("### Combined Analysis\nYou said \"How will my crops do?\"."));
    Ok(())
}

#[test]
fn test_message_without_records() -> anyhow::Result<()> {
    let fixture = Fixture::new();
    let handle = PredictorHandle::new(fixture.predictor(ModelKind::FeedForward));
    let service = ChatService::new(handle, FixedExtractor(vec![]), EchoGenerator);

    let reply = service.handle("hello")?;
    assert!(reply.ml_results.is_empty());
    assert!(reply.response.contains("_No structured crop details provided._"));
    assert!(reply.response.contains("_ML model was not used due to insufficient details._"));

    let body = serde_json::to_value(&reply)?;
    assert!(body.get("ml_result").is_some());
    Ok(())
}

#[test]
fn test_extractor_failure_propagates() {
    let fixture = Fixture::new();
    let predictor = fixture.predictor(ModelKind::FeedForward);
    let service = ChatService::new(predictor, FailingExtractor, EchoGenerator);
    let err = service.handle("hello").unwrap_err();
    assert!(err.to_string().contains("unavailable"));
}
