// Integration tests for Chat Predictor
//
// These tests run full prediction sessions against a mock completion service,
// covering request shape, event-stream decoding, simulated delivery and
// failure reporting.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tokio::time::Duration;

use chat_predictor::{
    config::{Config, DeliveryMode},
    error::PredictorError,
    models::{LabelLanguage, Locale, MessageType, PredictionSet},
    predictor::{PredictionRequest, Predictor},
    simulated::SimulationCadence,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn test_config(server: &ServerGuard, delivery_mode: DeliveryMode) -> Config {
    Config {
        api_url: server.url(),
        api_key: "sk-test-key".to_string(),
        model: "test/model".to_string(),
        delivery_mode,
        first_token_timeout: 5,
        http_request_timeout: 10,
        ..Config::default()
    }
}

fn test_request() -> PredictionRequest {
    PredictionRequest::new("# Dialogue Record\n[Other]: want to grab lunch?", MessageType::Other)
        .with_timestamp(Some("2024-05-01 11:30:00".to_string()))
}

/// Zero-delay cadence so simulated sessions finish instantly
fn instant_cadence() -> SimulationCadence {
    SimulationCadence {
        step: 2,
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        slot_pause: Duration::ZERO,
    }
}

fn content_frame(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"id": "gen-1", "choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

fn reasoning_frame(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"id": "gen-1", "choices": [{"index": 0, "delta": {"reasoning_content": text}}]})
    )
}

fn sse_body(frames: &[String]) -> String {
    let mut body = String::from(": OPENROUTER PROCESSING\n\n");
    for frame in frames {
        body.push_str(frame);
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn run_stream(
    predictor: &Predictor,
    request: &PredictionRequest,
) -> (Result<PredictionSet, PredictorError>, Vec<PredictionSet>) {
    let mut snapshots = Vec::new();
    let result = predictor
        .generate_stream(request, |snapshot| snapshots.push(snapshot))
        .await;
    (result, snapshots)
}

// ==================================================================================================
// Real Streaming Tests
// ==================================================================================================

#[tokio::test]
async fn test_real_stream_end_to_end() {
    let mut server = Server::new_async().await;
    let body = sse_body(&[
        content_frame("<think>They sound "),
        content_frame("hungry.</think>\nPrediction 1 (Positive): \"Sure"),
        content_frame(", let's go!\"\nPrediction 2 (Negative): Not today.\n"),
        content_frame("Prediction 3 (Neutral): Maybe at one?"),
    ]);
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "test/model",
            "stream": true,
            "n": 1
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let (result, snapshots) = run_stream(&predictor, &test_request()).await;
    let final_set = result.unwrap();

    mock.assert_async().await;
    assert_eq!(
        final_set.texts(),
        vec!["Sure, let's go!", "Not today.", "Maybe at one?"]
    );
    assert_eq!(final_set.reasoning(), Some("They sound hungry."));

    // One snapshot per frame plus the final one
    assert_eq!(snapshots.len(), 5);
    assert!(snapshots.iter().all(|s| s.len() == 3));
    assert_eq!(snapshots.last(), Some(&final_set));
    assert_eq!(snapshots[0].reasoning(), Some("They sound"));
    assert!(snapshots[0].texts().iter().all(|t| t.is_empty()));
}

#[tokio::test]
async fn test_real_stream_reasoning_field_and_chinese_labels() {
    let mut server = Server::new_async().await;
    let body = sse_body(&[
        reasoning_frame("对方在约饭"),
        content_frame("预测1（正向）：好呀！\n预测2（负向）：不去。\n"),
        content_frame("预测3（中立）：看情况。"),
    ]);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let (result, _) = run_stream(&predictor, &test_request()).await;
    let final_set = result.unwrap();

    assert_eq!(final_set.texts(), vec!["好呀！", "不去。", "看情况。"]);
    assert_eq!(final_set.reasoning(), Some("对方在约饭"));
}

#[tokio::test]
async fn test_real_stream_malformed_frame_skipped() {
    let mut server = Server::new_async().await;
    let body = sse_body(&[
        content_frame("Prediction 1: one\n"),
        "data: {\"choices\": [{\"delta\": \n\n".to_string(),
        content_frame("Prediction 2: two\nPrediction 3: three"),
    ]);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let (result, snapshots) = run_stream(&predictor, &test_request()).await;

    assert_eq!(result.unwrap().texts(), vec!["one", "two", "three"]);
    // The malformed frame produces no snapshot
    assert_eq!(snapshots.len(), 3);
}

#[tokio::test]
async fn test_real_stream_missing_slots_get_placeholders() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(sse_body(&[content_frame("Prediction 2: only this one")]))
        .create_async()
        .await;

    let config = Config {
        locale: Locale::Zh,
        ..test_config(&server, DeliveryMode::Real)
    };
    let predictor = Predictor::new(&config).unwrap();
    let (result, _) = run_stream(&predictor, &test_request()).await;

    assert_eq!(
        result.unwrap().texts(),
        vec!["[无法生成预测 1]", "only this one", "[无法生成预测 3]"]
    );
}

#[tokio::test]
async fn test_http_error_reported_without_snapshots() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let (result, snapshots) = run_stream(&predictor, &test_request()).await;

    match result {
        Err(err @ PredictorError::Api { .. }) => {
            assert!(err.is_transport());
            assert!(err.to_string().contains("500"));
            assert!(err.to_string().contains("upstream exploded"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert!(snapshots.is_empty());
}

#[tokio::test]
async fn test_unauthorized_reported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "No auth credentials found"}}"#)
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let (result, _) = run_stream(&predictor, &test_request()).await;

    assert!(matches!(result, Err(PredictorError::Api { status: 401, .. })));
}

// ==================================================================================================
// Simulated Delivery Tests
// ==================================================================================================

#[tokio::test]
async fn test_simulated_delivery_end_to_end() {
    let mut server = Server::new_async().await;
    let content = "<think>casual tone</think>\nPrediction 1 (Positive): 'Love to!'\nPrediction 2 (Negative): Busy.\nPrediction 3 (Neutral): Let me check.";
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"stream": false})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "gen-2",
                "model": "test/model",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Simulated))
        .unwrap()
        .with_cadence(instant_cadence());
    let (result, snapshots) = run_stream(&predictor, &test_request()).await;
    let final_set = result.unwrap();

    mock.assert_async().await;
    assert_eq!(final_set.texts(), vec!["Love to!", "Busy.", "Let me check."]);
    assert_eq!(final_set.reasoning(), Some("casual tone"));

    assert_eq!(snapshots.last(), Some(&final_set));
    assert!(snapshots.iter().all(|s| s.reasoning() == Some("casual tone")));
    assert!(snapshots[0].texts().iter().all(|t| t.is_empty()));
    for pair in snapshots.windows(2) {
        for (a, b) in pair[0].slots().iter().zip(pair[1].slots()) {
            assert!(b.text().starts_with(a.text()));
        }
    }
}

#[tokio::test]
async fn test_single_shot_generate() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "choices": [{"message": {
                    "content": "Reasoning Process: short reply fits.\nPrediction 1: ok\nPrediction 2: no\nPrediction 3: hm"
                }}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let final_set = predictor.generate(&test_request()).await.unwrap();

    assert_eq!(final_set.texts(), vec!["ok", "no", "hm"]);
    assert_eq!(final_set.reasoning(), Some("short reply fits."));
}

#[tokio::test]
async fn test_single_shot_without_choices() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(r#"{"id": "gen-3", "choices": []}"#)
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Simulated)).unwrap();
    let result = predictor.generate(&test_request()).await;

    assert!(matches!(result, Err(PredictorError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_secondary_label_language_fallback() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(
            json!({"choices": [{"message": {"content": "Prediction 1: yes\nPrediction 2: no\nPrediction 3: maybe"}}]})
                .to_string(),
        )
        .create_async()
        .await;

    let config = Config {
        label_language: LabelLanguage::Chinese,
        ..test_config(&server, DeliveryMode::Real)
    };
    let predictor = Predictor::new(&config).unwrap();
    let final_set = predictor.generate(&test_request()).await.unwrap();

    assert_eq!(final_set.texts(), vec!["yes", "no", "maybe"]);
}

// ==================================================================================================
// Precondition Tests
// ==================================================================================================

#[tokio::test]
async fn test_missing_credential_rejected_before_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let config = Config {
        api_key: String::new(),
        ..test_config(&server, DeliveryMode::Real)
    };

    assert!(matches!(config.validate(), Err(PredictorError::MissingCredential)));
    assert!(matches!(
        Predictor::new(&config),
        Err(PredictorError::MissingCredential)
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_context_rejected_before_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let predictor = Predictor::new(&test_config(&server, DeliveryMode::Real)).unwrap();
    let (result, snapshots) =
        run_stream(&predictor, &PredictionRequest::new("", MessageType::Me)).await;

    assert!(matches!(result, Err(PredictorError::Validation(_))));
    assert!(snapshots.is_empty());
    mock.assert_async().await;
}
