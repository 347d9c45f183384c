use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use educonnect::config::ModelConfig;
use educonnect::flows::*;
use serde_json::{json, Value};

const API_KEY: &str = "test-key";

/// What the stub provider saw and what it answers with.
#[derive(Clone)]
struct Stub {
    reply: (StatusCode, Value),
    seen: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn generate_content(
    State(stub): State<Stub>,
    Path(rest): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "message": "API key not valid" } })),
        );
    }
    stub.seen.lock().unwrap().push((rest, body));
    let (status, reply) = stub.reply.clone();
    (status, Json(reply))
}

async fn spawn_provider(status: StatusCode, reply: Value) -> (SocketAddr, Stub) {
    let stub = Stub {
        reply: (status, reply),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1beta/models/{*rest}", post(generate_content))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, stub)
}

fn config_for(addr: SocketAddr, key: &str) -> ModelConfig {
    let mut config = ModelConfig::with_endpoint(format!("http://{}/v1beta", addr), key);
    config.model = "test-model".to_string();
    config
}

fn text_reply(parts: &[&str]) -> Value {
    let parts: Vec<Value> = parts.iter().map(|t| json!({ "text": t })).collect();
    json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    })
}

fn lesson() -> LessonContext {
    LessonContext {
        lesson_title: "Force and Pressure".to_string(),
        lesson_summary: "Forces as pushes and pulls, and pressure as force per unit area."
            .to_string(),
        key_topics: vec!["Contact forces".to_string(), "Pressure".to_string()],
        learning_outcomes: vec!["Define pressure".to_string()],
    }
}

mod gen_ai_client {
    use super::*;

    #[tokio::test]
    async fn joins_text_parts_of_first_candidate() {
        let (addr, stub) = spawn_provider(StatusCode::OK, text_reply(&["{\"a\":", " 1}"])).await;
        let client = GenAiClient::new(&config_for(addr, API_KEY)).unwrap();

        let text = client.generate("Say hello").await.unwrap();

        assert_eq!(text, "{\"a\": 1}");
        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "test-model:generateContent");
        assert_eq!(seen[0].1["contents"][0]["parts"][0]["text"], "Say hello");
        assert_eq!(
            seen[0].1["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn provider_errors_keep_status_and_body() {
        let (addr, _stub) = spawn_provider(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "message": "quota exhausted" } }),
        )
        .await;
        let client = GenAiClient::new(&config_for(addr, API_KEY)).unwrap();

        let err = client.generate("Say hello").await.unwrap_err();

        match err {
            FlowError::Provider { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("quota exhausted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_api_key_is_a_provider_error() {
        let (addr, stub) = spawn_provider(StatusCode::OK, text_reply(&["{}"])).await;
        let client = GenAiClient::new(&config_for(addr, "wrong-key")).unwrap();

        let err = client.generate("Say hello").await.unwrap_err();

        assert!(matches!(err, FlowError::Provider { status: 403, .. }));
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_candidates_is_an_empty_response() {
        let (addr, _stub) = spawn_provider(StatusCode::OK, json!({ "candidates": [] })).await;
        let client = GenAiClient::new(&config_for(addr, API_KEY)).unwrap();

        let err = client.generate("Say hello").await.unwrap_err();

        assert!(matches!(err, FlowError::EmptyResponse));
    }
}

mod flows_over_http {
    use super::*;

    #[tokio::test]
    async fn quiz_round_trips_through_the_provider() {
        let quiz = json!({
            "title": "Force and Pressure",
            "questions": [{
                "question": "What is the SI unit of pressure?",
                "options": ["Pascal", "Newton", "Joule", "Watt"],
                "correct_answer": "Pascal"
            }]
        });
        let (addr, stub) =
            spawn_provider(StatusCode::OK, text_reply(&[&quiz.to_string()])).await;
        let flows = Flows::from_config(&config_for(addr, API_KEY)).unwrap();

        let result = flows
            .generate_quiz(&QuizInput {
                lesson: lesson(),
                question_count: 1,
            })
            .await
            .unwrap();

        assert_eq!(result.questions[0].correct_answer, "Pascal");
        assert_eq!(flows.model(), "test-model");

        let seen = stub.seen.lock().unwrap();
        let prompt = seen[0].1["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Force and Pressure"));
        assert!(prompt.contains("- Contact forces"));
        assert!(prompt.contains("\"correct_answer\""));
    }

    #[tokio::test]
    async fn non_json_model_text_is_malformed() {
        let (addr, _stub) =
            spawn_provider(StatusCode::OK, text_reply(&["Sure! Here is an answer."])).await;
        let flows = Flows::from_config(&config_for(addr, API_KEY)).unwrap();

        let err = flows
            .tutor(&TutorInput {
                lesson: lesson(),
                question: "What is pressure?".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Malformed(_)));
    }

    #[tokio::test]
    async fn missing_key_gives_unconfigured_flows() {
        let flows = Flows::from_config(&ModelConfig::default()).unwrap();

        let err = flows
            .tutor(&TutorInput {
                lesson: lesson(),
                question: "What is pressure?".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::NotConfigured));
        assert_eq!(flows.model(), "unconfigured");
    }
}
