use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use csf_agents::ChatOrchestrator;
use csf_api::{
    build_app, build_router, ApiState, AppConfig, ConfigError, CorsPolicy, API_KEY_VAR,
    GENERIC_FAILURE_DETAIL,
};
use csf_core::REFUSAL_MESSAGE;
use csf_llm::{LanguageModel, LlmError};
use csf_observability::AppMetrics;
use csf_retrieval::{HashEmbeddingModel, ReferenceIndex};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

fn reference_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../reference")
}

struct StubModel {
    reply: Result<String, u16>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(status),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    fn model_id(&self) -> &str {
        "stub/model"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(LlmError::Status {
                status: *status,
                body: "upstream says: key sk-or-secret revoked".to_string(),
            }),
        }
    }
}

fn app_with(model: Arc<StubModel>, cors: CorsPolicy) -> Router {
    let orchestrator = ChatOrchestrator::new(model, AppMetrics::shared());
    build_router(ApiState::new(orchestrator, cors))
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn out_of_scope_message_is_refused_without_model_call() {
    let model = StubModel::replying("unused");
    let app = app_with(model.clone(), CorsPolicy::Any);

    let response = app
        .oneshot(chat_request(json!({ "message": "Tell me about something outside NIST" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert_eq!(parsed["agent_mode"], "refuse");
    assert_eq!(parsed["response"], REFUSAL_MESSAGE);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn general_chat_returns_sanitized_reply() {
    let model = StubModel::replying("**Hello** world");
    let app = app_with(model.clone(), CorsPolicy::Any);

    let response = app
        .oneshot(chat_request(json!({ "message": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert_eq!(parsed, json!({ "agent_mode": "general", "response": "Hello world" }));
    assert_eq!(model.calls(), 1);
    assert!(model.prompts.lock()[0].ends_with("USER QUESTION:\nhi\n"));
}

#[tokio::test]
async fn teach_mode_is_reported() {
    let model = StubModel::replying("- The Govern function sets strategy.");
    let app = app_with(model, CorsPolicy::Any);

    let response = app
        .oneshot(chat_request(json!({ "message": "Explain the Govern function" })))
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["agent_mode"], "teach");
    assert_eq!(parsed["response"], "The Govern function sets strategy.");
}

#[tokio::test]
async fn invalid_bodies_are_rejected_before_the_model() {
    let model = StubModel::replying("unused");

    for body in [json!({}), json!({ "message": "" }), json!({ "message": "   " }), json!({ "message": 7 })] {
        let response = app_with(model.clone(), CorsPolicy::Any)
            .oneshot(chat_request(body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");

        let parsed = json_body(response).await;
        assert_eq!(parsed["error"], "invalid_request");
    }

    let malformed = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from("{\"message\":"))
        .unwrap();
    let response = app_with(model.clone(), CorsPolicy::Any)
        .oneshot(malformed)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn upstream_failure_returns_generic_500() {
    let model = StubModel::failing(401);
    let app = app_with(model.clone(), CorsPolicy::Any);

    let response = app
        .oneshot(chat_request(json!({ "message": "What is the Detect function?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let parsed = json_body(response).await;
    assert_eq!(parsed["error"], "chat_failed");
    assert_eq!(parsed["detail"], GENERIC_FAILURE_DETAIL);
    assert!(!parsed.to_string().contains("sk-or-secret"));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn health_reports_model_and_counters() {
    let model = StubModel::replying("ok");
    let orchestrator = ChatOrchestrator::new(model, AppMetrics::shared());
    let state = ApiState::new(orchestrator, CorsPolicy::Any);
    let app = build_router(state.clone());

    let _ = app
        .clone()
        .oneshot(chat_request(json!({ "message": "outside nist please" })))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = json_body(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["model"], "stub/model");
    assert_eq!(parsed["retrieval_enabled"], false);
    assert_eq!(parsed["metrics"]["requests_total"], 1);
    assert_eq!(parsed["metrics"]["refusals_total"], 1);
    assert!(parsed["timestamp_utc"].as_str().is_some());
}

#[tokio::test]
async fn wildcard_cors_mirrors_origin_with_credentials() {
    let app = app_with(StubModel::replying("ok"), CorsPolicy::Any);

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/chat")
        .header("origin", "https://csf.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(preflight).await.unwrap();
    assert!(response.status().is_success());

    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "https://csf.example");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert!(headers["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("POST"));
}

#[tokio::test]
async fn origin_list_blocks_unknown_origins() {
    let cors = CorsPolicy::Origins(vec!["https://allowed.example".to_string()]);

    let request = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app_with(StubModel::replying("ok"), cors.clone())
        .oneshot(request("https://allowed.example"))
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://allowed.example"
    );

    let blocked = app_with(StubModel::replying("ok"), cors)
        .oneshot(request("https://evil.example"))
        .await
        .unwrap();
    assert!(blocked.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = app_with(StubModel::replying("ok"), CorsPolicy::Any);

    let generated = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(generated.headers().get("x-request-id").is_some());
    assert_eq!(generated.headers()["x-content-type-options"], "nosniff");

    let supplied = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(supplied.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn reference_passages_reach_the_prompt() {
    let index = ReferenceIndex::from_dir(
        reference_root(),
        Some(Arc::new(HashEmbeddingModel::default())),
    )
    .unwrap();
    assert!(index.stats().docs_loaded >= 7);

    let model = StubModel::replying("Restore from verified backups.");
    let orchestrator = ChatOrchestrator::new(model.clone(), AppMetrics::shared())
        .with_retriever(Arc::new(index), 5);
    let app = build_router(ApiState::new(orchestrator, CorsPolicy::Any));

    let response = app
        .oneshot(chat_request(
            json!({ "message": "How do we restore operations after a ransomware incident?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let prompt = model.prompts.lock()[0].clone();
    assert!(prompt.contains("NIST CSF REFERENCE:\n"));
    assert!(prompt.contains("RC.RP"));
    assert!(prompt.ends_with(
        "USER QUESTION:\nHow do we restore operations after a ransomware incident?\n"
    ));
}

#[test]
fn startup_fails_fast_without_credential() {
    let error = AppConfig::from_lookup(|_| None).unwrap_err();
    assert_eq!(error, ConfigError::MissingCredential(API_KEY_VAR));
    assert!(error.to_string().contains("OPENROUTER_API_KEY"));
}

#[tokio::test]
async fn build_app_wires_reference_index_from_config() {
    let root = reference_root().to_string_lossy().to_string();
    let vars = HashMap::from([
        (API_KEY_VAR.to_string(), "sk-test".to_string()),
        ("CSF_REFERENCE_ROOT".to_string(), root),
    ]);
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let app = build_app(&config).unwrap();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let parsed = json_body(response).await;
    assert_eq!(parsed["model"], "deepseek/deepseek-chat");
    assert_eq!(parsed["retrieval_enabled"], true);
}

#[test]
fn build_app_rejects_missing_reference_root() {
    let vars = HashMap::from([
        (API_KEY_VAR.to_string(), "sk-test".to_string()),
        ("CSF_REFERENCE_ROOT".to_string(), "/nonexistent/csf-reference".to_string()),
    ]);
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
    assert!(build_app(&config).is_err());
}
