mod config;
mod error;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use csf_agents::ChatOrchestrator;
use csf_core::{ChatRequest, ChatResponse, ResponseSanitizer};
use csf_llm::OpenRouterClient;
use csf_observability::{AppMetrics, MetricsSnapshot};
use csf_retrieval::{HashEmbeddingModel, ReferenceIndex};
use serde::Serialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::{parse_cors_policy, AppConfig, ConfigError, CorsPolicy, API_KEY_VAR};
pub use error::{ApiError, GENERIC_FAILURE_DETAIL};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub metrics: Arc<AppMetrics>,
    pub cors: CorsPolicy,
}

impl ApiState {
    pub fn new(orchestrator: ChatOrchestrator, cors: CorsPolicy) -> Self {
        let metrics = orchestrator.metrics().clone();
        Self {
            orchestrator: Arc::new(orchestrator),
            metrics,
            cors,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    model: String,
    retrieval_enabled: bool,
    metrics: MetricsSnapshot,
}

/// Builds the orchestrator and its collaborators from configuration.
pub fn build_orchestrator(config: &AppConfig) -> Result<ChatOrchestrator> {
    let metrics = AppMetrics::shared();

    let model = Arc::new(
        OpenRouterClient::new(config.llm.clone())
            .context("failed to build language model client")?,
    );

    let mut orchestrator = ChatOrchestrator::new(model, metrics)
        .with_sanitizer(ResponseSanitizer::new(config.hyphen_policy));

    if let Some(root) = config.reference_root.as_ref() {
        let index = ReferenceIndex::from_dir(root, Some(Arc::new(HashEmbeddingModel::default())))
            .with_context(|| format!("failed loading reference index from {}", root.display()))?;
        let stats = index.stats();
        info!(
            root = %root.display(),
            docs = stats.docs_loaded,
            chunks = stats.chunks_loaded,
            "reference index loaded"
        );
        orchestrator = orchestrator.with_retriever(Arc::new(index), config.reference_top_k);
    }

    Ok(orchestrator)
}

pub fn build_app(config: &AppConfig) -> Result<Router> {
    let orchestrator = build_orchestrator(config)?;
    Ok(build_router(ApiState::new(orchestrator, config.cors.clone())))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(build_cors_layer(&state.cors))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        model: state.orchestrator.model_id().to_string(),
        retrieval_enabled: state.orchestrator.retrieval_enabled(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(
    State(state): State<ApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::Validation(
            "message must be a non-empty string".to_string(),
        ));
    }

    let response = state.orchestrator.handle_chat(request).await?;
    Ok(Json(response))
}

fn build_cors_layer(policy: &CorsPolicy) -> CorsLayer {
    match policy {
        // Credentials cannot be combined with a literal `*`, so the origin is mirrored.
        CorsPolicy::Any => CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        CorsPolicy::Origins(origins) => {
            let origins = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true)
        }
    }
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );

    response
}
