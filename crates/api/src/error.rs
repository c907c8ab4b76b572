use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use csf_agents::ChatError;
use thiserror::Error;
use tracing::warn;

pub const GENERIC_FAILURE_DETAIL: &str =
    "The assistant could not complete this request. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Chat(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Upstream details stay in the server log; the caller gets a fixed message.
        let body = match &self {
            Self::Validation(detail) => {
                warn!(detail = %detail, "rejected chat request");
                serde_json::json!({
                    "error": "invalid_request",
                    "detail": detail,
                })
            }
            Self::Chat(_) => serde_json::json!({
                "error": "chat_failed",
                "detail": GENERIC_FAILURE_DETAIL,
            }),
        };

        (status, Json(body)).into_response()
    }
}
