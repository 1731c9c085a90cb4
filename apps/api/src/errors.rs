use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jobs::client::JobsError;
use crate::llm_client::LlmError;
use crate::translation::translator::TranslateError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslateError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Jobs error: {0}")]
    Jobs(#[from] JobsError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Translation(TranslateError::TargetInvalid) => (
                StatusCode::BAD_REQUEST,
                "TARGET_INVALID",
                TranslateError::TargetInvalid.to_string(),
            ),
            AppError::Translation(e @ TranslateError::TextTooLong { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "TEXT_TOO_LONG", e.to_string())
            }
            AppError::Translation(TranslateError::Remote(e)) | AppError::Llm(e) => llm_response(e),
            AppError::Jobs(JobsError::InvalidQuery(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Jobs(e) => {
                tracing::error!("Jobs upstream error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The job search service is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Remote-call failures map to gateway statuses. Upstream messages are logged,
/// never echoed, since they may quote request headers.
fn llm_response(e: &LlmError) -> (StatusCode, &'static str, String) {
    match e {
        LlmError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "LLM_NOT_CONFIGURED",
            "No language model backend is configured".to_string(),
        ),
        LlmError::Timeout(after) => {
            tracing::error!("LLM timeout after {after:?}");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "The language model did not answer in time".to_string(),
            )
        }
        LlmError::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            "CANCELLED",
            "The request was cancelled".to_string(),
        ),
        LlmError::Api { .. } | LlmError::Network(_) | LlmError::BadResponse(_) => {
            tracing::error!("LLM error: {e}");
            (
                StatusCode::BAD_GATEWAY,
                upstream_code(e),
                "An AI processing error occurred".to_string(),
            )
        }
    }
}

fn upstream_code(e: &LlmError) -> &'static str {
    match e {
        LlmError::Api { .. } => "REMOTE_HTTP_ERROR",
        LlmError::BadResponse(_) => "REMOTE_BAD_RESPONSE",
        _ => "NETWORK_ERROR",
    }
}
