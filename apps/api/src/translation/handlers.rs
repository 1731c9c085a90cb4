//! Axum route handlers for the Translation API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::translation::models::{TranslateInput, TranslationResult};

pub const MAX_BATCH_ITEMS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<TranslateInput>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<TranslationResult>,
}

/// POST /api/v1/translate
pub async fn handle_translate(
    State(state): State<AppState>,
    Json(input): Json<TranslateInput>,
) -> Result<Json<TranslationResult>, AppError> {
    let request_id = Uuid::new_v4();
    let target = input.target_lang.clone();
    let cancel = state.shutdown.child_token();

    let result = state.translator.translate_text(input, &cancel).await?;

    info!(
        "translate {request_id}: target={target} ok={} provider={:?}",
        result.ok, result.provider
    );
    Ok(Json(result))
}

/// POST /api/v1/translate/batch
pub async fn handle_translate_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    if req.items.len() > MAX_BATCH_ITEMS {
        return Err(AppError::PayloadTooLarge(format!(
            "A batch holds at most {MAX_BATCH_ITEMS} items, got {}",
            req.items.len()
        )));
    }

    let request_id = Uuid::new_v4();
    let count = req.items.len();
    let cancel = state.shutdown.child_token();

    let results = state.translator.translate_batch(req.items, &cancel).await;

    let failed = results.iter().filter(|r| !r.ok).count();
    info!("translate batch {request_id}: {count} item(s), {failed} not ok");
    Ok(Json(BatchResponse { results }))
}
