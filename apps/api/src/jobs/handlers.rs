use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::Value;

use crate::errors::AppError;
use crate::jobs::client::JobsQuery;
use crate::state::AppState;

/// GET /api/v1/jobs
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<Value>, AppError> {
    let body = state.jobs.search(&query).await?;
    Ok(Json(body))
}
