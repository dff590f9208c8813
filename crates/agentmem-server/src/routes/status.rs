use agentmem_core::StatusSummary;
use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status — per-agent summary of the namespace.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<StatusSummary>, AppError> {
    let summary = app.memory.aggregate_status().await?;
    Ok(Json(summary))
}
