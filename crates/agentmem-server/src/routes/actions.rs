use std::time::Duration;

use agentmem_core::ActionRecord;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Default age after which an active action counts as stale.
const DEFAULT_STALE_SECS: u64 = 600;

/// GET /api/actions/active — every pending or in-progress action.
pub async fn list_active(
    State(app): State<AppState>,
) -> Result<Json<Vec<ActionRecord>>, AppError> {
    Ok(Json(app.memory.list_active().await?))
}

#[derive(Debug, Deserialize)]
pub struct StaleQuery {
    pub max_age_secs: Option<u64>,
}

/// GET /api/actions/stale?max_age_secs=N — active actions not updated recently.
pub async fn list_stale(
    State(app): State<AppState>,
    Query(query): Query<StaleQuery>,
) -> Result<Json<Vec<ActionRecord>>, AppError> {
    let max_age = Duration::from_secs(query.max_age_secs.unwrap_or(DEFAULT_STALE_SECS));
    Ok(Json(app.memory.list_stale(max_age).await?))
}

/// GET /api/actions/{agent_id}/{action_id} — one action record.
pub async fn get_action(
    State(app): State<AppState>,
    Path((agent_id, action_id)): Path<(String, String)>,
) -> Result<Json<ActionRecord>, AppError> {
    match app.memory.read(&agent_id, &action_id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::not_found(format!(
            "action '{agent_id}:{action_id}' not found"
        ))),
    }
}
