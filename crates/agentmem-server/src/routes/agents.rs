use agentmem_core::ActionRecord;
use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/agents/{agent_id}/actions — all live actions of one agent.
pub async fn list_agent_actions(
    State(app): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<ActionRecord>>, AppError> {
    Ok(Json(app.memory.list_agent(&agent_id).await?))
}
