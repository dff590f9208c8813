pub mod error;
pub mod routes;
pub mod state;

use agentmem_core::SharedMemory;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
///
/// Every route is a GET: dashboards observe agent state, they never write it.
pub fn build_router(memory: Arc<SharedMemory>) -> Router {
    let app_state = state::AppState::new(memory);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(routes::status::get_status))
        .route("/api/actions/active", get(routes::actions::list_active))
        .route("/api/actions/stale", get(routes::actions::list_stale))
        .route(
            "/api/actions/{agent_id}/{action_id}",
            get(routes::actions::get_action),
        )
        .route(
            "/api/agents/{agent_id}/actions",
            get(routes::agents::list_agent_actions),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the snapshot server on `0.0.0.0:{port}`.
pub async fn serve(memory: Arc<SharedMemory>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(memory, listener).await
}

/// Start the snapshot server on a pre-bound listener.
///
/// The caller can read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(
    memory: Arc<SharedMemory>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let namespace = memory.namespace().to_string();
    let store = memory.store_kind();
    let app = build_router(memory);

    tracing::info!(
        %namespace,
        store,
        "agentmem server listening on http://localhost:{actual_port}"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
