use agentmem_core::MemoryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 404 errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain. Absence is
/// not an error in the core, so it has no `MemoryError` variant.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

fn status_for(err: &MemoryError) -> StatusCode {
    match err {
        MemoryError::InvalidIdentifier { .. } | MemoryError::UnknownStatus(_) => {
            StatusCode::BAD_REQUEST
        }
        MemoryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        MemoryError::WaitTimeout { .. }
        | MemoryError::DependencyTimeout { .. }
        | MemoryError::DependencyFailed { .. }
        | MemoryError::DependencyCycle { .. }
        | MemoryError::InvalidTransition { .. }
        | MemoryError::InvalidConfig(_)
        | MemoryError::CorruptRecord { .. }
        | MemoryError::Io(_)
        | MemoryError::Yaml(_)
        | MemoryError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone() });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }

        let status = self
            .0
            .downcast_ref::<MemoryError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
