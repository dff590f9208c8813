use thiserror::Error;

use crate::record::{ActionRecord, ActionRef, ActionStatus};

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("timed out after {timeout_ms}ms waiting for {target} (last seen: {})", last_status(.last_seen))]
    WaitTimeout {
        target: ActionRef,
        timeout_ms: u64,
        /// Last record observed while polling, `None` if the action never appeared.
        last_seen: Option<Box<ActionRecord>>,
    },

    #[error("dependency {dependency} did not complete: {source}")]
    DependencyTimeout {
        dependency: ActionRef,
        #[source]
        source: Box<MemoryError>,
    },

    #[error("dependency {dependency} failed")]
    DependencyFailed {
        dependency: ActionRef,
        record: Box<ActionRecord>,
    },

    #[error("dependency cycle: {}", .path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    DependencyCycle { path: Vec<ActionRef> },

    #[error("invalid transition for {target}: {from} -> {to}")]
    InvalidTransition {
        target: ActionRef,
        from: String,
        to: ActionStatus,
    },

    #[error("unknown action status '{0}' (expected pending, in_progress, completed or failed)")]
    UnknownStatus(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("corrupt record at '{key}': {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn last_status(last_seen: &Option<Box<ActionRecord>>) -> &'static str {
    match last_seen {
        Some(record) => record.status.as_str(),
        None => "never published",
    }
}

impl MemoryError {
    /// Routine "not done yet" outcomes, as opposed to failures of the store
    /// or of the caller's input.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. } | Self::DependencyTimeout { .. })
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
