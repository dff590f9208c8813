//! Action record data model.
//!
//! An `ActionRecord` is the only thing agents share: one record per
//! `(agent_id, action_id)`, overwritten in place as the owning agent makes
//! progress. Field names on the wire are camelCase (`agentId`, `createdAt`, ...)
//! and `type` is spelled literally, so records written by any client of the
//! store decode here unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MemoryError, Result};
use crate::key::SEPARATOR;

/// Open JSON object used for both `payload` and `result`.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Current wall-clock time truncated to whole milliseconds, the precision the
/// wire format keeps.
pub fn now_ms() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap_or_else(Utc::now)
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an action.
///
/// Transitions: `Pending → InProgress → Completed | Failed`. Terminal states
/// are final; an agent that needs to redo work publishes a new action id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a record currently in `self` may be overwritten with `next`.
    pub fn can_move_to(&self, next: ActionStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(MemoryError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRef
// ---------------------------------------------------------------------------

/// Pointer to another agent's action, used for dependencies and error context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRef {
    pub agent_id: String,
    pub action_id: String,
}

impl ActionRef {
    pub fn new(agent_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            action_id: action_id.into(),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.agent_id, SEPARATOR, self.action_id)
    }
}

/// Parses `agent:action`, the same shape the key codec uses.
impl FromStr for ActionRef {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let Some((agent_id, action_id)) = s.split_once(SEPARATOR) else {
            return Err(MemoryError::InvalidIdentifier {
                value: s.to_string(),
                reason: "expected <agentId>:<actionId>",
            });
        };
        crate::key::validate_id(agent_id)?;
        crate::key::validate_id(action_id)?;
        Ok(Self::new(agent_id, action_id))
    }
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

/// The serialized unit of shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub agent_id: String,
    pub action_id: String,
    /// Free-form category, e.g. "code_generation" or "review".
    #[serde(rename = "type")]
    pub action_type: String,
    pub status: ActionStatus,
    #[serde(default)]
    pub payload: Payload,
    /// Present only once the status is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    /// Actions this one conventionally waits on. Not enforced by the store.
    #[serde(default)]
    pub dependencies: Vec<ActionRef>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ActionRecord {
    /// Build a fresh record from a publish request, stamped with `now`.
    pub fn from_new(agent_id: &str, action_id: &str, action: NewAction, now: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            action_id: action_id.to_string(),
            action_type: action.action_type,
            status: action.status,
            payload: action.payload,
            result: None,
            dependencies: action.dependencies,
            created_at: now,
            updated_at: now,
        }
    }

    /// Minimal stand-in used when an action is completed without ever having
    /// been published.
    pub fn synthesized(agent_id: &str, action_id: &str, now: DateTime<Utc>) -> Self {
        Self::from_new(agent_id, action_id, NewAction::new("unknown"), now)
    }

    pub fn action_ref(&self) -> ActionRef {
        ActionRef::new(&self.agent_id, &self.action_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored value. `key` only feeds the error message.
    pub fn from_bytes(key: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| MemoryError::CorruptRecord {
            key: key.to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// NewAction
// ---------------------------------------------------------------------------

/// What an agent hands to `publish`: everything except identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAction {
    pub action_type: String,
    pub status: ActionStatus,
    pub payload: Payload,
    pub dependencies: Vec<ActionRef>,
}

impl NewAction {
    /// A `Pending` action with an empty payload and no dependencies.
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            status: ActionStatus::Pending,
            payload: Payload::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn in_progress(mut self) -> Self {
        self.status = ActionStatus::InProgress;
        self
    }

    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set a single payload field, e.g. `progress: "10%"`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, dependency: ActionRef) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ActionRef>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
