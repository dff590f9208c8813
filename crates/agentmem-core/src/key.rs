//! Store key codec.
//!
//! Every record lives under `<namespace>:<agentId>:<actionId>`. Ids may not
//! be empty or contain the separator, which makes the encoding injective and
//! lets a prefix scan over `<namespace>:` or `<namespace>:<agentId>:` select
//! exactly one namespace or one agent.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{MemoryError, Result};

pub const SEPARATOR: char = ':';

static NAMESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn namespace_re() -> &'static Regex {
    NAMESPACE_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap())
}

/// Namespaces are plain tokens: no separator, and nothing a Redis `SCAN MATCH`
/// pattern would treat as a wildcard.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.len() > 128 || !namespace_re().is_match(namespace) {
        return Err(MemoryError::InvalidConfig(format!(
            "namespace '{namespace}' must be 1-128 characters of [A-Za-z0-9_.-]"
        )));
    }
    Ok(())
}

/// Reject ids the codec cannot encode unambiguously.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(MemoryError::InvalidIdentifier {
            value: id.to_string(),
            reason: "must not be empty",
        });
    }
    if id.contains(SEPARATOR) {
        return Err(MemoryError::InvalidIdentifier {
            value: id.to_string(),
            reason: "must not contain ':'",
        });
    }
    Ok(())
}

pub fn encode(namespace: &str, agent_id: &str, action_id: &str) -> Result<String> {
    validate_id(agent_id)?;
    validate_id(action_id)?;
    Ok(format!("{namespace}{SEPARATOR}{agent_id}{SEPARATOR}{action_id}"))
}

/// Inverse of [`encode`]. Keys from another namespace or with the wrong number
/// of segments decode to `None`.
pub fn decode(namespace: &str, key: &str) -> Option<(String, String)> {
    let rest = key
        .strip_prefix(namespace)?
        .strip_prefix(SEPARATOR)?;
    let (agent_id, action_id) = rest.split_once(SEPARATOR)?;
    if agent_id.is_empty() || action_id.is_empty() || action_id.contains(SEPARATOR) {
        return None;
    }
    Some((agent_id.to_string(), action_id.to_string()))
}

/// Prefix covering every key in `namespace`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{namespace}{SEPARATOR}")
}

/// Prefix covering every action of one agent.
pub fn agent_prefix(namespace: &str, agent_id: &str) -> Result<String> {
    validate_id(agent_id)?;
    Ok(format!("{namespace}{SEPARATOR}{agent_id}{SEPARATOR}"))
}
