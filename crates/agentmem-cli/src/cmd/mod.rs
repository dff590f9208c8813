pub mod action;
pub mod cleanup;
pub mod config;
pub mod init;
pub mod query;
pub mod serve;

use agentmem_core::{MemoryConfig, Payload, SharedMemory};
use anyhow::Context;
use std::path::Path;

/// Load the root's config and connect to the store it names.
pub async fn connect(root: &Path) -> anyhow::Result<SharedMemory> {
    let config = MemoryConfig::load(root).context("failed to load .agentmem/config.yaml")?;
    SharedMemory::open(&config, root)
        .await
        .with_context(|| format!("failed to open {} store", config.store.kind()))
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}

/// Parse a `--payload` / `--result` argument. It must be a JSON object.
pub fn parse_object(raw: &str, what: &str) -> anyhow::Result<Payload> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("{what} is not valid JSON"))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("{what} must be a JSON object, got {other}"),
    }
}
