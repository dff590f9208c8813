use crate::output::print_json;
use agentmem_core::{paths, MemoryConfig, StoreConfig};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration (defaults filled in)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = redact(MemoryConfig::load(root).context("failed to load config")?);

    if json {
        return print_json(&config);
    }

    println!("Config file:    {}", paths::config_path(root).display());
    println!("Namespace:      {}", config.namespace);
    println!("TTL:            {}s", config.ttl_seconds);
    println!("Poll interval:  {}ms", config.poll_interval_ms);
    println!("Wait timeout:   {}ms", config.wait_timeout_ms);
    println!("Store:          {}", store_display(root, &config.store));
    if config.roles.is_empty() {
        println!("Roles:          (none)");
    } else {
        println!("Roles:");
        for (agent, role) in &config.roles {
            println!("  {:<20} {}", agent, role);
        }
    }
    Ok(())
}

fn redact(mut config: MemoryConfig) -> MemoryConfig {
    if let StoreConfig::Redis { password, .. } = &mut config.store {
        if password.is_some() {
            *password = Some("********".into());
        }
    }
    config
}

fn store_display(root: &Path, store: &StoreConfig) -> String {
    match store {
        StoreConfig::Memory => "memory (process-local)".to_string(),
        StoreConfig::Redb {
            path,
            busy_timeout_ms,
        } => format!(
            "redb ({}, busy timeout {busy_timeout_ms}ms)",
            paths::resolve_store_path(root, path).display()
        ),
        StoreConfig::Redis {
            host, port, db, ..
        } => format!("redis ({host}:{port}, db {db})"),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = MemoryConfig::load(root).context("failed to load config")?;
    let outcome = config.validate();

    if json {
        let value = serde_json::json!({
            "valid": outcome.is_ok(),
            "error": outcome.as_ref().err().map(ToString::to_string),
        });
        print_json(&value)?;
    } else if outcome.is_ok() {
        println!("Config is valid.");
    }

    outcome.context("config validation failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_masks_redis_password() {
        let config = MemoryConfig {
            store: StoreConfig::Redis {
                host: "localhost".into(),
                port: 6379,
                password: Some("hunter2".into()),
                db: 0,
            },
            ..MemoryConfig::default()
        };
        match redact(config).store {
            StoreConfig::Redis { password, .. } => {
                assert_eq!(password.as_deref(), Some("********"))
            }
            other => panic!("unexpected store {other:?}"),
        }
    }
}
