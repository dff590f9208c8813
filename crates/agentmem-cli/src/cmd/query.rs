use crate::cmd::{connect, runtime};
use crate::output::{age, print_json, print_table};
use agentmem_core::{ActionRecord, StatusSummary};
use anyhow::Context;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// active / agent / stale
// ---------------------------------------------------------------------------

pub fn active(root: &Path, json: bool) -> anyhow::Result<()> {
    let records = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory.list_active().await.context("failed to list active actions")
    })?;
    print_records(&records, "No active actions.", json)
}

pub fn agent(root: &Path, agent_id: &str, json: bool) -> anyhow::Result<()> {
    let records = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory
            .list_agent(agent_id)
            .await
            .with_context(|| format!("failed to list actions of '{agent_id}'"))
    })?;
    print_records(&records, &format!("No actions for '{agent_id}'."), json)
}

pub fn stale(root: &Path, max_age_secs: u64, json: bool) -> anyhow::Result<()> {
    let records = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory
            .list_stale(Duration::from_secs(max_age_secs))
            .await
            .context("failed to list stale actions")
    })?;
    print_records(
        &records,
        &format!("No active action older than {max_age_secs}s."),
        json,
    )
}

fn print_records(records: &[ActionRecord], empty: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("{empty}");
        return Ok(());
    }
    let now = Utc::now();
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.agent_id.clone(),
                r.action_id.clone(),
                r.action_type.clone(),
                r.status.to_string(),
                age(r.updated_at, now),
            ]
        })
        .collect();
    print_table(&["AGENT", "ACTION", "TYPE", "STATUS", "UPDATED"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

pub fn status(root: &Path, json: bool) -> anyhow::Result<()> {
    let summary = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory
            .aggregate_status()
            .await
            .context("failed to aggregate status")
    })?;

    if json {
        return print_json(&summary);
    }
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &StatusSummary) {
    if summary.agents.is_empty() {
        println!("No actions recorded.");
        return;
    }
    let rows = summary
        .agents
        .values()
        .map(|a| {
            let latest = a
                .actions
                .first()
                .map(|d| format!("{} ({})", d.action_id, d.status))
                .unwrap_or_default();
            vec![
                a.agent_id.clone(),
                a.role.clone().unwrap_or_else(|| "-".into()),
                a.counts.pending.to_string(),
                a.counts.in_progress.to_string(),
                a.counts.completed.to_string(),
                a.counts.failed.to_string(),
                latest,
            ]
        })
        .collect();
    print_table(
        &[
            "AGENT",
            "ROLE",
            "PENDING",
            "IN_PROGRESS",
            "COMPLETED",
            "FAILED",
            "LATEST",
        ],
        rows,
    );
    println!();
    println!("{} active action(s)", summary.total_active);
}
