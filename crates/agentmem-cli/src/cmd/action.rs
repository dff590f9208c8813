use crate::cmd::{connect, parse_object, runtime};
use crate::output::print_json;
use agentmem_core::{ActionRecord, ActionRef, ActionStatus, NewAction, Payload};
use anyhow::Context;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

pub struct PublishArgs {
    pub agent: String,
    pub action: Option<String>,
    pub action_type: String,
    pub status: String,
    pub payload: Option<String>,
    pub depends: Vec<String>,
}

pub fn publish(root: &Path, args: PublishArgs, json: bool) -> anyhow::Result<()> {
    let status: ActionStatus = args.status.parse()?;
    let payload = match args.payload.as_deref() {
        Some(raw) => parse_object(raw, "--payload")?,
        None => Payload::new(),
    };
    let dependencies = args
        .depends
        .iter()
        .map(|d| d.parse::<ActionRef>())
        .collect::<Result<Vec<_>, _>>()
        .context("--depends expects <agent>:<action> pairs")?;
    let action_id = args
        .action
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let action = NewAction::new(args.action_type)
        .with_status(status)
        .with_payload(payload)
        .with_dependencies(dependencies);

    let record = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory
            .publish(&args.agent, &action_id, action)
            .await
            .context("publish failed")
    })?;

    if json {
        print_json(&record)?;
    } else {
        println!(
            "Published {} ({})",
            record.action_ref(),
            record.status
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// read
// ---------------------------------------------------------------------------

pub fn read(root: &Path, agent: &str, action: &str, json: bool) -> anyhow::Result<()> {
    let record = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory.read(agent, action).await.context("read failed")
    })?;

    match (record, json) {
        (Some(record), true) => print_json(&record)?,
        (None, true) => println!("null"),
        (Some(record), false) => print_record(&record)?,
        (None, false) => println!("No record for {agent}:{action}"),
    }
    Ok(())
}

fn print_record(record: &ActionRecord) -> anyhow::Result<()> {
    println!("Action:   {}", record.action_ref());
    println!("Type:     {}", record.action_type);
    println!("Status:   {}", record.status);
    println!("Created:  {}", record.created_at.to_rfc3339());
    println!("Updated:  {}", record.updated_at.to_rfc3339());
    if !record.dependencies.is_empty() {
        let deps: Vec<String> = record.dependencies.iter().map(ToString::to_string).collect();
        println!("Depends:  {}", deps.join(", "));
    }
    if !record.payload.is_empty() {
        println!("Payload:  {}", serde_json::to_string(&record.payload)?);
    }
    if let Some(result) = &record.result {
        println!("Result:   {}", serde_json::to_string(result)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// complete / fail
// ---------------------------------------------------------------------------

pub fn finish(
    root: &Path,
    agent: &str,
    action: &str,
    status: ActionStatus,
    result: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let result = match result {
        Some(raw) => parse_object(raw, "--result")?,
        None => Payload::new(),
    };

    let record = runtime()?.block_on(async {
        let memory = connect(root).await?;
        let record = match status {
            ActionStatus::Failed => memory.fail(agent, action, result).await,
            _ => memory.complete(agent, action, result).await,
        };
        record.with_context(|| format!("failed to mark {agent}:{action} {status}"))
    })?;

    if json {
        print_json(&record)?;
    } else {
        println!("{} is {}", record.action_ref(), record.status);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// wait
// ---------------------------------------------------------------------------

pub fn wait(
    root: &Path,
    agent: &str,
    action: &str,
    timeout_ms: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let record = runtime()?.block_on(async {
        let memory = connect(root).await?;
        let timeout = timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| memory.wait_timeout());
        memory
            .wait_for(agent, action, timeout)
            .await
            .map_err(anyhow::Error::from)
    })?;

    if json {
        print_json(&record)?;
    } else {
        print_record(&record)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

pub fn delete(root: &Path, agent: &str, action: &str, json: bool) -> anyhow::Result<()> {
    let removed = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory.delete(agent, action).await.context("delete failed")
    })?;

    if json {
        print_json(&serde_json::json!({ "deleted": removed }))?;
    } else if removed {
        println!("Deleted {agent}:{action}");
    } else {
        println!("No record for {agent}:{action}");
    }
    Ok(())
}
