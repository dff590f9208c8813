use crate::cmd::{connect, runtime};
use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, max_age_hours: u64, json: bool) -> anyhow::Result<()> {
    let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
    let deleted = runtime()?.block_on(async {
        let memory = connect(root).await?;
        memory
            .cleanup_older_than(max_age)
            .await
            .context("cleanup failed")
    })?;

    if json {
        print_json(&serde_json::json!({ "deleted": deleted }))?;
    } else {
        println!("Deleted {deleted} action(s) older than {max_age_hours}h");
    }
    Ok(())
}
