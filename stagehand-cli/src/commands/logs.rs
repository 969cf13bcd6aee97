//! Log display

use anyhow::Result;
use colored::*;
use stagehand_client::StatusClient;

pub async fn show_logs(
    client: &StatusClient,
    id: i64,
    step: Option<String>,
    json: bool,
) -> Result<()> {
    let records: Vec<_> = client
        .stage_logs(id)
        .await?
        .into_iter()
        .filter(|r| step.as_deref().is_none_or(|s| r.step == s))
        .collect();

    if records.is_empty() {
        println!("{}", "No log lines recorded.".yellow());
        return Ok(());
    }

    if json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    let width = records.iter().map(|r| r.step.len()).max().unwrap_or(0);
    for record in &records {
        println!(
            "{} {} {}",
            format!("{:>width$}", record.step, width = width).cyan(),
            "│".dimmed(),
            record.line
        );
    }

    Ok(())
}
