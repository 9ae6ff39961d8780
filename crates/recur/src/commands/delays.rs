//! Delays command
//!
//! Prints the backoff schedule a policy produces, bounded by the smallest and
//! largest jitter draw.

use anyhow::Result;
use camino::Utf8Path;
use recur_core::retry::compute_delay;
use recur_core::{RecurConfig, RetryPolicy};
use serde::Serialize;

use crate::cli::DelaysArgs;
use crate::commands::resolve_policy;
use crate::output;

/// Delay window before one retry
#[derive(Debug, Clone, PartialEq, Serialize)]
struct ScheduleRow {
    retry: u32,
    min_ms: u64,
    max_ms: u64,
}

pub fn run(args: DelaysArgs, config: Option<&Utf8Path>) -> Result<()> {
    let config = RecurConfig::load(config)?;
    let policy = resolve_policy(&config, &args.policy)?;
    let rows = schedule(&policy, !args.policy.no_jitter);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    output::kv("Max retries", &policy.max_retry_count().to_string());
    output::kv("Max attempts", &policy.max_attempts().to_string());
    output::kv(
        "Max delay",
        &format!("{}ms", policy.max_retry_delay().as_millis()),
    );
    println!();

    for row in &rows {
        if row.min_ms == row.max_ms {
            println!("  retry {:>3}  {}ms", row.retry, row.min_ms);
        } else {
            println!("  retry {:>3}  {}ms - {}ms", row.retry, row.min_ms, row.max_ms);
        }
    }

    Ok(())
}

fn schedule(policy: &RetryPolicy, jitter: bool) -> Vec<ScheduleRow> {
    let upper_sample = if jitter { 1.0 } else { 0.0 };

    (0..policy.max_retry_count())
        .filter_map(|index| {
            let min = compute_delay(policy, index, 0.0)?;
            let max = compute_delay(policy, index, upper_sample)?;
            Some(ScheduleRow {
                retry: index + 1,
                min_ms: min.as_millis() as u64,
                max_ms: max.as_millis() as u64,
            })
        })
        .collect()
}
