//! `horizon-bridge status`: read-only view of the last run.

use anyhow::{Context, Result};
use horizon_bridge::claims::list_inflight;
use horizon_bridge::telemetry::RUN_CATEGORY;
use horizon_bridge::{load_queue, load_state, BridgePaths};
use serde_json::json;

pub fn run(paths: &BridgePaths, json: bool) -> Result<()> {
    let state = load_state(&paths.state).context("Failed to read run state")?;
    let queue = load_queue(&paths.queue).context("Failed to read operator queue")?;
    let inflight = list_inflight(paths).context("Failed to list inflight claims")?;
    let run_records = horizon_tape::read_category(&paths.telemetry, RUN_CATEGORY)
        .context("Failed to read telemetry log")?
        .len();
    let pending = queue.intents.iter().filter(|i| i.is_pending()).count();

    if json {
        let body = json!({
            "lastRun": state.as_ref().map(|s| json!({
                "status": s.status,
                "generatedAt": s.generated_at,
                "traceId": s.trace_id,
                "counts": s.counts,
                "reasonCodes": s.reason_codes,
            })),
            "queue": {
                "intentCount": queue.intents.len(),
                "pendingConfirmationCount": pending,
            },
            "inflightClaims": inflight.len(),
            "runRecords": run_records,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match &state {
        Some(state) => {
            println!(
                "Last run:  {} at {} [{}]",
                state.trace_id,
                state.generated_at,
                state.status.as_str()
            );
            println!(
                "           {} claimed, {} processed, {} rejected, {} queued",
                state.counts.claimed_files,
                state.counts.processed_files,
                state.counts.rejected_files,
                state.counts.queued_envelopes
            );
        }
        None => println!("Last run:  none recorded"),
    }
    println!(
        "Queue:     {} intents, {} pending confirmation",
        queue.intents.len(),
        pending
    );
    println!("Inflight:  {} claim(s)", inflight.len());
    println!("Telemetry: {} run record(s)", run_records);
    Ok(())
}
