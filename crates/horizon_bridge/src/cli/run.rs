//! `horizon-bridge run`: one bridge run.

use anyhow::{Context, Result};
use horizon_bridge::{BridgeConfig, BridgePaths, RunReport};

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub max_files: usize,
    pub trace_id: Option<String>,
    pub json: bool,
}

/// Returns the process exit code: 0 ok, 2 when any file was rejected.
pub fn run(paths: BridgePaths, args: RunArgs) -> Result<u8> {
    let mut config = BridgeConfig::new(paths).with_max_files(args.max_files);
    if let Some(trace_id) = args.trace_id {
        config = config.with_trace_id(trace_id);
    }

    let report = horizon_bridge::run(&config).context("Bridge run failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.state)?);
    } else {
        print_summary(&report);
    }
    Ok(report.exit_code())
}

fn print_summary(report: &RunReport) {
    let state = &report.state;
    let counts = &state.counts;

    println!("Bridge run {} [{}]", state.trace_id, state.status.as_str());
    println!(
        "  files:     {} claimed, {} processed, {} rejected",
        counts.claimed_files, counts.processed_files, counts.rejected_files
    );
    println!(
        "  envelopes: {} queued, {} duplicate, {} invalid",
        counts.queued_envelopes, counts.duplicate_envelopes, counts.invalid_envelopes
    );
    println!(
        "  queue:     {} intents, {} pending confirmation",
        counts.intent_count, counts.pending_confirmations
    );

    for file in report.files.iter().filter(|f| f.is_rejected()) {
        println!(
            "  rejected:  {} ({})",
            file.source_path.display(),
            file.reason_codes.join(", ")
        );
    }
    if !state.files.orphaned_inflight.is_empty() {
        println!(
            "  warning:   {} inflight claim(s) from earlier runs; see `horizon-bridge recover`",
            state.files.orphaned_inflight.len()
        );
    }
    println!("  reasons:   {}", state.reason_codes.join(", "));
}
