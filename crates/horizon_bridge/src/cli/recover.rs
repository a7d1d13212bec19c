//! `horizon-bridge recover`: requeue abandoned inflight claims.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use horizon_bridge::{recover_stale_claims, BridgePaths, RecoveryOutcome};

#[derive(Debug, Clone)]
pub struct RecoverArgs {
    pub older_than_secs: u64,
    pub dry_run: bool,
    pub json: bool,
}

pub fn run(paths: &BridgePaths, args: RecoverArgs) -> Result<()> {
    let secs = i64::try_from(args.older_than_secs).context("--older-than-secs is too large")?;
    let older_than = Duration::try_seconds(secs).context("--older-than-secs is too large")?;

    let report = recover_stale_claims(paths, older_than, Utc::now(), args.dry_run)
        .context("Inflight recovery failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.actions.is_empty() {
        println!("No inflight claims.");
        return Ok(());
    }
    for action in &report.actions {
        let label = match action.outcome {
            RecoveryOutcome::Requeued => "requeued",
            RecoveryOutcome::Eligible => "would requeue",
            RecoveryOutcome::TooRecent => "too recent",
            RecoveryOutcome::Occupied => "occupied",
            RecoveryOutcome::Unrecognized => "unrecognized",
        };
        match &action.restore_path {
            Some(restore) => println!(
                "{:<14} {} -> {}",
                label,
                action.claim_path.display(),
                restore.display()
            ),
            None => println!("{:<14} {}", label, action.claim_path.display()),
        }
    }
    if report.dry_run {
        println!("(dry run; nothing moved)");
    }
    Ok(())
}
