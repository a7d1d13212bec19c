//! Requeue inflight claims abandoned by crashed runs.
//!
//! Runs never do this on their own; an operator triggers it once they know
//! no live run still owns the claims.

use crate::claims::{list_inflight, parse_claim_name};
use crate::config::BridgePaths;
use crate::error::{BridgeError, Result};
use chrono::{DateTime, Duration, Utc};
use horizon_intent::format_timestamp;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Requeued,
    /// Dry run: would have been requeued
    Eligible,
    /// Claimed more recently than the threshold
    TooRecent,
    /// Something already lives at the original outbox path
    Occupied,
    /// Not a claim name this bridge produces
    Unrecognized,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAction {
    pub claim_path: PathBuf,
    pub restore_path: Option<PathBuf>,
    pub claimed_at: Option<String>,
    pub outcome: RecoveryOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub dry_run: bool,
    pub actions: Vec<RecoveryAction>,
}

impl RecoveryReport {
    pub fn count(&self, outcome: RecoveryOutcome) -> usize {
        self.actions.iter().filter(|a| a.outcome == outcome).count()
    }
}

/// Move inflight claims older than `older_than` back into the outbox.
///
/// Age is taken from the timestamp in the claim name, not from file
/// metadata, since rename preserves the producer's mtime.
pub fn recover_stale_claims(
    paths: &BridgePaths,
    older_than: Duration,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<RecoveryReport> {
    paths.validate()?;
    let inflight = paths.inflight_dir();
    let cutoff = now.checked_sub_signed(older_than).ok_or_else(|| {
        BridgeError::Config(format!(
            "recovery threshold of {}s reaches past the supported date range",
            older_than.num_seconds()
        ))
    })?;
    let mut report = RecoveryReport {
        dry_run,
        actions: Vec::new(),
    };

    for claim_path in list_inflight(paths)? {
        let action = recover_one(paths, &inflight, claim_path, cutoff, dry_run)?;
        report.actions.push(action);
    }

    info!(
        requeued = report.count(RecoveryOutcome::Requeued),
        eligible = report.count(RecoveryOutcome::Eligible),
        skipped = report.actions.len()
            - report.count(RecoveryOutcome::Requeued)
            - report.count(RecoveryOutcome::Eligible),
        dry_run,
        "Inflight recovery complete"
    );
    Ok(report)
}

fn recover_one(
    paths: &BridgePaths,
    inflight: &Path,
    claim_path: PathBuf,
    cutoff: DateTime<Utc>,
    dry_run: bool,
) -> Result<RecoveryAction> {
    let name = claim_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(parsed) = parse_claim_name(&name) else {
        warn!(path = %claim_path.display(), "Skipping unrecognized file in inflight area");
        return Ok(RecoveryAction {
            claim_path,
            restore_path: None,
            claimed_at: None,
            outcome: RecoveryOutcome::Unrecognized,
        });
    };

    let relative_dir = claim_path
        .parent()
        .and_then(|parent| parent.strip_prefix(inflight).ok())
        .unwrap_or_else(|| Path::new(""));
    let restore_path = paths.outbox.join(relative_dir).join(&parsed.original);

    let outcome = if parsed.claimed_at > cutoff {
        RecoveryOutcome::TooRecent
    } else if restore_path.exists() {
        warn!(
            claim = %claim_path.display(),
            restore = %restore_path.display(),
            "Original outbox path is occupied; leaving claim in place"
        );
        RecoveryOutcome::Occupied
    } else if dry_run {
        RecoveryOutcome::Eligible
    } else {
        if let Some(parent) = restore_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BridgeError::io("creating", parent, e))?;
        }
        fs::rename(&claim_path, &restore_path)
            .map_err(|e| BridgeError::io("requeueing claim", &claim_path, e))?;
        info!(
            claim = %claim_path.display(),
            restore = %restore_path.display(),
            claimed_by_pid = parsed.pid,
            "Requeued abandoned claim"
        );
        RecoveryOutcome::Requeued
    };

    Ok(RecoveryAction {
        claim_path,
        restore_path: Some(restore_path),
        claimed_at: Some(format_timestamp(parsed.claimed_at)),
        outcome,
    })
}
