//! Run state
//!
//! `state.json` is the durable summary of the latest run. Its dedupe section
//! is what makes acceptance exactly-once across runs.

use crate::atomic::{atomic_write_json, load_json_lenient};
use crate::claims::Claim;
use crate::dedup::DedupIndex;
use crate::error::Result;
use crate::processor::FileReport;
use crate::queue::QueueBuild;
use crate::reason;
use horizon_intent::{DedupKey, SCHEMA_VERSION_V1};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    FailedContractValidation,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::FailedContractValidation => "failed_contract_validation",
        }
    }

    /// Process exit code: 0 for a clean run, 2 when any file was rejected.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::FailedContractValidation => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    pub claimed_files: u64,
    pub processed_files: u64,
    pub rejected_files: u64,
    pub queued_envelopes: u64,
    pub duplicate_envelopes: u64,
    pub invalid_envelopes: u64,
    pub pending_confirmations: u64,
    pub intent_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupeSnapshot {
    pub key_count: u64,
    /// Sorted
    pub keys: Vec<DedupKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFiles {
    pub claimed: Vec<String>,
    pub processed: Vec<String>,
    pub rejected: Vec<String>,
    /// Inflight claims left behind by earlier runs
    pub orphaned_inflight: Vec<String>,
}

/// Pointer to the run before this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousRun {
    pub status: String,
    pub generated_at: String,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub schema_version: String,
    pub generated_at: String,
    pub trace_id: String,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub dedupe: DedupeSnapshot,
    pub files: RunFiles,
    pub reason_codes: Vec<String>,
    pub previous: Option<PreviousRun>,
}

impl RunState {
    pub fn exit_code(&self) -> u8 {
        self.status.exit_code()
    }

    /// The `previous` pointer a successor run should carry.
    pub fn as_previous(&self) -> PreviousRun {
        PreviousRun {
            status: self.status.as_str().to_string(),
            generated_at: self.generated_at.clone(),
            trace_id: self.trace_id.clone(),
        }
    }
}

/// What a run needs from the previous state file.
#[derive(Debug, Clone, Default)]
pub struct PriorState {
    pub dedup_keys: Vec<DedupKey>,
    pub previous: Option<PreviousRun>,
}

/// Load the parts of the previous state a new run depends on.
///
/// Read field by field so that a state file from an older or newer writer
/// still yields its dedup keys.
pub fn load_prior_state(path: &Path) -> Result<PriorState> {
    let Some(document) = load_json_lenient::<Value>(path, "run state")? else {
        return Ok(PriorState::default());
    };

    let mut dedup_keys = Vec::new();
    let mut invalid = 0usize;
    if let Some(keys) = document.pointer("/dedupe/keys").and_then(Value::as_array) {
        for key in keys {
            match key.as_str().map(str::parse::<DedupKey>) {
                Some(Ok(key)) => dedup_keys.push(key),
                _ => invalid += 1,
            }
        }
    }
    if invalid > 0 {
        warn!(path = %path.display(), invalid, "Ignored malformed dedup keys in prior state");
    }

    let text = |field: &str| {
        document
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let previous = document.is_object().then(|| PreviousRun {
        status: text("status"),
        generated_at: text("generatedAt"),
        trace_id: text("traceId"),
    });

    Ok(PriorState {
        dedup_keys,
        previous,
    })
}

/// Load the full state document, for reporting.
pub fn load_state(path: &Path) -> Result<Option<RunState>> {
    load_json_lenient(path, "run state")
}

pub fn write_state(path: &Path, state: &RunState) -> Result<()> {
    atomic_write_json(path, state)
}

/// Everything that goes into the state of one finished run.
pub struct RunSummary<'a> {
    pub trace_id: &'a str,
    pub generated_at: &'a str,
    pub claims: &'a [Claim],
    pub reports: &'a [FileReport],
    pub queue: &'a QueueBuild,
    pub dedup: &'a DedupIndex,
    pub orphaned_inflight: &'a [PathBuf],
    pub previous: Option<PreviousRun>,
}

impl RunSummary<'_> {
    pub fn into_state(self) -> RunState {
        let rejected: Vec<&FileReport> = self.reports.iter().filter(|r| r.is_rejected()).collect();
        let processed: Vec<&FileReport> =
            self.reports.iter().filter(|r| !r.is_rejected()).collect();

        let status = if rejected.is_empty() {
            RunStatus::Ok
        } else {
            RunStatus::FailedContractValidation
        };

        let queue = &self.queue.document;
        let counts = RunCounts {
            claimed_files: self.claims.len() as u64,
            processed_files: processed.len() as u64,
            rejected_files: rejected.len() as u64,
            queued_envelopes: self.queue.added,
            duplicate_envelopes: self.reports.iter().map(|r| r.duplicate_count).sum(),
            invalid_envelopes: self.reports.iter().map(|r| r.invalid_count).sum(),
            pending_confirmations: queue.summary.pending_confirmation_count,
            intent_count: queue.summary.intent_count,
        };

        let mut reason_codes = Vec::new();
        reason_codes.push(if self.claims.is_empty() {
            reason::NO_OUTBOX_FILES.to_string()
        } else {
            reason::CLAIMED_FILES.to_string()
        });
        reason_codes.extend(queue.reason_codes.iter().cloned());
        if counts.duplicate_envelopes > 0 {
            reason_codes.push(reason::DUPLICATE_ENVELOPES.to_string());
        }
        let contract_codes: BTreeSet<&String> = rejected
            .iter()
            .flat_map(|r| r.reason_codes.iter())
            .filter(|code| code.starts_with("contract_"))
            .collect();
        reason_codes.extend(contract_codes.into_iter().cloned());
        if !self.orphaned_inflight.is_empty() {
            reason_codes.push(reason::INFLIGHT_ORPHANS_PRESENT.to_string());
        }

        let display = |path: &PathBuf| path.display().to_string();
        let targets = |reports: &[&FileReport]| -> Vec<String> {
            reports
                .iter()
                .filter_map(|r| r.target_path.as_ref())
                .map(display)
                .collect()
        };
        RunState {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            generated_at: self.generated_at.to_string(),
            trace_id: self.trace_id.to_string(),
            status,
            counts,
            dedupe: DedupeSnapshot {
                key_count: self.dedup.len() as u64,
                keys: self.dedup.keys().cloned().collect(),
            },
            files: RunFiles {
                claimed: self.claims.iter().map(|c| display(&c.source)).collect(),
                processed: targets(&processed),
                rejected: targets(&rejected),
                orphaned_inflight: self.orphaned_inflight.iter().map(display).collect(),
            },
            reason_codes,
            previous: self.previous,
        }
    }
}
