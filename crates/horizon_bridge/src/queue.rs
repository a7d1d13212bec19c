//! Queue Builder
//!
//! The operator queue is the single document operators read. Each run merges
//! its newly accepted intents into whatever the previous run left behind and
//! rewrites the document atomically.

use crate::atomic::{atomic_write_json, load_json_lenient};
use crate::error::Result;
use crate::reason;
use horizon_intent::{Intent, SCHEMA_VERSION_V1};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Value of the queue document's `source` field.
pub const QUEUE_SOURCE: &str = "horizon-bridge";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub intent_count: u64,
    pub pending_confirmation_count: u64,
}

/// The operator queue as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDocument {
    pub schema_version: String,
    /// When the queue was first created; preserved across runs
    pub generated_at: String,
    pub updated_at: String,
    /// Trace ID of the run that last wrote the queue
    pub trace_id: String,
    pub source: String,
    pub intents: Vec<Intent>,
    pub summary: QueueSummary,
    pub reason_codes: Vec<String>,
}

/// What survives of the previous queue document.
#[derive(Debug, Clone, Default)]
pub struct PriorQueue {
    pub generated_at: Option<String>,
    pub intents: Vec<Intent>,
}

/// Load the previous queue.
///
/// Missing or unparseable documents load as empty. Entries are decoded one
/// by one so that a single malformed entry does not discard the rest.
pub fn load_queue(path: &Path) -> Result<PriorQueue> {
    let Some(document) = load_json_lenient::<Value>(path, "operator queue")? else {
        return Ok(PriorQueue::default());
    };

    let generated_at = document
        .get("generatedAt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let entries = match document.get("intents") {
        Some(Value::Array(entries)) => entries.as_slice(),
        _ => &[],
    };
    let mut intents = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;
    for entry in entries {
        match serde_json::from_value::<Intent>(entry.clone()) {
            Ok(intent) => intents.push(intent),
            Err(err) => {
                debug!(error = %err, "Dropping malformed queue entry");
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "Dropped malformed entries from prior queue");
    }

    Ok(PriorQueue {
        generated_at,
        intents,
    })
}

/// The merged queue plus what this run contributed.
#[derive(Debug, Clone)]
pub struct QueueBuild {
    pub document: QueueDocument,
    /// New intents that made it into the queue
    pub added: u64,
}

/// Merge `accepted` into `prior` and produce the next queue document.
///
/// Prior entries win when a key appears twice. Entries without a dedup key
/// are dropped. Output is sorted by `(createdAt, packetId, traceId)`.
pub fn build_queue(
    prior: PriorQueue,
    accepted: Vec<Intent>,
    trace_id: &str,
    now: &str,
) -> QueueBuild {
    let mut seen = HashSet::new();
    let mut intents = Vec::with_capacity(prior.intents.len() + accepted.len());
    let mut added = 0u64;

    let tagged = prior
        .intents
        .into_iter()
        .map(|intent| (false, intent))
        .chain(accepted.into_iter().map(|intent| (true, intent)));
    for (is_new, intent) in tagged {
        let Some(key) = intent.dedup_key() else {
            warn!(intent_id = %intent.intent_id, "Dropping queue entry without packetId/traceId");
            continue;
        };
        if !seen.insert(key) {
            continue;
        }
        if is_new {
            added += 1;
        }
        intents.push(intent);
    }

    intents.sort_by(|a, b| {
        (a.created_at.as_str(), a.packet_id.as_str(), a.trace_id.as_str()).cmp(&(
            b.created_at.as_str(),
            b.packet_id.as_str(),
            b.trace_id.as_str(),
        ))
    });

    let summary = QueueSummary {
        intent_count: intents.len() as u64,
        pending_confirmation_count: intents.iter().filter(|i| i.is_pending()).count() as u64,
    };

    let mut reason_codes = Vec::new();
    if added > 0 {
        reason_codes.push(reason::QUEUE_UPDATED.to_string());
    }
    if summary.pending_confirmation_count > 0 {
        reason_codes.push(reason::CONFIRMATION_PENDING.to_string());
    } else {
        reason_codes.push(reason::QUEUE_EMPTY.to_string());
    }

    QueueBuild {
        document: QueueDocument {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            generated_at: prior.generated_at.unwrap_or_else(|| now.to_string()),
            updated_at: now.to_string(),
            trace_id: trace_id.to_string(),
            source: QUEUE_SOURCE.to_string(),
            intents,
            summary,
            reason_codes,
        },
        added,
    }
}

pub fn write_queue(path: &Path, document: &QueueDocument) -> Result<()> {
    atomic_write_json(path, document)
}
