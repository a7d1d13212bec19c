//! File Processor
//!
//! Validates every line of one claimed file and decides its fate as a unit.
//! A single contract violation rejects the whole file: none of its intents
//! are queued and none of its keys reach the dedup index.
//!
//! Processing only reads. The claim is released afterwards with
//! [`FileReport::release`], once the run has persisted the queue, so a run
//! that dies in between leaves its files in `inflight/` where `recover` can
//! find them.

use crate::claims::{Claim, ClaimStore, Disposition};
use crate::dedup::DedupIndex;
use crate::error::{BridgeError, Result};
use crate::reason::{self, push_distinct};
use horizon_intent::{validate_line, DedupKey, Intent};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of processing one claimed file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub source_path: PathBuf,
    pub claim_path: PathBuf,
    /// Final location under `processed/` or `rejected/`; set on release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_path: Option<PathBuf>,
    #[serde(rename = "status")]
    pub disposition: Disposition,
    /// blake3 of the file bytes, hex
    pub content_digest: String,
    /// Non-blank lines
    pub line_count: u64,
    pub valid_count: u64,
    pub queued_count: u64,
    pub duplicate_count: u64,
    pub invalid_count: u64,
    pub reason_codes: Vec<String>,
    /// Newly accepted intents; always empty for a rejected file
    #[serde(skip)]
    pub intents: Vec<Intent>,
}

impl FileReport {
    pub fn is_rejected(&self) -> bool {
        self.disposition == Disposition::Rejected
    }

    /// Move the claimed file to the directory matching its disposition.
    pub fn release<S: ClaimStore + ?Sized>(&mut self, store: &S, claim: &Claim) -> Result<&Path> {
        let target = store.finalize(claim, self.disposition)?;
        Ok(self.target_path.insert(target).as_path())
    }
}

/// Result of validating the lines of one file, before any side effects.
#[derive(Debug, Default)]
struct LineScan {
    line_count: u64,
    valid_count: u64,
    duplicate_count: u64,
    invalid_count: u64,
    /// Contract codes in order of first appearance
    contract_codes: Vec<String>,
    intents: Vec<Intent>,
    keys: BTreeSet<DedupKey>,
}

/// Processes claimed files for one run.
#[derive(Debug, Clone)]
pub struct FileProcessor {
    created_at: String,
}

impl FileProcessor {
    /// `created_at` stamps every intent accepted in this run.
    pub fn new(created_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
        }
    }

    /// Validate `claim` and fold its keys into `dedup` if it is accepted.
    ///
    /// The file stays where it is; see [`FileReport::release`].
    pub fn process(&self, claim: &Claim, dedup: &mut DedupIndex) -> Result<FileReport> {
        let bytes = fs::read(&claim.inflight)
            .map_err(|e| BridgeError::io("reading claimed file", &claim.inflight, e))?;
        let content_digest = blake3::hash(&bytes).to_hex().to_string();
        let source_file = claim.source.display().to_string();

        let scan = self.scan(&bytes, &source_file, dedup);
        let disposition = if scan.invalid_count > 0 {
            Disposition::Rejected
        } else {
            Disposition::Processed
        };

        let mut reason_codes = Vec::new();
        let (queued_count, intents) = match disposition {
            Disposition::Rejected => {
                for code in &scan.contract_codes {
                    push_distinct(&mut reason_codes, code);
                }
                warn!(
                    source = %claim.source.display(),
                    invalid = scan.invalid_count,
                    reasons = ?reason_codes,
                    "Rejected outbox file"
                );
                (0, Vec::new())
            }
            Disposition::Processed => {
                push_distinct(&mut reason_codes, reason::FILE_PROCESSED);
                dedup.extend(scan.keys);
                info!(
                    source = %claim.source.display(),
                    queued = scan.intents.len(),
                    duplicates = scan.duplicate_count,
                    "Processed outbox file"
                );
                (scan.intents.len() as u64, scan.intents)
            }
        };
        if scan.duplicate_count > 0 {
            push_distinct(&mut reason_codes, reason::DUPLICATE_ENVELOPES);
        }

        Ok(FileReport {
            source_path: claim.source.clone(),
            claim_path: claim.inflight.clone(),
            target_path: None,
            disposition,
            content_digest,
            line_count: scan.line_count,
            valid_count: scan.valid_count,
            queued_count,
            duplicate_count: scan.duplicate_count,
            invalid_count: scan.invalid_count,
            reason_codes,
            intents,
        })
    }

    /// Validate each non-blank line against the contract and the index.
    ///
    /// Keys are collected per file so that a duplicate inside the same file
    /// is caught, while `dedup` itself stays untouched until the file is
    /// known to be accepted.
    fn scan(&self, bytes: &[u8], source_file: &str, dedup: &DedupIndex) -> LineScan {
        let mut scan = LineScan::default();

        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = raw.strip_suffix(b"\r").unwrap_or(raw);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            scan.line_count += 1;

            let envelope = match validate_line(line) {
                Ok(envelope) => envelope,
                Err(err) => {
                    debug!(line = index + 1, source = source_file, error = %err, "Contract violation");
                    scan.invalid_count += 1;
                    push_distinct(&mut scan.contract_codes, err.reason_code());
                    continue;
                }
            };
            scan.valid_count += 1;

            let key = envelope.dedup_key();
            if dedup.contains(&key) || scan.keys.contains(&key) {
                debug!(line = index + 1, key = %key, "Duplicate envelope");
                scan.duplicate_count += 1;
                continue;
            }
            scan.intents
                .push(Intent::from_envelope(&envelope, source_file, &self.created_at));
            scan.keys.insert(key);
        }

        scan
    }
}
