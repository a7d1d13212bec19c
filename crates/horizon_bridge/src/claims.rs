//! Claim Manager
//!
//! Ownership of an outbox file is taken by renaming it into the inflight
//! area. Rename is atomic within one filesystem, so two concurrent runs can
//! never both claim the same file: the loser finds the source gone and moves
//! on. Any other rename failure aborts the run.
//!
//! ```text
//! outbox/team-a/batch.jsonl
//!   -> claims/inflight/team-a/batch.jsonl.claim-20260101T090000.000000Z-4242
//!   -> claims/processed/team-a/batch.jsonl.claim-20260101T090000.000000Z-4242
//!      (or claims/rejected/...)
//! ```
//!
//! The claims directory must be on the same filesystem as the outbox.

use crate::config::BridgePaths;
use crate::error::{BridgeError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Separates the original file name from the claim suffix.
pub const CLAIM_MARKER: &str = ".claim-";

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const STAMP_PARSE_FORMAT: &str = "%Y%m%dT%H%M%S%.fZ";

/// Exclusive ownership of one outbox file for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Where the file lived in the outbox
    pub source: PathBuf,
    /// `source` relative to the outbox root
    pub relative: PathBuf,
    /// Where the file lives while the claim is held
    pub inflight: PathBuf,
    pub claimed_at: DateTime<Utc>,
}

/// Terminal destination of a claimed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Processed,
    Rejected,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Processed => "processed",
            Disposition::Rejected => "rejected",
        }
    }
}

/// Backing store for claims.
///
/// The filesystem implementation is the only one today; the trait keeps the
/// rest of the pipeline independent of how exclusivity is achieved.
pub trait ClaimStore {
    /// Candidate files, in deterministic order.
    fn candidates(&self) -> Result<Vec<PathBuf>>;

    /// Attempt to take exclusive ownership of `source`.
    ///
    /// `Ok(None)` means somebody else got there first or the file is gone.
    /// Every other failure is an error.
    fn try_claim(&self, source: &Path) -> Result<Option<Claim>>;

    /// Release a claim by moving the file to its terminal destination.
    fn finalize(&self, claim: &Claim, disposition: Disposition) -> Result<PathBuf>;

    /// Claims currently held, including ones abandoned by earlier runs.
    fn outstanding(&self) -> Result<Vec<PathBuf>>;
}

/// Claim files in candidate order until `max_files` claims succeed.
///
/// `max_files == 0` means unlimited. Never reads file contents.
pub fn claim_batch<S: ClaimStore + ?Sized>(store: &S, max_files: usize) -> Result<Vec<Claim>> {
    let mut claims = Vec::new();
    for candidate in store.candidates()? {
        if max_files > 0 && claims.len() >= max_files {
            break;
        }
        if let Some(claim) = store.try_claim(&candidate)? {
            claims.push(claim);
        }
    }
    Ok(claims)
}

/// Filesystem-backed claim store using rename-as-lock.
#[derive(Debug, Clone)]
pub struct FsClaimStore {
    outbox: PathBuf,
    inflight: PathBuf,
    processed: PathBuf,
    rejected: PathBuf,
    claimed_at: DateTime<Utc>,
    suffix: String,
}

impl FsClaimStore {
    /// Create the store for one run, creating the directories it owns.
    ///
    /// `run_started` and the process ID make every claim name unique to
    /// this run.
    pub fn new(paths: &BridgePaths, run_started: DateTime<Utc>) -> Result<Self> {
        let store = Self {
            outbox: paths.outbox.clone(),
            inflight: paths.inflight_dir(),
            processed: paths.processed_dir(),
            rejected: paths.rejected_dir(),
            claimed_at: run_started,
            suffix: claim_suffix(run_started, std::process::id()),
        };
        for dir in [
            &store.outbox,
            &store.inflight,
            &store.processed,
            &store.rejected,
        ] {
            fs::create_dir_all(dir).map_err(|e| BridgeError::io("creating", dir, e))?;
        }
        Ok(store)
    }

    pub fn inflight_dir(&self) -> &Path {
        &self.inflight
    }

    fn destination_dir(&self, disposition: Disposition) -> &Path {
        match disposition {
            Disposition::Processed => &self.processed,
            Disposition::Rejected => &self.rejected,
        }
    }
}

impl ClaimStore for FsClaimStore {
    fn candidates(&self) -> Result<Vec<PathBuf>> {
        discover(&self.outbox)
    }

    fn try_claim(&self, source: &Path) -> Result<Option<Claim>> {
        let relative = source
            .strip_prefix(&self.outbox)
            .map_err(|_| {
                BridgeError::Claim(format!(
                    "{} is not inside the outbox {}",
                    source.display(),
                    self.outbox.display()
                ))
            })?
            .to_path_buf();
        let file_name = relative
            .file_name()
            .ok_or_else(|| BridgeError::Claim(format!("{} has no file name", source.display())))?
            .to_string_lossy()
            .into_owned();

        let claim_name = format!("{}{}", file_name, self.suffix);
        let inflight = match relative.parent() {
            Some(parent) => self.inflight.join(parent).join(claim_name),
            None => self.inflight.join(claim_name),
        };
        if let Some(parent) = inflight.parent() {
            fs::create_dir_all(parent).map_err(|e| BridgeError::io("creating", parent, e))?;
        }

        match fs::rename(source, &inflight) {
            Ok(()) => {
                debug!(source = %source.display(), inflight = %inflight.display(), "Claimed outbox file");
                Ok(Some(Claim {
                    source: source.to_path_buf(),
                    relative,
                    inflight,
                    claimed_at: self.claimed_at,
                }))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(source = %source.display(), "Outbox file already claimed or removed; skipping");
                Ok(None)
            }
            Err(err) => Err(BridgeError::io("claiming", source, err)),
        }
    }

    fn finalize(&self, claim: &Claim, disposition: Disposition) -> Result<PathBuf> {
        let relative = claim.inflight.strip_prefix(&self.inflight).map_err(|_| {
            BridgeError::Claim(format!(
                "{} is not an inflight claim",
                claim.inflight.display()
            ))
        })?;
        let target = self.destination_dir(disposition).join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BridgeError::io("creating", parent, e))?;
        }
        fs::rename(&claim.inflight, &target)
            .map_err(|e| BridgeError::io("finalizing claim", &claim.inflight, e))?;
        debug!(
            target = %target.display(),
            disposition = disposition.as_str(),
            "Released claim"
        );
        Ok(target)
    }

    fn outstanding(&self) -> Result<Vec<PathBuf>> {
        list_files(&self.inflight, false)
    }
}

/// Recursively list outbox files, sorted by path.
///
/// Hidden entries are skipped so producers can stage a file under a dot-name
/// and rename it into place once complete.
pub fn discover(outbox: &Path) -> Result<Vec<PathBuf>> {
    list_files(outbox, true)
}

/// Every file currently held in the inflight area.
pub fn list_inflight(paths: &BridgePaths) -> Result<Vec<PathBuf>> {
    list_files(&paths.inflight_dir(), false)
}

fn list_files(dir: &Path, skip_hidden: bool) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(skip_hidden && is_hidden(entry)));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Another run moved something out from under the walk.
            Err(err) if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::NotFound) => {
                continue
            }
            Err(err) => return Err(err.into()),
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn claim_suffix(at: DateTime<Utc>, pid: u32) -> String {
    format!("{}{}-{}", CLAIM_MARKER, at.format(STAMP_FORMAT), pid)
}

/// The parts of a claim file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimName {
    /// File name as it was in the outbox
    pub original: String,
    pub claimed_at: DateTime<Utc>,
    pub pid: u32,
}

/// Split `batch.jsonl.claim-20260101T090000.000000Z-4242` into its parts.
pub fn parse_claim_name(name: &str) -> Option<ClaimName> {
    let (original, suffix) = name.rsplit_once(CLAIM_MARKER)?;
    let (stamp, pid) = suffix.rsplit_once('-')?;
    if original.is_empty() {
        return None;
    }
    let claimed_at = NaiveDateTime::parse_from_str(stamp, STAMP_PARSE_FORMAT)
        .ok()?
        .and_utc();
    Some(ClaimName {
        original: original.to_string(),
        claimed_at,
        pid: pid.parse().ok()?,
    })
}
