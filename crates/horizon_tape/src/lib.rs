//! Append-only audit log for Horizon bridge runs.
//!
//! Records are written in NDJSON format (one JSON object per line) and the
//! file is only ever opened in append mode. Nothing in this crate rewrites,
//! truncates or compacts an existing log.
//!
//! # Example
//!
//! ```no_run
//! use horizon_tape::TelemetryLog;
//! use std::path::Path;
//!
//! let log = TelemetryLog::open(Path::new("/tmp/bridge.jsonl")).unwrap();
//! log.append(
//!     "horizon_bridge_run",
//!     "trace-123",
//!     &serde_json::json!({ "status": "ok" }),
//! )
//! .unwrap();
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Schema version stamped on every record.
pub const SCHEMA_VERSION: &str = "v1";

/// Errors that can occur during log operations.
#[derive(Error, Debug)]
pub enum TapeError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record payload must serialize to a JSON object")]
    PayloadNotObject,

    #[error("Failed to acquire lock")]
    LockError,
}

/// Metadata wrapped around every payload.
///
/// The payload's own fields are flattened next to the metadata so that each
/// line reads as a single flat record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEnvelope<T> {
    pub schema_version: String,
    /// Unique identifier for this record (UUID v4)
    pub record_id: String,
    /// Sequence number within the writer that produced the record
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    /// Record class, e.g. `horizon_bridge_file`
    pub category: String,
    /// Trace of the run that produced the record
    pub trace_id: String,
    #[serde(flatten)]
    pub payload: T,
}

/// Writer that appends records to a telemetry log.
pub struct TelemetryLog {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
    seq: AtomicU64,
}

impl TelemetryLog {
    /// Open the log for appending, creating it and its parent directory if
    /// needed.
    pub fn open(path: &Path) -> Result<Self, TapeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| TapeError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| TapeError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufWriter::new(file)),
            seq: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Returns the record ID.
    pub fn append<T: Serialize>(
        &self,
        category: &str,
        trace_id: &str,
        payload: &T,
    ) -> Result<String, TapeError> {
        if !serde_json::to_value(payload)?.is_object() {
            return Err(TapeError::PayloadNotObject);
        }

        let record_id = Uuid::new_v4().to_string();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        let envelope = RecordEnvelope {
            schema_version: SCHEMA_VERSION.to_string(),
            record_id: record_id.clone(),
            seq,
            recorded_at: Utc::now(),
            category: category.to_string(),
            trace_id: trace_id.to_string(),
            payload,
        };

        let json = serde_json::to_string(&envelope)?;

        let mut file = self.file.lock().map_err(|_| TapeError::LockError)?;
        writeln!(file, "{}", json).map_err(|source| self.io_error(source))?;
        file.flush().map_err(|source| self.io_error(source))?;

        Ok(record_id)
    }

    /// Flush buffered output and fsync the log.
    pub fn sync(&self) -> Result<(), TapeError> {
        let mut file = self.file.lock().map_err(|_| TapeError::LockError)?;
        file.flush().map_err(|source| self.io_error(source))?;
        file.get_ref()
            .sync_all()
            .map_err(|source| self.io_error(source))
    }

    /// Number of records appended by this writer.
    pub fn appended(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn io_error(&self, source: io::Error) -> TapeError {
        TapeError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Read every record of a log as raw JSON values.
///
/// A missing log reads as empty. Lines that fail to parse (for example a
/// torn final line after a crash) are skipped.
pub fn read_records(path: &Path) -> Result<Vec<serde_json::Value>, TapeError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(TapeError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

/// Records of one category, in log order.
pub fn read_category(path: &Path, category: &str) -> Result<Vec<serde_json::Value>, TapeError> {
    Ok(read_records(path)?
        .into_iter()
        .filter(|record| record.get("category").and_then(|c| c.as_str()) == Some(category))
        .collect())
}
