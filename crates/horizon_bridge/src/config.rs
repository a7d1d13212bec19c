//! Configuration paths for the bridge
//!
//! Every path defaults to a location under `<root>/.horizon/bridge/`; each
//! one can be overridden individually.

use crate::error::{BridgeError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const HORIZON_DIR: &str = ".horizon";
pub const BRIDGE_DIR: &str = "bridge";

pub const INFLIGHT_DIR: &str = "inflight";
pub const PROCESSED_DIR: &str = "processed";
pub const REJECTED_DIR: &str = "rejected";

/// Resolved filesystem layout of one bridge installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePaths {
    pub root: PathBuf,
    pub outbox: PathBuf,
    /// Holds `inflight/`, `processed/` and `rejected/`
    pub claims: PathBuf,
    pub queue: PathBuf,
    pub state: PathBuf,
    pub telemetry: PathBuf,
    pub logs: PathBuf,
}

/// Per-path overrides, typically from CLI flags or the environment.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub outbox: Option<PathBuf>,
    pub claims: Option<PathBuf>,
    pub queue: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub telemetry: Option<PathBuf>,
}

impl BridgePaths {
    /// Default layout under `root`.
    pub fn from_root(root: &Path) -> Self {
        let bridge = root.join(HORIZON_DIR).join(BRIDGE_DIR);
        Self {
            root: root.to_path_buf(),
            outbox: bridge.join("outbox"),
            claims: bridge.join("claims"),
            queue: bridge.join("operator-queue.json"),
            state: bridge.join("state.json"),
            telemetry: bridge.join("telemetry.jsonl"),
            logs: root.join(HORIZON_DIR).join("logs"),
        }
    }

    /// Default layout with `overrides` applied on top.
    pub fn resolve(root: &Path, overrides: PathOverrides) -> Self {
        let defaults = Self::from_root(root);
        Self {
            outbox: overrides.outbox.unwrap_or(defaults.outbox),
            claims: overrides.claims.unwrap_or(defaults.claims),
            queue: overrides.queue.unwrap_or(defaults.queue),
            state: overrides.state.unwrap_or(defaults.state),
            telemetry: overrides.telemetry.unwrap_or(defaults.telemetry),
            ..defaults
        }
    }

    pub fn inflight_dir(&self) -> PathBuf {
        self.claims.join(INFLIGHT_DIR)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.claims.join(PROCESSED_DIR)
    }

    pub fn rejected_dir(&self) -> PathBuf {
        self.claims.join(REJECTED_DIR)
    }

    /// Reject layouts where the bridge would rediscover its own files.
    ///
    /// Discovery walks the outbox recursively, so nothing the bridge writes
    /// may live below it, and the outbox may not live below the claims area.
    pub fn validate(&self) -> Result<()> {
        if self.claims.starts_with(&self.outbox) || self.outbox.starts_with(&self.claims) {
            return Err(BridgeError::Config(format!(
                "claims directory {} and outbox {} must not contain one another",
                self.claims.display(),
                self.outbox.display()
            )));
        }
        for (label, path) in [
            ("queue file", &self.queue),
            ("state file", &self.state),
            ("telemetry file", &self.telemetry),
        ] {
            if path.starts_with(&self.outbox) {
                return Err(BridgeError::Config(format!(
                    "{} {} must not live inside the outbox {}",
                    label,
                    path.display(),
                    self.outbox.display()
                )));
            }
        }
        Ok(())
    }
}

/// Everything one bridge run needs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub paths: BridgePaths,
    /// Maximum files claimed per run; 0 means unlimited
    pub max_files: usize,
    /// Trace identifier for this run; generated when absent
    pub trace_id: Option<String>,
}

impl BridgeConfig {
    pub fn new(paths: BridgePaths) -> Self {
        Self {
            paths,
            max_files: 0,
            trace_id: None,
        }
    }

    pub fn from_root(root: &Path) -> Self {
        Self::new(BridgePaths::from_root(root))
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// The configured trace ID, or a fresh one.
    pub fn resolve_trace_id(&self) -> String {
        self.trace_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .unwrap_or_else(generate_trace_id)
    }
}

pub fn generate_trace_id() -> String {
    format!("horizon-bridge-{}", Uuid::new_v4())
}

/// Anchor a relative path at the current directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| BridgeError::io("resolving current directory for", path, e))?;
    Ok(cwd.join(path))
}
