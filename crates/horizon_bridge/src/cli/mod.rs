//! CLI commands for the bridge binary.

pub mod config;
pub mod recover;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use horizon_bridge::config::absolutize;
use horizon_bridge::{BridgePaths, PathOverrides};
use std::path::PathBuf;

/// Path settings shared by every command.
#[derive(Debug, Clone, clap::Args)]
pub struct PathArgs {
    /// Repository root; other paths default to locations under it
    #[arg(long, env = "HORIZON_ROOT")]
    pub root: Option<PathBuf>,

    /// Outbox directory to drain
    #[arg(long, env = "HORIZON_BRIDGE_OUTBOX")]
    pub outbox: Option<PathBuf>,

    /// Directory holding inflight/, processed/ and rejected/
    #[arg(long = "claims-dir", env = "HORIZON_BRIDGE_CLAIMS")]
    pub claims_dir: Option<PathBuf>,

    /// Operator queue document
    #[arg(long = "queue-file", env = "HORIZON_BRIDGE_QUEUE")]
    pub queue_file: Option<PathBuf>,

    /// Run state document
    #[arg(long = "state-file", env = "HORIZON_BRIDGE_STATE")]
    pub state_file: Option<PathBuf>,

    /// Telemetry log (JSON lines)
    #[arg(long = "telemetry-file", env = "HORIZON_BRIDGE_TELEMETRY")]
    pub telemetry_file: Option<PathBuf>,
}

impl PathArgs {
    /// Resolve every path to an absolute one and check the layout.
    pub fn resolve(&self) -> Result<BridgePaths> {
        let root = match &self.root {
            Some(root) => absolutize(root)?,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let absolute = |path: &Option<PathBuf>| -> Result<Option<PathBuf>> {
            Ok(match path {
                Some(path) => Some(absolutize(path)?),
                None => None,
            })
        };
        let paths = BridgePaths::resolve(
            &root,
            PathOverrides {
                outbox: absolute(&self.outbox)?,
                claims: absolute(&self.claims_dir)?,
                queue: absolute(&self.queue_file)?,
                state: absolute(&self.state_file)?,
                telemetry: absolute(&self.telemetry_file)?,
            },
        );
        paths.validate()?;
        Ok(paths)
    }
}

/// Machine-readable form of a fatal error, for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let chain: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    let body = serde_json::json!({
        "status": "error",
        "error": err.to_string(),
        "causes": chain,
    });
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:?}", err),
    }
}
