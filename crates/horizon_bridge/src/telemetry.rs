//! Telemetry records for bridge runs.
//!
//! Unlike tracing output, the telemetry log is an audit trail: a failed
//! append fails the run.

use crate::error::Result;
use crate::processor::FileReport;
use crate::state::{RunCounts, RunState, RunStatus};
use horizon_tape::TelemetryLog;
use serde::Serialize;
use std::path::Path;

pub const FILE_CATEGORY: &str = "horizon_bridge_file";
pub const RUN_CATEGORY: &str = "horizon_bridge_run";

/// Payload of the single per-run record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord<'a> {
    pub status: RunStatus,
    pub started_at: &'a str,
    pub counts: &'a RunCounts,
    pub reason_codes: &'a [String],
    pub queue_path: String,
    pub state_path: String,
}

pub struct TelemetryRecorder {
    log: TelemetryLog,
    trace_id: String,
}

impl TelemetryRecorder {
    pub fn open(path: &Path, trace_id: &str) -> Result<Self> {
        Ok(Self {
            log: TelemetryLog::open(path)?,
            trace_id: trace_id.to_string(),
        })
    }

    pub fn record_file(&self, report: &FileReport) -> Result<String> {
        Ok(self.log.append(FILE_CATEGORY, &self.trace_id, report)?)
    }

    pub fn record_run(
        &self,
        state: &RunState,
        started_at: &str,
        queue_path: &Path,
        state_path: &Path,
    ) -> Result<String> {
        let record = RunRecord {
            status: state.status,
            started_at,
            counts: &state.counts,
            reason_codes: &state.reason_codes,
            queue_path: queue_path.display().to_string(),
            state_path: state_path.display().to_string(),
        };
        Ok(self.log.append(RUN_CATEGORY, &self.trace_id, &record)?)
    }

    /// Flush and fsync everything recorded so far.
    pub fn finish(&self) -> Result<u64> {
        self.log.sync()?;
        Ok(self.log.appended())
    }
}
