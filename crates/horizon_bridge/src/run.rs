//! One bridge run, start to finish.
//!
//! Order of side effects:
//! 1. claim outbox files
//! 2. validate each claimed file
//! 3. write the queue
//! 4. move each claimed file to `processed/` or `rejected/`
//! 5. append per-file telemetry, then one run record
//! 6. write the run state
//!
//! A claim is only released once its intents are in the queue. An error
//! before that leaves every claim inflight and the queue untouched; an error
//! while releasing leaves the remaining claims inflight with their intents
//! already queued. Either way `recover` puts them back and the next run
//! counts them as duplicates. The state is never written by a failed run.

use crate::claims::{claim_batch, ClaimStore, FsClaimStore};
use crate::config::BridgeConfig;
use crate::dedup::DedupIndex;
use crate::error::Result;
use crate::processor::{FileProcessor, FileReport};
use crate::queue::{self, QueueDocument};
use crate::state::{self, RunState, RunStatus, RunSummary};
use crate::telemetry::TelemetryRecorder;
use chrono::{DateTime, Utc};
use horizon_intent::format_timestamp;
use std::time::Instant;
use tracing::{info, warn};

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub files: Vec<FileReport>,
    pub queue: QueueDocument,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn exit_code(&self) -> u8 {
        self.state.exit_code()
    }
}

/// Run the bridge once against the filesystem.
pub fn run(config: &BridgeConfig) -> Result<RunReport> {
    config.paths.validate()?;
    let started = Utc::now();
    let store = FsClaimStore::new(&config.paths, started)?;
    run_with_store(config, &store, started)
}

/// Run the bridge once with an explicit claim store.
pub fn run_with_store<S: ClaimStore + ?Sized>(
    config: &BridgeConfig,
    store: &S,
    started: DateTime<Utc>,
) -> Result<RunReport> {
    let paths = &config.paths;
    paths.validate()?;
    let timer = Instant::now();
    let trace_id = config.resolve_trace_id();
    let now = format_timestamp(started);

    info!(trace_id = %trace_id, outbox = %paths.outbox.display(), "Starting bridge run");

    let prior_state = state::load_prior_state(&paths.state)?;
    let prior_queue = queue::load_queue(&paths.queue)?;
    let mut dedup = DedupIndex::seed(prior_state.dedup_keys, prior_queue.intents.iter());

    let orphaned = store.outstanding()?;
    if !orphaned.is_empty() {
        warn!(
            count = orphaned.len(),
            "Inflight claims from earlier runs found; use `horizon-bridge recover` to requeue them"
        );
    }

    let claims = claim_batch(store, config.max_files)?;
    info!(claimed = claims.len(), "Claimed outbox files");

    let processor = FileProcessor::new(now.clone());
    let mut reports = Vec::with_capacity(claims.len());
    let mut accepted = Vec::new();
    for claim in &claims {
        let mut report = processor.process(claim, &mut dedup)?;
        accepted.append(&mut report.intents);
        reports.push(report);
    }

    let queue = queue::build_queue(prior_queue, accepted, &trace_id, &now);
    queue::write_queue(&paths.queue, &queue.document)?;

    for (report, claim) in reports.iter_mut().zip(&claims) {
        report.release(store, claim)?;
    }

    let state = RunSummary {
        trace_id: &trace_id,
        generated_at: &now,
        claims: &claims,
        reports: &reports,
        queue: &queue,
        dedup: &dedup,
        orphaned_inflight: &orphaned,
        previous: prior_state.previous,
    }
    .into_state();

    let telemetry = TelemetryRecorder::open(&paths.telemetry, &trace_id)?;
    for report in &reports {
        telemetry.record_file(report)?;
    }
    telemetry.record_run(&state, &now, &paths.queue, &paths.state)?;
    telemetry.finish()?;

    state::write_state(&paths.state, &state)?;

    info!(
        trace_id = %trace_id,
        status = state.status.as_str(),
        processed = state.counts.processed_files,
        rejected = state.counts.rejected_files,
        queued = state.counts.queued_envelopes,
        duplicates = state.counts.duplicate_envelopes,
        elapsed_ms = timer.elapsed().as_millis() as u64,
        "Bridge run complete"
    );

    Ok(RunReport {
        state,
        files: reports,
        queue: queue.document,
    })
}
