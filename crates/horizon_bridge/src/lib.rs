//! Horizon message bridge
//!
//! Moves intent envelopes from the producer outbox into the operator queue.
//! Each run claims outbox files, validates them line by line, drops
//! envelopes that were already accepted, and records what it did:
//!
//! ```text
//! outbox/*.jsonl --claim--> claims/inflight/ --validate--> claims/processed/
//!                                                      \-> claims/rejected/
//!                       accepted intents --> operator-queue.json
//!                       run summary      --> state.json, telemetry.jsonl
//! ```
//!
//! A file is accepted or rejected as a whole. Every envelope is accepted at
//! most once, keyed on `packetId::traceId`, across files and across runs.

pub mod atomic;
pub mod claims;
pub mod config;
pub mod dedup;
pub mod error;
pub mod processor;
pub mod queue;
pub mod reason;
pub mod recovery;
pub mod run;
pub mod state;
pub mod telemetry;

pub use claims::{claim_batch, discover, Claim, ClaimStore, Disposition, FsClaimStore};
pub use config::{BridgeConfig, BridgePaths, PathOverrides};
pub use dedup::DedupIndex;
pub use error::{BridgeError, Result};
pub use processor::{FileProcessor, FileReport};
pub use queue::{build_queue, load_queue, write_queue, QueueDocument, QueueSummary};
pub use recovery::{recover_stale_claims, RecoveryOutcome, RecoveryReport};
pub use run::{run, run_with_store, RunReport};
pub use state::{load_state, write_state, RunState, RunStatus};
