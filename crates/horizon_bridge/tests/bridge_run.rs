//! End-to-end runs of the bridge library against a temporary repository.

use horizon_bridge::queue::QueueDocument;
use horizon_bridge::reason;
use horizon_bridge::telemetry::{FILE_CATEGORY, RUN_CATEGORY};
use horizon_bridge::{run, BridgeConfig, RunStatus};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn envelope(packet: &str, trace: &str, intent: &str) -> Value {
    json!({
        "schemaVersion": "v1",
        "traceId": trace,
        "packet": {
            "packetId": packet,
            "recipient": {"type": "operator", "id": "ops-oncall"},
            "intent": intent
        },
        "evidenceRefs": ["runbook://fleet/pause"]
    })
}

fn write_outbox(config: &BridgeConfig, relative: &str, lines: &[Value]) {
    let path = config.paths.outbox.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body: String = lines.iter().map(|line| format!("{}\n", line)).collect();
    fs::write(path, body).unwrap();
}

fn read_queue(path: &Path) -> QueueDocument {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn files_in(dir: &Path) -> usize {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

#[test]
fn valid_file_is_queued_for_confirmation() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path()).with_trace_id("run-b");
    write_outbox(&config, "batch.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);

    let report = run(&config).unwrap();

    assert_eq!(report.status(), RunStatus::Ok);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.queue.intents.len(), 1);
    let intent = &report.queue.intents[0];
    assert_eq!(intent.intent_id, "horizon-bridge:p1:pause-fleet");
    assert_eq!(intent.status.as_str(), "pending_operator_confirmation");
    assert!(intent.requires_operator_confirmation);
    assert!(!intent.autonomous.eligible);
    assert_eq!(intent.evidence_refs, vec![json!("runbook://fleet/pause")]);

    assert_eq!(files_in(&config.paths.processed_dir()), 1);
    assert_eq!(files_in(&config.paths.outbox), 0);
    assert_eq!(files_in(&config.paths.inflight_dir()), 0);

    let on_disk = read_queue(&config.paths.queue);
    assert_eq!(on_disk, report.queue);
    assert_eq!(on_disk.summary.intent_count, 1);
    assert_eq!(on_disk.summary.pending_confirmation_count, 1);
    assert_eq!(
        report.state.reason_codes,
        vec![
            reason::CLAIMED_FILES,
            reason::QUEUE_UPDATED,
            reason::CONFIRMATION_PENDING
        ]
    );
}

#[test]
fn file_with_missing_trace_id_is_rejected_whole() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());
    let mut broken = envelope("p2", "t1", "Drain");
    broken.as_object_mut().unwrap().remove("traceId");
    write_outbox(
        &config,
        "batch.jsonl",
        &[envelope("p1", "t1", "Pause Fleet"), broken],
    );

    let report = run(&config).unwrap();

    assert_eq!(report.status(), RunStatus::FailedContractValidation);
    assert_eq!(report.exit_code(), 2);
    assert!(report.queue.intents.is_empty());
    assert_eq!(report.state.counts.rejected_files, 1);
    assert_eq!(report.state.counts.invalid_envelopes, 1);
    assert_eq!(report.state.dedupe.key_count, 0);
    assert!(report
        .state
        .reason_codes
        .contains(&"contract_required_field_missing".to_string()));
    assert_eq!(files_in(&config.paths.rejected_dir()), 1);
    assert_eq!(files_in(&config.paths.processed_dir()), 0);
}

#[test]
fn same_envelope_in_a_later_run_is_a_duplicate() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());

    write_outbox(&config, "first.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    let first = run(&config).unwrap();
    assert_eq!(first.state.counts.queued_envelopes, 1);

    write_outbox(&config, "second.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    let second = run(&config).unwrap();

    assert_eq!(second.exit_code(), 0);
    assert_eq!(second.state.counts.duplicate_envelopes, 1);
    assert_eq!(second.state.counts.queued_envelopes, 0);
    assert_eq!(second.state.counts.intent_count, 1);
    assert!(second
        .state
        .reason_codes
        .contains(&reason::DUPLICATE_ENVELOPES.to_string()));
    assert!(!second
        .state
        .reason_codes
        .contains(&reason::QUEUE_UPDATED.to_string()));
}

#[test]
fn rerun_without_new_files_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());
    write_outbox(&config, "batch.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    let first = run(&config).unwrap();

    let second = run(&config).unwrap();

    assert_eq!(second.state.counts.claimed_files, 0);
    assert_eq!(second.state.counts.intent_count, first.state.counts.intent_count);
    assert_eq!(second.queue.intents, first.queue.intents);
    assert_eq!(second.state.reason_codes[0], reason::NO_OUTBOX_FILES);
    assert_eq!(second.state.dedupe.keys, first.state.dedupe.keys);
}

#[test]
fn duplicates_across_files_in_one_run_are_accepted_once() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());
    write_outbox(&config, "a.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    write_outbox(
        &config,
        "nested/b.jsonl",
        &[envelope("p1", "t1", "Pause Fleet"), envelope("p1", "t2", "Pause Fleet")],
    );

    let report = run(&config).unwrap();

    assert_eq!(report.state.counts.processed_files, 2);
    assert_eq!(report.state.counts.queued_envelopes, 2);
    assert_eq!(report.state.counts.duplicate_envelopes, 1);
    let keys: Vec<&str> = report.state.dedupe.keys.iter().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["p1::t1", "p1::t2"]);
}

#[test]
fn rejected_file_keys_do_not_block_later_acceptance() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());
    write_outbox(
        &config,
        "bad.jsonl",
        &[envelope("p1", "t1", "Pause Fleet"), json!({"schemaVersion": "v9"})],
    );
    assert_eq!(run(&config).unwrap().exit_code(), 2);

    write_outbox(&config, "good.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    let report = run(&config).unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.state.counts.queued_envelopes, 1);
    assert_eq!(report.state.counts.duplicate_envelopes, 0);
}

#[test]
fn lost_state_is_rebuilt_from_the_queue() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());
    write_outbox(&config, "a.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    run(&config).unwrap();

    fs::write(&config.paths.state, "{ corrupted").unwrap();
    write_outbox(&config, "b.jsonl", &[envelope("p1", "t1", "Pause Fleet")]);
    let report = run(&config).unwrap();

    assert_eq!(report.state.counts.duplicate_envelopes, 1);
    assert_eq!(report.state.counts.intent_count, 1);
    assert!(report.state.previous.is_none());
}

#[test]
fn max_files_leaves_the_rest_for_the_next_run() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path()).with_max_files(1);
    write_outbox(&config, "a.jsonl", &[envelope("p1", "t1", "A")]);
    write_outbox(&config, "b.jsonl", &[envelope("p2", "t1", "B")]);

    let first = run(&config).unwrap();
    assert_eq!(first.state.counts.claimed_files, 1);
    assert_eq!(files_in(&config.paths.outbox), 1);

    let second = run(&config).unwrap();
    assert_eq!(second.state.counts.claimed_files, 1);
    assert_eq!(second.state.counts.intent_count, 2);
}

#[test]
fn telemetry_has_file_records_then_one_run_record() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path()).with_trace_id("run-tel");
    write_outbox(&config, "a.jsonl", &[envelope("p1", "t1", "A")]);
    write_outbox(&config, "b.jsonl", &[json!({"nope": true})]);

    run(&config).unwrap();

    let records = horizon_tape::read_records(&config.paths.telemetry).unwrap();
    let categories: Vec<&str> = records
        .iter()
        .map(|r| r["category"].as_str().unwrap())
        .collect();
    assert_eq!(categories, vec![FILE_CATEGORY, FILE_CATEGORY, RUN_CATEGORY]);
    assert!(records.iter().all(|r| r["traceId"] == "run-tel"));
    assert_eq!(records[0]["status"], "processed");
    assert_eq!(records[1]["status"], "rejected");
    assert_eq!(records[2]["status"], "failed_contract_validation");
    assert_eq!(records[2]["counts"]["rejectedFiles"], 1);
}

#[test]
fn orphaned_inflight_claims_are_reported_not_reprocessed() {
    let temp = TempDir::new().unwrap();
    let config = BridgeConfig::from_root(temp.path());
    let orphan = config
        .paths
        .inflight_dir()
        .join("a.jsonl.claim-20250101T000000.000000Z-99");
    fs::create_dir_all(orphan.parent().unwrap()).unwrap();
    fs::write(&orphan, format!("{}\n", envelope("p1", "t1", "A"))).unwrap();

    let report = run(&config).unwrap();

    assert_eq!(report.state.counts.claimed_files, 0);
    assert_eq!(report.state.files.orphaned_inflight.len(), 1);
    assert_eq!(
        report.state.reason_codes.last().map(String::as_str),
        Some(reason::INFLIGHT_ORPHANS_PRESENT)
    );
    assert!(orphan.exists());

    let recovered = horizon_bridge::recover_stale_claims(
        &config.paths,
        chrono::Duration::seconds(60),
        chrono::Utc::now(),
        false,
    )
    .unwrap();
    assert_eq!(
        recovered.count(horizon_bridge::RecoveryOutcome::Requeued),
        1
    );

    let after = run(&config).unwrap();
    assert_eq!(after.state.counts.queued_envelopes, 1);
    assert!(after.state.files.orphaned_inflight.is_empty());
}
