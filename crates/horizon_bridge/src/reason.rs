//! Bridge reason codes
//!
//! Contract codes (`contract_*`) come from `horizon_intent`; everything the
//! bridge itself reports is prefixed `horizon_bridge_`.

pub const NO_OUTBOX_FILES: &str = "horizon_bridge_no_outbox_files";
pub const CLAIMED_FILES: &str = "horizon_bridge_claimed_files";
pub const QUEUE_UPDATED: &str = "horizon_bridge_queue_updated";
pub const CONFIRMATION_PENDING: &str = "horizon_bridge_confirmation_pending";
pub const QUEUE_EMPTY: &str = "horizon_bridge_queue_empty";
pub const DUPLICATE_ENVELOPES: &str = "horizon_bridge_duplicate_envelopes";
pub const FILE_PROCESSED: &str = "horizon_bridge_file_processed";
pub const INFLIGHT_ORPHANS_PRESENT: &str = "horizon_bridge_inflight_orphans_present";

/// Append `code` unless it is already present, keeping first-seen order.
pub(crate) fn push_distinct(codes: &mut Vec<String>, code: &str) {
    if !codes.iter().any(|existing| existing == code) {
        codes.push(code.to_string());
    }
}
