//! Intent bridge core types.
//!
//! Canonical definitions for envelopes, dedup keys, queued intents and the
//! v1 envelope contract.

pub mod contract;

pub use contract::{
    validate, validate_line, ContractError, ContractVerdict, ContractViolation, REQUIRED_FIELDS,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The only envelope schema version the bridge accepts.
pub const SCHEMA_VERSION_V1: &str = "v1";

/// Prefix of every intent identifier.
pub const INTENT_ID_PREFIX: &str = "horizon-bridge";

const DEDUP_KEY_SEPARATOR: &str = "::";

// ============================================================================
// Dedup Key - packetId::traceId
// ============================================================================

/// Composite key guaranteeing exactly-once acceptance of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(packet_id: &str, trace_id: &str) -> Self {
        Self(format!("{}{}{}", packet_id, DEDUP_KEY_SEPARATOR, trace_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error when parsing a persisted dedup key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid dedup key: {0}")]
pub struct DedupKeyParseError(String);

impl std::str::FromStr for DedupKey {
    type Err = DedupKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(DEDUP_KEY_SEPARATOR) {
            Some((packet_id, trace_id)) if !packet_id.is_empty() && !trace_id.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(DedupKeyParseError(s.to_string())),
        }
    }
}

// ============================================================================
// Envelope - normalized v1 input record
// ============================================================================

/// Addressee of a packet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

/// A validated envelope. Only [`contract::validate`] constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub schema_version: String,
    pub trace_id: String,
    pub packet_id: String,
    pub recipient: Recipient,
    pub intent: String,
    pub evidence_refs: Vec<Value>,
}

impl Envelope {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.packet_id, &self.trace_id)
    }
}

// ============================================================================
// Intent Status
// ============================================================================

/// Queue status of an intent.
///
/// The bridge only ever creates pending intents. Downstream operator tooling
/// owns every other status, so those are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntentStatus {
    PendingOperatorConfirmation,
    Other(String),
}

impl IntentStatus {
    pub const PENDING_OPERATOR_CONFIRMATION: &'static str = "pending_operator_confirmation";

    pub fn as_str(&self) -> &str {
        match self {
            IntentStatus::PendingOperatorConfirmation => Self::PENDING_OPERATOR_CONFIRMATION,
            IntentStatus::Other(status) => status,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, IntentStatus::PendingOperatorConfirmation)
    }
}

impl Default for IntentStatus {
    fn default() -> Self {
        IntentStatus::PendingOperatorConfirmation
    }
}

impl From<String> for IntentStatus {
    fn from(value: String) -> Self {
        if value == Self::PENDING_OPERATOR_CONFIRMATION {
            IntentStatus::PendingOperatorConfirmation
        } else {
            IntentStatus::Other(value)
        }
    }
}

impl From<IntentStatus> for String {
    fn from(value: IntentStatus) -> Self {
        match value {
            IntentStatus::PendingOperatorConfirmation => {
                IntentStatus::PENDING_OPERATOR_CONFIRMATION.to_string()
            }
            IntentStatus::Other(status) => status,
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Intent - the queue-resident record
// ============================================================================

/// Autonomy policy attached to every intent. Intents are never auto-actioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomousPolicy {
    #[serde(default)]
    pub eligible: bool,
}

/// An accepted envelope awaiting operator confirmation.
///
/// Every field defaults when absent so that a hand-edited queue still loads;
/// entries without a dedup key are dropped by the queue builder. Fields added
/// by downstream tooling are kept in `extra` and written back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub intent_id: String,
    #[serde(default)]
    pub packet_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub recipient: Recipient,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub evidence_refs: Vec<Value>,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub status: IntentStatus,
    #[serde(default = "default_requires_confirmation")]
    pub requires_operator_confirmation: bool,
    #[serde(default)]
    pub autonomous: AutonomousPolicy,
    /// RFC3339 timestamp, millisecond precision
    #[serde(default)]
    pub created_at: String,
    /// RFC3339 timestamp, millisecond precision
    #[serde(default)]
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_requires_confirmation() -> bool {
    true
}

impl Intent {
    /// Build a fresh pending intent from a validated envelope.
    pub fn from_envelope(envelope: &Envelope, source_file: &str, created_at: &str) -> Self {
        Self {
            intent_id: intent_id(&envelope.packet_id, &envelope.intent),
            packet_id: envelope.packet_id.clone(),
            trace_id: envelope.trace_id.clone(),
            recipient: envelope.recipient.clone(),
            intent: envelope.intent.clone(),
            evidence_refs: envelope.evidence_refs.clone(),
            source_file: source_file.to_string(),
            status: IntentStatus::PendingOperatorConfirmation,
            requires_operator_confirmation: true,
            autonomous: AutonomousPolicy { eligible: false },
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            extra: Map::new(),
        }
    }

    /// The dedup key, or `None` when either half is blank.
    pub fn dedup_key(&self) -> Option<DedupKey> {
        if self.packet_id.trim().is_empty() || self.trace_id.trim().is_empty() {
            return None;
        }
        Some(DedupKey::new(&self.packet_id, &self.trace_id))
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}

/// Deterministic intent identifier: `horizon-bridge:<packetId>:<slug>`.
pub fn intent_id(packet_id: &str, intent: &str) -> String {
    format!("{}:{}:{}", INTENT_ID_PREFIX, packet_id, slugify(intent))
}

/// ASCII lowercase, with every run of other characters collapsed to `-`.
///
/// Non-ASCII letters count as separators so ids stay plain ASCII. A value
/// with nothing left slugs to `intent`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        return "intent".to_string();
    }
    slug
}

/// Canonical timestamp format for intents, queues and run state.
///
/// Fixed millisecond precision keeps lexical order equal to chronological
/// order, which the queue sort relies on.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            trace_id: "t1".to_string(),
            packet_id: "p1".to_string(),
            recipient: Recipient {
                kind: "ops".to_string(),
                id: "fleet-a".to_string(),
            },
            intent: "Pause Fleet".to_string(),
            evidence_refs: vec![],
        }
    }

    #[test]
    fn test_dedup_key_format() {
        let key = DedupKey::new("p1", "t1");
        assert_eq!(key.as_str(), "p1::t1");
        assert_eq!(envelope().dedup_key(), key);
    }

    #[test]
    fn test_dedup_key_parse() {
        let key: DedupKey = "p1::t1".parse().unwrap();
        assert_eq!(key, DedupKey::new("p1", "t1"));
        assert!("p1".parse::<DedupKey>().is_err());
        assert!("::t1".parse::<DedupKey>().is_err());
        assert!("p1::".parse::<DedupKey>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pause Fleet"), "pause-fleet");
        assert_eq!(slugify("  Restart -- Node #4!  "), "restart-node-4");
        assert_eq!(slugify("already-slugged"), "already-slugged");
        assert_eq!(slugify("***"), "intent");
        assert_eq!(slugify("Café Pause"), "caf-pause");
        assert_eq!(slugify("Ärger"), "rger");
        assert_eq!(slugify("日本"), "intent");
    }

    #[test]
    fn test_intent_id() {
        assert_eq!(intent_id("p1", "Pause Fleet"), "horizon-bridge:p1:pause-fleet");
    }

    #[test]
    fn test_intent_from_envelope() {
        let intent = Intent::from_envelope(&envelope(), "outbox/a.jsonl", "2026-01-01T00:00:00.000Z");
        assert_eq!(intent.intent_id, "horizon-bridge:p1:pause-fleet");
        assert!(intent.is_pending());
        assert!(intent.requires_operator_confirmation);
        assert!(!intent.autonomous.eligible);
        assert_eq!(intent.created_at, intent.updated_at);
        assert_eq!(intent.dedup_key(), Some(DedupKey::new("p1", "t1")));
    }

    #[test]
    fn test_intent_serializes_camel_case() {
        let intent = Intent::from_envelope(&envelope(), "a.jsonl", "2026-01-01T00:00:00.000Z");
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["intentId"], "horizon-bridge:p1:pause-fleet");
        assert_eq!(value["status"], "pending_operator_confirmation");
        assert_eq!(value["requiresOperatorConfirmation"], true);
        assert_eq!(value["autonomous"]["eligible"], false);
        assert_eq!(value["recipient"]["type"], "ops");
    }

    #[test]
    fn test_intent_preserves_downstream_fields() {
        let raw = json!({
            "intentId": "horizon-bridge:p1:pause-fleet",
            "packetId": "p1",
            "traceId": "t1",
            "status": "confirmed",
            "confirmedBy": "operator-7",
        });
        let intent: Intent = serde_json::from_value(raw).unwrap();
        assert_eq!(intent.status, IntentStatus::Other("confirmed".to_string()));
        assert!(!intent.is_pending());

        let back = serde_json::to_value(&intent).unwrap();
        assert_eq!(back["confirmedBy"], "operator-7");
        assert_eq!(back["status"], "confirmed");
    }

    #[test]
    fn test_intent_without_key_has_no_dedup_key() {
        let intent: Intent = serde_json::from_value(json!({ "packetId": "p1" })).unwrap();
        assert_eq!(intent.dedup_key(), None);
    }

    #[test]
    fn test_format_timestamp_is_lexically_ordered() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(format_timestamp(early), "2026-01-01T09:00:00.000Z");
        assert!(format_timestamp(early) < format_timestamp(late));
    }
}
