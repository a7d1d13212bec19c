//! v1 envelope contract.
//!
//! Checks run in a fixed order (required fields, then schema version, then
//! evidence type) and the first failure names the reason code, so identical
//! input always yields the identical rejection.

use crate::{Envelope, Recipient, SCHEMA_VERSION_V1};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Required fields, in the order they are reported.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "schemaVersion",
    "traceId",
    "packet.packetId",
    "packet.recipient.type",
    "packet.recipient.id",
    "packet.intent",
    "evidenceRefs",
];

/// Machine-readable class of a contract failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractViolation {
    RequiredFieldMissing,
    SchemaVersionUnsupported,
    EvidenceRefsNotArray,
    InvalidJson,
}

impl ContractViolation {
    pub fn reason_code(&self) -> &'static str {
        match self {
            ContractViolation::RequiredFieldMissing => "contract_required_field_missing",
            ContractViolation::SchemaVersionUnsupported => "contract_schema_version_unsupported",
            ContractViolation::EvidenceRefsNotArray => "contract_evidence_refs_not_array",
            ContractViolation::InvalidJson => "contract_invalid_json",
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason_code())
    }
}

/// The first failing check for one line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("required fields missing: {}", .0.join(", "))]
    RequiredFieldMissing(Vec<&'static str>),

    #[error("unsupported schemaVersion: {0}")]
    SchemaVersionUnsupported(String),

    #[error("evidenceRefs is not an array")]
    EvidenceRefsNotArray,
}

impl ContractError {
    pub fn violation(&self) -> ContractViolation {
        match self {
            ContractError::InvalidJson(_) => ContractViolation::InvalidJson,
            ContractError::RequiredFieldMissing(_) => ContractViolation::RequiredFieldMissing,
            ContractError::SchemaVersionUnsupported(_) => {
                ContractViolation::SchemaVersionUnsupported
            }
            ContractError::EvidenceRefsNotArray => ContractViolation::EvidenceRefsNotArray,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        self.violation().reason_code()
    }
}

/// Structured result of checking one parsed envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractVerdict {
    /// Dotted paths of required fields that are absent, null or blank
    pub missing_fields: Vec<&'static str>,
    pub schema_version_supported: bool,
    /// Raw `schemaVersion` as found, for diagnostics
    pub found_schema_version: Option<String>,
    pub evidence_refs_is_array: bool,
    /// Normalized envelope, only set when every check passed
    pub envelope: Option<Envelope>,
}

impl ContractVerdict {
    pub fn is_valid(&self) -> bool {
        self.envelope.is_some()
    }

    /// First failing check, in contract order.
    pub fn violation(&self) -> Option<ContractViolation> {
        self.first_error().map(|err| err.violation())
    }

    pub fn into_result(self) -> Result<Envelope, ContractError> {
        if let Some(err) = self.first_error() {
            return Err(err);
        }
        self.envelope
            .ok_or_else(|| ContractError::RequiredFieldMissing(REQUIRED_FIELDS.to_vec()))
    }

    fn first_error(&self) -> Option<ContractError> {
        if !self.missing_fields.is_empty() {
            return Some(ContractError::RequiredFieldMissing(self.missing_fields.clone()));
        }
        if !self.schema_version_supported {
            return Some(ContractError::SchemaVersionUnsupported(
                self.found_schema_version.clone().unwrap_or_default(),
            ));
        }
        if !self.evidence_refs_is_array {
            return Some(ContractError::EvidenceRefsNotArray);
        }
        None
    }
}

/// Check one parsed JSON value against the v1 contract.
pub fn validate(value: &Value) -> ContractVerdict {
    let missing_fields: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !is_present(value, field))
        .collect();

    let raw_version = lookup(value, "schemaVersion").filter(|v| !v.is_null());
    let found_schema_version = raw_version.map(|v| match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    });
    let schema_version_supported = found_schema_version.as_deref() == Some(SCHEMA_VERSION_V1);

    let evidence = lookup(value, "evidenceRefs").filter(|v| !v.is_null());
    let evidence_refs_is_array = matches!(evidence, Some(Value::Array(_)));

    let envelope = if missing_fields.is_empty() && schema_version_supported && evidence_refs_is_array
    {
        normalize(value)
    } else {
        None
    };

    ContractVerdict {
        missing_fields,
        schema_version_supported,
        found_schema_version,
        evidence_refs_is_array,
        envelope,
    }
}

/// Parse one raw line and check it.
pub fn validate_line(line: &[u8]) -> Result<Envelope, ContractError> {
    let value: Value =
        serde_json::from_slice(line).map_err(|e| ContractError::InvalidJson(e.to_string()))?;
    validate(&value).into_result()
}

fn normalize(value: &Value) -> Option<Envelope> {
    Some(Envelope {
        schema_version: text_at(value, "schemaVersion")?.to_string(),
        trace_id: text_at(value, "traceId")?.to_string(),
        packet_id: text_at(value, "packet.packetId")?.to_string(),
        recipient: Recipient {
            kind: text_at(value, "packet.recipient.type")?.to_string(),
            id: text_at(value, "packet.recipient.id")?.to_string(),
        },
        intent: text_at(value, "packet.intent")?.to_string(),
        evidence_refs: lookup(value, "evidenceRefs")?.as_array()?.clone(),
    })
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Trimmed, non-empty string at `path`.
fn text_at<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    lookup(value, path)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_present(value: &Value, field: &str) -> bool {
    match field {
        // Presence only; the value itself is judged by the later checks.
        "schemaVersion" => match lookup(value, field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        },
        "evidenceRefs" => !matches!(lookup(value, field), None | Some(Value::Null)),
        _ => text_at(value, field).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "schemaVersion": "v1",
            "traceId": "t1",
            "packet": {
                "packetId": "p1",
                "recipient": { "type": "ops", "id": "fleet-a" },
                "intent": "Pause Fleet"
            },
            "evidenceRefs": []
        })
    }

    #[test]
    fn test_valid_envelope() {
        let verdict = validate(&valid());
        assert!(verdict.is_valid());
        assert!(verdict.missing_fields.is_empty());
        assert_eq!(verdict.violation(), None);

        let envelope = verdict.into_result().unwrap();
        assert_eq!(envelope.packet_id, "p1");
        assert_eq!(envelope.trace_id, "t1");
        assert_eq!(envelope.recipient.kind, "ops");
        assert_eq!(envelope.recipient.id, "fleet-a");
        assert_eq!(envelope.intent, "Pause Fleet");
        assert!(envelope.evidence_refs.is_empty());
    }

    #[test]
    fn test_missing_trace_id() {
        let mut value = valid();
        value.as_object_mut().unwrap().remove("traceId");
        let verdict = validate(&value);
        assert_eq!(verdict.missing_fields, vec!["traceId"]);
        assert_eq!(
            verdict.violation(),
            Some(ContractViolation::RequiredFieldMissing)
        );
    }

    #[test]
    fn test_blank_and_non_string_fields_are_missing() {
        let mut value = valid();
        value["packet"]["recipient"]["id"] = json!("   ");
        value["packet"]["intent"] = json!(42);
        let verdict = validate(&value);
        assert_eq!(
            verdict.missing_fields,
            vec!["packet.recipient.id", "packet.intent"]
        );
    }

    #[test]
    fn test_non_object_reports_every_field() {
        let verdict = validate(&json!([1, 2, 3]));
        assert_eq!(verdict.missing_fields, REQUIRED_FIELDS.to_vec());
        assert_eq!(
            verdict.violation(),
            Some(ContractViolation::RequiredFieldMissing)
        );
    }

    #[test]
    fn test_unsupported_schema_version() {
        let mut value = valid();
        value["schemaVersion"] = json!("v2");
        let verdict = validate(&value);
        assert!(verdict.missing_fields.is_empty());
        assert!(!verdict.schema_version_supported);
        assert_eq!(
            verdict.into_result().unwrap_err(),
            ContractError::SchemaVersionUnsupported("v2".to_string())
        );
    }

    #[test]
    fn test_numeric_schema_version_is_unsupported_not_missing() {
        let mut value = valid();
        value["schemaVersion"] = json!(1);
        let verdict = validate(&value);
        assert!(verdict.missing_fields.is_empty());
        assert_eq!(
            verdict.violation(),
            Some(ContractViolation::SchemaVersionUnsupported)
        );
    }

    #[test]
    fn test_evidence_refs_not_array() {
        let mut value = valid();
        value["evidenceRefs"] = json!("doc-1");
        let verdict = validate(&value);
        assert!(!verdict.evidence_refs_is_array);
        assert_eq!(
            verdict.violation(),
            Some(ContractViolation::EvidenceRefsNotArray)
        );
    }

    #[test]
    fn test_null_evidence_refs_is_missing() {
        let mut value = valid();
        value["evidenceRefs"] = Value::Null;
        assert_eq!(
            validate(&value).violation(),
            Some(ContractViolation::RequiredFieldMissing)
        );
    }

    #[test]
    fn test_check_order_missing_beats_version_and_evidence() {
        let value = json!({
            "schemaVersion": "v9",
            "packet": {
                "packetId": "p1",
                "recipient": { "type": "ops", "id": "fleet-a" },
                "intent": "Pause Fleet"
            },
            "evidenceRefs": {}
        });
        assert_eq!(
            validate(&value).violation(),
            Some(ContractViolation::RequiredFieldMissing)
        );

        let mut value = valid();
        value["schemaVersion"] = json!("v9");
        value["evidenceRefs"] = json!({});
        assert_eq!(
            validate(&value).violation(),
            Some(ContractViolation::SchemaVersionUnsupported)
        );
    }

    #[test]
    fn test_validate_line_invalid_json() {
        let err = validate_line(b"{not json").unwrap_err();
        assert_eq!(err.violation(), ContractViolation::InvalidJson);
        assert_eq!(err.reason_code(), "contract_invalid_json");
    }

    #[test]
    fn test_validate_line_trims_values() {
        let line = br#"{"schemaVersion":" v1 ","traceId":" t1 ","packet":{"packetId":"p1","recipient":{"type":"ops","id":"fleet-a"},"intent":"Pause Fleet"},"evidenceRefs":["e1"]}"#;
        let envelope = validate_line(line).unwrap();
        assert_eq!(envelope.trace_id, "t1");
        assert_eq!(envelope.schema_version, "v1");
        assert_eq!(envelope.evidence_refs, vec![json!("e1")]);
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            ContractViolation::RequiredFieldMissing.reason_code(),
            "contract_required_field_missing"
        );
        assert_eq!(
            ContractViolation::SchemaVersionUnsupported.to_string(),
            "contract_schema_version_unsupported"
        );
        assert_eq!(
            ContractViolation::EvidenceRefsNotArray.reason_code(),
            "contract_evidence_refs_not_array"
        );
    }
}
