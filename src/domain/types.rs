//! Shared types for the bus times skill

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Newtype wrapper for provider stop codes to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StopCode(pub u64);

impl std::fmt::Display for StopCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for provider route codes to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RouteCode(pub u64);

impl std::fmt::Display for RouteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single predicted arrival of one route at one stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalEstimate {
    pub arrival_at: DateTime<Utc>,
}

impl ArrivalEstimate {
    pub fn new(arrival_at: DateTime<Utc>) -> Self {
        Self { arrival_at }
    }
}

/// How many upcoming estimates the caller wants spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateCount {
    Single,
    Double,
}

impl EstimateCount {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateCount::Single => "single",
            EstimateCount::Double => "double",
        }
    }
}

/// Result of an arrival lookup: the next estimate and, when asked for, the one after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrivals {
    pub first: ArrivalEstimate,
    pub second: Option<ArrivalEstimate>,
}

/// Voice platform request envelope (the subset the skill reads)
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub version: Option<String>,
    pub request: InboundRequest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub intent: Option<Intent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_slots")]
    pub slots: HashMap<String, Slot>,
}

impl Intent {
    /// Slot value with surrounding whitespace removed; empty values count as missing
    pub fn slot_value(&self, slot: &str) -> Option<&str> {
        self.slots
            .get(slot)
            .and_then(|s| s.value.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Slot {
    #[serde(default, deserialize_with = "string_or_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub value: Option<String>,
}

/// Slot maps may be null, and single entries may be malformed.
/// Entries that are not slot objects are dropped so the caller sees a missing slot.
fn lenient_slots<'de, D>(deserializer: D) -> Result<HashMap<String, Slot>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| serde_json::from_value::<Slot>(value).ok().map(|slot| (key, slot)))
        .collect())
}

/// Only JSON strings are kept; any other value reads as absent
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

impl RequestEnvelope {
    pub fn request_type(&self) -> &str {
        &self.request.request_type
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.request.intent.as_ref().map(|i| i.name.as_str())
    }

    pub fn request_id(&self) -> &str {
        self.request.request_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_intent_envelope() {
        let json = r#"{
            "version": "1.0",
            "session": {"new": true},
            "request": {
                "type": "IntentRequest",
                "requestId": "req-1",
                "locale": "en-US",
                "intent": {
                    "name": "NextTimeIntent",
                    "slots": {
                        "bus": {"name": "bus", "value": " C1 "},
                        "stop": {"name": "stop"}
                    }
                }
            }
        }"#;

        let envelope: RequestEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.request_type(), "IntentRequest");
        assert_eq!(envelope.intent_name(), Some("NextTimeIntent"));
        assert_eq!(envelope.request_id(), "req-1");

        let intent = envelope.request.intent.as_ref().unwrap();
        assert_eq!(intent.slot_value("bus"), Some("C1"));
        assert_eq!(intent.slot_value("stop"), None);
        assert_eq!(intent.slot_value("missing"), None);
    }

    #[test]
    fn test_parse_launch_envelope_without_intent() {
        let json = r#"{"request": {"type": "LaunchRequest"}}"#;
        let envelope: RequestEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.request_type(), "LaunchRequest");
        assert_eq!(envelope.intent_name(), None);
        assert_eq!(envelope.request_id(), "-");
    }

    #[test]
    fn test_malformed_slots_read_as_missing() {
        let json = r#"{"request": {"type": "IntentRequest", "intent": {
            "name": "NextTimeIntent",
            "slots": {
                "bus": {"name": "bus", "value": 42},
                "stop": "east",
                "extra": {"name": ["x"], "value": "kept"}
            }
        }}}"#;
        let envelope: RequestEnvelope = serde_json::from_str(json).unwrap();
        let intent = envelope.request.intent.as_ref().unwrap();
        assert_eq!(intent.slot_value("bus"), None);
        assert_eq!(intent.slot_value("stop"), None);
        assert_eq!(intent.slot_value("extra"), Some("kept"));
        assert_eq!(intent.slots["extra"].name, None);
    }

    #[test]
    fn test_null_slots_read_as_empty() {
        let json = r#"{"request": {"type": "IntentRequest",
            "intent": {"name": "TwoTimeIntent", "slots": null}}}"#;
        let envelope: RequestEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.request.intent.as_ref().unwrap().slots.is_empty());
    }

    #[test]
    fn test_code_display() {
        assert_eq!(StopCode(4117202).to_string(), "4117202");
        assert_eq!(RouteCode(42).to_string(), "42");
    }
}
