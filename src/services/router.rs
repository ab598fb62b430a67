//! Intent routing
//!
//! Maps an inbound envelope to exactly one `SkillRequest`. Anything not in the
//! table becomes `Unrecognized`; routing itself never fails.

use crate::domain::types::RequestEnvelope;

pub const LAUNCH_REQUEST: &str = "LaunchRequest";
pub const INTENT_REQUEST: &str = "IntentRequest";
pub const SESSION_ENDED_REQUEST: &str = "SessionEndedRequest";

pub const NEXT_TIME_INTENT: &str = "NextTimeIntent";
pub const TWO_TIME_INTENT: &str = "TwoTimeIntent";
pub const HELP_INTENT: &str = "AMAZON.HelpIntent";
pub const CANCEL_INTENT: &str = "AMAZON.CancelIntent";
pub const STOP_INTENT: &str = "AMAZON.StopIntent";

pub const BUS_SLOT: &str = "bus";
pub const STOP_SLOT: &str = "stop";

/// Raw slot text as heard; `None` when the platform did not fill the slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotValues {
    pub bus: Option<String>,
    pub stop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillRequest {
    Launch,
    NextArrival(SlotValues),
    TwoArrivals(SlotValues),
    Help,
    Cancel,
    SessionEnded,
    Unrecognized,
}

impl SkillRequest {
    pub fn route(envelope: &RequestEnvelope) -> Self {
        match envelope.request_type() {
            LAUNCH_REQUEST => SkillRequest::Launch,
            SESSION_ENDED_REQUEST => SkillRequest::SessionEnded,
            INTENT_REQUEST => Self::route_intent(envelope),
            _ => SkillRequest::Unrecognized,
        }
    }

    fn route_intent(envelope: &RequestEnvelope) -> Self {
        let Some(intent) = envelope.request.intent.as_ref() else {
            return SkillRequest::Unrecognized;
        };

        let slots = || SlotValues {
            bus: intent.slot_value(BUS_SLOT).map(str::to_string),
            stop: intent.slot_value(STOP_SLOT).map(str::to_string),
        };

        match intent.name.as_str() {
            NEXT_TIME_INTENT => SkillRequest::NextArrival(slots()),
            TWO_TIME_INTENT => SkillRequest::TwoArrivals(slots()),
            HELP_INTENT => SkillRequest::Help,
            CANCEL_INTENT | STOP_INTENT => SkillRequest::Cancel,
            _ => SkillRequest::Unrecognized,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SkillRequest::Launch => "launch",
            SkillRequest::NextArrival(_) => "next_arrival",
            SkillRequest::TwoArrivals(_) => "two_arrivals",
            SkillRequest::Help => "help",
            SkillRequest::Cancel => "cancel",
            SkillRequest::SessionEnded => "session_ended",
            SkillRequest::Unrecognized => "unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> RequestEnvelope {
        serde_json::from_str(json).unwrap()
    }

    fn intent_envelope(name: &str) -> RequestEnvelope {
        envelope(&format!(
            r#"{{"request": {{"type": "IntentRequest", "intent": {{"name": "{name}",
                "slots": {{"bus": {{"name": "bus", "value": "C1"}},
                           "stop": {{"name": "stop", "value": "East"}}}}}}}}}}"#
        ))
    }

    #[test]
    fn test_route_launch() {
        let req = SkillRequest::route(&envelope(r#"{"request": {"type": "LaunchRequest"}}"#));
        assert_eq!(req, SkillRequest::Launch);
        assert_eq!(req.kind(), "launch");
    }

    #[test]
    fn test_route_session_ended() {
        let req = SkillRequest::route(&envelope(r#"{"request": {"type": "SessionEndedRequest"}}"#));
        assert_eq!(req, SkillRequest::SessionEnded);
    }

    #[test]
    fn test_route_next_time_with_slots() {
        let req = SkillRequest::route(&intent_envelope(NEXT_TIME_INTENT));
        assert_eq!(
            req,
            SkillRequest::NextArrival(SlotValues {
                bus: Some("C1".to_string()),
                stop: Some("East".to_string()),
            })
        );
    }

    #[test]
    fn test_route_two_time() {
        let req = SkillRequest::route(&intent_envelope(TWO_TIME_INTENT));
        assert!(matches!(req, SkillRequest::TwoArrivals(_)));
        assert_eq!(req.kind(), "two_arrivals");
    }

    #[test]
    fn test_route_builtin_intents() {
        assert_eq!(SkillRequest::route(&intent_envelope(HELP_INTENT)), SkillRequest::Help);
        assert_eq!(SkillRequest::route(&intent_envelope(CANCEL_INTENT)), SkillRequest::Cancel);
        assert_eq!(SkillRequest::route(&intent_envelope(STOP_INTENT)), SkillRequest::Cancel);
    }

    #[test]
    fn test_route_unknown_intent() {
        assert_eq!(
            SkillRequest::route(&intent_envelope("AMAZON.FallbackIntent")),
            SkillRequest::Unrecognized
        );
        assert_eq!(SkillRequest::route(&intent_envelope("BusIntent")), SkillRequest::Unrecognized);
    }

    #[test]
    fn test_route_intent_request_without_intent() {
        let req = SkillRequest::route(&envelope(r#"{"request": {"type": "IntentRequest"}}"#));
        assert_eq!(req, SkillRequest::Unrecognized);
    }

    #[test]
    fn test_route_unknown_request_type() {
        let req = SkillRequest::route(&envelope(
            r#"{"request": {"type": "AudioPlayer.PlaybackStarted"}}"#,
        ));
        assert_eq!(req, SkillRequest::Unrecognized);
    }

    #[test]
    fn test_route_missing_slots() {
        let req = SkillRequest::route(&envelope(
            r#"{"request": {"type": "IntentRequest", "intent": {"name": "NextTimeIntent"}}}"#,
        ));
        assert_eq!(req, SkillRequest::NextArrival(SlotValues::default()));
    }
}
