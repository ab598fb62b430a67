//! User-facing error taxonomy
//!
//! Every failure the skill can hit is one of these. None of them is ever
//! spoken as a technical message; `to_speech` maps each to a canned reply.

use crate::domain::speech::{SpeechResponse, NOT_UNDERSTOOD_MESSAGE};
use thiserror::Error;

/// Which slot a clarification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Bus,
    Stop,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Bus => "bus",
            SlotKind::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkillError {
    #[error("unrecognized stop: {0}")]
    UnrecognizedStop(String),
    #[error("unrecognized bus: {0}")]
    UnrecognizedBus(String),
    #[error("missing {} slot", .0.as_str())]
    MissingSlot(SlotKind),
    #[error("upstream arrival data unavailable")]
    UpstreamUnavailable,
    #[error("no handler for request")]
    UnroutableRequest,
}

impl SkillError {
    /// Clarifications and unroutable requests keep the session open for a retry;
    /// upstream failures end it.
    pub fn to_speech(&self, unavailable_message: &str) -> SpeechResponse {
        match self {
            SkillError::UnrecognizedStop(name) => {
                SpeechResponse::ask(format!("{name} is not a stop that I recognize. Please try again."))
            }
            SkillError::UnrecognizedBus(name) => {
                SpeechResponse::ask(format!("{name} is not a bus that I recognize. Please try again."))
            }
            SkillError::MissingSlot(kind) => SpeechResponse::ask(format!(
                "I didn't catch which {} you meant. Please try again.",
                kind.as_str()
            )),
            SkillError::UpstreamUnavailable => SpeechResponse::tell(unavailable_message),
            SkillError::UnroutableRequest => SpeechResponse::ask(NOT_UNDERSTOOD_MESSAGE),
        }
    }

    pub fn is_clarification(&self) -> bool {
        matches!(
            self,
            SkillError::UnrecognizedStop(_) | SkillError::UnrecognizedBus(_) | SkillError::MissingSlot(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::speech::UNAVAILABLE_MESSAGE;

    #[test]
    fn test_unrecognized_stop_keeps_session_open() {
        let speech = SkillError::UnrecognizedStop("north".to_string()).to_speech(UNAVAILABLE_MESSAGE);
        assert_eq!(speech.text(), Some("north is not a stop that I recognize. Please try again."));
        assert!(!speech.should_end_session());
    }

    #[test]
    fn test_unrecognized_bus_keeps_session_open() {
        let speech = SkillError::UnrecognizedBus("c9".to_string()).to_speech(UNAVAILABLE_MESSAGE);
        assert_eq!(speech.text(), Some("c9 is not a bus that I recognize. Please try again."));
        assert!(!speech.should_end_session());
    }

    #[test]
    fn test_missing_slot() {
        let speech = SkillError::MissingSlot(SlotKind::Stop).to_speech(UNAVAILABLE_MESSAGE);
        assert_eq!(speech.text(), Some("I didn't catch which stop you meant. Please try again."));
        assert!(!speech.should_end_session());
    }

    #[test]
    fn test_upstream_unavailable_ends_session() {
        let speech = SkillError::UpstreamUnavailable.to_speech("custom unavailable");
        assert_eq!(speech.text(), Some("custom unavailable"));
        assert!(speech.should_end_session());
    }

    #[test]
    fn test_unroutable_reprompts() {
        let speech = SkillError::UnroutableRequest.to_speech(UNAVAILABLE_MESSAGE);
        assert_eq!(speech.text(), Some(NOT_UNDERSTOOD_MESSAGE));
        assert!(!speech.should_end_session());
        assert!(speech.has_reprompt());
    }

    #[test]
    fn test_is_clarification() {
        assert!(SkillError::MissingSlot(SlotKind::Bus).is_clarification());
        assert!(SkillError::UnrecognizedBus("x".to_string()).is_clarification());
        assert!(!SkillError::UpstreamUnavailable.is_clarification());
        assert!(!SkillError::UnroutableRequest.is_clarification());
    }
}
