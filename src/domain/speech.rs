//! Speech responses and arrival sentence composition
//!
//! Every handler produces exactly one `SpeechResponse`. Text is wrapped in
//! SSML before it leaves the process; user-supplied names are XML-escaped.

use crate::domain::types::{ArrivalEstimate, Arrivals};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Spoken when the upstream lookup fails or returns nothing
pub const UNAVAILABLE_MESSAGE: &str =
    "There is no data currently available. Please ask again later. ";

pub const LAUNCH_MESSAGE: &str = "Welcome to Bus Times. You can ask me when the next bus will \
    arrive at a stop. For example, say when is the next c1 at east?";

pub const HELP_MESSAGE: &str = "You can ask me when the next bus arrives at a stop, or for the \
    next two arrivals. For example, say when are the next two c1 buses at west?";

pub const GOODBYE_MESSAGE: &str = "Goodbye!";

pub const NOT_UNDERSTOOD_MESSAGE: &str = "Sorry, I didn't understand that. Please try again.";

const REPROMPT_PREFIX: &str = "I'm sorry. I didn't get that. Please try again. ";

/// What to say and whether the platform should keep listening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechResponse {
    text: Option<String>,
    reprompt: bool,
    should_end_session: bool,
}

impl SpeechResponse {
    /// Speak and end the session
    pub fn tell(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), reprompt: false, should_end_session: true }
    }

    /// Speak and keep the session open with a reprompt
    pub fn ask(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), reprompt: true, should_end_session: false }
    }

    /// No speech at all (the platform forbids speech after a session ended)
    pub fn silent() -> Self {
        Self { text: None, reprompt: false, should_end_session: true }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn should_end_session(&self) -> bool {
        self.should_end_session
    }

    pub fn has_reprompt(&self) -> bool {
        self.reprompt
    }

    /// Build the platform response payload
    pub fn to_envelope(&self) -> ResponseEnvelope {
        let output_speech = self.text.as_deref().map(OutputSpeech::ssml);
        let reprompt = match (&self.text, self.reprompt) {
            (Some(text), true) => Some(Reprompt {
                output_speech: OutputSpeech::ssml(&format!("{REPROMPT_PREFIX}{text}")),
            }),
            _ => None,
        };

        ResponseEnvelope {
            version: "1.0",
            response: ResponseBody {
                output_speech,
                reprompt,
                should_end_session: self.should_end_session,
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_envelope()).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    pub version: &'static str,
    pub response: ResponseBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    pub should_end_session: bool,
}

#[derive(Debug, Serialize)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub speech_type: &'static str,
    pub ssml: String,
}

impl OutputSpeech {
    fn ssml(text: &str) -> Self {
        Self { speech_type: "SSML", ssml: format!("<speak>{}</speak>", escape_xml(text)) }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Whole minutes from `now` until the estimate, truncated toward zero.
/// Estimates already in the past count as arriving now.
pub fn minutes_until(estimate: &ArrivalEstimate, now: DateTime<Utc>) -> i64 {
    (estimate.arrival_at - now).num_minutes().max(0)
}

pub fn pluralize(minutes: i64) -> &'static str {
    if minutes == 1 {
        "minute"
    } else {
        "minutes"
    }
}

/// Sentence for the next arrival
pub fn next_arrival_sentence(bus: &str, stop: &str, minutes: i64) -> String {
    if minutes == 0 {
        format!("The {bus} is arriving at {stop} now. ")
    } else {
        format!("The {bus} will arrive at {stop} in {minutes} {}. ", pluralize(minutes))
    }
}

/// Sentence for the arrival after the next one
pub fn following_arrival_sentence(bus: &str, stop: &str, minutes: i64) -> String {
    format!(
        "The next {bus} after that will arrive at {stop} in {minutes} {}.",
        pluralize(minutes)
    )
}

/// Compose the spoken text for a lookup result
pub fn describe_arrivals(bus: &str, stop: &str, arrivals: &Arrivals, now: DateTime<Utc>) -> String {
    let mut message = next_arrival_sentence(bus, stop, minutes_until(&arrivals.first, now));
    if let Some(second) = &arrivals.second {
        message.push_str(&following_arrival_sentence(bus, stop, minutes_until(second, now)));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 58, 20).unwrap()
    }

    fn at(offset_secs: i64) -> ArrivalEstimate {
        ArrivalEstimate::new(now() + Duration::seconds(offset_secs))
    }

    #[test]
    fn test_minutes_until_truncates() {
        assert_eq!(minutes_until(&at(0), now()), 0);
        assert_eq!(minutes_until(&at(59), now()), 0);
        assert_eq!(minutes_until(&at(60), now()), 1);
        assert_eq!(minutes_until(&at(179), now()), 2);
        assert_eq!(minutes_until(&at(180), now()), 3);
    }

    #[test]
    fn test_minutes_until_crosses_hour_boundary() {
        // 14:58:20 -> 15:03:20 is five elapsed minutes, not 3 - 58
        assert_eq!(minutes_until(&at(300), now()), 5);
    }

    #[test]
    fn test_minutes_until_past_estimate_clamps_to_zero() {
        assert_eq!(minutes_until(&at(-30), now()), 0);
        assert_eq!(minutes_until(&at(-600), now()), 0);
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(0), "minutes");
        assert_eq!(pluralize(1), "minute");
        assert_eq!(pluralize(2), "minutes");
        assert_eq!(pluralize(17), "minutes");
    }

    #[test]
    fn test_arriving_now_has_no_numeral() {
        let arrivals = Arrivals { first: at(10), second: None };
        let text = describe_arrivals("ccx", "west", &arrivals, now());
        assert_eq!(text, "The ccx is arriving at west now. ");
        assert!(!text.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_single_minute_is_singular() {
        let arrivals = Arrivals { first: at(90), second: None };
        let text = describe_arrivals("c1", "east", &arrivals, now());
        assert_eq!(text, "The c1 will arrive at east in 1 minute. ");
    }

    #[test]
    fn test_three_minutes() {
        let arrivals = Arrivals { first: at(180), second: None };
        let text = describe_arrivals("c1", "east", &arrivals, now());
        assert_eq!(text, "The c1 will arrive at east in 3 minutes. ");
    }

    #[test]
    fn test_two_arrivals() {
        let arrivals = Arrivals { first: at(120), second: Some(at(660)) };
        let text = describe_arrivals("c1", "west", &arrivals, now());
        assert_eq!(
            text,
            "The c1 will arrive at west in 2 minutes. \
             The next c1 after that will arrive at west in 11 minutes."
        );
    }

    #[test]
    fn test_following_arrival_uses_minutes_for_zero() {
        assert_eq!(
            following_arrival_sentence("c1", "east", 0),
            "The next c1 after that will arrive at east in 0 minutes."
        );
    }

    #[test]
    fn test_tell_envelope() {
        let json = SpeechResponse::tell("The c1 is arriving at east now. ").to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["response"]["outputSpeech"]["type"], "SSML");
        assert_eq!(
            value["response"]["outputSpeech"]["ssml"],
            "<speak>The c1 is arriving at east now. </speak>"
        );
        assert!(value["response"].get("reprompt").is_none());
        assert_eq!(value["response"]["shouldEndSession"], true);
    }

    #[test]
    fn test_ask_envelope_has_reprompt() {
        let json = SpeechResponse::ask(NOT_UNDERSTOOD_MESSAGE).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["response"]["shouldEndSession"], false);
        let reprompt = value["response"]["reprompt"]["outputSpeech"]["ssml"].as_str().unwrap();
        assert!(reprompt.starts_with("<speak>I&apos;m sorry. I didn&apos;t get that."));
    }

    #[test]
    fn test_silent_envelope() {
        let json = SpeechResponse::silent().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["response"].get("outputSpeech").is_none());
        assert_eq!(value["response"]["shouldEndSession"], true);
    }

    #[test]
    fn test_user_text_is_escaped() {
        let envelope = SpeechResponse::ask("<break/> & co is not a stop").to_envelope();
        let ssml = envelope.response.output_speech.unwrap().ssml;
        assert_eq!(ssml, "<speak>&lt;break/&gt; &amp; co is not a stop</speak>");
    }
}
