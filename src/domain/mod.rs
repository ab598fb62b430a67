//! Domain models - core skill types and speech composition
//!
//! This module contains the canonical data types used throughout the skill:
//! - `types` - provider codes, arrival estimates, inbound request envelope
//! - `speech` - speech responses and arrival sentence composition
//! - `error` - user-facing error taxonomy

pub mod error;
pub mod speech;
pub mod types;

// Re-export commonly used types at module level
pub use error::SkillError;
pub use speech::SpeechResponse;
pub use types::{ArrivalEstimate, Arrivals, EstimateCount, RequestEnvelope, RouteCode, StopCode};
