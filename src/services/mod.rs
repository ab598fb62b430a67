//! Services - request routing and skill logic
//!
//! This module contains the core business logic services:
//! - `router` - Maps request envelopes onto `SkillRequest`
//! - `directory` - Bus/stop name to provider code resolution
//! - `skill` - Request handling from routing to speech response

pub mod directory;
pub mod router;
pub mod skill;

// Re-export commonly used types
pub use directory::TransitDirectory;
pub use router::SkillRequest;
pub use skill::{ArrivalSource, Skill};
