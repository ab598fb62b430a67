//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `webhook` - HTTP endpoint receiving voice platform requests
//! - `transloc` - HTTP client for the TransLoc arrival-estimates API

pub mod transloc;
pub mod webhook;

// Re-export commonly used types
pub use transloc::{LookupError, TranslocClient};
pub use webhook::start_skill_server;
