//! Shared utilities for hima
//!
//! This crate provides:
//! - ID types (GroupId, UserId, MemberId, InviteCode)
//! - Time utilities (mockable wall clock, ISO-8601 instants)
//! - Error types
//! - Rate limiting helpers
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
