//! Shared record types for hima
//!
//! This crate defines the shapes exchanged with the hosted backend and
//! between the hima crates:
//! - Member and group records (wire format)
//! - Status updates, which keep the busy/free invariant by construction
//! - Change events from the backend's change feed
//! - Locally stored identity and notification settings

mod events;
mod types;

pub use events::*;
pub use types::*;
