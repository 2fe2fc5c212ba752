//! Core status logic for hima
//!
//! This crate contains:
//! - The status option catalog (how long someone is free, tomorrow plans)
//! - Time policy (expiration instants, remaining-time text, plan rollover)
//! - Member lifecycle reconciliation with write-through to the backend
//! - Group sessions and display-ready snapshots

mod catalog;
mod policy;
mod reconcile;
mod session;
mod view;

pub use catalog::*;
pub use policy::*;
pub use reconcile::*;
pub use session::*;
pub use view::*;
