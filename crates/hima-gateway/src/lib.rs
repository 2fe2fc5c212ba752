//! Backend gateway interfaces for hima
//!
//! This crate defines the boundary between the hima core and the hosted
//! backend: a request/response `Gateway` and a subscribe/callback
//! `ChangeFeed`. It contains no HTTP code itself.

mod mock;
mod polling;
mod traits;

pub use mock::*;
pub use polling::*;
pub use traits::*;
