//! REST gateway for hima
//!
//! Talks to the hosted backend's PostgREST endpoint (`/rest/v1/<table>`)
//! with the project's anon key. The backend has no push channel we can
//! use from here, so change notifications come from
//! [`hima_gateway::PollingFeed`] wrapped around [`RestGateway`].

mod client;
mod query;

pub use client::*;
pub use query::*;
