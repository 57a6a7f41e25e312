//! Rendezvous relay for peercall signaling.
//!
//! Peers hold one TCP connection each and exchange newline-delimited JSON
//! envelopes. A `register` envelope binds an identity to the connection it
//! arrived on; `offer`, `answer` and `candidate` envelopes are forwarded
//! unchanged to the connection their target registered from. The relay
//! never interprets SDP or candidates.

pub mod config;
pub mod error;
pub mod router;
pub mod server;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use router::{ConnectionId, RouteOutcome, Router};
pub use server::RelayServer;
