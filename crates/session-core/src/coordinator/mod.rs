//! Signaling orchestrator
//!
//! Owns the peer sessions, turns transport description/candidate events into
//! signaling envelopes and routes inbound envelopes to the right session.

mod coordinator;
mod event_handler;
mod session_ops;
mod signaling_handler;
pub mod registry;

pub use coordinator::SignalingOrchestrator;
pub use registry::{RegistryStats, SessionHandle, SessionRegistry};
