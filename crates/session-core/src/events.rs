//! Call events published to observers
//!
//! Uses a `tokio::sync::broadcast` channel; slow subscribers lag and lose
//! the oldest events rather than stall the orchestrator.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionState, PeerIdentity, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallEvent {
    /// A session moved between live states
    StateChanged {
        remote: PeerIdentity,
        session_id: SessionId,
        old_state: ConnectionState,
        new_state: ConnectionState,
    },
    /// A session reached `Closed` or `Failed` and left the registry
    CallEnded {
        remote: PeerIdentity,
        session_id: SessionId,
        state: ConnectionState,
        reason: String,
    },
}

impl CallEvent {
    pub fn remote(&self) -> &PeerIdentity {
        match self {
            CallEvent::StateChanged { remote, .. } | CallEvent::CallEnded { remote, .. } => remote,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            CallEvent::StateChanged { session_id, .. } | CallEvent::CallEnded { session_id, .. } => *session_id,
        }
    }
}
