//! Identity, session and state types

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque participant identity, assigned out of band at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerIdentity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique per session instance; tells a fresh session's events from a
/// previous session's for the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Side of the description exchange, fixed at session creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Offerer,
    Answerer,
}

/// Lifecycle of one peer session.
///
/// `Closed` and `Failed` are terminal: a session in either state never
/// leaves it and is dropped from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    GatheringLocalDescription,
    AwaitingRemoteDescription,
    AwaitingConnection,
    Connected,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Whether the state machine allows `self -> next` for a session of `role`
    pub fn can_transition_to(&self, next: ConnectionState, role: Role) -> bool {
        use ConnectionState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Closed) | (_, Failed) => true,
            (Idle, GatheringLocalDescription) => true,
            (GatheringLocalDescription, AwaitingRemoteDescription) => role == Role::Offerer,
            (GatheringLocalDescription, AwaitingConnection) => role == Role::Answerer,
            (GatheringLocalDescription, Connected) => role == Role::Answerer,
            (AwaitingRemoteDescription, AwaitingConnection) => role == Role::Offerer,
            (AwaitingConnection, Connected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
