//! Error types for session core

use peercall_audio_core::AudioError;
use thiserror::Error;

use crate::types::{ConnectionState, PeerIdentity};

/// Main result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Main error type for session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// A live session already exists for this identity
    #[error("A live session already exists for {0}")]
    DuplicateSession(PeerIdentity),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// State machine rejected a transition
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: ConnectionState, to: ConnectionState },

    /// Media transport engine failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Signaling channel failure
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Malformed or unexpected signaling message
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<peercall_infra_common::Error> for SessionError {
    fn from(err: peercall_infra_common::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}

// Convenience constructors
impl SessionError {
    pub fn session_not_found(remote: &str) -> Self {
        SessionError::SessionNotFound(remote.to_string())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        SessionError::Transport(msg.into())
    }

    pub fn signaling(msg: impl Into<String>) -> Self {
        SessionError::Signaling(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        SessionError::Protocol(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SessionError::Config(msg.into())
    }
}
