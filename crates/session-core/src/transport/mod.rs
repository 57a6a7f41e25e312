//! Media transport boundary
//!
//! The engine does NAT traversal, encryption and congestion control; this
//! crate only drives it. Every call here is non-blocking. Results that take
//! time (descriptions, candidates, connectivity) come back as
//! [`TransportEvent`]s through the [`ConnectionEvents`] handed to
//! [`MediaTransportEngine::create_connection`].

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::{PeerIdentity, SessionId};

pub mod loopback;

/// Kind of session description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// Connection states reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    /// Transient; the engine may recover
    Disconnected,
    Failed,
    Closed,
}

/// Everything a connection reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    LocalDescription { sdp: String, kind: SdpType },
    LocalCandidate { candidate: String, mid: String },
    GatheringComplete,
    StateChanged(TransportState),
    TrackMessage(Bytes),
}

/// A transport event tagged with the session it belongs to
#[derive(Debug, Clone)]
pub struct SessionTransportEvent {
    pub remote: PeerIdentity,
    pub session_id: SessionId,
    pub event: TransportEvent,
}

/// Sink a connection reports its events into
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    remote: PeerIdentity,
    session_id: SessionId,
    tx: mpsc::UnboundedSender<SessionTransportEvent>,
}

impl ConnectionEvents {
    pub fn new(remote: PeerIdentity, session_id: SessionId, tx: mpsc::UnboundedSender<SessionTransportEvent>) -> Self {
        Self { remote, session_id, tx }
    }

    /// Report an event; silently dropped once the orchestrator is gone
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(SessionTransportEvent {
            remote: self.remote.clone(),
            session_id: self.session_id,
            event,
        });
    }

    pub fn remote(&self) -> &PeerIdentity {
        &self.remote
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// Engine-level settings for new connections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
}

/// Factory for per-peer connections
pub trait MediaTransportEngine: Send + Sync {
    fn create_connection(
        &self,
        remote: &PeerIdentity,
        config: &TransportConfig,
        events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>>;
}

/// One peer connection
pub trait MediaConnection: Send + Sync {
    /// Start generating a local description; completion arrives as
    /// `LocalDescription` (and candidates, then `GatheringComplete`)
    fn set_local_description(&self, kind: SdpType) -> Result<()>;

    fn set_remote_description(&self, sdp: &str, kind: SdpType) -> Result<()>;

    fn add_remote_candidate(&self, candidate: &str, mid: &str) -> Result<()>;

    /// Fire-and-forget send on the data path; fails when it would block or
    /// the path is not open
    fn send(&self, data: &[u8]) -> Result<()>;

    /// Release the connection. Idempotent.
    fn close(&self);
}
