//! One remote identity, one connection, one state machine

use std::sync::Arc;

use peercall_audio_core::{
    AudioCapturePipeline, AudioError, AudioPlaybackPipeline, AudioResult, CaptureStats, PacketTransmitter,
    PlaybackStats,
};
use tracing::{debug, info};

use super::devices::AudioDeviceProvider;
use crate::config::CallConfig;
use crate::errors::{Result, SessionError};
use crate::transport::{MediaConnection, SdpType};
use crate::types::{ConnectionState, PeerIdentity, Role, SessionId};

/// Capture output goes straight onto the connection's data path
struct ConnectionTransmitter(Arc<dyn MediaConnection>);

impl PacketTransmitter for ConnectionTransmitter {
    fn transmit(&self, packet: &[u8]) -> AudioResult<()> {
        self.0.send(packet).map_err(|e| AudioError::transmit(e.to_string()))
    }
}

/// Point-in-time view of a session for callers outside the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub remote: PeerIdentity,
    pub session_id: SessionId,
    pub role: Role,
    pub state: ConnectionState,
    pub ssrc: u32,
    pub initial_sequence: u16,
    pub next_sequence: u16,
    pub capture: CaptureStats,
    pub playback: PlaybackStats,
}

pub struct PeerSession {
    remote: PeerIdentity,
    session_id: SessionId,
    role: Role,
    state: ConnectionState,
    ssrc: u32,
    initial_sequence: u16,
    connection: Arc<dyn MediaConnection>,
    capture: AudioCapturePipeline,
    playback: AudioPlaybackPipeline,
    local_description: Option<(String, SdpType)>,
    description_sent: bool,
    pending_candidates: Vec<(String, String)>,
}

impl PeerSession {
    pub fn new(
        remote: PeerIdentity,
        session_id: SessionId,
        role: Role,
        connection: Arc<dyn MediaConnection>,
        config: &CallConfig,
    ) -> Result<Self> {
        let ssrc = config.ssrc.unwrap_or_else(rand::random);
        let initial_sequence = config.initial_sequence.unwrap_or_else(rand::random);

        let transmitter = Arc::new(ConnectionTransmitter(connection.clone()));
        let capture = AudioCapturePipeline::new(&config.codec, ssrc, initial_sequence, transmitter)?;
        let playback = AudioPlaybackPipeline::new(&config.codec, &config.playback)?;

        debug!(remote = %remote, session = %session_id, ?role, ssrc, initial_sequence, "Created peer session");

        Ok(Self {
            remote,
            session_id,
            role,
            state: ConnectionState::Idle,
            ssrc,
            initial_sequence,
            connection,
            capture,
            playback,
            local_description: None,
            description_sent: false,
            pending_candidates: Vec::new(),
        })
    }

    pub fn remote(&self) -> &PeerIdentity {
        &self.remote
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn connection(&self) -> &Arc<dyn MediaConnection> {
        &self.connection
    }

    /// Move to `next`, returning the previous state
    pub fn transition(&mut self, next: ConnectionState) -> Result<ConnectionState> {
        if !self.state.can_transition_to(next, self.role) {
            return Err(SessionError::InvalidTransition { from: self.state, to: next });
        }
        let previous = self.state;
        self.state = next;
        debug!(remote = %self.remote, session = %self.session_id, "{} -> {}", previous, next);
        Ok(previous)
    }

    pub fn local_description(&self) -> Option<&(String, SdpType)> {
        self.local_description.as_ref()
    }

    pub fn set_local_description(&mut self, sdp: String, kind: SdpType) {
        self.local_description = Some((sdp, kind));
    }

    pub fn description_sent(&self) -> bool {
        self.description_sent
    }

    /// Record that the description went out; returns the candidates queued
    /// while waiting for it.
    pub fn mark_description_sent(&mut self) -> Vec<(String, String)> {
        self.description_sent = true;
        std::mem::take(&mut self.pending_candidates)
    }

    pub fn queue_candidate(&mut self, candidate: String, mid: String) {
        self.pending_candidates.push((candidate, mid));
    }

    /// Start capture and enable playback
    pub fn start_media(&mut self, devices: &dyn AudioDeviceProvider) -> Result<()> {
        let sink = devices.playback_sink(&self.remote)?;
        self.playback.start(sink)?;

        let source = devices.capture_source(&self.remote)?;
        self.capture.start(source)?;

        info!(remote = %self.remote, session = %self.session_id, ssrc = self.ssrc, "Media flowing");
        Ok(())
    }

    /// Inbound packet from the transport
    pub fn on_media(&self, packet: &[u8]) {
        self.playback.on_packet(packet);
    }

    /// Enter a terminal state, stop both pipelines and release the
    /// connection. Returns the previous state, or `None` if the session was
    /// already terminal.
    pub fn shutdown(&mut self, terminal: ConnectionState) -> Option<ConnectionState> {
        debug_assert!(terminal.is_terminal());
        if self.state.is_terminal() {
            return None;
        }
        let previous = self.state;
        self.state = terminal;

        self.capture.stop();
        self.playback.stop();
        self.connection.close();
        self.pending_candidates.clear();

        info!(remote = %self.remote, session = %self.session_id, "Session {} (was {})", terminal, previous);
        Some(previous)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            remote: self.remote.clone(),
            session_id: self.session_id,
            role: self.role,
            state: self.state,
            ssrc: self.ssrc,
            initial_sequence: self.initial_sequence,
            next_sequence: self.capture.next_sequence(),
            capture: self.capture.stats(),
            playback: self.playback.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackNetwork;
    use crate::transport::{ConnectionEvents, MediaTransportEngine, TransportConfig};
    use peercall_audio_core::CodecConfig;
    use tokio::sync::mpsc;

    fn session(role: Role) -> PeerSession {
        let network = LoopbackNetwork::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session_id = SessionId::new();
        let connection = network
            .engine("a")
            .create_connection(&"b".into(), &TransportConfig::default(), ConnectionEvents::new("b".into(), session_id, tx))
            .unwrap();
        let config = CallConfig::new("a")
            .with_codec(CodecConfig::pcmu())
            .with_ssrc(5)
            .with_initial_sequence(900);
        PeerSession::new("b".into(), session_id, role, connection, &config).unwrap()
    }

    #[test]
    fn test_configured_ssrc_and_sequence() {
        let session = session(Role::Offerer);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.ssrc, 5);
        assert_eq!(snapshot.initial_sequence, 900);
        assert_eq!(snapshot.next_sequence, 900);
        assert_eq!(snapshot.state, ConnectionState::Idle);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut session = session(Role::Offerer);
        let result = session.transition(ConnectionState::Connected);
        assert!(matches!(result, Err(SessionError::InvalidTransition { .. })));
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_shutdown_once() {
        let mut session = session(Role::Answerer);
        session.transition(ConnectionState::GatheringLocalDescription).unwrap();
        assert_eq!(session.shutdown(ConnectionState::Failed), Some(ConnectionState::GatheringLocalDescription));
        assert_eq!(session.shutdown(ConnectionState::Closed), None);
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(session.transition(ConnectionState::Connected).is_err());
    }

    #[test]
    fn test_candidates_queue_until_description_sent() {
        let mut session = session(Role::Offerer);
        session.queue_candidate("c1".into(), "0".into());
        session.queue_candidate("c2".into(), "0".into());
        let flushed = session.mark_description_sent();
        assert_eq!(flushed.len(), 2);
        assert!(session.description_sent());
        assert!(session.mark_description_sent().is_empty());
    }
}
