//! Shared helpers for session-core integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use peercall_session_core::prelude::*;
use peercall_session_core::transport::{
    ConnectionEvents, MediaConnection, MediaTransportEngine, SdpType, TransportConfig,
};
use peercall_session_core::LoopbackEngine;

pub const WAIT: Duration = Duration::from_secs(3);

/// Wraps a loopback engine and records every packet its connections send
pub struct RecordingEngine {
    inner: LoopbackEngine,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingEngine {
    pub fn new(inner: LoopbackEngine) -> Self {
        Self {
            inner,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

struct RecordingConnection {
    inner: Arc<dyn MediaConnection>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MediaTransportEngine for RecordingEngine {
    fn create_connection(
        &self,
        remote: &PeerIdentity,
        config: &TransportConfig,
        events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>> {
        let inner = self.inner.create_connection(remote, config, events)?;
        Ok(Arc::new(RecordingConnection {
            inner,
            sent: self.sent.clone(),
        }))
    }
}

impl MediaConnection for RecordingConnection {
    fn set_local_description(&self, kind: SdpType) -> Result<()> {
        self.inner.set_local_description(kind)
    }

    fn set_remote_description(&self, sdp: &str, kind: SdpType) -> Result<()> {
        self.inner.set_remote_description(sdp, kind)
    }

    fn add_remote_candidate(&self, candidate: &str, mid: &str) -> Result<()> {
        self.inner.add_remote_candidate(candidate, mid)
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        self.inner.send(data)?;
        self.sent.lock().push(data.to_vec());
        Ok(())
    }

    fn close(&self) {
        self.inner.close()
    }
}

pub struct Peer {
    pub id: PeerIdentity,
    pub orchestrator: Arc<SignalingOrchestrator>,
    pub devices: Arc<MemoryDevices>,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Start an orchestrator on the loopback network, wired to `relay`, registered
pub async fn peer(network: &LoopbackNetwork, relay: &MemoryRelay, config: CallConfig) -> Peer {
    let id = config.local_id.clone();
    let engine = RecordingEngine::new(network.engine(id.clone()));
    let sent = engine.sent.clone();
    let devices = Arc::new(MemoryDevices::new());
    let (channel, inbound) = relay.connect();

    let orchestrator =
        SignalingOrchestrator::new(config, Arc::new(engine), Arc::new(channel), devices.clone()).unwrap();
    orchestrator.spawn_signaling_reader(inbound);
    orchestrator.register().await.unwrap();

    Peer {
        id,
        orchestrator,
        devices,
        sent,
    }
}

/// Narrowband config so frames are small and codecs need no features
pub fn config(id: &str) -> CallConfig {
    CallConfig::new(id).with_codec(CodecConfig::pcmu())
}

pub async fn wait_for_state(peer: &Peer, remote: &str, state: ConnectionState) {
    let remote = PeerIdentity::from(remote);
    let reached = tokio::time::timeout(WAIT, async {
        while peer.orchestrator.session_state(&remote) != Some(state) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        reached.is_ok(),
        "{} never reached {:?} with {} (now {:?})",
        peer.id,
        state,
        remote,
        peer.orchestrator.session_state(&remote)
    );
}

pub async fn wait_for_no_session(peer: &Peer, remote: &str) {
    let remote = PeerIdentity::from(remote);
    let gone = tokio::time::timeout(WAIT, async {
        while peer.orchestrator.session_state(&remote).is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(gone.is_ok(), "{} still has a session with {}", peer.id, remote);
}

pub async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let done = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(done.is_ok(), "timed out waiting for {}", what);
}
