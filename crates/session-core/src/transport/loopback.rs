//! In-process media transport
//!
//! Connections are paired by identity inside a shared [`LoopbackNetwork`].
//! A connection is negotiated once it has both a local and a remote
//! description; when both ends of a pair are negotiated they go
//! `Connected` together and `send` on one surfaces as `TrackMessage` on the
//! other. Failures can be injected per connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    ConnectionEvents, MediaConnection, MediaTransportEngine, SdpType, TransportConfig, TransportEvent, TransportState,
};
use crate::errors::{Result, SessionError};
use crate::types::PeerIdentity;

type PairKey = (PeerIdentity, PeerIdentity);

#[derive(Default)]
struct NetworkState {
    /// (local, remote) -> newest connection for that direction
    endpoints: HashMap<PairKey, Weak<LoopbackConnection>>,
}

/// Shared medium all loopback engines attach to
#[derive(Clone)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
    next_port: Arc<AtomicU16>,
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            next_port: Arc::new(AtomicU16::new(50000)),
        }
    }

    /// Engine creating connections on behalf of `local`
    pub fn engine(&self, local: impl Into<PeerIdentity>) -> LoopbackEngine {
        LoopbackEngine {
            network: self.clone(),
            local: local.into(),
        }
    }

    /// Make the `local -> remote` connection report `state`.
    ///
    /// Returns false when no such connection exists.
    pub fn inject_state(&self, local: &PeerIdentity, remote: &PeerIdentity, state: TransportState) -> bool {
        match self.connection(local, remote) {
            Some(connection) => {
                connection.events.emit(TransportEvent::StateChanged(state));
                true
            }
            None => false,
        }
    }

    /// Make sends on the `local -> remote` connection fail as if the path were congested
    pub fn set_blocked(&self, local: &PeerIdentity, remote: &PeerIdentity, blocked: bool) -> bool {
        match self.connection(local, remote) {
            Some(connection) => {
                connection.inner.lock().blocked = blocked;
                true
            }
            None => false,
        }
    }

    /// Remote candidates applied to the `local -> remote` connection
    pub fn remote_candidates(&self, local: &PeerIdentity, remote: &PeerIdentity) -> Vec<String> {
        self.connection(local, remote)
            .map(|c| c.inner.lock().remote_candidates.clone())
            .unwrap_or_default()
    }

    fn connection(&self, local: &PeerIdentity, remote: &PeerIdentity) -> Option<Arc<LoopbackConnection>> {
        self.state
            .lock()
            .endpoints
            .get(&(local.clone(), remote.clone()))
            .and_then(Weak::upgrade)
    }

    fn register(&self, connection: &Arc<LoopbackConnection>) {
        let key = (connection.local.clone(), connection.remote.clone());
        self.state.lock().endpoints.insert(key, Arc::downgrade(connection));
    }

    /// Connect `connection` with its counterpart if both ends are negotiated
    fn try_connect(&self, connection: &Arc<LoopbackConnection>) {
        // Holding the network lock serialises pairing so each pair connects once
        let state = self.state.lock();
        let key = (connection.remote.clone(), connection.local.clone());
        let Some(partner) = state.endpoints.get(&key).and_then(Weak::upgrade) else {
            return;
        };

        if !connection.inner.lock().ready_to_connect() || !partner.inner.lock().ready_to_connect() {
            return;
        }

        connection.link(&partner);
        partner.link(connection);
        drop(state);

        debug!(local = %connection.local, remote = %connection.remote, "Loopback pair connected");
        connection.events.emit(TransportEvent::StateChanged(TransportState::Connected));
        partner.events.emit(TransportEvent::StateChanged(TransportState::Connected));
    }

    fn allocate_port(&self) -> u16 {
        self.next_port.fetch_add(1, Ordering::Relaxed)
    }
}

/// [`MediaTransportEngine`] backed by a [`LoopbackNetwork`]
#[derive(Clone)]
pub struct LoopbackEngine {
    network: LoopbackNetwork,
    local: PeerIdentity,
}

impl MediaTransportEngine for LoopbackEngine {
    fn create_connection(
        &self,
        remote: &PeerIdentity,
        _config: &TransportConfig,
        events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>> {
        let connection = Arc::new(LoopbackConnection {
            local: self.local.clone(),
            remote: remote.clone(),
            port: self.network.allocate_port(),
            network: self.network.clone(),
            events,
            inner: Mutex::new(ConnectionInner::default()),
        });
        self.network.register(&connection);
        connection.events.emit(TransportEvent::StateChanged(TransportState::New));
        Ok(connection)
    }
}

#[derive(Default)]
struct ConnectionInner {
    local_description: Option<SdpType>,
    remote_description: Option<SdpType>,
    remote_candidates: Vec<String>,
    partner: Weak<LoopbackConnection>,
    connected: bool,
    closed: bool,
    blocked: bool,
}

impl ConnectionInner {
    fn ready_to_connect(&self) -> bool {
        !self.closed && !self.connected && self.local_description.is_some() && self.remote_description.is_some()
    }
}

pub struct LoopbackConnection {
    local: PeerIdentity,
    remote: PeerIdentity,
    port: u16,
    network: LoopbackNetwork,
    events: ConnectionEvents,
    inner: Mutex<ConnectionInner>,
}

impl LoopbackConnection {
    fn link(&self, partner: &Arc<LoopbackConnection>) {
        let mut inner = self.inner.lock();
        inner.partner = Arc::downgrade(partner);
        inner.connected = true;
    }

    fn sdp(&self, kind: SdpType) -> String {
        let setup = match kind {
            SdpType::Offer => "actpass",
            SdpType::Answer => "active",
        };
        format!(
            "v=0\r\no=- {port} 0 IN IP4 127.0.0.1\r\ns=peercall\r\nt=0 0\r\n\
             m=application {port} UDP/DTLS/SCTP webrtc-datachannel\r\n\
             c=IN IP4 127.0.0.1\r\na=mid:0\r\na=setup:{setup}\r\na=ice-ufrag:{ufrag}\r\n",
            port = self.port,
            setup = setup,
            ufrag = self.local,
        )
    }

    fn candidate(&self) -> String {
        format!("a=candidate:1 1 UDP 2122260223 127.0.0.1 {} typ host", self.port)
    }

    /// Called by the partner when it closes
    fn partner_closed(&self) {
        let mut inner = self.inner.lock();
        if inner.closed || !inner.connected {
            return;
        }
        inner.connected = false;
        drop(inner);
        self.events.emit(TransportEvent::StateChanged(TransportState::Closed));
    }
}

impl MediaConnection for LoopbackConnection {
    fn set_local_description(&self, kind: SdpType) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(SessionError::transport("connection closed"));
            }
            if kind == SdpType::Answer && inner.remote_description != Some(SdpType::Offer) {
                return Err(SessionError::transport("cannot answer without a remote offer"));
            }
            inner.local_description = Some(kind);
        }

        self.events.emit(TransportEvent::LocalDescription {
            sdp: self.sdp(kind),
            kind,
        });
        self.events.emit(TransportEvent::LocalCandidate {
            candidate: self.candidate(),
            mid: "0".to_string(),
        });
        self.events.emit(TransportEvent::GatheringComplete);

        self.try_connect_self();
        Ok(())
    }

    fn set_remote_description(&self, sdp: &str, kind: SdpType) -> Result<()> {
        if !sdp.starts_with("v=0") {
            return Err(SessionError::transport("remote description is not SDP"));
        }
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(SessionError::transport("connection closed"));
            }
            inner.remote_description = Some(kind);
        }
        self.events.emit(TransportEvent::StateChanged(TransportState::Connecting));
        self.try_connect_self();
        Ok(())
    }

    fn add_remote_candidate(&self, candidate: &str, _mid: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::transport("connection closed"));
        }
        inner.remote_candidates.push(candidate.to_string());
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        let partner = {
            let inner = self.inner.lock();
            if !inner.connected || inner.closed {
                return Err(SessionError::transport("data path not open"));
            }
            if inner.blocked {
                return Err(SessionError::transport("send would block"));
            }
            inner.partner.upgrade()
        };

        match partner {
            Some(partner) => {
                partner
                    .events
                    .emit(TransportEvent::TrackMessage(Bytes::copy_from_slice(data)));
                Ok(())
            }
            None => Err(SessionError::transport("peer connection gone")),
        }
    }

    fn close(&self) {
        let partner = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.connected = false;
            std::mem::take(&mut inner.partner)
        };
        debug!(local = %self.local, remote = %self.remote, "Loopback connection closed");
        if let Some(partner) = partner.upgrade() {
            partner.partner_closed();
        }
    }
}

impl LoopbackConnection {
    fn try_connect_self(&self) {
        if let Some(me) = self.network.connection(&self.local, &self.remote) {
            if std::ptr::eq(Arc::as_ptr(&me), self) {
                self.network.try_connect(&me);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SessionTransportEvent;
    use crate::types::SessionId;
    use tokio::sync::mpsc;

    fn open(
        network: &LoopbackNetwork,
        local: &str,
        remote: &str,
    ) -> (Arc<dyn MediaConnection>, mpsc::UnboundedReceiver<SessionTransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = ConnectionEvents::new(remote.into(), SessionId::new(), tx);
        let connection = network
            .engine(local)
            .create_connection(&remote.into(), &TransportConfig::default(), events)
            .unwrap();
        (connection, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionTransportEvent>) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(tagged) = rx.try_recv() {
            events.push(tagged.event);
        }
        events
    }

    #[test]
    fn test_offer_answer_connects_both_ends() {
        let network = LoopbackNetwork::new();
        let (a, mut a_rx) = open(&network, "a", "b");
        let (b, mut b_rx) = open(&network, "b", "a");

        a.set_local_description(SdpType::Offer).unwrap();
        let offer = drain(&mut a_rx)
            .into_iter()
            .find_map(|e| match e {
                TransportEvent::LocalDescription { sdp, .. } => Some(sdp),
                _ => None,
            })
            .unwrap();

        b.set_remote_description(&offer, SdpType::Offer).unwrap();
        b.set_local_description(SdpType::Answer).unwrap();
        assert!(!drain(&mut b_rx).contains(&TransportEvent::StateChanged(TransportState::Connected)));

        a.set_remote_description("v=0\r\n", SdpType::Answer).unwrap();
        assert!(drain(&mut a_rx).contains(&TransportEvent::StateChanged(TransportState::Connected)));
        assert!(drain(&mut b_rx).contains(&TransportEvent::StateChanged(TransportState::Connected)));

        a.send(&[1, 2, 3]).unwrap();
        assert_eq!(
            drain(&mut b_rx),
            vec![TransportEvent::TrackMessage(Bytes::from_static(&[1, 2, 3]))]
        );

        a.close();
        assert_eq!(drain(&mut b_rx), vec![TransportEvent::StateChanged(TransportState::Closed)]);
        assert!(a.send(&[0]).is_err());
    }

    #[test]
    fn test_send_before_connect_fails() {
        let network = LoopbackNetwork::new();
        let (a, _rx) = open(&network, "a", "b");
        assert!(a.send(&[0]).is_err());
    }

    #[test]
    fn test_answer_requires_offer() {
        let network = LoopbackNetwork::new();
        let (a, _rx) = open(&network, "a", "b");
        assert!(a.set_local_description(SdpType::Answer).is_err());
    }

    #[test]
    fn test_inject_state() {
        let network = LoopbackNetwork::new();
        let (_a, mut rx) = open(&network, "a", "b");
        drain(&mut rx);
        assert!(network.inject_state(&"a".into(), &"b".into(), TransportState::Failed));
        assert_eq!(drain(&mut rx), vec![TransportEvent::StateChanged(TransportState::Failed)]);
        assert!(!network.inject_state(&"x".into(), &"y".into(), TransportState::Failed));
    }
}
