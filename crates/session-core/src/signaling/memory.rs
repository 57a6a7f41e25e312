//! In-process relay for tests and demos
//!
//! Behaves like the TCP rendezvous server: `register` binds an identity to
//! the sending channel, everything else is forwarded verbatim to the
//! registered target. Forwarded envelopes are also kept for inspection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{SignalingChannel, SignalingEnvelope};
use crate::errors::{Result, SessionError};
use crate::types::PeerIdentity;

#[derive(Default)]
struct RelayState {
    peers: HashMap<PeerIdentity, mpsc::UnboundedSender<String>>,
    history: Vec<SignalingEnvelope>,
}

/// Shared in-memory rendezvous point
#[derive(Clone, Default)]
pub struct MemoryRelay {
    state: Arc<Mutex<RelayState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel; messages addressed to it arrive on the receiver once
    /// it has sent `register`.
    pub fn connect(&self) -> (MemorySignalingChannel, mpsc::UnboundedReceiver<String>) {
        let (inbox, rx) = mpsc::unbounded_channel();
        (
            MemorySignalingChannel {
                state: self.state.clone(),
                inbox,
            },
            rx,
        )
    }

    /// Every non-register envelope sent through the relay, in order
    pub fn history(&self) -> Vec<SignalingEnvelope> {
        self.state.lock().history.clone()
    }

    /// Deliver raw text to a registered identity, bypassing parsing
    pub fn inject(&self, target: &PeerIdentity, text: impl Into<String>) -> bool {
        match self.state.lock().peers.get(target) {
            Some(inbox) => inbox.send(text.into()).is_ok(),
            None => false,
        }
    }

    pub fn is_registered(&self, id: &PeerIdentity) -> bool {
        self.state.lock().peers.contains_key(id)
    }
}

/// One participant's end of a [`MemoryRelay`]
pub struct MemorySignalingChannel {
    state: Arc<Mutex<RelayState>>,
    inbox: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl SignalingChannel for MemorySignalingChannel {
    async fn send(&self, message: String) -> Result<()> {
        let envelope = SignalingEnvelope::from_json(&message)
            .map_err(|e| SessionError::protocol(format!("relay rejected message: {}", e)))?;

        let mut state = self.state.lock();
        if let SignalingEnvelope::Register { id } = &envelope {
            debug!(id = %id, "Relay registered peer");
            state.peers.insert(id.clone(), self.inbox.clone());
            return Ok(());
        }

        state.history.push(envelope.clone());
        let target = envelope.target().and_then(|t| state.peers.get(t));
        match target {
            Some(inbox) => {
                let _ = inbox.send(message);
            }
            None => debug!(kind = envelope.kind(), "Relay dropped message for unregistered target"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_after_register() {
        let relay = MemoryRelay::new();
        let (alice, _alice_rx) = relay.connect();
        let (bob, mut bob_rx) = relay.connect();

        bob.send(SignalingEnvelope::register("bob".into()).to_json().unwrap()).await.unwrap();
        assert!(relay.is_registered(&"bob".into()));

        let offer = SignalingEnvelope::offer("alice".into(), "bob".into(), "v=0");
        alice.send(offer.to_json().unwrap()).await.unwrap();

        let received = bob_rx.recv().await.unwrap();
        assert_eq!(SignalingEnvelope::from_json(&received).unwrap(), offer);
        assert_eq!(relay.history(), vec![offer]);
    }

    #[tokio::test]
    async fn test_unregistered_target_dropped() {
        let relay = MemoryRelay::new();
        let (alice, _rx) = relay.connect();
        let offer = SignalingEnvelope::offer("alice".into(), "nobody".into(), "v=0");
        assert!(alice.send(offer.to_json().unwrap()).await.is_ok());
        assert_eq!(relay.history().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_rejected() {
        let relay = MemoryRelay::new();
        let (alice, _rx) = relay.connect();
        assert!(matches!(alice.send("{".to_string()).await, Err(SessionError::Protocol(_))));
    }
}
