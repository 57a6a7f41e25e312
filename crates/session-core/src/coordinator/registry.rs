//! Identity → session directory
//!
//! The directory lock is short-held and never held across `.await` or
//! transport calls. Lock order is directory before session: code holding a
//! session lock must not call back into the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{Result, SessionError};
use crate::session::PeerSession;
use crate::types::{PeerIdentity, SessionId};

/// Shared handle to one session and its per-session lock
pub type SessionHandle = Arc<Mutex<PeerSession>>;

#[derive(Clone)]
struct Entry {
    session_id: SessionId,
    handle: SessionHandle,
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub total_created: u64,
    pub total_removed: u64,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<PeerIdentity, Entry>>,
    total_created: AtomicU64,
    total_removed: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session for `remote`, with the session id it was registered under
    pub fn get(&self, remote: &PeerIdentity) -> Option<(SessionId, SessionHandle)> {
        self.sessions
            .lock()
            .get(remote)
            .map(|entry| (entry.session_id, entry.handle.clone()))
    }

    /// Current session for `remote` if it is not terminal
    pub fn live(&self, remote: &PeerIdentity) -> Option<SessionHandle> {
        let sessions = self.sessions.lock();
        sessions
            .get(remote)
            .filter(|entry| !entry.handle.lock().is_terminal())
            .map(|entry| entry.handle.clone())
    }

    /// Register a new session, replacing a lingering terminal one.
    ///
    /// Fails with `DuplicateSession` if a live session already holds `remote`.
    pub fn insert(&self, remote: PeerIdentity, session_id: SessionId, handle: SessionHandle) -> Result<()> {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(&remote) {
            if !existing.handle.lock().is_terminal() {
                return Err(SessionError::DuplicateSession(remote));
            }
        }
        sessions.insert(remote, Entry { session_id, handle });
        self.total_created.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove the entry for `remote` only if it still belongs to `session_id`
    pub fn remove(&self, remote: &PeerIdentity, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(remote) {
            Some(entry) if entry.session_id == session_id => {
                sessions.remove(remote);
                self.total_removed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(remote = %remote, session = %session_id, "Unregistered session");
                true
            }
            _ => false,
        }
    }

    /// Identities with a registered session
    pub fn remotes(&self) -> Vec<PeerIdentity> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_sessions: self.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_removed: self.total_removed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallConfig;
    use crate::transport::loopback::LoopbackNetwork;
    use crate::transport::{ConnectionEvents, MediaTransportEngine, TransportConfig};
    use crate::types::{ConnectionState, Role};
    use peercall_audio_core::CodecConfig;
    use tokio::sync::mpsc;

    fn handle(remote: &str, session_id: SessionId) -> SessionHandle {
        let network = LoopbackNetwork::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = network
            .engine("me")
            .create_connection(
                &remote.into(),
                &TransportConfig::default(),
                ConnectionEvents::new(remote.into(), session_id, tx),
            )
            .unwrap();
        let config = CallConfig::new("me").with_codec(CodecConfig::pcmu());
        let session = PeerSession::new(remote.into(), session_id, Role::Offerer, connection, &config).unwrap();
        Arc::new(Mutex::new(session))
    }

    #[test]
    fn test_duplicate_live_session_rejected() {
        let registry = SessionRegistry::new();
        let first = SessionId::new();
        registry.insert("bob".into(), first, handle("bob", first)).unwrap();

        let second = SessionId::new();
        let result = registry.insert("bob".into(), second, handle("bob", second));
        assert!(matches!(result, Err(SessionError::DuplicateSession(_))));
        assert_eq!(registry.get(&"bob".into()).map(|(id, _)| id), Some(first));
    }

    #[test]
    fn test_terminal_session_replaced() {
        let registry = SessionRegistry::new();
        let first = SessionId::new();
        let old = handle("bob", first);
        registry.insert("bob".into(), first, old.clone()).unwrap();
        old.lock().shutdown(ConnectionState::Closed);
        assert!(registry.live(&"bob".into()).is_none());

        let second = SessionId::new();
        registry.insert("bob".into(), second, handle("bob", second)).unwrap();
        assert_eq!(registry.get(&"bob".into()).map(|(id, _)| id), Some(second));
    }

    #[test]
    fn test_remove_checks_session_id() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        registry.insert("bob".into(), id, handle("bob", id)).unwrap();

        assert!(!registry.remove(&"bob".into(), SessionId::new()));
        assert!(registry.remove(&"bob".into(), id));
        assert!(registry.is_empty());
        assert_eq!(registry.stats().total_removed, 1);
    }
}
