//! Session lifecycle operations for SignalingOrchestrator

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::registry::SessionHandle;
use super::SignalingOrchestrator;
use crate::errors::{Result, SessionError};
use crate::events::CallEvent;
use crate::session::PeerSession;
use crate::signaling::SignalingEnvelope;
use crate::transport::{ConnectionEvents, SdpType};
use crate::types::{ConnectionState, PeerIdentity, Role, SessionId};

impl SignalingOrchestrator {
    /// Announce the local identity to the relay
    pub async fn register(&self) -> Result<()> {
        let envelope = SignalingEnvelope::register(self.config.local_id.clone());
        self.send_envelope(&envelope).await?;
        info!(local = %self.config.local_id, "Registered with signaling relay");
        Ok(())
    }

    /// Open an outbound call to `remote` as the offerer.
    ///
    /// Fails with `DuplicateSession` when a live session for `remote`
    /// exists; that session is left untouched.
    pub async fn start_call(&self, remote: impl Into<PeerIdentity>) -> Result<SessionId> {
        let remote = remote.into();
        if remote == self.config.local_id {
            return Err(SessionError::protocol("cannot call the local identity"));
        }
        if self.registry.live(&remote).is_some() {
            return Err(SessionError::DuplicateSession(remote));
        }

        let (session_id, handle) = self.create_session(remote.clone(), Role::Offerer)?;
        info!(remote = %remote, session = %session_id, "Starting call");

        let result = {
            let mut session = handle.lock();
            session
                .transition(ConnectionState::GatheringLocalDescription)
                .and_then(|_| session.connection().set_local_description(SdpType::Offer))
        };

        match result {
            Ok(()) => {
                self.publish_transition(&remote, session_id, ConnectionState::Idle, ConnectionState::GatheringLocalDescription);
                Ok(session_id)
            }
            Err(e) => {
                self.terminate(&handle, ConnectionState::Failed, &e.to_string());
                Err(e)
            }
        }
    }

    /// Tear down the call with `remote`
    pub async fn hang_up(&self, remote: impl Into<PeerIdentity>) -> Result<()> {
        let remote = remote.into();
        let (_, handle) = self
            .registry
            .get(&remote)
            .ok_or_else(|| SessionError::session_not_found(remote.as_str()))?;

        if !self.terminate(&handle, ConnectionState::Closed, "local hang-up") {
            return Err(SessionError::session_not_found(remote.as_str()));
        }
        Ok(())
    }

    /// Create a session and its connection, then register it.
    pub(crate) fn create_session(&self, remote: PeerIdentity, role: Role) -> Result<(SessionId, SessionHandle)> {
        let session_id = SessionId::new();
        let events = ConnectionEvents::new(remote.clone(), session_id, self.transport_tx.clone());
        let connection = self
            .engine
            .create_connection(&remote, &self.transport_config, events)?;

        let session = match PeerSession::new(remote.clone(), session_id, role, connection.clone(), &self.config) {
            Ok(session) => session,
            Err(e) => {
                connection.close();
                return Err(e);
            }
        };

        let handle = Arc::new(Mutex::new(session));
        if let Err(e) = self.registry.insert(remote, session_id, handle.clone()) {
            // Lost a race with another session for the same identity
            connection.close();
            return Err(e);
        }
        Ok((session_id, handle))
    }

    /// Move a session to a terminal state, release it and drop it from the
    /// registry. Returns false if it was already terminal.
    pub(crate) fn terminate(&self, handle: &SessionHandle, terminal: ConnectionState, reason: &str) -> bool {
        let (remote, session_id) = {
            let mut session = handle.lock();
            if session.shutdown(terminal).is_none() {
                return false;
            }
            (session.remote().clone(), session.session_id())
        };

        self.registry.remove(&remote, session_id);
        if terminal == ConnectionState::Failed {
            warn!(remote = %remote, session = %session_id, "Call failed: {}", reason);
        } else {
            info!(remote = %remote, session = %session_id, "Call closed: {}", reason);
        }
        self.publish(CallEvent::CallEnded {
            remote,
            session_id,
            state: terminal,
            reason: reason.to_string(),
        });
        true
    }

    pub(crate) fn publish_transition(
        &self,
        remote: &PeerIdentity,
        session_id: SessionId,
        old_state: ConnectionState,
        new_state: ConnectionState,
    ) {
        self.publish(CallEvent::StateChanged {
            remote: remote.clone(),
            session_id,
            old_state,
            new_state,
        });
    }
}
