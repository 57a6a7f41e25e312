//! Inbound and outbound signaling for SignalingOrchestrator
//!
//! Envelopes are processed strictly one at a time. Anything that does not
//! fit the current state is logged and dropped; nothing here tears down a
//! session because of a stray message.

use tracing::{debug, info, warn};

use super::registry::SessionHandle;
use super::SignalingOrchestrator;
use crate::errors::Result;
use crate::signaling::SignalingEnvelope;
use crate::transport::SdpType;
use crate::types::{ConnectionState, PeerIdentity, Role};

impl SignalingOrchestrator {
    /// Parse and dispatch one inbound message. Malformed input is logged and dropped.
    pub async fn on_message_received(&self, text: &str) {
        let envelope = match SignalingEnvelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Discarding malformed signaling message: {}", e);
                return;
            }
        };
        if let Err(e) = self.on_envelope_received(envelope).await {
            warn!("Signaling message handling failed: {}", e);
        }
    }

    /// Dispatch one parsed envelope
    pub async fn on_envelope_received(&self, envelope: SignalingEnvelope) -> Result<()> {
        if let Some(target) = envelope.target() {
            if target != &self.config.local_id {
                warn!(kind = envelope.kind(), target = %target, "Discarding envelope addressed elsewhere");
                return Ok(());
            }
        }

        match envelope {
            SignalingEnvelope::Offer { sender, sdp, .. } => self.handle_offer(sender, sdp).await,
            SignalingEnvelope::Answer { sender, sdp, .. } => {
                self.handle_answer(sender, &sdp);
                Ok(())
            }
            SignalingEnvelope::Candidate {
                sender, candidate, mid, ..
            } => {
                self.handle_candidate(sender, &candidate, &mid);
                Ok(())
            }
            SignalingEnvelope::Register { id } => {
                warn!(id = %id, "Discarding register envelope received by a client");
                Ok(())
            }
        }
    }

    async fn handle_offer(&self, sender: PeerIdentity, sdp: String) -> Result<()> {
        if let Some((_, existing)) = self.registry.get(&sender) {
            let (live, role, state) = {
                let session = existing.lock();
                (!session.is_terminal(), session.role(), session.state())
            };

            if live {
                let glare = role == Role::Offerer
                    && matches!(
                        state,
                        ConnectionState::GatheringLocalDescription | ConnectionState::AwaitingRemoteDescription
                    );
                if !glare {
                    warn!(remote = %sender, %state, "Discarding offer for live session");
                    return Ok(());
                }
                if self.config.local_id < sender {
                    info!(remote = %sender, "Offer glare: yielding and answering the remote offer");
                    self.terminate(&existing, ConnectionState::Closed, "offer glare");
                } else {
                    info!(remote = %sender, "Offer glare: keeping local offer, discarding remote one");
                    return Ok(());
                }
            }
        }

        self.accept_offer(sender, sdp)
    }

    fn accept_offer(&self, sender: PeerIdentity, sdp: String) -> Result<()> {
        let (session_id, handle) = self.create_session(sender.clone(), Role::Answerer)?;
        info!(remote = %sender, session = %session_id, "Answering incoming call");

        let result = {
            let mut session = handle.lock();
            session
                .transition(ConnectionState::GatheringLocalDescription)
                .and_then(|_| session.connection().set_remote_description(&sdp, SdpType::Offer))
                .and_then(|_| session.connection().set_local_description(SdpType::Answer))
        };

        match result {
            Ok(()) => {
                self.publish_transition(&sender, session_id, ConnectionState::Idle, ConnectionState::GatheringLocalDescription);
                Ok(())
            }
            Err(e) => {
                self.terminate(&handle, ConnectionState::Failed, &format!("could not apply offer: {}", e));
                Ok(())
            }
        }
    }

    fn handle_answer(&self, sender: PeerIdentity, sdp: &str) {
        let Some((session_id, handle)) = self.registry.get(&sender) else {
            warn!(remote = %sender, "Discarding answer: no session");
            return;
        };

        let result = {
            let mut session = handle.lock();
            if session.role() != Role::Offerer || session.state() != ConnectionState::AwaitingRemoteDescription {
                warn!(remote = %sender, state = %session.state(), role = ?session.role(), "Discarding unexpected answer");
                return;
            }
            session
                .connection()
                .set_remote_description(sdp, SdpType::Answer)
                .and_then(|_| session.transition(ConnectionState::AwaitingConnection))
        };

        match result {
            Ok(previous) => {
                self.publish_transition(&sender, session_id, previous, ConnectionState::AwaitingConnection)
            }
            Err(e) => {
                self.terminate(&handle, ConnectionState::Failed, &format!("could not apply answer: {}", e));
            }
        }
    }

    fn handle_candidate(&self, sender: PeerIdentity, candidate: &str, mid: &str) {
        let Some(handle) = self.registry.live(&sender) else {
            warn!(remote = %sender, "Discarding candidate: no session");
            return;
        };

        let session = handle.lock();
        match session.connection().add_remote_candidate(candidate, mid) {
            Ok(()) => debug!(remote = %sender, mid, "Applied remote candidate"),
            Err(e) => warn!(remote = %sender, "Remote candidate rejected: {}", e),
        }
    }

    /// Send the offer or answer for `handle`, once.
    ///
    /// Moves an offerer to `AwaitingRemoteDescription` and an answerer that is
    /// still gathering to `AwaitingConnection`, then flushes any candidates
    /// queued while the description was pending.
    pub(crate) async fn on_local_description_ready(&self, handle: &SessionHandle) -> Result<()> {
        let prepared = {
            let mut session = handle.lock();
            if session.is_terminal() || session.description_sent() {
                return Ok(());
            }
            let Some((sdp, _)) = session.local_description().cloned() else {
                debug!(remote = %session.remote(), "Local description not generated yet");
                return Ok(());
            };

            let local = self.config.local_id.clone();
            let remote = session.remote().clone();
            let (envelope, next) = match session.role() {
                Role::Offerer => (
                    SignalingEnvelope::offer(local, remote.clone(), sdp),
                    ConnectionState::AwaitingRemoteDescription,
                ),
                Role::Answerer => (
                    SignalingEnvelope::answer(local, remote.clone(), sdp),
                    ConnectionState::AwaitingConnection,
                ),
            };

            let transition = if session.state() == ConnectionState::GatheringLocalDescription {
                Some((session.transition(next)?, next))
            } else {
                None
            };
            let queued = session.mark_description_sent();
            (remote, session.session_id(), envelope, transition, queued)
        };
        let (remote, session_id, envelope, transition, queued) = prepared;

        if let Some((previous, next)) = transition {
            self.publish_transition(&remote, session_id, previous, next);
        }

        if let Err(e) = self.send_envelope(&envelope).await {
            self.terminate(handle, ConnectionState::Failed, &format!("could not send {}: {}", envelope.kind(), e));
            return Err(e);
        }
        debug!(remote = %remote, kind = envelope.kind(), "Sent local description");

        for (candidate, mid) in queued {
            self.send_candidate(handle, &remote, candidate, mid).await?;
        }
        Ok(())
    }

    pub(crate) async fn send_candidate(
        &self,
        handle: &SessionHandle,
        remote: &PeerIdentity,
        candidate: String,
        mid: String,
    ) -> Result<()> {
        let envelope = SignalingEnvelope::candidate(self.config.local_id.clone(), remote.clone(), candidate, mid);
        if let Err(e) = self.send_envelope(&envelope).await {
            self.terminate(handle, ConnectionState::Failed, &format!("could not send candidate: {}", e));
            return Err(e);
        }
        Ok(())
    }

    pub(crate) async fn send_envelope(&self, envelope: &SignalingEnvelope) -> Result<()> {
        let text = envelope.to_json()?;
        self.signaling.send(text).await
    }
}
