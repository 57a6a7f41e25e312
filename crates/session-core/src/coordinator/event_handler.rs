//! Transport event handling for SignalingOrchestrator

use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::registry::SessionHandle;
use super::SignalingOrchestrator;
use crate::errors::Result;
use crate::transport::{SessionTransportEvent, TransportEvent, TransportState};
use crate::types::{ConnectionState, Role};

impl SignalingOrchestrator {
    /// Main loop dispatching transport events to their sessions in order
    pub(crate) async fn run_event_loop(
        orchestrator: Weak<Self>,
        mut events: mpsc::UnboundedReceiver<SessionTransportEvent>,
    ) {
        debug!("Starting transport event loop");

        while let Some(event) = events.recv().await {
            let Some(orchestrator) = orchestrator.upgrade() else {
                break;
            };
            if let Err(e) = orchestrator.handle_transport_event(event).await {
                error!("Error handling transport event: {}", e);
            }
        }

        debug!("Transport event loop ended");
    }

    async fn handle_transport_event(&self, tagged: SessionTransportEvent) -> Result<()> {
        let SessionTransportEvent {
            remote,
            session_id,
            event,
        } = tagged;

        let handle = match self.registry.get(&remote) {
            Some((current, handle)) if current == session_id => handle,
            _ => {
                trace!(remote = %remote, session = %session_id, "Discarding event from stale session");
                return Ok(());
            }
        };

        match event {
            TransportEvent::LocalDescription { sdp, kind } => {
                let send_now = {
                    let mut session = handle.lock();
                    if session.is_terminal() {
                        return Ok(());
                    }
                    debug!(remote = %remote, ?kind, "Local description generated");
                    session.set_local_description(sdp, kind);
                    self.config.trickle_ice
                };
                if send_now {
                    self.on_local_description_ready(&handle).await?;
                }
            }

            TransportEvent::LocalCandidate { candidate, mid } => {
                if !self.config.trickle_ice {
                    trace!(remote = %remote, "Candidate gathered; carried in the full description");
                    return Ok(());
                }
                let send_now = {
                    let mut session = handle.lock();
                    if session.is_terminal() {
                        return Ok(());
                    }
                    if session.description_sent() {
                        Some((candidate, mid))
                    } else {
                        session.queue_candidate(candidate, mid);
                        None
                    }
                };
                if let Some((candidate, mid)) = send_now {
                    self.send_candidate(&handle, &remote, candidate, mid).await?;
                }
            }

            TransportEvent::GatheringComplete => {
                debug!(remote = %remote, "Candidate gathering complete");
                if !self.config.trickle_ice {
                    self.on_local_description_ready(&handle).await?;
                }
            }

            TransportEvent::StateChanged(state) => self.handle_transport_state(&handle, state).await?,

            TransportEvent::TrackMessage(data) => {
                let session = handle.lock();
                if session.state() == ConnectionState::Connected {
                    session.on_media(&data);
                }
            }
        }

        Ok(())
    }

    async fn handle_transport_state(&self, handle: &SessionHandle, state: TransportState) -> Result<()> {
        match state {
            TransportState::Connected => self.handle_connected(handle).await,
            TransportState::Disconnected => {
                let session = handle.lock();
                info!(remote = %session.remote(), session = %session.session_id(), "Transport disconnected, waiting for recovery");
                Ok(())
            }
            TransportState::Failed => {
                self.terminate(handle, ConnectionState::Failed, "transport failed");
                Ok(())
            }
            TransportState::Closed => {
                self.terminate(handle, ConnectionState::Closed, "transport closed");
                Ok(())
            }
            TransportState::New | TransportState::Connecting => {
                trace!(?state, "Transport progressing");
                Ok(())
            }
        }
    }

    async fn handle_connected(&self, handle: &SessionHandle) -> Result<()> {
        let outcome = {
            let mut session = handle.lock();
            let answering_early =
                session.role() == Role::Answerer && session.state() == ConnectionState::GatheringLocalDescription;
            if session.state() != ConnectionState::AwaitingConnection && !answering_early {
                warn!(remote = %session.remote(), state = %session.state(), "Ignoring connectivity in unexpected state");
                return Ok(());
            }

            let previous = session.transition(ConnectionState::Connected)?;
            let started = session.start_media(self.devices.as_ref());
            (
                session.remote().clone(),
                session.session_id(),
                previous,
                started,
                !session.description_sent(),
            )
        };
        let (remote, session_id, previous, started, description_pending) = outcome;

        self.publish_transition(&remote, session_id, previous, ConnectionState::Connected);
        info!(remote = %remote, session = %session_id, "Call connected");

        if let Err(e) = started {
            self.terminate(handle, ConnectionState::Failed, &format!("could not start media: {}", e));
            return Err(e);
        }

        if description_pending {
            self.on_local_description_ready(handle).await?;
        }
        Ok(())
    }
}
