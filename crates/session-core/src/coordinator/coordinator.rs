//! Core SignalingOrchestrator structure and initialization

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::registry::{RegistryStats, SessionRegistry};
use crate::config::CallConfig;
use crate::errors::Result;
use crate::events::CallEvent;
use crate::session::{AudioDeviceProvider, SessionSnapshot};
use crate::signaling::SignalingChannel;
use crate::transport::{MediaTransportEngine, SessionTransportEvent, TransportConfig};
use crate::types::{ConnectionState, PeerIdentity};

/// Owns every peer session of this process and drives them through the
/// signaling channel and the transport engine.
pub struct SignalingOrchestrator {
    pub(crate) config: CallConfig,
    pub(crate) transport_config: TransportConfig,
    pub(crate) engine: Arc<dyn MediaTransportEngine>,
    pub(crate) signaling: Arc<dyn SignalingChannel>,
    pub(crate) devices: Arc<dyn AudioDeviceProvider>,
    pub(crate) registry: SessionRegistry,
    pub(crate) transport_tx: mpsc::UnboundedSender<SessionTransportEvent>,
    pub(crate) call_events: broadcast::Sender<CallEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SignalingOrchestrator {
    /// Build the orchestrator and start its transport event loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: CallConfig,
        engine: Arc<dyn MediaTransportEngine>,
        signaling: Arc<dyn SignalingChannel>,
        devices: Arc<dyn AudioDeviceProvider>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (call_events, _) = broadcast::channel(config.event_channel_capacity);
        let transport_config = TransportConfig {
            ice_servers: config.ice_servers.clone(),
        };

        let orchestrator = Arc::new(Self {
            config,
            transport_config,
            engine,
            signaling,
            devices,
            registry: SessionRegistry::new(),
            transport_tx,
            call_events,
            tasks: Mutex::new(Vec::new()),
        });

        let event_loop = tokio::spawn(Self::run_event_loop(Arc::downgrade(&orchestrator), transport_rx));
        orchestrator.tasks.lock().push(event_loop);

        tracing::info!(local = %orchestrator.config.local_id, "Signaling orchestrator started");
        Ok(orchestrator)
    }

    /// Feed inbound signaling text into the orchestrator, one message at a time.
    pub fn spawn_signaling_reader(self: &Arc<Self>, mut inbound: mpsc::UnboundedReceiver<String>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let reader = tokio::spawn(async move {
            while let Some(text) = inbound.recv().await {
                let Some(orchestrator) = weak.upgrade() else {
                    break;
                };
                orchestrator.on_message_received(&text).await;
            }
            tracing::debug!("Signaling reader finished");
        });
        self.tasks.lock().push(reader);
    }

    pub fn local_id(&self) -> &PeerIdentity {
        &self.config.local_id
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Subscribe to call events
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.call_events.subscribe()
    }

    /// State of the current session for `remote`
    pub fn session_state(&self, remote: &PeerIdentity) -> Option<ConnectionState> {
        let (_, handle) = self.registry.get(remote)?;
        let state = handle.lock().state();
        Some(state)
    }

    pub fn session_snapshot(&self, remote: &PeerIdentity) -> Option<SessionSnapshot> {
        let (_, handle) = self.registry.get(remote)?;
        let snapshot = handle.lock().snapshot();
        Some(snapshot)
    }

    /// Identities with a registered session
    pub fn active_sessions(&self) -> Vec<PeerIdentity> {
        self.registry.remotes()
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub(crate) fn publish(&self, event: CallEvent) {
        // No subscribers is not an error
        let _ = self.call_events.send(event);
    }

    /// Hang up every session and stop background tasks
    pub async fn shutdown(&self) {
        for remote in self.registry.remotes() {
            if let Err(e) = self.hang_up(remote.clone()).await {
                tracing::debug!(remote = %remote, "Hang-up during shutdown: {}", e);
            }
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::info!(local = %self.config.local_id, "Signaling orchestrator stopped");
    }
}

impl Drop for SignalingOrchestrator {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
