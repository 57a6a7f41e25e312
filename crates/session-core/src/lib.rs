//! Peer-to-peer call orchestration for peercall.
//!
//! A [`SignalingOrchestrator`] owns one [`PeerSession`] per remote identity.
//! It exchanges offer/answer/candidate envelopes over a [`SignalingChannel`],
//! drives a [`MediaTransportEngine`] connection per session, and once a
//! connection is up runs the audio capture and playback pipelines over it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use peercall_session_core::prelude::*;
//!
//! # async fn demo() -> peercall_session_core::Result<()> {
//! let network = LoopbackNetwork::new();
//! let relay = MemoryRelay::new();
//! let (channel, inbound) = relay.connect();
//!
//! let alice = SignalingOrchestrator::new(
//!     CallConfig::new("alice"),
//!     Arc::new(network.engine("alice")),
//!     Arc::new(channel),
//!     Arc::new(MemoryDevices::new()),
//! )?;
//! alice.spawn_signaling_reader(inbound);
//! alice.register().await?;
//! alice.start_call("bob").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod session;
pub mod signaling;
pub mod transport;
pub mod types;

pub use config::CallConfig;
pub use coordinator::SignalingOrchestrator;
pub use errors::{Result, SessionError};
pub use events::CallEvent;
pub use session::{AudioDeviceProvider, MemoryDevices, PeerSession, SessionSnapshot};
pub use signaling::memory::{MemoryRelay, MemorySignalingChannel};
pub use signaling::tcp::TcpSignalingChannel;
pub use signaling::{SignalingChannel, SignalingEnvelope};
pub use transport::loopback::{LoopbackEngine, LoopbackNetwork};
pub use transport::{
    ConnectionEvents, MediaConnection, MediaTransportEngine, SdpType, SessionTransportEvent, TransportConfig,
    TransportEvent, TransportState,
};
pub use types::{ConnectionState, PeerIdentity, Role, SessionId};

/// Common imports for applications
pub mod prelude {
    pub use crate::{
        AudioDeviceProvider, CallConfig, CallEvent, ConnectionState, LoopbackNetwork, MemoryDevices, MemoryRelay,
        PeerIdentity, Result, Role, SessionError, SignalingChannel, SignalingEnvelope, SignalingOrchestrator,
        TcpSignalingChannel,
    };
    pub use peercall_audio_core::{CodecConfig, CodecType, PlaybackConfig};
}
