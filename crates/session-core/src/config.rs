//! Call configuration
//!
//! Every field has a default, so a TOML file only needs what it overrides:
//!
//! ```toml
//! local_id = "alice"
//! trickle_ice = true
//!
//! [codec]
//! codec = "pcmu"
//! sample_rate = 8000
//! payload_type = 0
//!
//! [playback]
//! reorder_depth = 4
//! ```

use std::path::Path;

use peercall_audio_core::{CodecConfig, PlaybackConfig};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::types::PeerIdentity;

/// Public STUN server used when none is configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Identity this process registers under
    pub local_id: PeerIdentity,
    /// STUN/TURN URLs handed to the transport engine
    pub ice_servers: Vec<String>,
    /// Send the description immediately and trickle candidates after it,
    /// instead of waiting for gathering to finish
    pub trickle_ice: bool,
    pub codec: CodecConfig,
    /// Fixed SSRC; random per session when unset
    pub ssrc: Option<u32>,
    /// Fixed first sequence number; random per session when unset
    pub initial_sequence: Option<u16>,
    pub playback: PlaybackConfig,
    /// Capacity of the call event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            local_id: PeerIdentity::new(""),
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            trickle_ice: false,
            codec: CodecConfig::default(),
            ssrc: None,
            initial_sequence: None,
            playback: PlaybackConfig::default(),
            event_channel_capacity: 64,
        }
    }
}

impl CallConfig {
    pub fn new(local_id: impl Into<PeerIdentity>) -> Self {
        Self {
            local_id: local_id.into(),
            ..Default::default()
        }
    }

    /// Load from a TOML file and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = peercall_infra_common::config::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text and validate
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = peercall_infra_common::config::from_toml_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_trickle_ice(mut self, enabled: bool) -> Self {
        self.trickle_ice = enabled;
        self
    }

    pub fn with_ssrc(mut self, ssrc: u32) -> Self {
        self.ssrc = Some(ssrc);
        self
    }

    pub fn with_initial_sequence(mut self, sequence: u16) -> Self {
        self.initial_sequence = Some(sequence);
        self
    }

    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_id.as_str().is_empty() {
            return Err(SessionError::config("local_id must not be empty"));
        }
        if self.event_channel_capacity == 0 {
            return Err(SessionError::config("event_channel_capacity must be at least 1"));
        }
        self.codec.validate()?;
        Ok(())
    }
}
