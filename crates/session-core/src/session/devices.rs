//! Audio device provisioning per session

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use peercall_audio_core::{CaptureSource, MemoryCaptureSource, MemoryPlaybackSink, PlaybackSink};

use crate::errors::Result;
use crate::types::PeerIdentity;

/// Hands out the capture source and playback sink for a connected session.
pub trait AudioDeviceProvider: Send + Sync {
    fn capture_source(&self, remote: &PeerIdentity) -> Result<Arc<dyn CaptureSource>>;

    fn playback_sink(&self, remote: &PeerIdentity) -> Result<Box<dyn PlaybackSink>>;
}

/// Memory-backed devices, one capture source and one sink per remote identity.
///
/// Handles returned by [`capture`](Self::capture) and [`sink`](Self::sink)
/// share state with the ones given to sessions, so tests can push audio in
/// and read what was played.
#[derive(Default)]
pub struct MemoryDevices {
    captures: Mutex<HashMap<PeerIdentity, MemoryCaptureSource>>,
    sinks: Mutex<HashMap<PeerIdentity, MemoryPlaybackSink>>,
}

impl MemoryDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&self, remote: &PeerIdentity) -> MemoryCaptureSource {
        self.captures.lock().entry(remote.clone()).or_default().clone()
    }

    pub fn sink(&self, remote: &PeerIdentity) -> MemoryPlaybackSink {
        self.sinks.lock().entry(remote.clone()).or_default().clone()
    }
}

impl AudioDeviceProvider for MemoryDevices {
    fn capture_source(&self, remote: &PeerIdentity) -> Result<Arc<dyn CaptureSource>> {
        Ok(Arc::new(self.capture(remote)))
    }

    fn playback_sink(&self, remote: &PeerIdentity) -> Result<Box<dyn PlaybackSink>> {
        Ok(Box::new(self.sink(remote)))
    }
}
