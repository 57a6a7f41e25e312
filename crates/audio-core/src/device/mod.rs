//! Capture and playback device seams
//!
//! Real hardware backends live outside this crate. The pipelines only need a
//! source that calls back with one PCM chunk at a time and a sink that
//! accepts decoded chunks in order.

use std::sync::Arc;

use crate::error::AudioResult;

pub mod memory;

/// Invoked by a capture source once per captured chunk
pub type PcmCallback = Arc<dyn Fn(&[i16]) + Send + Sync>;

/// Something that produces PCM chunks on its own schedule.
pub trait CaptureSource: Send + Sync {
    /// Begin delivering chunks to `callback`
    fn start(&self, callback: PcmCallback) -> AudioResult<()>;

    /// Stop delivering and release the callback; safe to call twice
    fn stop(&self);
}

/// Destination for decoded PCM
pub trait PlaybackSink: Send {
    fn write(&mut self, pcm: &[i16]) -> AudioResult<()>;
}
