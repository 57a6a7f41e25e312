//! Audio side of a peercall session.
//!
//! - [`codec`]: the boundary to the audio codec plus G.711, L16 and (with
//!   `codec-opus`) Opus implementations
//! - [`device`]: capture source / playback sink traits and in-memory devices
//! - [`pipeline`]: the capture pipeline (PCM → encoded → RTP → transport) and
//!   the playback pipeline (RTP → decoded → bounded queue → sink)

pub mod codec;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod types;

pub use codec::{AudioCodec, CodecConfig, CodecFactory, CodecType};
pub use device::memory::{MemoryCaptureSource, MemoryPlaybackSink};
pub use device::{CaptureSource, PcmCallback, PlaybackSink};
pub use error::{AudioError, AudioResult};
pub use pipeline::capture::{AudioCapturePipeline, CaptureStats, PacketTransmitter};
pub use pipeline::playback::{AudioPlaybackPipeline, PlaybackConfig, PlaybackStats};
pub use pipeline::queue::PlaybackQueue;
pub use pipeline::reorder::ReorderBuffer;
pub use types::AudioFormat;
