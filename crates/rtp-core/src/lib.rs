//! RTP framing for peercall.
//!
//! This crate turns one encoded audio frame into a fixed 12-byte header plus
//! payload and back. It knows nothing about codecs, loss recovery or
//! ordering; callers decide what to do with gaps and payload types.

pub mod error;
pub mod packet;
pub mod stats;

pub use error::{Result, RtpError};
pub use packet::sequence::{seq_distance, SequenceCounter};
pub use packet::{RtpFramer, RtpHeader, RtpPacket};
pub use stats::{SequenceStats, SequenceTracker, SequenceVerdict};

/// RTP sequence number
pub type RtpSequenceNumber = u16;

/// RTP timestamp in codec sample-rate units
pub type RtpTimestamp = u32;

/// Synchronization source identifier
pub type RtpSsrc = u32;

/// Size of the fixed RTP header in bytes
pub const RTP_HEADER_SIZE: usize = 12;

/// RTP version carried in the top two bits of the first byte
pub const RTP_VERSION: u8 = 2;

/// Dynamic payload type used for Opus
pub const DEFAULT_PAYLOAD_TYPE: u8 = 111;
