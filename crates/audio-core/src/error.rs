//! Error types for audio operations

use peercall_rtp_core::RtpError;
use thiserror::Error;

/// Result type for audio operations
pub type AudioResult<T> = std::result::Result<T, AudioError>;

/// Errors raised by codecs, devices and pipelines
#[derive(Debug, Error)]
pub enum AudioError {
    /// Codec or pipeline configured with values it cannot honour
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// PCM or encoded data in an unexpected shape
    #[error("Invalid format: {details}")]
    InvalidFormat { details: String },

    /// PCM chunk length differs from the negotiated frame size
    #[error("Invalid frame size: expected {expected} samples, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    #[error("Encoding failed: {reason}")]
    EncodeFailed { reason: String },

    #[error("Decoding failed: {reason}")]
    DecodeFailed { reason: String },

    /// Codec not compiled in or unknown
    #[error("Unsupported codec: {codec}")]
    UnsupportedCodec { codec: String },

    /// RTP framing failure
    #[error("Framing error: {0}")]
    Framing(#[from] RtpError),

    /// Transport refused or failed to take a packet
    #[error("Transmit failed: {reason}")]
    Transmit { reason: String },

    /// Capture or playback device failure
    #[error("Device error: {reason}")]
    Device { reason: String },
}

impl AudioError {
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { reason: reason.into() }
    }

    pub fn invalid_format(details: impl Into<String>) -> Self {
        Self::InvalidFormat { details: details.into() }
    }

    pub fn encode_failed(reason: impl Into<String>) -> Self {
        Self::EncodeFailed { reason: reason.into() }
    }

    pub fn decode_failed(reason: impl Into<String>) -> Self {
        Self::DecodeFailed { reason: reason.into() }
    }

    pub fn transmit(reason: impl Into<String>) -> Self {
        Self::Transmit { reason: reason.into() }
    }

    pub fn device(reason: impl Into<String>) -> Self {
        Self::Device { reason: reason.into() }
    }
}
