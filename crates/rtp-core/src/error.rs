use thiserror::Error;

/// Result type for RTP framing operations
pub type Result<T> = std::result::Result<T, RtpError>;

/// Errors produced while framing or deframing RTP packets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtpError {
    /// Buffer shorter than the fixed header
    #[error("RTP header truncated: got {len} bytes, need 12")]
    HeaderTruncated { len: usize },
}
