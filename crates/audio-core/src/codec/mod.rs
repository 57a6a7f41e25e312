//! Codec boundary
//!
//! The pipelines only ever see [`AudioCodec`]: PCM in, opaque bytes out and
//! back. Sample rate, channel count and frame duration are fixed when the
//! codec is created and never renegotiated mid-session.

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};
use crate::types::AudioFormat;

pub mod g711;
pub mod l16;
#[cfg(feature = "codec-opus")]
pub mod opus;

/// Audio codecs this crate can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    /// Opus - variable bitrate, 8-48kHz
    Opus,
    /// G.711 PCMU (μ-law) - 8kHz, 64kbps
    Pcmu,
    /// G.711 PCMA (A-law) - 8kHz, 64kbps
    Pcma,
    /// Uncompressed 16-bit big-endian PCM
    L16,
}

impl CodecType {
    /// Get the default RTP payload type for this codec
    pub fn default_payload_type(&self) -> u8 {
        match self {
            CodecType::Opus => 111,
            CodecType::Pcmu => 0,
            CodecType::Pcma => 8,
            CodecType::L16 => 96,
        }
    }

    /// Get the codec name as used in SDP
    pub fn sdp_name(&self) -> &'static str {
        match self {
            CodecType::Opus => "opus",
            CodecType::Pcmu => "PCMU",
            CodecType::Pcma => "PCMA",
            CodecType::L16 => "L16",
        }
    }
}

/// Configuration negotiated once at session start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub codec: CodecType,
    /// RTP payload type stamped on every packet
    pub payload_type: u8,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_duration_ms: u32,
    /// Target bitrate in bits per second (ignored by fixed-rate codecs)
    pub bitrate: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::opus()
    }
}

impl CodecConfig {
    /// Opus at 48 kHz mono, 20 ms frames, payload type 111
    pub fn opus() -> Self {
        Self {
            codec: CodecType::Opus,
            payload_type: CodecType::Opus.default_payload_type(),
            sample_rate: 48000,
            channels: 1,
            frame_duration_ms: 20,
            bitrate: 48000,
        }
    }

    /// G.711 μ-law at 8 kHz mono
    pub fn pcmu() -> Self {
        Self {
            codec: CodecType::Pcmu,
            payload_type: CodecType::Pcmu.default_payload_type(),
            sample_rate: 8000,
            channels: 1,
            frame_duration_ms: 20,
            bitrate: 64000,
        }
    }

    /// G.711 A-law at 8 kHz mono
    pub fn pcma() -> Self {
        Self {
            codec: CodecType::Pcma,
            payload_type: CodecType::Pcma.default_payload_type(),
            ..Self::pcmu()
        }
    }

    /// Linear PCM at the given rate, mono
    pub fn l16(sample_rate: u32) -> Self {
        Self {
            codec: CodecType::L16,
            payload_type: CodecType::L16.default_payload_type(),
            sample_rate,
            channels: 1,
            frame_duration_ms: 20,
            bitrate: sample_rate * 16,
        }
    }

    /// Override the payload type
    pub fn with_payload_type(mut self, payload_type: u8) -> Self {
        self.payload_type = payload_type;
        self
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.frame_duration_ms)
    }

    /// Reject configurations no pipeline can run with
    pub fn validate(&self) -> AudioResult<()> {
        if !CodecFactory::is_supported(self.codec) {
            return Err(AudioError::UnsupportedCodec {
                codec: format!("{} (not enabled in this build)", self.codec.sdp_name()),
            });
        }
        if self.payload_type > 0x7F {
            return Err(AudioError::invalid_configuration(format!(
                "payload type {} does not fit in 7 bits",
                self.payload_type
            )));
        }
        if self.channels == 0 {
            return Err(AudioError::invalid_configuration("channel count must be at least 1"));
        }
        if self.format().samples_per_frame() == 0 {
            return Err(AudioError::invalid_configuration(format!(
                "{} Hz with {} ms frames yields no samples",
                self.sample_rate, self.frame_duration_ms
            )));
        }
        Ok(())
    }
}

/// Stateful encoder/decoder pair for one direction of one session.
pub trait AudioCodec: Send {
    /// Encode exactly one PCM chunk into one frame
    fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>>;

    /// Decode one frame into PCM
    fn decode(&mut self, encoded: &[u8]) -> AudioResult<Vec<i16>>;

    fn config(&self) -> &CodecConfig;

    /// Reset codec state
    fn reset(&mut self) -> AudioResult<()>;
}

/// Reject chunks that do not hold exactly one frame
pub(crate) fn check_chunk_len(config: &CodecConfig, pcm: &[i16]) -> AudioResult<()> {
    let expected = config.format().samples_per_chunk();
    if pcm.len() != expected {
        return Err(AudioError::InvalidFrameSize {
            expected,
            actual: pcm.len(),
        });
    }
    Ok(())
}

/// Factory for creating codec instances
pub struct CodecFactory;

impl CodecFactory {
    /// Create a new codec instance with the specified configuration
    pub fn create(config: &CodecConfig) -> AudioResult<Box<dyn AudioCodec>> {
        config.validate()?;
        match config.codec {
            CodecType::Pcmu | CodecType::Pcma => Ok(Box::new(g711::G711Codec::new(config.clone())?)),
            CodecType::L16 => Ok(Box::new(l16::L16Codec::new(config.clone())?)),
            #[cfg(feature = "codec-opus")]
            CodecType::Opus => Ok(Box::new(opus::OpusCodec::new(config.clone())?)),
            #[cfg(not(feature = "codec-opus"))]
            CodecType::Opus => Err(AudioError::UnsupportedCodec {
                codec: "opus (build with the codec-opus feature)".to_string(),
            }),
        }
    }

    /// Codecs available in this build
    pub fn supported_codecs() -> Vec<CodecType> {
        let mut codecs = vec![CodecType::Pcmu, CodecType::Pcma, CodecType::L16];
        if cfg!(feature = "codec-opus") {
            codecs.insert(0, CodecType::Opus);
        }
        codecs
    }

    pub fn is_supported(codec: CodecType) -> bool {
        Self::supported_codecs().contains(&codec)
    }
}
