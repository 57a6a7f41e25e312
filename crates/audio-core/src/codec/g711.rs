use super::{check_chunk_len, AudioCodec, CodecConfig, CodecType};
use crate::error::{AudioError, AudioResult};

const ULAW_BIAS: i32 = 0x84;
const ALAW_AMI_MASK: i32 = 0x55;

/// G.711 audio codec supporting both μ-law (PCMU) and A-law (PCMA)
pub struct G711Codec {
    config: CodecConfig,
    is_mu_law: bool,
}

impl G711Codec {
    /// Create a codec; the law is picked from `config.codec`
    pub fn new(config: CodecConfig) -> AudioResult<Self> {
        let is_mu_law = match config.codec {
            CodecType::Pcmu => true,
            CodecType::Pcma => false,
            other => {
                return Err(AudioError::invalid_configuration(format!(
                    "G.711 codec created for {:?}",
                    other
                )))
            }
        };

        if config.sample_rate != 8000 {
            return Err(AudioError::invalid_configuration(format!(
                "G.711 only supports 8kHz sample rate, got {}",
                config.sample_rate
            )));
        }

        if config.channels != 1 {
            return Err(AudioError::invalid_configuration(format!(
                "G.711 only supports mono audio, got {} channels",
                config.channels
            )));
        }

        Ok(Self { config, is_mu_law })
    }
}

impl AudioCodec for G711Codec {
    fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>> {
        check_chunk_len(&self.config, pcm)?;

        let encode = if self.is_mu_law { linear_to_mu_law } else { linear_to_a_law };
        Ok(pcm.iter().map(|&sample| encode(sample)).collect())
    }

    fn decode(&mut self, encoded: &[u8]) -> AudioResult<Vec<i16>> {
        if encoded.is_empty() {
            return Err(AudioError::decode_failed("empty G.711 payload"));
        }

        let decode = if self.is_mu_law { mu_law_to_linear } else { a_law_to_linear };
        Ok(encoded.iter().map(|&byte| decode(byte)).collect())
    }

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn reset(&mut self) -> AudioResult<()> {
        // G.711 is stateless
        Ok(())
    }
}

/// Index of the highest set bit
fn top_bit(value: i32) -> i32 {
    31 - value.leading_zeros() as i32
}

/// Convert linear PCM sample to μ-law
fn linear_to_mu_law(sample: i16) -> u8 {
    let (linear, mask) = if sample < 0 {
        (ULAW_BIAS - sample as i32 - 1, 0x7F)
    } else {
        (ULAW_BIAS + sample as i32, 0xFF)
    };

    let segment = top_bit(linear | 0xFF) - 7;
    if segment >= 8 {
        return (0x7F ^ mask) as u8;
    }
    (((segment << 4) | ((linear >> (segment + 3)) & 0x0F)) ^ mask) as u8
}

/// Convert μ-law to linear PCM sample
fn mu_law_to_linear(mu_law: u8) -> i16 {
    let mu_law = !mu_law as i32;
    let magnitude = (((mu_law & 0x0F) << 3) + ULAW_BIAS) << ((mu_law & 0x70) >> 4);
    if mu_law & 0x80 != 0 {
        (ULAW_BIAS - magnitude) as i16
    } else {
        (magnitude - ULAW_BIAS) as i16
    }
}

/// Convert linear PCM sample to A-law
fn linear_to_a_law(sample: i16) -> u8 {
    let (linear, mask) = if sample >= 0 {
        (sample as i32, ALAW_AMI_MASK | 0x80)
    } else {
        (-(sample as i32) - 1, ALAW_AMI_MASK)
    };

    let segment = top_bit(linear | 0xFF) - 7;
    if segment >= 8 {
        return (0x7F ^ mask) as u8;
    }
    let shift = if segment > 0 { segment + 3 } else { 4 };
    (((segment << 4) | ((linear >> shift) & 0x0F)) ^ mask) as u8
}

/// Convert A-law to linear PCM sample
fn a_law_to_linear(a_law: u8) -> i16 {
    let a_law = (a_law as i32) ^ ALAW_AMI_MASK;
    let mut magnitude = (a_law & 0x0F) << 4;
    let segment = (a_law & 0x70) >> 4;
    if segment > 0 {
        magnitude = (magnitude + 0x108) << (segment - 1);
    } else {
        magnitude += 8;
    }
    if a_law & 0x80 != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}
