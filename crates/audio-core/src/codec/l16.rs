//! Uncompressed linear PCM (RFC 3551 L16): big-endian 16-bit samples

use super::{check_chunk_len, AudioCodec, CodecConfig, CodecType};
use crate::error::{AudioError, AudioResult};

pub struct L16Codec {
    config: CodecConfig,
}

impl L16Codec {
    pub fn new(config: CodecConfig) -> AudioResult<Self> {
        if config.codec != CodecType::L16 {
            return Err(AudioError::invalid_configuration(format!(
                "L16 codec created for {:?}",
                config.codec
            )));
        }
        Ok(Self { config })
    }
}

impl AudioCodec for L16Codec {
    fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>> {
        check_chunk_len(&self.config, pcm)?;
        Ok(pcm.iter().flat_map(|sample| sample.to_be_bytes()).collect())
    }

    fn decode(&mut self, encoded: &[u8]) -> AudioResult<Vec<i16>> {
        if encoded.is_empty() || encoded.len() % 2 != 0 {
            return Err(AudioError::decode_failed(format!(
                "L16 payload of {} bytes is not a whole number of samples",
                encoded.len()
            )));
        }
        Ok(encoded
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn reset(&mut self) -> AudioResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossless() {
        let mut codec = L16Codec::new(CodecConfig::l16(8000)).unwrap();
        let pcm: Vec<i16> = (0..160).map(|i| (i as i16 - 80) * 400).collect();
        let encoded = codec.encode(&pcm).unwrap();
        assert_eq!(encoded.len(), 320);
        assert_eq!(codec.decode(&encoded).unwrap(), pcm);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut codec = L16Codec::new(CodecConfig::l16(8000)).unwrap();
        let mut pcm = vec![0i16; 160];
        pcm[0] = 0x0102;
        let encoded = codec.encode(&pcm).unwrap();
        assert_eq!(&encoded[..2], &[0x01, 0x02]);
    }

    #[test]
    fn test_odd_payload_rejected() {
        let mut codec = L16Codec::new(CodecConfig::l16(8000)).unwrap();
        assert!(codec.decode(&[1, 2, 3]).is_err());
    }
}
