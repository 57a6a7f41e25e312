//! Opus via libopus (`audiopus`)

use audiopus::coder::{Decoder, Encoder};
use audiopus::{Application, Bitrate, Channels, SampleRate};

use super::{check_chunk_len, AudioCodec, CodecConfig, CodecType};
use crate::error::{AudioError, AudioResult};

/// Largest Opus packet libopus will produce
const MAX_PACKET_SIZE: usize = 4000;

pub struct OpusCodec {
    config: CodecConfig,
    encoder: Encoder,
    decoder: Decoder,
}

impl OpusCodec {
    pub fn new(config: CodecConfig) -> AudioResult<Self> {
        if config.codec != CodecType::Opus {
            return Err(AudioError::invalid_configuration(format!(
                "Opus codec created for {:?}",
                config.codec
            )));
        }
        let (encoder, decoder) = build_coders(&config)?;
        Ok(Self {
            config,
            encoder,
            decoder,
        })
    }
}

fn sample_rate(rate: u32) -> AudioResult<SampleRate> {
    match rate {
        8000 => Ok(SampleRate::Hz8000),
        12000 => Ok(SampleRate::Hz12000),
        16000 => Ok(SampleRate::Hz16000),
        24000 => Ok(SampleRate::Hz24000),
        48000 => Ok(SampleRate::Hz48000),
        other => Err(AudioError::invalid_configuration(format!(
            "Opus does not support {} Hz",
            other
        ))),
    }
}

fn channels(count: u16) -> AudioResult<Channels> {
    match count {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        other => Err(AudioError::invalid_configuration(format!(
            "Opus does not support {} channels",
            other
        ))),
    }
}

fn build_coders(config: &CodecConfig) -> AudioResult<(Encoder, Decoder)> {
    let rate = sample_rate(config.sample_rate)?;
    let channels = channels(config.channels)?;

    let mut encoder = Encoder::new(rate, channels, Application::Voip)
        .map_err(|e| AudioError::invalid_configuration(format!("Opus encoder: {}", e)))?;
    encoder
        .set_bitrate(Bitrate::BitsPerSecond(config.bitrate as i32))
        .map_err(|e| AudioError::invalid_configuration(format!("Opus bitrate: {}", e)))?;

    let decoder = Decoder::new(rate, channels)
        .map_err(|e| AudioError::invalid_configuration(format!("Opus decoder: {}", e)))?;

    Ok((encoder, decoder))
}

impl AudioCodec for OpusCodec {
    fn encode(&mut self, pcm: &[i16]) -> AudioResult<Vec<u8>> {
        check_chunk_len(&self.config, pcm)?;

        let mut output = vec![0u8; MAX_PACKET_SIZE];
        let written = self
            .encoder
            .encode(pcm, &mut output)
            .map_err(|e| AudioError::encode_failed(e.to_string()))?;
        output.truncate(written);
        Ok(output)
    }

    fn decode(&mut self, encoded: &[u8]) -> AudioResult<Vec<i16>> {
        let mut output = vec![0i16; self.config.format().samples_per_chunk()];
        let samples = self
            .decoder
            .decode(Some(encoded), &mut output, false)
            .map_err(|e| AudioError::decode_failed(e.to_string()))?;
        output.truncate(samples * self.config.channels as usize);
        Ok(output)
    }

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn reset(&mut self) -> AudioResult<()> {
        let (encoder, decoder) = build_coders(&self.config)?;
        self.encoder = encoder;
        self.decoder = decoder;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tone_chunk;

    #[test]
    fn test_encode_decode_reference_frame() {
        let config = CodecConfig::opus();
        let mut codec = OpusCodec::new(config.clone()).unwrap();
        let pcm = tone_chunk(&config.format(), 440.0, 0);

        let encoded = codec.encode(&pcm).unwrap();
        assert!(!encoded.is_empty());

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.len(), 960);
    }

    #[test]
    fn test_rejects_odd_rate() {
        let config = CodecConfig {
            sample_rate: 44100,
            ..CodecConfig::opus()
        };
        assert!(OpusCodec::new(config).is_err());
    }
}
