//! Core audio types

use serde::{Deserialize, Serialize};

/// Shape of the PCM stream crossing the codec boundary.
///
/// Samples are signed 16-bit, interleaved when `channels > 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_duration_ms: u32,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, frame_duration_ms: u32) -> Self {
        Self {
            sample_rate,
            channels,
            frame_duration_ms,
        }
    }

    /// 48 kHz mono, 20 ms frames
    pub fn wideband_mono() -> Self {
        Self::new(48000, 1, 20)
    }

    /// 8 kHz mono, 20 ms frames
    pub fn narrowband_mono() -> Self {
        Self::new(8000, 1, 20)
    }

    /// Samples per channel in one frame; also the RTP timestamp increment
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize) / 1000
    }

    /// Interleaved samples in one PCM chunk
    pub fn samples_per_chunk(&self) -> usize {
        self.samples_per_frame() * self.channels as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::wideband_mono()
    }
}

/// Generate one chunk of a sine tone, continuing from `frame_index`.
pub fn tone_chunk(format: &AudioFormat, frequency_hz: f32, frame_index: u64) -> Vec<i16> {
    let per_frame = format.samples_per_frame();
    let start = frame_index as usize * per_frame;
    let mut chunk = Vec::with_capacity(format.samples_per_chunk());
    for n in start..start + per_frame {
        let t = n as f32 / format.sample_rate as f32;
        let sample = (t * frequency_hz * std::f32::consts::TAU).sin() * i16::MAX as f32 * 0.3;
        for _ in 0..format.channels {
            chunk.push(sample as i16);
        }
    }
    chunk
}
