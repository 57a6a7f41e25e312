//! Outbound audio: PCM chunk → encode → RTP frame → transport
//!
//! Every captured chunk is handled synchronously on the capture source's own
//! context. The pipeline mutex covers the encoder, the sequence counter and
//! the running timestamp, so packets leave in the order chunks arrived.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use peercall_rtp_core::{RtpFramer, RtpSequenceNumber, RtpSsrc, RtpTimestamp, SequenceCounter};
use tracing::{debug, info, trace};

use crate::codec::{AudioCodec, CodecConfig, CodecFactory};
use crate::device::{CaptureSource, PcmCallback};
use crate::error::{AudioError, AudioResult};

/// Non-blocking send path into the media transport.
///
/// An error means the packet was not sent; the pipeline counts it and moves on.
pub trait PacketTransmitter: Send + Sync {
    fn transmit(&self, packet: &[u8]) -> AudioResult<()>;
}

/// Capture counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Packets handed to the transport successfully
    pub frames_sent: u64,
    /// Packets the transport refused
    pub send_drops: u64,
    /// Chunks the encoder rejected
    pub encode_errors: u64,
}

struct CaptureState {
    encoder: Box<dyn AudioCodec>,
    sequence: SequenceCounter,
    timestamp: RtpTimestamp,
}

struct CaptureInner {
    active: AtomicBool,
    ssrc: RtpSsrc,
    payload_type: u8,
    channels: usize,
    state: Mutex<CaptureState>,
    transmitter: Arc<dyn PacketTransmitter>,
    source: Mutex<Option<Arc<dyn CaptureSource>>>,
    frames_sent: AtomicU64,
    send_drops: AtomicU64,
    encode_errors: AtomicU64,
}

/// Capture side of one session
pub struct AudioCapturePipeline {
    inner: Arc<CaptureInner>,
}

impl AudioCapturePipeline {
    /// Build a pipeline that stamps `ssrc` and counts from `initial_sequence`.
    pub fn new(
        codec: &CodecConfig,
        ssrc: RtpSsrc,
        initial_sequence: RtpSequenceNumber,
        transmitter: Arc<dyn PacketTransmitter>,
    ) -> AudioResult<Self> {
        let encoder = CodecFactory::create(codec)?;
        Ok(Self::with_encoder(encoder, ssrc, initial_sequence, transmitter))
    }

    /// Build a pipeline around an already constructed encoder
    pub fn with_encoder(
        encoder: Box<dyn AudioCodec>,
        ssrc: RtpSsrc,
        initial_sequence: RtpSequenceNumber,
        transmitter: Arc<dyn PacketTransmitter>,
    ) -> Self {
        let config = encoder.config().clone();
        Self {
            inner: Arc::new(CaptureInner {
                active: AtomicBool::new(false),
                ssrc,
                payload_type: config.payload_type,
                channels: config.channels.max(1) as usize,
                state: Mutex::new(CaptureState {
                    encoder,
                    sequence: SequenceCounter::new(initial_sequence),
                    timestamp: 0,
                }),
                transmitter,
                source: Mutex::new(None),
                frames_sent: AtomicU64::new(0),
                send_drops: AtomicU64::new(0),
                encode_errors: AtomicU64::new(0),
            }),
        }
    }

    /// Mark the pipeline active and attach it to `source`.
    pub fn start(&self, source: Arc<dyn CaptureSource>) -> AudioResult<()> {
        if self.inner.active.swap(true, Ordering::AcqRel) {
            return Err(AudioError::device("capture pipeline already started"));
        }

        let weak: Weak<CaptureInner> = Arc::downgrade(&self.inner);
        let callback: PcmCallback = Arc::new(move |pcm: &[i16]| {
            if let Some(inner) = weak.upgrade() {
                inner.process(pcm);
            }
        });

        if let Err(e) = source.start(callback) {
            self.inner.active.store(false, Ordering::Release);
            return Err(e);
        }
        *self.inner.source.lock() = Some(source);

        info!(ssrc = self.inner.ssrc, "Audio capture started");
        Ok(())
    }

    /// Start accepting chunks through [`push_frame`](Self::push_frame) only
    pub fn activate(&self) {
        self.inner.active.store(true, Ordering::Release);
    }

    /// Deactivate, then release the source. Idempotent.
    pub fn stop(&self) {
        let was_active = self.inner.active.swap(false, Ordering::AcqRel);
        let source = self.inner.source.lock().take();
        if let Some(source) = source {
            source.stop();
        }
        if was_active {
            info!(ssrc = self.inner.ssrc, "Audio capture stopped");
        }
    }

    /// Feed one chunk directly. Returns false when the pipeline is inactive.
    pub fn push_frame(&self, pcm: &[i16]) -> bool {
        self.inner.process(pcm)
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.inner.ssrc
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence(&self) -> RtpSequenceNumber {
        self.inner.state.lock().sequence.peek()
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_sent: self.inner.frames_sent.load(Ordering::Relaxed),
            send_drops: self.inner.send_drops.load(Ordering::Relaxed),
            encode_errors: self.inner.encode_errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for AudioCapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl CaptureInner {
    fn process(&self, pcm: &[i16]) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }

        let mut state = self.state.lock();
        // Re-check under the lock: stop() may have raced the callback
        if !self.active.load(Ordering::Acquire) {
            return false;
        }

        let timestamp = state.timestamp;
        state.timestamp = timestamp.wrapping_add((pcm.len() / self.channels) as u32);

        let encoded = match state.encoder.encode(pcm) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.encode_errors.fetch_add(1, Ordering::Relaxed);
                debug!(ssrc = self.ssrc, error = %e, "Dropping chunk that failed to encode");
                return true;
            }
        };

        let seq = state.sequence.advance();
        let packet = RtpFramer::frame(self.ssrc, seq, timestamp, self.payload_type, false, &encoded);

        match self.transmitter.transmit(&packet) {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                trace!(ssrc = self.ssrc, seq, timestamp, bytes = packet.len(), "Sent RTP packet");
            }
            Err(e) => {
                self.send_drops.fetch_add(1, Ordering::Relaxed);
                debug!(ssrc = self.ssrc, seq, error = %e, "Transport dropped RTP packet");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::memory::MemoryCaptureSource;
    use peercall_rtp_core::RtpPacket;

    #[derive(Default)]
    struct Recorder {
        packets: Mutex<Vec<Vec<u8>>>,
        refuse: AtomicBool,
    }

    impl PacketTransmitter for Recorder {
        fn transmit(&self, packet: &[u8]) -> AudioResult<()> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(AudioError::transmit("would block"));
            }
            self.packets.lock().push(packet.to_vec());
            Ok(())
        }
    }

    fn pipeline(initial_sequence: u16) -> (AudioCapturePipeline, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let pipeline = AudioCapturePipeline::new(&CodecConfig::pcmu(), 0xABCD, initial_sequence, recorder.clone()).unwrap();
        (pipeline, recorder)
    }

    fn parsed(recorder: &Recorder) -> Vec<RtpPacket> {
        recorder.packets.lock().iter().map(|p| RtpPacket::parse(p).unwrap()).collect()
    }

    #[test]
    fn test_inactive_pipeline_ignores_frames() {
        let (pipeline, recorder) = pipeline(0);
        assert!(!pipeline.push_frame(&[0; 160]));
        assert!(recorder.packets.lock().is_empty());
    }

    #[test]
    fn test_sequence_and_timestamp_progression() {
        let (pipeline, recorder) = pipeline(65534);
        pipeline.activate();
        for _ in 0..3 {
            assert!(pipeline.push_frame(&[0; 160]));
        }

        let packets = parsed(&recorder);
        let seqs: Vec<u16> = packets.iter().map(|p| p.header.sequence_number).collect();
        let stamps: Vec<u32> = packets.iter().map(|p| p.header.timestamp).collect();
        assert_eq!(seqs, vec![65534, 65535, 0]);
        assert_eq!(stamps, vec![0, 160, 320]);
        assert!(packets.iter().all(|p| p.header.ssrc == 0xABCD && p.header.payload_type == 0));
        assert!(packets.iter().all(|p| !p.header.marker && p.payload.len() == 160));
    }

    #[test]
    fn test_encode_failure_keeps_sequence() {
        let (pipeline, recorder) = pipeline(7);
        pipeline.activate();
        pipeline.push_frame(&[0; 10]);
        pipeline.push_frame(&[0; 160]);

        assert_eq!(pipeline.stats().encode_errors, 1);
        let packets = parsed(&recorder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.sequence_number, 7);
    }

    #[test]
    fn test_send_failure_consumes_sequence() {
        let (pipeline, recorder) = pipeline(100);
        pipeline.activate();
        recorder.refuse.store(true, Ordering::SeqCst);
        pipeline.push_frame(&[0; 160]);
        recorder.refuse.store(false, Ordering::SeqCst);
        pipeline.push_frame(&[0; 160]);

        let stats = pipeline.stats();
        assert_eq!(stats.send_drops, 1);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(parsed(&recorder)[0].header.sequence_number, 101);
    }

    #[test]
    fn test_stop_releases_source() {
        let (pipeline, recorder) = pipeline(0);
        let source = MemoryCaptureSource::new();
        pipeline.start(Arc::new(source.clone())).unwrap();
        assert!(source.push(&[0; 160]));

        pipeline.stop();
        pipeline.stop();
        assert!(!source.is_started());
        assert!(!source.push(&[0; 160]));
        assert_eq!(recorder.packets.lock().len(), 1);
    }
}
