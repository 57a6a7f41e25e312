//! Inbound audio: RTP bytes → deframe → (resequence) → decode → queue → sink
//!
//! Packets are processed on the transport's receive path; a single tokio
//! task drains the bounded queue into the sink. The queue drops its oldest
//! chunk rather than grow, so a stalled sink costs audio, never memory.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use peercall_rtp_core::{RtpFramer, RtpPacket, SequenceTracker, SequenceVerdict};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::codec::{AudioCodec, CodecConfig, CodecFactory};
use crate::device::PlaybackSink;
use crate::error::{AudioError, AudioResult};
use crate::pipeline::queue::PlaybackQueue;
use crate::pipeline::reorder::ReorderBuffer;

/// Playback tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Decoded chunks held before the oldest is discarded
    pub queue_capacity: usize,
    /// Packets held for resequencing; 0 plays in arrival order
    pub reorder_depth: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            reorder_depth: 0,
        }
    }
}

/// Playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub packets_received: u64,
    /// Buffers too short to hold an RTP header
    pub format_errors: u64,
    pub decode_errors: u64,
    /// Chunks evicted from a full queue
    pub overflow_drops: u64,
    /// Chunks written to the sink
    pub chunks_played: u64,
    /// Packets inferred missing from sequence gaps
    pub packets_lost: u64,
    /// Packets that arrived behind a higher sequence number
    pub out_of_order: u64,
    /// Packets the resequencer discarded as too late
    pub late_drops: u64,
}

struct ReceiveState {
    decoder: Box<dyn AudioCodec>,
    tracker: SequenceTracker,
    reorder: Option<ReorderBuffer>,
}

struct PlaybackInner {
    active: AtomicBool,
    receive: Mutex<ReceiveState>,
    queue: Mutex<PlaybackQueue>,
    ready: Notify,
    packets_received: AtomicU64,
    format_errors: AtomicU64,
    decode_errors: AtomicU64,
    overflow_drops: AtomicU64,
    chunks_played: AtomicU64,
}

/// Playback side of one session
pub struct AudioPlaybackPipeline {
    inner: Arc<PlaybackInner>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlaybackPipeline {
    pub fn new(codec: &CodecConfig, config: &PlaybackConfig) -> AudioResult<Self> {
        let decoder = CodecFactory::create(codec)?;
        Ok(Self::with_decoder(decoder, config))
    }

    pub fn with_decoder(decoder: Box<dyn AudioCodec>, config: &PlaybackConfig) -> Self {
        let reorder = (config.reorder_depth > 0).then(|| ReorderBuffer::new(config.reorder_depth));
        Self {
            inner: Arc::new(PlaybackInner {
                active: AtomicBool::new(false),
                receive: Mutex::new(ReceiveState {
                    decoder,
                    tracker: SequenceTracker::new(),
                    reorder,
                }),
                queue: Mutex::new(PlaybackQueue::new(config.queue_capacity)),
                ready: Notify::new(),
                packets_received: AtomicU64::new(0),
                format_errors: AtomicU64::new(0),
                decode_errors: AtomicU64::new(0),
                overflow_drops: AtomicU64::new(0),
                chunks_played: AtomicU64::new(0),
            }),
            drain: Mutex::new(None),
        }
    }

    /// Enable playback and spawn the task draining the queue into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, sink: Box<dyn PlaybackSink>) -> AudioResult<()> {
        if self.inner.active.swap(true, Ordering::AcqRel) {
            return Err(AudioError::device("playback pipeline already started"));
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(drain_loop(inner, sink));
        *self.drain.lock() = Some(handle);

        info!("Audio playback started");
        Ok(())
    }

    /// Disable playback, discard queued audio and end the drain task. Idempotent.
    pub fn stop(&self) {
        let was_active = self.inner.active.swap(false, Ordering::AcqRel);
        self.inner.queue.lock().clear();
        self.inner.ready.notify_one();
        if let Some(handle) = self.drain.lock().take() {
            handle.abort();
        }
        if was_active {
            info!("Audio playback stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Handle one packet from the transport; never fails, only counts.
    pub fn on_packet(&self, data: &[u8]) {
        let inner = &self.inner;
        if !inner.active.load(Ordering::Acquire) {
            return;
        }

        let packet = match RtpFramer::deframe(data) {
            Ok(packet) => packet,
            Err(e) => {
                inner.format_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dropping malformed RTP packet");
                return;
            }
        };
        inner.packets_received.fetch_add(1, Ordering::Relaxed);

        let mut chunks = Vec::new();
        {
            let mut receive = inner.receive.lock();
            let seq = packet.header.sequence_number;
            match receive.tracker.observe(seq) {
                SequenceVerdict::Gap { lost } => debug!(seq, lost, "Sequence gap"),
                SequenceVerdict::Late => debug!(seq, "Out-of-order packet"),
                SequenceVerdict::Restarted => debug!(seq, "Sequence restarted"),
                SequenceVerdict::First | SequenceVerdict::InOrder => {}
            }

            let ready: Vec<RtpPacket> = match receive.reorder.as_mut() {
                Some(reorder) => reorder.push(packet),
                None => vec![packet],
            };

            for packet in ready {
                match receive.decoder.decode(&packet.payload) {
                    Ok(pcm) => chunks.push(pcm),
                    Err(e) => {
                        inner.decode_errors.fetch_add(1, Ordering::Relaxed);
                        debug!(seq = packet.header.sequence_number, error = %e, "Dropping undecodable frame");
                    }
                }
            }
        }

        if chunks.is_empty() {
            return;
        }

        {
            let mut queue = inner.queue.lock();
            for chunk in chunks {
                if queue.push(chunk).is_some() {
                    inner.overflow_drops.fetch_add(1, Ordering::Relaxed);
                    trace!("Playback queue full, discarded oldest chunk");
                }
            }
        }
        inner.ready.notify_one();
    }

    /// Chunks waiting for the sink
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn stats(&self) -> PlaybackStats {
        let inner = &self.inner;
        let receive = inner.receive.lock();
        let sequence = receive.tracker.stats();
        PlaybackStats {
            packets_received: inner.packets_received.load(Ordering::Relaxed),
            format_errors: inner.format_errors.load(Ordering::Relaxed),
            decode_errors: inner.decode_errors.load(Ordering::Relaxed),
            overflow_drops: inner.overflow_drops.load(Ordering::Relaxed),
            chunks_played: inner.chunks_played.load(Ordering::Relaxed),
            packets_lost: sequence.packets_lost,
            out_of_order: sequence.packets_out_of_order,
            late_drops: receive.reorder.as_ref().map(|r| r.late_drops()).unwrap_or(0),
        }
    }
}

impl Drop for AudioPlaybackPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drain_loop(inner: Arc<PlaybackInner>, mut sink: Box<dyn PlaybackSink>) {
    loop {
        let next = inner.queue.lock().pop();
        match next {
            Some(chunk) => {
                if let Err(e) = sink.write(&chunk) {
                    warn!(error = %e, "Playback sink rejected chunk");
                    continue;
                }
                inner.chunks_played.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                if !inner.active.load(Ordering::Acquire) {
                    break;
                }
                inner.ready.notified().await;
            }
        }
    }
    debug!("Playback drain task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::memory::MemoryPlaybackSink;
    use std::time::Duration;

    fn frame(seq: u16) -> bytes::Bytes {
        RtpFramer::frame(9, seq, seq as u32 * 160, 0, false, &[0xFF; 160])
    }

    async fn wait_for_chunks(sink: &MemoryPlaybackSink, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while sink.chunk_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_packets_reach_sink() {
        let pipeline = AudioPlaybackPipeline::new(&CodecConfig::pcmu(), &PlaybackConfig::default()).unwrap();
        let sink = MemoryPlaybackSink::new();
        pipeline.start(Box::new(sink.clone())).unwrap();

        for seq in 0..5 {
            pipeline.on_packet(&frame(seq));
        }
        wait_for_chunks(&sink, 5).await;

        assert!(sink.chunks().iter().all(|c| c.len() == 160));
        assert_eq!(pipeline.stats().chunks_played, 5);
    }

    #[tokio::test]
    async fn test_short_buffer_counted_as_format_error() {
        let pipeline = AudioPlaybackPipeline::new(&CodecConfig::pcmu(), &PlaybackConfig::default()).unwrap();
        pipeline.start(Box::new(MemoryPlaybackSink::new())).unwrap();

        pipeline.on_packet(&[0x80, 0, 1]);
        let stats = pipeline.stats();
        assert_eq!(stats.format_errors, 1);
        assert_eq!(stats.packets_received, 0);
    }

    #[tokio::test]
    async fn test_decode_error_drops_frame_only() {
        let pipeline = AudioPlaybackPipeline::new(&CodecConfig::pcmu(), &PlaybackConfig::default()).unwrap();
        let sink = MemoryPlaybackSink::new();
        pipeline.start(Box::new(sink.clone())).unwrap();

        // Header-only packet: G.711 refuses empty payloads
        pipeline.on_packet(&RtpFramer::frame(9, 0, 0, 0, false, &[]));
        pipeline.on_packet(&frame(1));
        wait_for_chunks(&sink, 1).await;

        assert_eq!(pipeline.stats().decode_errors, 1);
    }

    #[tokio::test]
    async fn test_gaps_counted_as_loss() {
        let pipeline = AudioPlaybackPipeline::new(&CodecConfig::pcmu(), &PlaybackConfig::default()).unwrap();
        pipeline.start(Box::new(MemoryPlaybackSink::new())).unwrap();

        for seq in [10, 11, 14, 15] {
            pipeline.on_packet(&frame(seq));
        }
        assert_eq!(pipeline.stats().packets_lost, 2);
    }

    #[test]
    fn test_inactive_pipeline_ignores_packets() {
        let pipeline = AudioPlaybackPipeline::new(&CodecConfig::pcmu(), &PlaybackConfig::default()).unwrap();
        pipeline.on_packet(&frame(0));
        assert_eq!(pipeline.queued(), 0);
        assert_eq!(pipeline.stats().packets_received, 0);
    }
}
