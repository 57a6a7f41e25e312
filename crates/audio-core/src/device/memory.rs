//! Memory-backed devices for tests and the loopback demo
//!
//! [`MemoryCaptureSource`] plays the role of a microphone: chunks are pushed
//! by hand or paced out on a tokio interval. [`MemoryPlaybackSink`] plays the
//! role of a speaker and records every chunk it is given.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{CaptureSource, PcmCallback, PlaybackSink};
use crate::error::{AudioError, AudioResult};

/// In-memory capture source
#[derive(Clone, Default)]
pub struct MemoryCaptureSource {
    callback: Arc<Mutex<Option<PcmCallback>>>,
    started: Arc<AtomicBool>,
}

impl MemoryCaptureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one chunk to the pipeline if the source is running.
    ///
    /// Returns whether the chunk was delivered.
    pub fn push(&self, pcm: &[i16]) -> bool {
        // Clone out of the lock so the callback never runs under it
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(pcm);
                true
            }
            None => false,
        }
    }

    /// Push `chunks` one per `period` until exhausted or the source stops.
    pub fn spawn_paced(&self, chunks: Vec<Vec<i16>>, period: Duration) -> JoinHandle<usize> {
        let source = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut delivered = 0;
            for chunk in chunks {
                ticker.tick().await;
                if !source.is_started() {
                    break;
                }
                if source.push(&chunk) {
                    delivered += 1;
                }
            }
            delivered
        })
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl CaptureSource for MemoryCaptureSource {
    fn start(&self, callback: PcmCallback) -> AudioResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(AudioError::device("memory capture source already started"));
        }
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::Release);
        self.callback.lock().take();
    }
}

/// In-memory playback sink; clones share the recorded chunks
#[derive(Clone, Default)]
pub struct MemoryPlaybackSink {
    chunks: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl MemoryPlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn chunks(&self) -> Vec<Vec<i16>> {
        self.chunks.lock().clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn clear(&self) {
        self.chunks.lock().clear();
    }
}

impl PlaybackSink for MemoryPlaybackSink {
    fn write(&mut self, pcm: &[i16]) -> AudioResult<()> {
        self.chunks.lock().push(pcm.to_vec());
        Ok(())
    }
}
