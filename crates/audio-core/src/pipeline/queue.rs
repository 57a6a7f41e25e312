//! Bounded playback queue

use std::collections::VecDeque;

/// FIFO of decoded chunks that discards the oldest entry when full.
#[derive(Debug)]
pub struct PlaybackQueue {
    chunks: VecDeque<Vec<i16>>,
    capacity: usize,
}

impl PlaybackQueue {
    /// A queue holding at most `capacity` chunks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a chunk, returning the chunk evicted to make room, if any
    pub fn push(&mut self, chunk: Vec<i16>) -> Option<Vec<i16>> {
        let evicted = if self.chunks.len() >= self.capacity {
            self.chunks.pop_front()
        } else {
            None
        };
        self.chunks.push_back(chunk);
        evicted
    }

    pub fn pop(&mut self) -> Option<Vec<i16>> {
        self.chunks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
