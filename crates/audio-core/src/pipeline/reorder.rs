//! Optional resequencing ahead of the decoder
//!
//! Holds a handful of packets and releases them in RTP sequence order.
//! Nothing waits on a timer: when the buffer overflows the lowest held
//! packet goes out and whatever gap precedes it is given up on.

use peercall_rtp_core::{seq_distance, RtpPacket, RtpSequenceNumber};

#[derive(Debug)]
pub struct ReorderBuffer {
    depth: usize,
    held: Vec<RtpPacket>,
    next_expected: Option<RtpSequenceNumber>,
    late_drops: u64,
}

impl ReorderBuffer {
    /// Buffer holding up to `depth` out-of-order packets
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            held: Vec::with_capacity(depth + 1),
            next_expected: None,
            late_drops: 0,
        }
    }

    /// Offer a packet; returns the packets now releasable, in sequence order.
    pub fn push(&mut self, packet: RtpPacket) -> Vec<RtpPacket> {
        let seq = packet.header.sequence_number;
        let next = *self.next_expected.get_or_insert(seq);

        if seq_distance(next, seq) < 0 || self.holds(seq) {
            self.late_drops += 1;
            tracing::debug!(seq, expected = next, "Dropping packet behind the playout point");
            return Vec::new();
        }

        self.held.push(packet);
        let mut released = self.release_consecutive();

        while self.held.len() > self.depth {
            let lowest = self.lowest_index();
            let packet = self.held.swap_remove(lowest);
            self.next_expected = Some(packet.header.sequence_number.wrapping_add(1));
            released.push(packet);
            released.extend(self.release_consecutive());
        }

        released
    }

    /// Packets discarded because their slot had already been played out
    pub fn late_drops(&self) -> u64 {
        self.late_drops
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    fn holds(&self, seq: RtpSequenceNumber) -> bool {
        self.held.iter().any(|p| p.header.sequence_number == seq)
    }

    fn release_consecutive(&mut self) -> Vec<RtpPacket> {
        let mut released = Vec::new();
        while let Some(next) = self.next_expected {
            let Some(index) = self.held.iter().position(|p| p.header.sequence_number == next) else {
                break;
            };
            released.push(self.held.swap_remove(index));
            self.next_expected = Some(next.wrapping_add(1));
        }
        released
    }

    fn lowest_index(&self) -> usize {
        let anchor = self.next_expected.unwrap_or(0);
        self.held
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| seq_distance(anchor, p.header.sequence_number))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}
