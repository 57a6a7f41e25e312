//! Receive-side sequence accounting
//!
//! Loss is inferred from gaps in the sequence space. Nothing is recovered;
//! the counters exist so callers can report link quality.

use crate::packet::sequence::seq_distance;
use crate::RtpSequenceNumber;

/// Jumps larger than this are treated as a stream restart rather than loss
const MAX_DROPOUT: i32 = 3000;

/// What a received sequence number means relative to the stream so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    /// First packet seen
    First,
    /// Exactly the next expected packet
    InOrder,
    /// Ahead of the expected packet; `lost` packets were skipped
    Gap { lost: u16 },
    /// Behind the highest packet seen (reordered or duplicated)
    Late,
    /// Far outside the window; tracking restarted from this packet
    Restarted,
}

/// Receive statistics for one RTP stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceStats {
    /// Packets observed
    pub packets_received: u64,
    /// Packets inferred missing from sequence gaps
    pub packets_lost: u64,
    /// Packets that arrived behind a higher sequence number
    pub packets_out_of_order: u64,
    /// Highest sequence number seen
    pub highest_seq: Option<RtpSequenceNumber>,
}

/// Tracks the highest sequence number and derives loss from gaps.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    stats: SequenceStats,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arriving sequence number
    pub fn observe(&mut self, seq: RtpSequenceNumber) -> SequenceVerdict {
        self.stats.packets_received += 1;

        let highest = match self.stats.highest_seq {
            None => {
                self.stats.highest_seq = Some(seq);
                return SequenceVerdict::First;
            }
            Some(highest) => highest,
        };

        let distance = seq_distance(highest, seq);
        if distance.abs() > MAX_DROPOUT {
            tracing::debug!("Sequence jump {} -> {}, restarting loss tracking", highest, seq);
            self.stats.highest_seq = Some(seq);
            return SequenceVerdict::Restarted;
        }

        match distance {
            1 => {
                self.stats.highest_seq = Some(seq);
                SequenceVerdict::InOrder
            }
            d if d > 1 => {
                let lost = (d - 1) as u16;
                self.stats.packets_lost += lost as u64;
                self.stats.highest_seq = Some(seq);
                SequenceVerdict::Gap { lost }
            }
            _ => {
                // A late arrival fills a hole we already counted as lost
                self.stats.packets_out_of_order += 1;
                self.stats.packets_lost = self.stats.packets_lost.saturating_sub(1);
                SequenceVerdict::Late
            }
        }
    }

    pub fn stats(&self) -> &SequenceStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.stats = SequenceStats::default();
    }
}
