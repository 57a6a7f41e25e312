//! Wrapping sequence number helpers

use crate::RtpSequenceNumber;

/// Outbound sequence counter that wraps at 65536.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    next: RtpSequenceNumber,
}

impl SequenceCounter {
    /// Start counting at `initial`
    pub fn new(initial: RtpSequenceNumber) -> Self {
        Self { next: initial }
    }

    /// Start at a random value, as RFC 3550 recommends
    pub fn random() -> Self {
        Self::new(rand::random())
    }

    /// Return the current value and advance by one
    pub fn advance(&mut self) -> RtpSequenceNumber {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }

    /// Value the next packet will carry
    pub fn peek(&self) -> RtpSequenceNumber {
        self.next
    }
}

/// Signed distance from `from` to `to`, accounting for wraparound.
///
/// Positive when `to` is ahead of `from` by less than half the sequence space.
pub fn seq_distance(from: RtpSequenceNumber, to: RtpSequenceNumber) -> i32 {
    to.wrapping_sub(from) as i16 as i32
}
