//! RTP packet layout
//!
//! ```text
//!  byte 0      byte 1      bytes 2-3        bytes 4-7     bytes 8-11
//! +-----------+-----------+----------------+-------------+-----------+---------
//! |V=2 .... M | . PT(7)   | sequence (BE)  | timestamp   | SSRC (BE) | payload
//! +-----------+-----------+----------------+-------------+-----------+---------
//! ```
//!
//! The first byte carries the version in its top two bits and the marker
//! flag in its lowest bit. The second byte carries a 7-bit payload type.

pub mod sequence;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, RtpError};
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp, RTP_HEADER_SIZE, RTP_VERSION};

const MARKER_MASK: u8 = 0x01;
const PAYLOAD_TYPE_MASK: u8 = 0x7F;

/// Fixed RTP header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: RtpSequenceNumber,
    pub timestamp: RtpTimestamp,
    pub ssrc: RtpSsrc,
}

impl RtpHeader {
    /// Header for an outbound packet with the marker cleared
    pub fn new(ssrc: RtpSsrc, sequence_number: RtpSequenceNumber, timestamp: RtpTimestamp, payload_type: u8) -> Self {
        Self {
            version: RTP_VERSION,
            marker: false,
            payload_type: payload_type & PAYLOAD_TYPE_MASK,
            sequence_number,
            timestamp,
            ssrc,
        }
    }

    /// Set the marker flag
    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    /// Write the 12 header bytes
    pub fn write_to(&self, buf: &mut impl BufMut) {
        let first = (self.version << 6) | if self.marker { MARKER_MASK } else { 0 };
        buf.put_u8(first);
        buf.put_u8(self.payload_type & PAYLOAD_TYPE_MASK);
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
    }

    /// Read the fixed header from the front of `data`
    pub fn read_from(data: &[u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(RtpError::HeaderTruncated { len: data.len() });
        }

        Ok(Self {
            version: data[0] >> 6,
            marker: data[0] & MARKER_MASK != 0,
            payload_type: data[1] & PAYLOAD_TYPE_MASK,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        })
    }
}

/// A deframed RTP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Bytes,
}

impl RtpPacket {
    pub fn new(header: RtpHeader, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Serialize header and payload into one buffer
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RTP_HEADER_SIZE + self.payload.len());
        self.header.write_to(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a packet; the payload is everything after the fixed header
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = RtpHeader::read_from(data)?;
        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&data[RTP_HEADER_SIZE..]),
        })
    }

    /// Total size on the wire
    pub fn size(&self) -> usize {
        RTP_HEADER_SIZE + self.payload.len()
    }
}

/// Stateless packetizer/depacketizer.
///
/// Framing never validates payload type or sequence continuity; that is
/// left to whoever consumes the packets.
pub struct RtpFramer;

impl RtpFramer {
    /// Build the wire bytes for one encoded frame
    pub fn frame(
        ssrc: RtpSsrc,
        sequence: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        payload_type: u8,
        marker: bool,
        encoded_frame: &[u8],
    ) -> Bytes {
        let header = RtpHeader::new(ssrc, sequence, timestamp, payload_type).with_marker(marker);
        let mut buf = BytesMut::with_capacity(RTP_HEADER_SIZE + encoded_frame.len());
        header.write_to(&mut buf);
        buf.put_slice(encoded_frame);
        buf.freeze()
    }

    /// Split wire bytes into header fields and payload
    pub fn deframe(bytes: &[u8]) -> Result<RtpPacket> {
        RtpPacket::parse(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let bytes = RtpFramer::frame(0xDEADBEEF, 0x1234, 0x56789ABC, 111, false, &[0x01, 0x02, 0x03, 0x04]);

        assert_eq!(bytes.len(), 16); // 12 byte header + 4 byte payload
        assert_eq!(bytes[0], 0x80); // Version 2, no marker
        assert_eq!(bytes[1], 111);
        assert_eq!(&bytes[2..4], &[0x12, 0x34]);
        assert_eq!(&bytes[4..8], &[0x56, 0x78, 0x9A, 0xBC]);
        assert_eq!(&bytes[8..12], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&bytes[12..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_marker_bit_in_first_byte() {
        let bytes = RtpFramer::frame(1, 0, 0, 111, true, &[]);
        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[1], 111);

        let packet = RtpFramer::deframe(&bytes).unwrap();
        assert!(packet.header.marker);
        assert_eq!(packet.header.version, RTP_VERSION);
    }

    #[test]
    fn test_payload_type_masked_to_seven_bits() {
        let bytes = RtpFramer::frame(1, 0, 0, 0xFF, false, &[]);
        assert_eq!(bytes[1], 0x7F);
    }

    #[test]
    fn test_parse_packet() {
        let data = vec![
            0x80, 0x00, 0x12, 0x34, // Version, PT, Sequence
            0x56, 0x78, 0x9A, 0xBC, // Timestamp
            0xDE, 0xAD, 0xBE, 0xEF, // SSRC
            0x80, 0x01, 0x02, 0x03, // Payload
        ];

        let packet = RtpFramer::deframe(&data).unwrap();
        assert_eq!(packet.header.payload_type, 0);
        assert_eq!(packet.header.sequence_number, 0x1234);
        assert_eq!(packet.header.timestamp, 0x56789ABC);
        assert_eq!(packet.header.ssrc, 0xDEADBEEF);
        assert_eq!(&packet.payload[..], &[0x80, 0x01, 0x02, 0x03]);
        assert_eq!(packet.size(), data.len());
    }

    #[test]
    fn test_header_only_packet_has_empty_payload() {
        let data = [0x80, 111, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2];
        let packet = RtpFramer::deframe(&data).unwrap();
        assert!(packet.payload.is_empty());
        assert_eq!(packet.header.ssrc, 2);
    }

    #[test]
    fn test_truncated_header() {
        for len in 0..RTP_HEADER_SIZE {
            let data = vec![0u8; len];
            assert_eq!(RtpFramer::deframe(&data), Err(RtpError::HeaderTruncated { len }));
        }
    }

    #[test]
    fn test_serialize_matches_frame() {
        let header = RtpHeader::new(7, 9, 960, 111);
        let packet = RtpPacket::new(header, vec![9u8; 10]);
        assert_eq!(packet.serialize(), RtpFramer::frame(7, 9, 960, 111, false, &[9u8; 10]));
    }
}
