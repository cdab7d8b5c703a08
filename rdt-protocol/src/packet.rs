//! Wire Packet Structure and Serialization
//!
//! Every packet on the wire has the same fixed size `P`:
//!
//! ```text
//!  0        4        8   9                9+L              P
//!  ├────────┼────────┼───┼─────────────────┼────────────────┤
//!  │  CRC32 │  seq   │ L │ payload (L)     │ zero padding   │
//!  └────────┴────────┴───┴─────────────────┴────────────────┘
//! ```
//!
//! Data packets carry a sequence number and `L > 0` payload bytes. Ack packets
//! carry the cumulative acknowledgment number in the same field and `L = 0`.
//! All multi-byte fields are big-endian.

use crate::checksum::{self, CHECKSUM_SIZE};
use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the packet header in bytes (code + sequence + length)
pub const HEADER_SIZE: usize = CHECKSUM_SIZE + 4 + 1;

/// Upper bound on payload bytes imposed by the one-byte length field
pub const MAX_SEGMENT: usize = u8::MAX as usize;

/// Default fixed packet size
pub const DEFAULT_PACKET_SIZE: usize = 128;

/// Byte offset of the sequence number field
const SEQ_OFFSET: usize = CHECKSUM_SIZE;

/// Byte offset of the payload length field
const LEN_OFFSET: usize = SEQ_OFFSET + 4;

/// Payload capacity of a packet of `packet_size` bytes
#[inline]
pub fn max_payload(packet_size: usize) -> usize {
    packet_size.saturating_sub(HEADER_SIZE).min(MAX_SEGMENT)
}

/// Check that a packet size leaves room for at least one payload byte
pub fn validate_packet_size(packet_size: usize) -> Result<(), PacketError> {
    if packet_size <= HEADER_SIZE {
        return Err(PacketError::InvalidPacketSize {
            size: packet_size,
            min: HEADER_SIZE + 1,
        });
    }
    Ok(())
}

/// Decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Integrity code as stored on the wire (zero until encoded)
    pub checksum: u32,
    /// Sequence number (data) or cumulative acknowledgment number (ack)
    pub seq: SeqNumber,
    /// Payload bytes (empty for acks)
    pub payload: Bytes,
}

impl Packet {
    /// Create a data packet
    pub fn data(seq: SeqNumber, payload: Bytes) -> Self {
        Packet {
            checksum: 0,
            seq,
            payload,
        }
    }

    /// Create an ack packet acknowledging everything up to and including `ack`
    pub fn ack(ack: SeqNumber) -> Self {
        Packet {
            checksum: 0,
            seq: ack,
            payload: Bytes::new(),
        }
    }

    /// Whether this packet carries no payload
    #[inline]
    pub fn is_ack(&self) -> bool {
        self.payload.is_empty()
    }

    /// Acknowledgment number carried by an ack packet
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        self.seq
    }

    /// Serialize into a stamped wire image of exactly `packet_size` bytes
    ///
    /// The computed code is also recorded in `self.checksum`.
    pub fn encode(&mut self, packet_size: usize) -> Result<Bytes, PacketError> {
        validate_packet_size(packet_size)?;

        let max = max_payload(packet_size);
        if self.payload.len() > max {
            return Err(PacketError::PayloadTooLarge {
                size: self.payload.len(),
                max,
            });
        }

        Ok(self.write(packet_size))
    }

    /// Serialize without bounds checks; `packet_size` and the payload length
    /// must already satisfy the limits enforced by [`Packet::encode`].
    pub(crate) fn write(&mut self, packet_size: usize) -> Bytes {
        let mut buf = BytesMut::with_capacity(packet_size);
        buf.put_u32(0);
        buf.put_u32(self.seq.as_raw());
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
        buf.resize(packet_size, 0);

        self.checksum = checksum::stamp(&mut buf);
        buf.freeze()
    }

    /// Parse a wire image
    ///
    /// Only structure is checked here; integrity is the caller's concern via
    /// [`checksum::verify`].
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        let checksum = buf.get_u32();
        let seq = SeqNumber::new(buf.get_u32());
        let len = buf.get_u8() as usize;

        let available = bytes.len() - HEADER_SIZE;
        if len > available {
            return Err(PacketError::LengthOutOfBounds { len, available });
        }

        Ok(Packet {
            checksum,
            seq,
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + len]),
        })
    }
}

/// Read the sequence field of a wire image without a full decode
pub fn peek_seq(bytes: &[u8]) -> Option<SeqNumber> {
    let raw: [u8; 4] = bytes.get(SEQ_OFFSET..LEN_OFFSET)?.try_into().ok()?;
    Some(SeqNumber::new(u32::from_be_bytes(raw)))
}

/// Packet encoding and parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Payload length {len} exceeds the {available} bytes after the header")]
    LengthOutOfBounds { len: usize, available: usize },

    #[error("Invalid packet size: {size} bytes (min {min})")]
    InvalidPacketSize { size: usize, min: usize },

    #[error("Message too large for its length prefix: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_payload() {
        assert_eq!(max_payload(20), 11);
        assert_eq!(max_payload(DEFAULT_PACKET_SIZE), 119);
        assert_eq!(max_payload(1024), MAX_SEGMENT);
        assert_eq!(max_payload(4), 0);
    }

    #[test]
    fn test_data_packet_layout() {
        let mut packet = Packet::data(SeqNumber::new(0x0102_0304), Bytes::from_static(b"hey"));
        let wire = packet.encode(20).unwrap();

        assert_eq!(wire.len(), 20);
        assert_eq!(&wire[4..8], &[1, 2, 3, 4]);
        assert_eq!(wire[8], 3);
        assert_eq!(&wire[9..12], b"hey");
        assert!(wire[12..].iter().all(|&b| b == 0));
        assert_eq!(checksum::stored(&wire), Some(packet.checksum));
        assert!(checksum::verify(&wire));
    }

    #[test]
    fn test_ack_packet() {
        let mut ack = Packet::ack(SeqNumber::new(41));
        let wire = ack.encode(DEFAULT_PACKET_SIZE).unwrap();

        let decoded = Packet::decode(&wire).unwrap();
        assert!(decoded.is_ack());
        assert_eq!(decoded.ack_number(), SeqNumber::new(41));
        assert_eq!(decoded.checksum, ack.checksum);
    }

    #[test]
    fn test_decode_roundtrip() {
        let payload = Bytes::from(vec![0xAB; 11]);
        let mut packet = Packet::data(SeqNumber::new(9), payload.clone());
        let wire = packet.encode(20).unwrap();

        let decoded = Packet::decode(&wire).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(peek_seq(&wire), Some(SeqNumber::new(9)));
    }

    #[test]
    fn test_payload_too_large() {
        let mut packet = Packet::data(SeqNumber::new(1), Bytes::from(vec![0; 12]));
        assert_eq!(
            packet.encode(20),
            Err(PacketError::PayloadTooLarge { size: 12, max: 11 })
        );
    }

    #[test]
    fn test_invalid_packet_size() {
        let mut packet = Packet::ack(SeqNumber::new(1));
        assert!(matches!(
            packet.encode(HEADER_SIZE),
            Err(PacketError::InvalidPacketSize { .. })
        ));
    }

    #[test]
    fn test_decode_short() {
        assert_eq!(
            Packet::decode(&[0; 5]),
            Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: 5
            })
        );
    }

    #[test]
    fn test_decode_length_out_of_bounds() {
        let mut wire = vec![0u8; 12];
        wire[8] = 4;
        assert_eq!(
            Packet::decode(&wire),
            Err(PacketError::LengthOutOfBounds {
                len: 4,
                available: 3
            })
        );
    }
}
