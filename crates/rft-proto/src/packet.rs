//! Wire format shared by the sender, the receiver, and the relay.
//!
//! Every datagram carries exactly one [`Packet`]. All multi-byte integers
//! are big-endian; the fixed 12-byte header is followed by the payload:
//!
//! ```text
//! | type: u32 | seqnum: u32 | length: u32 | data: `length` ASCII bytes |
//! ```
//!
//! Encoding and decoding are pure data transformations; no I/O happens here.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Byte length of the fixed header: type(4) + seqnum(4) + length(4).
pub const HEADER_LEN: usize = 12;
/// Largest payload a DATA packet may carry.
pub const MAX_PAYLOAD: usize = 500;
/// Receive-buffer size both peers must accommodate.
pub const MAX_DATAGRAM: usize = 2048;

/// Discriminant of a datagram within the shared sequence-number space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Acknowledges one exact sequence number.
    Ack,
    /// Carries a chunk of the file.
    Data,
    /// End of transmission (and its echo reply).
    Eot,
}

impl PacketType {
    pub fn discriminant(self) -> u32 {
        match self {
            PacketType::Ack => 0,
            PacketType::Data => 1,
            PacketType::Eot => 2,
        }
    }

    fn from_discriminant(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PacketType::Ack),
            1 => Some(PacketType::Data),
            2 => Some(PacketType::Eot),
            _ => None,
        }
    }
}

/// One protocol datagram. The `length` wire field is derived from the
/// payload on encode and validated against it on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub seq: u32,
    /// ASCII text, empty for ACK and EOT packets.
    pub payload: String,
}

impl Packet {
    /// Build a DATA packet. `payload` must be ASCII and at most
    /// [`MAX_PAYLOAD`] bytes; the sender's chunker guarantees both.
    pub fn data(seq: u32, payload: String) -> Self {
        debug_assert!(payload.is_ascii());
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            kind: PacketType::Data,
            seq,
            payload,
        }
    }

    pub fn ack(seq: u32) -> Self {
        Self {
            kind: PacketType::Ack,
            seq,
            payload: String::new(),
        }
    }

    pub fn eot(seq: u32) -> Self {
        Self {
            kind: PacketType::Eot,
            seq,
            payload: String::new(),
        }
    }

    /// Payload length in bytes (the wire `length` field).
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serialise into a ready-to-send frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u32(self.kind.discriminant());
        buf.put_u32(self.seq);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(self.payload.as_bytes());
        buf.freeze()
    }

    /// Parse a received frame.
    pub fn decode(frame: &[u8]) -> Result<Self, PacketError> {
        if frame.len() < HEADER_LEN {
            return Err(PacketError::Truncated(frame.len()));
        }
        let mut buf = frame;
        let raw_kind = buf.get_u32();
        let seq = buf.get_u32();
        let length = buf.get_u32();

        let kind =
            PacketType::from_discriminant(raw_kind).ok_or(PacketError::UnknownType(raw_kind))?;
        if length as usize > MAX_PAYLOAD {
            return Err(PacketError::LengthOutOfRange(length));
        }
        if buf.remaining() != length as usize {
            return Err(PacketError::LengthMismatch {
                claimed: length,
                got: buf.remaining(),
            });
        }
        if !buf.is_ascii() {
            return Err(PacketError::NotAscii);
        }
        // Lossless: ASCII is a subset of UTF-8.
        let payload = String::from_utf8_lossy(buf).into_owned();

        Ok(Self { kind, seq, payload })
    }
}

/// Reasons a received datagram fails to parse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram too short for a header ({0} bytes)")]
    Truncated(usize),
    #[error("unknown packet type discriminant {0}")]
    UnknownType(u32),
    #[error("length field {0} exceeds the payload cap")]
    LengthOutOfRange(u32),
    #[error("length field claims {claimed} payload bytes but {got} are present")]
    LengthMismatch { claimed: u32, got: usize },
    #[error("payload contains non-ASCII bytes")]
    NotAscii,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_roundtrip() {
        let pkt = Packet::data(7, "hello relay".to_string());
        let decoded = Packet::decode(&pkt.encode()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn ack_and_eot_roundtrip() {
        for pkt in [Packet::ack(3), Packet::eot(0)] {
            let decoded = Packet::decode(&pkt.encode()).unwrap();
            assert_eq!(decoded, pkt);
            assert!(decoded.is_empty());
        }
    }

    #[test]
    fn header_layout_is_big_endian() {
        let bytes = Packet::data(0x0102_0304, "ab".to_string()).encode();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]); // DATA
        assert_eq!(&bytes[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 2]);
        assert_eq!(&bytes[12..], b"ab");
    }

    #[test]
    fn encoded_length_is_header_plus_payload() {
        let pkt = Packet::data(1, "x".repeat(MAX_PAYLOAD));
        assert_eq!(pkt.encode().len(), HEADER_LEN + MAX_PAYLOAD);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert_eq!(Packet::decode(&[]), Err(PacketError::Truncated(0)));
        assert_eq!(
            Packet::decode(&[0u8; HEADER_LEN - 1]),
            Err(PacketError::Truncated(HEADER_LEN - 1))
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bytes = Packet::ack(0).encode().to_vec();
        bytes[3] = 9;
        assert_eq!(Packet::decode(&bytes), Err(PacketError::UnknownType(9)));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut bytes = Packet::data(0, "data".to_string()).encode().to_vec();
        bytes.pop(); // length field still claims 4 payload bytes
        assert_eq!(
            Packet::decode(&bytes),
            Err(PacketError::LengthMismatch { claimed: 4, got: 3 })
        );
    }

    #[test]
    fn oversize_length_field_is_rejected() {
        let mut bytes = vec![0u8; HEADER_LEN + 501];
        bytes[3] = 1; // DATA
        bytes[8..12].copy_from_slice(&501u32.to_be_bytes());
        assert_eq!(Packet::decode(&bytes), Err(PacketError::LengthOutOfRange(501)));
    }

    #[test]
    fn non_ascii_payload_is_rejected() {
        let mut bytes = Packet::data(0, "ab".to_string()).encode().to_vec();
        bytes[12] = 0xFF;
        assert_eq!(Packet::decode(&bytes), Err(PacketError::NotAscii));
    }

    #[test]
    fn frames_fit_the_relay_datagram_budget() {
        let pkt = Packet::data(u32::MAX, "y".repeat(MAX_PAYLOAD));
        assert!(pkt.encode().len() <= MAX_DATAGRAM);
    }
}
