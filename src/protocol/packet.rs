//! Typed packets.
//!
//! Control and data packets share one wire shape and differ only by content.
//! [`Packet::classify`] inspects a received [`RawPacket`] once, after its CRC
//! has been verified, so the rest of the crate matches on an enum instead of
//! re-checking byte patterns.
//!
//! # Example
//!
//! ```
//! use uart_link::protocol::{Packet, RawPacket};
//!
//! let raw = RawPacket::new(3, &[1, 2, 3]).unwrap();
//! match Packet::classify(raw).unwrap() {
//!     Packet::Data(data) => assert_eq!(data.payload(), &[1, 2, 3]),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use bytes::Bytes;

use super::wire_format::{RawPacket, ACK_PACKET, PACKET_DATA_BYTES, PACKET_LENGTH, RETX_PACKET};
use crate::error::{LinkError, Result};

/// A CRC-valid packet, classified by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// Application payload.
    Data(DataPacket),
    /// Peer confirms receipt of our last packet.
    Ack,
    /// Peer asks us to resend our last packet.
    Retx,
}

impl Packet {
    /// Verify the CRC of `raw` and classify it.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ChecksumMismatch`] if the stored CRC does not
    /// match the contents.
    pub fn classify(raw: RawPacket) -> Result<Self> {
        let computed = raw.compute_crc();
        if computed != raw.crc {
            return Err(LinkError::ChecksumMismatch {
                computed,
                received: raw.crc,
            });
        }

        if raw.is_retx() {
            Ok(Packet::Retx)
        } else if raw.is_ack() {
            Ok(Packet::Ack)
        } else {
            Ok(Packet::Data(DataPacket { raw }))
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> [u8; PACKET_LENGTH] {
        match self {
            Packet::Data(data) => data.to_bytes(),
            Packet::Ack => ACK_PACKET,
            Packet::Retx => RETX_PACKET,
        }
    }

    /// Check if this is an application payload.
    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(self, Packet::Data(_))
    }

    /// Check if this is an ACK.
    #[inline]
    pub fn is_ack(&self) -> bool {
        matches!(self, Packet::Ack)
    }

    /// Check if this is a resend request.
    #[inline]
    pub fn is_retx(&self) -> bool {
        matches!(self, Packet::Retx)
    }

    /// Take the data packet, if any.
    pub fn into_data(self) -> Option<DataPacket> {
        match self {
            Packet::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// An application packet with a verified CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPacket {
    raw: RawPacket,
}

impl DataPacket {
    /// Build an outbound data packet with `length = payload.len()`.
    pub fn new(payload: &[u8]) -> Result<Self> {
        let length = u8::try_from(payload.len()).unwrap_or(u8::MAX);
        Self::with_length(length, payload)
    }

    /// Build an outbound data packet with an explicit declared length.
    pub fn with_length(length: u8, payload: &[u8]) -> Result<Self> {
        Ok(Self {
            raw: RawPacket::new(length, payload)?,
        })
    }

    /// Declared payload length.
    #[inline]
    pub fn length(&self) -> u8 {
        self.raw.length
    }

    /// Full padded data field.
    #[inline]
    pub fn data(&self) -> &[u8; PACKET_DATA_BYTES] {
        &self.raw.data
    }

    /// Meaningful prefix of the data field.
    ///
    /// The declared length is not trusted beyond the field size.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.raw.length).min(PACKET_DATA_BYTES);
        &self.raw.data[..len]
    }

    /// Copy of the payload as `Bytes`.
    pub fn payload_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.payload())
    }

    /// CRC byte.
    #[inline]
    pub fn crc(&self) -> u8 {
        self.raw.crc
    }

    /// Underlying wire packet.
    #[inline]
    pub fn raw(&self) -> &RawPacket {
        &self.raw
    }

    /// Encode to wire bytes.
    #[inline]
    pub fn to_bytes(&self) -> [u8; PACKET_LENGTH] {
        self.raw.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire_format::{PACKET_ACK_DATA0, PACKET_CRC_INDEX, PACKET_RETX_DATA0};

    #[test]
    fn test_classify_control_packets() {
        let ack = RawPacket::decode(&ACK_PACKET).unwrap();
        assert_eq!(Packet::classify(ack).unwrap(), Packet::Ack);

        let retx = RawPacket::decode(&RETX_PACKET).unwrap();
        assert_eq!(Packet::classify(retx).unwrap(), Packet::Retx);
    }

    #[test]
    fn test_classify_data() {
        let raw = RawPacket::new(2, &[0xAB, 0xCD]).unwrap();
        let packet = Packet::classify(raw).unwrap();

        assert!(packet.is_data());
        let data = packet.into_data().unwrap();
        assert_eq!(data.length(), 2);
        assert_eq!(data.payload(), &[0xAB, 0xCD]);
        assert_eq!(data.raw(), &raw);
    }

    #[test]
    fn test_classify_lookalike_is_data() {
        // Starts with the ACK byte but declares two bytes
        let raw = RawPacket::new(2, &[PACKET_ACK_DATA0, 0xFF]).unwrap();
        assert!(Packet::classify(raw).unwrap().is_data());

        let raw = RawPacket::new(1, &[PACKET_RETX_DATA0, 0x00]).unwrap();
        assert!(Packet::classify(raw).unwrap().is_data());
    }

    #[test]
    fn test_classify_bad_crc() {
        let mut bytes = ACK_PACKET;
        bytes[PACKET_CRC_INDEX] ^= 0xFF;
        let raw = RawPacket::decode(&bytes).unwrap();

        match Packet::classify(raw) {
            Err(LinkError::ChecksumMismatch { computed, received }) => {
                assert_eq!(computed, 0x27);
                assert_eq!(received, 0x27 ^ 0xFF);
            }
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_matches_wire() {
        assert_eq!(Packet::Ack.encode(), ACK_PACKET);
        assert_eq!(Packet::Retx.encode(), RETX_PACKET);

        let data = DataPacket::new(b"hi").unwrap();
        assert_eq!(Packet::Data(data).encode(), data.to_bytes());
    }

    #[test]
    fn test_data_packet_new_uses_payload_len() {
        let data = DataPacket::new(&[9, 8, 7, 6]).unwrap();
        assert_eq!(data.length(), 4);
        assert_eq!(data.payload(), &[9, 8, 7, 6]);
        assert_eq!(&data.data()[4..], &[0xFF; 12]);
        assert_eq!(data.payload_bytes(), Bytes::from_static(&[9, 8, 7, 6]));
    }

    #[test]
    fn test_data_packet_oversized() {
        assert!(matches!(
            DataPacket::new(&[0u8; 300]),
            Err(LinkError::OversizedPayload { len: 300, max: 16 })
        ));
    }

    #[test]
    fn test_payload_clamped_to_field() {
        let data = DataPacket::with_length(200, &[1, 2]).unwrap();
        assert_eq!(data.payload().len(), PACKET_DATA_BYTES);
    }
}
