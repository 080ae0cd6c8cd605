//! Wire format encoding and decoding.
//!
//! Every packet is exactly 18 bytes; there is no delimiter:
//! ```text
//! ┌────────┬──────────────────────┬───────┐
//! │ Length │ Data                 │ CRC   │
//! │ 1 byte │ 16 bytes, 0xFF-padded│ 1 byte│
//! └────────┴──────────────────────┴───────┘
//! ```
//!
//! The CRC covers the first 17 bytes (length + data).

use super::checksum::crc8;
use crate::error::{LinkError, Result};

/// Size of the length field.
pub const PACKET_LENGTH_BYTES: usize = 1;

/// Size of the data field.
pub const PACKET_DATA_BYTES: usize = 16;

/// Size of the CRC field.
pub const PACKET_CRC_BYTES: usize = 1;

/// Offset of the CRC byte.
pub const PACKET_CRC_INDEX: usize = PACKET_LENGTH_BYTES + PACKET_DATA_BYTES;

/// Total packet size on the wire (exactly 18).
pub const PACKET_LENGTH: usize = PACKET_LENGTH_BYTES + PACKET_DATA_BYTES + PACKET_CRC_BYTES;

/// Filler for unused data bytes.
pub const PADDING_BYTE: u8 = 0xFF;

/// First data byte of an ACK packet.
pub const PACKET_ACK_DATA0: u8 = 0x15;

/// First data byte of a RETX (resend request) packet.
pub const PACKET_RETX_DATA0: u8 = 0x19;

/// Encoded ACK packet.
pub const ACK_PACKET: [u8; PACKET_LENGTH] = RawPacket::single_byte(PACKET_ACK_DATA0).encode();

/// Encoded RETX packet.
pub const RETX_PACKET: [u8; PACKET_LENGTH] = RawPacket::single_byte(PACKET_RETX_DATA0).encode();

/// A packet as it appears on the wire, before any validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPacket {
    /// Declared payload length.
    pub length: u8,
    /// Data field, always padded to 16 bytes.
    pub data: [u8; PACKET_DATA_BYTES],
    /// CRC as stored (received) or computed (outbound).
    pub crc: u8,
}

impl RawPacket {
    /// Build an outbound packet, padding `payload` and computing the CRC.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::OversizedPayload`] if `payload` is longer than
    /// 16 bytes.
    pub fn new(length: u8, payload: &[u8]) -> Result<Self> {
        if payload.len() > PACKET_DATA_BYTES {
            return Err(LinkError::OversizedPayload {
                len: payload.len(),
                max: PACKET_DATA_BYTES,
            });
        }

        let mut data = [PADDING_BYTE; PACKET_DATA_BYTES];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self::from_parts(length, data))
    }

    /// Build a packet from an already padded data field, computing the CRC.
    pub const fn from_parts(length: u8, data: [u8; PACKET_DATA_BYTES]) -> Self {
        let crc = crc_of(length, &data);
        Self { length, data, crc }
    }

    /// Build a `length == 1` packet carrying `byte` followed by padding.
    pub const fn single_byte(byte: u8) -> Self {
        let mut data = [PADDING_BYTE; PACKET_DATA_BYTES];
        data[0] = byte;
        Self::from_parts(1, data)
    }

    /// Encode to the 18-byte wire representation.
    pub const fn encode(&self) -> [u8; PACKET_LENGTH] {
        let mut buf = [0u8; PACKET_LENGTH];
        buf[0] = self.length;
        let mut i = 0;
        while i < PACKET_DATA_BYTES {
            buf[PACKET_LENGTH_BYTES + i] = self.data[i];
            i += 1;
        }
        buf[PACKET_CRC_INDEX] = self.crc;
        buf
    }

    /// Split the first 18 bytes of `buf` into fields.
    ///
    /// The CRC is taken as-is; call [`RawPacket::is_crc_valid`] to check it.
    /// Returns `None` if `buf` is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use uart_link::protocol::{RawPacket, ACK_PACKET};
    ///
    /// let packet = RawPacket::decode(&ACK_PACKET).unwrap();
    /// assert!(packet.is_crc_valid());
    /// assert!(packet.is_ack());
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < PACKET_LENGTH {
            return None;
        }
        let mut data = [0u8; PACKET_DATA_BYTES];
        data.copy_from_slice(&buf[PACKET_LENGTH_BYTES..PACKET_CRC_INDEX]);
        Some(Self {
            length: buf[0],
            data,
            crc: buf[PACKET_CRC_INDEX],
        })
    }

    /// CRC recomputed from the length and data fields.
    #[inline]
    pub const fn compute_crc(&self) -> u8 {
        crc_of(self.length, &self.data)
    }

    /// Check whether the stored CRC matches the contents.
    #[inline]
    pub const fn is_crc_valid(&self) -> bool {
        self.compute_crc() == self.crc
    }

    /// Check for a `length == 1` packet whose data is `byte` then all padding.
    pub fn is_single_byte_packet(&self, byte: u8) -> bool {
        self.length == 1
            && self.data[0] == byte
            && self.data[1..].iter().all(|&b| b == PADDING_BYTE)
    }

    /// Check if this is an ACK.
    #[inline]
    pub fn is_ack(&self) -> bool {
        self.is_single_byte_packet(PACKET_ACK_DATA0)
    }

    /// Check if this is a resend request.
    #[inline]
    pub fn is_retx(&self) -> bool {
        self.is_single_byte_packet(PACKET_RETX_DATA0)
    }
}

const fn crc_of(length: u8, data: &[u8; PACKET_DATA_BYTES]) -> u8 {
    let mut covered = [0u8; PACKET_CRC_INDEX];
    covered[0] = length;
    let mut i = 0;
    while i < PACKET_DATA_BYTES {
        covered[PACKET_LENGTH_BYTES + i] = data[i];
        i += 1;
    }
    crc8(&covered)
}

/// Encode a payload into wire bytes (standalone function).
///
/// # Example
///
/// ```
/// use uart_link::protocol::{encode_packet, PACKET_LENGTH};
///
/// let bytes = encode_packet(3, &[0x01, 0x02, 0x03]).unwrap();
/// assert_eq!(bytes.len(), PACKET_LENGTH);
/// assert_eq!(&bytes[..4], &[0x03, 0x01, 0x02, 0x03]);
/// assert!(bytes[4..17].iter().all(|&b| b == 0xFF));
/// ```
#[inline]
pub fn encode_packet(length: u8, payload: &[u8]) -> Result<[u8; PACKET_LENGTH]> {
    Ok(RawPacket::new(length, payload)?.encode())
}

/// Decode wire bytes into a packet (standalone function).
#[inline]
pub fn decode_packet(buf: &[u8]) -> Option<RawPacket> {
    RawPacket::decode(buf)
}
