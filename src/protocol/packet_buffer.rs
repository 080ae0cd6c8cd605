//! Packet buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management. Framing is purely
//! length-driven: every 18 bytes form one packet, so there is no header
//! state to track and nothing to resynchronize.
//!
//! # Example
//!
//! ```
//! use uart_link::protocol::{PacketBuffer, ACK_PACKET};
//!
//! let mut buffer = PacketBuffer::new();
//!
//! // Bytes arrive in arbitrary chunks from the transport
//! assert!(buffer.push(&ACK_PACKET[..7]).is_empty());
//! let packets = buffer.push(&ACK_PACKET[7..]);
//!
//! assert_eq!(packets.len(), 1);
//! assert!(packets[0].is_ack());
//! ```

use bytes::BytesMut;

use super::wire_format::{RawPacket, PACKET_LENGTH};

/// Default initial capacity.
const DEFAULT_CAPACITY: usize = 16 * PACKET_LENGTH;

/// Buffer for accumulating incoming bytes and extracting complete packets.
pub struct PacketBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
}

impl PacketBuffer {
    /// Create a new packet buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new packet buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Push data into the buffer and extract all complete packets.
    ///
    /// Returns packets in arrival order. Trailing partial data stays
    /// buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<RawPacket> {
        self.buffer.extend_from_slice(data);

        let mut packets = Vec::with_capacity(self.buffer.len() / PACKET_LENGTH);
        while let Some(packet) = self.try_extract() {
            packets.push(packet);
        }
        packets
    }

    /// Push data and extract at most one packet.
    ///
    /// Anything beyond the first complete packet waits for a later call,
    /// even if it is already complete.
    pub fn push_one(&mut self, data: &[u8]) -> Option<RawPacket> {
        self.buffer.extend_from_slice(data);
        self.try_extract()
    }

    /// Try to extract a single packet from the front of the buffer.
    ///
    /// Returns `None` if fewer than 18 bytes are buffered.
    pub fn try_extract(&mut self) -> Option<RawPacket> {
        if self.buffer.len() < PACKET_LENGTH {
            return None;
        }
        let raw = self.buffer.split_to(PACKET_LENGTH);
        RawPacket::decode(&raw)
    }

    /// Append data to the buffer without extracting packets.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}
