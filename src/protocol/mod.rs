//! Protocol module - checksum, wire format, reassembly, and packet types.
//!
//! This module implements the fixed-size packet protocol:
//! - CRC-8 integrity check
//! - 18-byte packet encoding/decoding
//! - Packet buffer for accumulating partial reads
//! - Typed `Packet` enum for control vs. data packets

mod checksum;
mod packet;
mod packet_buffer;
mod wire_format;

pub use checksum::{crc8, CRC8_POLY};
pub use packet::{DataPacket, Packet};
pub use packet_buffer::PacketBuffer;
pub use wire_format::{
    decode_packet, encode_packet, RawPacket, ACK_PACKET, PACKET_ACK_DATA0, PACKET_CRC_BYTES,
    PACKET_CRC_INDEX, PACKET_DATA_BYTES, PACKET_LENGTH, PACKET_LENGTH_BYTES, PACKET_RETX_DATA0,
    PADDING_BYTE, RETX_PACKET,
};
