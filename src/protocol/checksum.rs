//! CRC-8 integrity check.
//!
//! Polynomial `0x07`, initial value `0x00`, no reflection, no final XOR,
//! processed MSB-first (the plain "CRC-8/SMBUS" variant).

use crc::{Crc, CRC_8_SMBUS};

/// Generator polynomial (x^8 + x^2 + x + 1, top bit implicit).
pub const CRC8_POLY: u8 = CRC_8_SMBUS.poly;

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Compute the CRC-8 of `data`.
///
/// `const` so that the reserved control packets can be built at compile time.
///
/// # Example
///
/// ```
/// use uart_link::protocol::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xF4);
/// ```
pub const fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}
