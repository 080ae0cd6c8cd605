//! # uart-link
//!
//! Stop-and-wait packet link for noisy serial byte streams.
//!
//! Hosts and devices exchange fixed 18-byte packets (length, 16 padded data
//! bytes, CRC-8). A corrupted packet is answered with a resend request
//! (RETX); a RETX is answered by replaying the last packet sent; a valid
//! data packet is queued for the application and acknowledged (ACK).
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): CRC-8, wire format, packet reassembly
//! - **Controller** ([`controller`]): validate → react state machine
//! - **Session** ([`Link`]): link task + writer task over any tokio stream
//!
//! ## Example
//!
//! ```ignore
//! use uart_link::Link;
//!
//! #[tokio::main]
//! async fn main() -> uart_link::Result<()> {
//!     let serial = open_serial_port("/dev/ttyACM0", 115_200)?;
//!     let mut link = Link::builder().start_stream(serial)?;
//!
//!     link.send_payload(&[0x31]).await?;
//!     let packet = link.recv().await?;
//!     println!("{:02x?}", packet.payload());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod stats;
pub mod writer;

mod session;

pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use protocol::{DataPacket, Packet};
pub use session::{Link, LinkBuilder, LinkSender, LinkTask};
pub use stats::LinkStatsSnapshot;
