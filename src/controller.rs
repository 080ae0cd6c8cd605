//! Link controller - the receive-side state machine.
//!
//! For every packet pulled off the wire the controller decides, in order:
//!
//! 1. CRC mismatch: request a resend (send RETX) and drop the packet.
//! 2. RETX: replay the last packet sent, byte for byte.
//! 3. ACK: nothing to do.
//! 4. Anything else: queue the payload for the application, then send ACK.
//!
//! [`LinkController::send`] is the only way bytes reach the writer, and it
//! records exactly what was written as the replay candidate. The replay path
//! writes that candidate without touching it.

use std::sync::Arc;

use crate::error::{LinkError, Result};
use crate::protocol::{Packet, RawPacket, ACK_PACKET, PACKET_LENGTH, RETX_PACKET};
use crate::queue::PacketQueue;
use crate::stats::LinkStats;
use crate::writer::{OutboundPacket, WriterHandle};

/// What the controller did with a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// CRC failed; a RETX was sent.
    RequestedRetransmit,
    /// Peer asked for a resend; the last packet was replayed.
    Replayed,
    /// Peer acknowledged our last packet.
    Acknowledged,
    /// Payload queued for the application and acknowledged.
    Accepted,
}

/// Owns the replay slot and the accepted-payload queue for one link.
pub struct LinkController {
    writer: WriterHandle,
    accepted: PacketQueue,
    stats: Arc<LinkStats>,
    /// Last packet handed to the writer, replayed on RETX.
    last_sent: [u8; PACKET_LENGTH],
    /// Corrupted packets since the last valid one.
    crc_failure_streak: u32,
    max_crc_failures: Option<u32>,
}

impl LinkController {
    /// Create a controller. The replay slot starts out holding an ACK.
    pub fn new(
        writer: WriterHandle,
        accepted: PacketQueue,
        stats: Arc<LinkStats>,
        max_crc_failures: Option<u32>,
    ) -> Self {
        Self {
            writer,
            accepted,
            stats,
            last_sent: ACK_PACKET,
            crc_failure_streak: 0,
            max_crc_failures,
        }
    }

    /// Packet that would be replayed on RETX.
    #[inline]
    pub fn last_sent(&self) -> &[u8; PACKET_LENGTH] {
        &self.last_sent
    }

    /// Corrupted packets received since the last valid one.
    #[inline]
    pub fn crc_failure_streak(&self) -> u32 {
        self.crc_failure_streak
    }

    /// Wait until the writer task has exited.
    ///
    /// Once this resolves every further send fails, so the session should end.
    pub async fn writer_closed(&self) {
        self.writer.closed().await
    }

    /// Write `packet` and remember it for replay.
    pub async fn send(&mut self, packet: OutboundPacket) -> Result<()> {
        self.writer.send(packet).await?;
        self.last_sent = packet;
        self.stats.record_sent();
        Ok(())
    }

    /// Rewrite the last packet verbatim.
    async fn replay(&mut self) -> Result<()> {
        self.writer.send(self.last_sent).await?;
        self.stats.record_sent();
        self.stats.record_retransmission();
        Ok(())
    }

    /// Validate a received packet and react to it.
    ///
    /// # Errors
    ///
    /// - [`LinkError::PersistentCorruption`] when the consecutive CRC failure
    ///   bound is exceeded.
    /// - [`LinkError::ConnectionClosed`] if the writer task is gone.
    pub async fn handle_packet(&mut self, raw: RawPacket) -> Result<Reaction> {
        self.stats.record_received();

        let packet = match Packet::classify(raw) {
            Ok(packet) => packet,
            Err(LinkError::ChecksumMismatch { computed, received }) => {
                return self.on_corrupt(computed, received).await;
            }
            Err(e) => return Err(e),
        };
        self.crc_failure_streak = 0;

        match packet {
            Packet::Retx => {
                tracing::debug!("Retransmitting last packet");
                self.replay().await?;
                Ok(Reaction::Replayed)
            }
            Packet::Ack => {
                tracing::debug!("Received ACK");
                self.stats.record_ack();
                Ok(Reaction::Acknowledged)
            }
            Packet::Data(data) => {
                tracing::debug!("Storing packet ({} bytes) and sending ACK", data.length());
                if self.accepted.enqueue(data).is_err() {
                    tracing::warn!("No consumer attached, dropping accepted packet");
                } else {
                    self.stats.record_accepted();
                }
                self.send(ACK_PACKET).await?;
                Ok(Reaction::Accepted)
            }
        }
    }

    async fn on_corrupt(&mut self, computed: u8, received: u8) -> Result<Reaction> {
        self.stats.record_crc_failure();
        self.crc_failure_streak = self.crc_failure_streak.saturating_add(1);

        tracing::warn!(
            "CRC failed, computed 0x{:02x}, got 0x{:02x} ({} in a row)",
            computed,
            received,
            self.crc_failure_streak
        );

        if let Some(max) = self.max_crc_failures {
            if self.crc_failure_streak > max {
                return Err(LinkError::PersistentCorruption {
                    failures: self.crc_failure_streak,
                });
            }
        }

        self.send(RETX_PACKET).await?;
        Ok(Reaction::RequestedRetransmit)
    }
}
