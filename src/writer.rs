//! Dedicated writer task for outbound packets.
//!
//! The link controller hands encoded packets to a writer task over an mpsc
//! channel instead of writing to the transport itself. The writer task owns
//! the write half and coalesces packets that are already queued (e.g. a
//! replay followed by an ACK) into a single write.
//!
//! # Architecture
//!
//! ```text
//! Link task ─► mpsc::Sender<[u8; 18]> ─► Writer Task ─► Transport
//! ```

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{LinkError, Result};
use crate::protocol::PACKET_LENGTH;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum packets to coalesce in a single write.
const MAX_BATCH_SIZE: usize = 16;

/// An encoded packet ready to be written.
pub type OutboundPacket = [u8; PACKET_LENGTH];

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the packet queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending packets to the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    /// Channel sender for packets.
    tx: mpsc::Sender<OutboundPacket>,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<OutboundPacket>) -> Self {
        Self { tx }
    }

    /// Send a packet to the writer task.
    ///
    /// Waits if the channel is full. Returns `Err(ConnectionClosed)` if the
    /// writer task has exited (usually after a transport error).
    pub async fn send(&self, packet: OutboundPacket) -> Result<()> {
        self.tx
            .send(packet)
            .await
            .map_err(|_| LinkError::ConnectionClosed)
    }

    /// Check if the writer task has exited.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the writer task has exited.
    ///
    /// Cancel-safe, so the link task can race it against transport reads.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Handle wired to a bare channel instead of a transport.
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<OutboundPacket>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

/// Spawn the writer task and return a handle for sending packets.
///
/// The task ends with `Ok(())` once every [`WriterHandle`] is dropped and
/// the queue is flushed, or with the first I/O error.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    let handle = WriterHandle::new(tx);
    let task = tokio::spawn(writer_loop(rx, writer));

    (handle, task)
}

/// Main writer loop - receives packets and writes them to the transport.
async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundPacket>,
    mut writer: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = BytesMut::with_capacity(MAX_BATCH_SIZE * PACKET_LENGTH);

    loop {
        let first = match rx.recv().await {
            Some(packet) => packet,
            None => return Ok(()),
        };

        batch.clear();
        batch.extend_from_slice(&first);
        let mut count = 1;

        while count < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(packet) => {
                    batch.extend_from_slice(&packet);
                    count += 1;
                }
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Transport write failed: {}", e);
            return Err(e);
        }
        tracing::trace!("Wrote {} packet(s)", count);
    }
}

async fn write_batch<W>(writer: &mut W, batch: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(batch).await?;
    writer.flush().await?;
    Ok(())
}
