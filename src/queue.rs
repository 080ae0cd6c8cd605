//! Application packet queue.
//!
//! FIFO of accepted [`DataPacket`]s between the link task (producer) and the
//! consumer. Built on an unbounded `tokio::sync::mpsc` channel, so the link
//! task never waits on a slow consumer, while the consumer suspends until a
//! packet is available.
//!
//! # Example
//!
//! ```
//! use uart_link::protocol::DataPacket;
//! use uart_link::queue::packet_queue;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> uart_link::Result<()> {
//! let (queue, mut receiver) = packet_queue();
//! queue.enqueue(DataPacket::new(b"one")?)?;
//! queue.enqueue(DataPacket::new(b"two")?)?;
//!
//! assert_eq!(receiver.recv().await?.payload(), b"one");
//! assert_eq!(receiver.recv().await?.payload(), b"two");
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{LinkError, Result};
use crate::protocol::DataPacket;

/// Create a connected queue/receiver pair.
pub fn packet_queue() -> (PacketQueue, PacketReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        PacketQueue {
            tx,
            depth: depth.clone(),
        },
        PacketReceiver { rx, depth },
    )
}

/// Producer side, held by the link controller.
#[derive(Clone)]
pub struct PacketQueue {
    tx: mpsc::UnboundedSender<DataPacket>,
    depth: Arc<AtomicUsize>,
}

impl PacketQueue {
    /// Append a packet to the tail.
    ///
    /// Returns `Err(ConnectionClosed)` if the receiver was dropped.
    pub fn enqueue(&self, packet: DataPacket) -> Result<()> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(packet).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::Release);
            LinkError::ConnectionClosed
        })
    }
}

/// Consumer side.
pub struct PacketReceiver {
    rx: mpsc::UnboundedReceiver<DataPacket>,
    depth: Arc<AtomicUsize>,
}

impl PacketReceiver {
    /// Wait for the next packet and remove it from the head.
    ///
    /// Cancel-safe: if the future is dropped before completing, no packet is
    /// lost, so this can be raced against a shutdown signal with `select!`.
    ///
    /// Returns `Err(ConnectionClosed)` once the link has ended and every
    /// queued packet has been consumed.
    pub async fn recv(&mut self) -> Result<DataPacket> {
        match self.rx.recv().await {
            Some(packet) => Ok(self.taken(packet)),
            None => Err(LinkError::ConnectionClosed),
        }
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<DataPacket> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::RecvTimeout(timeout)),
        }
    }

    /// Take the head packet if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<DataPacket>> {
        match self.rx.try_recv() {
            Ok(packet) => Ok(Some(self.taken(packet))),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(LinkError::ConnectionClosed),
        }
    }

    /// Blocking receive for consumers running on a plain OS thread.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Result<DataPacket> {
        match self.rx.blocking_recv() {
            Some(packet) => Ok(self.taken(packet)),
            None => Err(LinkError::ConnectionClosed),
        }
    }

    /// Number of packets waiting.
    #[inline]
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Check if no packets are waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn taken(&self, packet: DataPacket) -> DataPacket {
        self.depth.fetch_sub(1, Ordering::Release);
        packet
    }
}
