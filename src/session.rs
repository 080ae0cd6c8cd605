//! Link builder and runtime loop.
//!
//! The [`LinkBuilder`] configures a session and [`Link`] runs it:
//! 1. Spawn the writer task on the transport's write half
//! 2. Spawn the link task, which reads the transport, reassembles packets
//!    and drives the [`LinkController`]
//! 3. Hand the consumer a queue of accepted payloads and a send handle
//!
//! Consumer sends travel to the link task over a channel, so the replay slot
//! is only ever touched by the task that processes inbound packets. Each send
//! waits for the link task to hand the packet to the writer, and the session
//! ends as soon as the writer task exits.
//!
//! # Example
//!
//! ```no_run
//! use uart_link::Link;
//!
//! # async fn run<S>(serial: S) -> uart_link::Result<()>
//! # where
//! #     S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
//! # {
//! let mut link = Link::builder()
//!     .max_consecutive_crc_failures(Some(8))
//!     .start_stream(serial)?;
//!
//! link.send_payload(&[0x01, 0x02, 0x03]).await?;
//! let reply = link.recv().await?;
//! println!("device said {:02x?}", reply.payload());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::LinkConfig;
use crate::controller::LinkController;
use crate::error::{LinkError, Result};
use crate::protocol::{encode_packet, DataPacket, PacketBuffer, PACKET_LENGTH};
use crate::queue::{packet_queue, PacketReceiver};
use crate::stats::{LinkStats, LinkStatsSnapshot};
use crate::writer::{spawn_writer_task, OutboundPacket};

/// Builder for configuring and starting a link session.
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
    config: LinkConfig,
}

impl LinkBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: LinkConfig) -> Self {
        Self { config }
    }

    /// Consecutive CRC failures tolerated before the link fails.
    ///
    /// `None` keeps requesting resends forever.
    /// Default: 16
    pub fn max_consecutive_crc_failures(mut self, limit: Option<u32>) -> Self {
        self.config.max_consecutive_crc_failures = limit;
        self
    }

    /// Extract every complete packet per read, or only the first.
    ///
    /// Default: true
    pub fn drain_all_packets(mut self, drain: bool) -> Self {
        self.config.drain_all_packets = drain;
        self
    }

    /// Set the transport read size.
    ///
    /// Default: 256
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 64
    pub fn writer_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer_channel_capacity = capacity;
        self
    }

    /// Set the send command channel capacity.
    ///
    /// Default: 64
    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.command_channel_capacity = capacity;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Start the link on separate read and write halves.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<R, W>(self, reader: R, writer: W) -> Result<Link>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Link::start(self.config, reader, writer)
    }

    /// Start the link on a single bidirectional stream.
    pub fn start_stream<S>(self, stream: S) -> Result<Link>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        self.start(reader, writer)
    }
}

/// A consumer send waiting for the link task.
struct SendCommand {
    packet: OutboundPacket,
    /// Completed once the packet is with the writer, or dropped if the
    /// session ends first.
    done: oneshot::Sender<Result<()>>,
}

/// Cloneable handle for sending application payloads.
#[derive(Clone)]
pub struct LinkSender {
    commands: mpsc::Sender<SendCommand>,
}

impl LinkSender {
    /// Send a payload with `length = payload.len()`.
    ///
    /// Resolves once the packet is queued for the transport.
    ///
    /// Returns `Err(OversizedPayload)` without sending if the payload is
    /// longer than 16 bytes, and `Err(ConnectionClosed)` if the session has
    /// ended. [`LinkTask::join`] reports why it ended.
    pub async fn send_payload(&self, payload: &[u8]) -> Result<()> {
        let packet = DataPacket::new(payload)?;
        self.submit(packet.to_bytes()).await
    }

    /// Send a payload with an explicit declared length.
    pub async fn send_packet(&self, length: u8, payload: &[u8]) -> Result<()> {
        let packet = encode_packet(length, payload)?;
        self.submit(packet).await
    }

    /// Check if the link task has exited.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn submit(&self, packet: OutboundPacket) -> Result<()> {
        let (done, result) = oneshot::channel();
        self.commands
            .send(SendCommand { packet, done })
            .await
            .map_err(|_| LinkError::ConnectionClosed)?;

        result.await.map_err(|_| LinkError::ConnectionClosed)?
    }
}

/// Join handle for a running session's tasks.
pub struct LinkTask {
    link: JoinHandle<Result<()>>,
    writer: JoinHandle<Result<()>>,
}

impl LinkTask {
    /// Wait for the session to end and return why it ended.
    ///
    /// `Ok(())` means the transport reached end of stream.
    pub async fn join(self) -> Result<()> {
        let link = self.link.await?;
        let writer = self.writer.await?;

        match (link, writer) {
            // The writer's failure is the root cause
            (Err(LinkError::ConnectionClosed), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
            (Ok(()), writer) => writer,
        }
    }

    /// Stop the session without waiting for end of stream.
    ///
    /// Packets not yet written are discarded. A later [`join`](Self::join)
    /// returns [`LinkError::Task`].
    pub fn abort(&self) {
        self.link.abort();
        self.writer.abort();
    }

    /// Check if both session tasks have exited.
    pub fn is_finished(&self) -> bool {
        self.link.is_finished() && self.writer.is_finished()
    }
}

/// A running link session.
///
/// Use `send_payload()` to transmit, `recv()` to take accepted payloads,
/// and `wait_for_shutdown()` to block until the transport closes.
pub struct Link {
    sender: LinkSender,
    receiver: PacketReceiver,
    stats: Arc<LinkStats>,
    task: LinkTask,
}

impl Link {
    /// Create a new link builder.
    pub fn builder() -> LinkBuilder {
        LinkBuilder::new()
    }

    fn start<R, W>(config: LinkConfig, reader: R, writer: W) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;

        let (writer, writer_task) = spawn_writer_task(writer, config.writer_config());
        let (queue, receiver) = packet_queue();
        let stats = Arc::new(LinkStats::new());
        let controller = LinkController::new(
            writer,
            queue,
            stats.clone(),
            config.max_consecutive_crc_failures,
        );

        let (commands_tx, commands_rx) = mpsc::channel(config.command_channel_capacity);

        let link_task = tokio::spawn(async move {
            tracing::debug!("Link session started");
            let result = run_link(reader, controller, commands_rx, &config).await;
            match &result {
                Ok(()) => tracing::debug!("Link session ended: transport closed"),
                Err(e) => tracing::error!("Link session failed: {}", e),
            }
            result
        });

        Ok(Link {
            sender: LinkSender {
                commands: commands_tx,
            },
            receiver,
            stats,
            task: LinkTask {
                link: link_task,
                writer: writer_task,
            },
        })
    }

    /// Send a payload with `length = payload.len()`.
    pub async fn send_payload(&self, payload: &[u8]) -> Result<()> {
        self.sender.send_payload(payload).await
    }

    /// Send a payload with an explicit declared length.
    pub async fn send_packet(&self, length: u8, payload: &[u8]) -> Result<()> {
        self.sender.send_packet(length, payload).await
    }

    /// Wait for the next accepted payload.
    pub async fn recv(&mut self) -> Result<DataPacket> {
        self.receiver.recv().await
    }

    /// Wait for the next accepted payload, giving up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<DataPacket> {
        self.receiver.recv_timeout(timeout).await
    }

    /// Take an accepted payload if one is ready.
    pub fn try_recv(&mut self) -> Result<Option<DataPacket>> {
        self.receiver.try_recv()
    }

    /// Get a cloneable send handle.
    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    /// Current link counters.
    pub fn stats(&self) -> LinkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared counters, readable after the link is split.
    pub fn stats_handle(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    /// Split into send handle, payload receiver and task handle.
    pub fn split(self) -> (LinkSender, PacketReceiver, LinkTask) {
        (self.sender, self.receiver, self.task)
    }

    /// Wait for the session to end (transport closed or link failure).
    ///
    /// This consumes the link; queued payloads are discarded.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        self.task.join().await
    }
}

/// Main link loop - reads the transport and serializes consumer sends.
async fn run_link<R>(
    mut reader: R,
    mut controller: LinkController,
    mut commands: mpsc::Receiver<SendCommand>,
    config: &LinkConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut packet_buffer = PacketBuffer::with_capacity(config.read_buffer_size + PACKET_LENGTH);
    let mut buf = vec![0u8; config.read_buffer_size];
    let mut commands_open = true;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(e) => return Err(LinkError::Io(e)),
                };
                tracing::trace!("Received {} bytes", n);

                if config.drain_all_packets {
                    for raw in packet_buffer.push(&buf[..n]) {
                        controller.handle_packet(raw).await?;
                    }
                } else if let Some(raw) = packet_buffer.push_one(&buf[..n]) {
                    controller.handle_packet(raw).await?;
                }
            }
            command = commands.recv(), if commands_open => match command {
                Some(SendCommand { packet, done }) => {
                    if let Err(e) = controller.send(packet).await {
                        let _ = done.send(Err(LinkError::ConnectionClosed));
                        return Err(e);
                    }
                    let _ = done.send(Ok(()));
                }
                None => commands_open = false,
            },
            _ = controller.writer_closed() => {
                tracing::debug!("Writer task exited");
                return Err(LinkError::ConnectionClosed);
            }
        }
    }
}
