//! Loopback demo - host and device links over a noisy in-memory line.
//!
//! This demo shows:
//! - Starting two links on any tokio byte stream
//! - Recovering from a corrupted packet via RETX and replay
//! - Reading link counters
//!
//! Run with `RUST_LOG=debug cargo run --example loopback` to see the
//! protocol decisions.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing_subscriber::EnvFilter;
use uart_link::protocol::{ACK_PACKET, PACKET_LENGTH};
use uart_link::Link;

/// Copy packets from `from` to `to`, damaging every `nth` data packet.
///
/// ACKs pass untouched: the protocol carries no sequence numbers, so a lost
/// ACK followed by a replay would deliver a payload twice.
async fn noisy_line<R, W>(mut from: R, mut to: W, nth: Option<usize>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; PACKET_LENGTH];
    let mut count = 0usize;
    while from.read_exact(&mut buf).await.is_ok() {
        if let Some(nth) = nth.filter(|_| buf != ACK_PACKET) {
            count += 1;
            if count % nth == 0 {
                buf[3] ^= 0x20;
            }
        }
        if to.write_all(&buf).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (host_end, line_host) = tokio::io::duplex(1024);
    let (device_end, line_device) = tokio::io::duplex(1024);
    let (host_rx, host_tx) = tokio::io::split(line_host);
    let (device_rx, device_tx) = tokio::io::split(line_device);
    tokio::spawn(noisy_line(host_rx, device_tx, Some(3)));
    tokio::spawn(noisy_line(device_rx, host_tx, None));

    let mut host = Link::builder().start_stream(host_end)?;
    let mut device = Link::builder().start_stream(device_end)?;

    // Device echoes every payload back with the first byte inverted
    let device_task = tokio::spawn(async move {
        for _ in 0..8 {
            let packet = device.recv().await?;
            let mut reply = packet.payload().to_vec();
            if let Some(first) = reply.first_mut() {
                *first = !*first;
            }
            device.send_payload(&reply).await?;
        }
        Ok::<_, uart_link::LinkError>(device.stats())
    });

    for block in 0u8..8 {
        let payload = [block, 0xB0, 0x07];
        host.send_payload(&payload).await?;
        let reply = host.recv().await?;
        println!("sent {:02x?} -> got {:02x?}", payload, reply.payload());
    }

    let device_stats = device_task.await??;
    println!("host:   {:?}", host.stats());
    println!("device: {:?}", device_stats);

    Ok(())
}
