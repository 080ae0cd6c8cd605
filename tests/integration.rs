//! Integration tests for uart-link.
//!
//! Each test runs a link over an in-memory duplex pipe and plays the remote
//! device by hand on the other end, or connects two links through a relay.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use uart_link::protocol::{
    encode_packet, RawPacket, ACK_PACKET, PACKET_CRC_INDEX, PACKET_LENGTH, RETX_PACKET,
};
use uart_link::{Link, LinkError};

async fn read_packet(peer: &mut DuplexStream) -> [u8; PACKET_LENGTH] {
    let mut buf = [0u8; PACKET_LENGTH];
    peer.read_exact(&mut buf).await.expect("peer read");
    buf
}

/// Assert the link writes nothing for a short while.
async fn assert_silent(peer: &mut DuplexStream) {
    let mut buf = [0u8; 1];
    let result = tokio::time::timeout(Duration::from_millis(30), peer.read(&mut buf)).await;
    assert!(result.is_err(), "expected no outbound bytes");
}

fn start() -> (Link, DuplexStream) {
    let (local, peer) = tokio::io::duplex(1024);
    let link = Link::builder().start_stream(local).expect("start link");
    (link, peer)
}

#[tokio::test]
async fn test_worked_example_is_accepted_and_acked() {
    let (mut link, mut peer) = start();

    let bytes = encode_packet(3, &[0x01, 0x02, 0x03]).unwrap();
    assert_eq!(bytes[PACKET_CRC_INDEX], 0xF6);
    peer.write_all(&bytes).await.unwrap();

    let packet = link.recv().await.unwrap();
    assert_eq!(packet.length(), 3);
    assert_eq!(packet.payload(), &[0x01, 0x02, 0x03]);
    assert!(packet.data()[3..].iter().all(|&b| b == 0xFF));

    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
    assert_silent(&mut peer).await;

    let stats = link.stats();
    assert_eq!(stats.payloads_accepted, 1);
    assert_eq!(stats.packets_sent, 1);
}

#[tokio::test]
async fn test_packet_split_across_writes() {
    let (mut link, mut peer) = start();
    let bytes = encode_packet(2, b"ok").unwrap();

    peer.write_all(&bytes[..7]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(link.try_recv().unwrap().is_none());

    peer.write_all(&bytes[7..]).await.unwrap();
    let packet = link.recv().await.unwrap();
    assert_eq!(packet.raw(), &RawPacket::decode(&bytes).unwrap());
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
}

#[tokio::test]
async fn test_payloads_delivered_in_order() {
    let (mut link, mut peer) = start();

    let mut burst = Vec::new();
    for i in 0u8..4 {
        burst.extend_from_slice(&encode_packet(1, &[i]).unwrap());
    }
    peer.write_all(&burst).await.unwrap();

    for i in 0u8..4 {
        assert_eq!(link.recv().await.unwrap().payload(), &[i]);
        assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
    }
}

#[tokio::test]
async fn test_corrupt_packet_triggers_retx_and_recovers() {
    let (mut link, mut peer) = start();

    let good = encode_packet(4, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    let mut bad = good;
    bad[2] ^= 0x10;

    peer.write_all(&bad).await.unwrap();
    assert_eq!(read_packet(&mut peer).await, RETX_PACKET);
    assert!(link
        .recv_timeout(Duration::from_millis(20))
        .await
        .is_err());

    // Peer resends, link accepts
    peer.write_all(&good).await.unwrap();
    assert_eq!(link.recv().await.unwrap().payload(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);

    let stats = link.stats();
    assert_eq!(stats.crc_failures, 1);
    assert_eq!(stats.payloads_accepted, 1);
    assert_eq!(stats.packets_received, 2);
}

#[tokio::test]
async fn test_retx_replays_exact_bytes() {
    let (link, mut peer) = start();

    link.send_packet(5, &[0x10, 0x20, 0x30, 0x40, 0x50])
        .await
        .unwrap();
    let original = read_packet(&mut peer).await;
    assert_eq!(original[0], 5);

    for _ in 0..3 {
        peer.write_all(&RETX_PACKET).await.unwrap();
        assert_eq!(read_packet(&mut peer).await, original);
    }
    assert_eq!(link.stats().retransmissions, 3);
}

#[tokio::test]
async fn test_retx_before_any_send_replays_ack() {
    let (_link, mut peer) = start();

    peer.write_all(&RETX_PACKET).await.unwrap();
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
}

#[tokio::test]
async fn test_ack_is_absorbed() {
    let (mut link, mut peer) = start();

    peer.write_all(&ACK_PACKET).await.unwrap();
    assert_silent(&mut peer).await;
    assert!(link.try_recv().unwrap().is_none());
    assert_eq!(link.stats().acks_received, 1);
}

#[tokio::test]
async fn test_control_lookalike_is_data() {
    let (mut link, mut peer) = start();

    // First byte is the ACK marker but the declared length is 2
    let lookalike = encode_packet(2, &[0x15, 0xFF]).unwrap();
    peer.write_all(&lookalike).await.unwrap();

    assert_eq!(link.recv().await.unwrap().payload(), &[0x15, 0xFF]);
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
}

#[tokio::test]
async fn test_split_consumer_on_own_task() {
    let (link, mut peer) = start();
    let (sender, mut receiver, task) = link.split();

    let consumer = tokio::spawn(async move {
        let mut got = Vec::new();
        while let Ok(packet) = receiver.recv().await {
            got.push(packet.payload().to_vec());
        }
        got
    });

    sender.send_payload(b"hello").await.unwrap();
    assert_eq!(&read_packet(&mut peer).await[1..6], b"hello");

    peer.write_all(&encode_packet(3, b"one").unwrap()).await.unwrap();
    peer.write_all(&encode_packet(3, b"two").unwrap()).await.unwrap();
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);

    drop(peer);
    task.join().await.unwrap();

    let got = consumer.await.unwrap();
    assert_eq!(got, vec![b"one".to_vec(), b"two".to_vec()]);
}

#[tokio::test]
async fn test_recv_after_transport_closed() {
    let (mut link, mut peer) = start();

    peer.write_all(&encode_packet(1, &[0x99]).unwrap())
        .await
        .unwrap();
    assert_eq!(read_packet(&mut peer).await, ACK_PACKET);
    drop(peer);

    assert_eq!(link.recv().await.unwrap().payload(), &[0x99]);
    assert!(matches!(link.recv().await, Err(LinkError::ConnectionClosed)));
    assert!(matches!(
        link.send_payload(&[1]).await,
        Err(LinkError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_unbounded_retries_survive_long_noise() {
    let (local, mut peer) = tokio::io::duplex(4096);
    let mut link = Link::builder()
        .max_consecutive_crc_failures(None)
        .start_stream(local)
        .unwrap();

    let mut bad = encode_packet(1, &[0x01]).unwrap();
    bad[0] ^= 0x80;
    for _ in 0..50 {
        peer.write_all(&bad).await.unwrap();
        assert_eq!(read_packet(&mut peer).await, RETX_PACKET);
    }

    peer.write_all(&encode_packet(1, &[0x01]).unwrap())
        .await
        .unwrap();
    assert_eq!(link.recv().await.unwrap().payload(), &[0x01]);
}

/// Forward `from` to `to`, flipping one bit in the first `corrupt` packets.
async fn noisy_forward<R, W>(mut from: R, mut to: W, corrupt: usize)
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = [0u8; PACKET_LENGTH];
    let mut seen = 0;
    while from.read_exact(&mut buf).await.is_ok() {
        if seen < corrupt {
            buf[5] ^= 0x04;
        }
        seen += 1;
        if to.write_all(&buf).await.is_err() {
            break;
        }
    }
}

#[tokio::test]
async fn test_two_links_recover_through_noisy_relay() {
    let (host_end, relay_host) = tokio::io::duplex(1024);
    let (device_end, relay_device) = tokio::io::duplex(1024);

    let (host_r, host_w) = tokio::io::split(relay_host);
    let (device_r, device_w) = tokio::io::split(relay_device);
    // Host -> device corrupts the first packet; device -> host is clean
    tokio::spawn(noisy_forward(host_r, device_w, 1));
    tokio::spawn(noisy_forward(device_r, host_w, 0));

    let mut host = Link::builder().start_stream(host_end).unwrap();
    let mut device = Link::builder().start_stream(device_end).unwrap();

    host.send_payload(&[0xC4, 0x55, 0x7E, 0x10]).await.unwrap();
    let received = device.recv().await.unwrap();
    assert_eq!(received.payload(), &[0xC4, 0x55, 0x7E, 0x10]);

    device.send_payload(&[0x42]).await.unwrap();
    let reply = host.recv().await.unwrap();
    assert_eq!(reply.payload(), &[0x42]);

    let host_stats = host.stats();
    assert_eq!(host_stats.retransmissions, 1);

    let device_stats = device.stats();
    assert_eq!(device_stats.crc_failures, 1);
    assert_eq!(device_stats.payloads_accepted, 1);
}
