//! Link counters.
//!
//! Updated by the link task with relaxed atomics and read from any task via
//! [`LinkStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between the link task and its handles.
#[derive(Debug, Default)]
pub struct LinkStats {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    crc_failures: AtomicU64,
    retransmissions: AtomicU64,
    acks_received: AtomicU64,
    payloads_accepted: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    /// Packets handed to the writer, replays included.
    pub packets_sent: u64,
    /// Packets extracted from the inbound stream, corrupt ones included.
    pub packets_received: u64,
    /// Inbound packets that failed the CRC check.
    pub crc_failures: u64,
    /// Replays of the last packet in answer to a RETX.
    pub retransmissions: u64,
    /// ACKs received from the peer.
    pub acks_received: u64,
    /// Data packets delivered to the application queue.
    pub payloads_accepted: u64,
}

impl LinkStats {
    /// Create a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current counter values.
    ///
    /// Counters are read one at a time, so a snapshot taken while the link
    /// is busy may be off by one between fields.
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            crc_failures: self.crc_failures.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            payloads_accepted: self.payloads_accepted.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_crc_failure(&self) {
        self.crc_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack(&self) {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self) {
        self.payloads_accepted.fetch_add(1, Ordering::Relaxed);
    }
}
