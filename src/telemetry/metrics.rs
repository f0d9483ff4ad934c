//! Link statistics.
//!
//! Thread-safe counters shared between the engine and whoever wants to
//! report on the link (the CLI prints a summary when a session ends).

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-link statistics.
#[derive(Debug, Default)]
pub struct LinkStats {
    /// Frames that passed the FCS check.
    pub rx_frames: Counter,
    /// Bytes of those frames, after unescaping.
    pub rx_bytes: Counter,
    /// Frames transmitted.
    pub tx_frames: Counter,
    /// Bytes transmitted, after escaping.
    pub tx_bytes: Counter,
    /// Frames discarded for a bad FCS.
    pub fcs_errors: Counter,
    /// Frames discarded as aborted, runt or oversized.
    pub framing_errors: Counter,
    /// Packets that failed to parse.
    pub malformed: Counter,
    /// Packets dropped because they did not fit the current state.
    pub dropped: Counter,
    /// Negotiations that ran out of option buffer space.
    pub option_overflows: Counter,
    /// Code-Rejects sent.
    pub code_rejects_sent: Counter,
    /// Protocol-Rejects sent.
    pub protocol_rejects_sent: Counter,
    /// IP datagrams delivered to the network layer.
    pub datagrams_delivered: Counter,
}

impl LinkStats {
    /// Creates new link statistics initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a received frame.
    pub fn record_rx(&self, bytes: usize) {
        self.rx_frames.inc();
        self.rx_bytes.add(bytes as u64);
    }

    /// Records a transmitted frame.
    pub fn record_tx(&self, bytes: usize) {
        self.tx_frames.inc();
        self.tx_bytes.add(bytes as u64);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            rx_frames: self.rx_frames.get(),
            rx_bytes: self.rx_bytes.get(),
            tx_frames: self.tx_frames.get(),
            tx_bytes: self.tx_bytes.get(),
            fcs_errors: self.fcs_errors.get(),
            framing_errors: self.framing_errors.get(),
            malformed: self.malformed.get(),
            dropped: self.dropped.get(),
            option_overflows: self.option_overflows.get(),
            code_rejects_sent: self.code_rejects_sent.get(),
            protocol_rejects_sent: self.protocol_rejects_sent.get(),
            datagrams_delivered: self.datagrams_delivered.get(),
        }
    }
}

/// Plain copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    pub rx_frames: u64,
    pub rx_bytes: u64,
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub fcs_errors: u64,
    pub framing_errors: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub option_overflows: u64,
    pub code_rejects_sent: u64,
    pub protocol_rejects_sent: u64,
    pub datagrams_delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.add(10);
        assert_eq!(counter.get(), 11);
    }

    #[test]
    fn test_link_stats() {
        let stats = LinkStats::new();

        stats.record_rx(100);
        stats.record_rx(200);
        stats.record_tx(50);
        stats.fcs_errors.inc();

        let snap = stats.snapshot();
        assert_eq!(snap.rx_frames, 2);
        assert_eq!(snap.rx_bytes, 300);
        assert_eq!(snap.tx_frames, 1);
        assert_eq!(snap.tx_bytes, 50);
        assert_eq!(snap.fcs_errors, 1);
        assert_eq!(snap.dropped, 0);
    }
}
