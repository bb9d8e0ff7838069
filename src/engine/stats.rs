//! Traffic statistics for an engine session
//!
//! Thread-safe counters written by the engine thread and read by the host.
//! Uses lock-free atomics for all operations.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Session traffic counters (fully lock-free)
#[derive(Debug, Default)]
pub struct Stats {
    /// Bytes received from the tester
    rx_bytes: AtomicU64,
    /// Bytes sent to the tester
    tx_bytes: AtomicU64,
    /// Complete request telegrams handled
    requests: AtomicU64,
    /// Response telegrams sent
    responses: AtomicU64,
    /// Requests answered from the response table
    table_hits: AtomicU64,
    /// Requests answered by the synthesizer
    synthesized: AtomicU64,
    /// Requests that fell through to the fallback policy
    fallbacks: AtomicU64,
    /// Received bytes discarded without forming a telegram
    dropped_bytes: AtomicU64,
}

/// Copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub requests: u64,
    pub responses: u64,
    pub table_hits: u64,
    pub synthesized: u64,
    pub fallbacks: u64,
    pub dropped_bytes: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_rx(&self, bytes: usize) {
        self.rx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count one transmitted telegram
    #[inline]
    pub fn add_tx(&self, bytes: usize) {
        self.tx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_table_hit(&self) {
        self.table_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_synthesized(&self) {
        self.synthesized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_dropped(&self, bytes: usize) {
        self.dropped_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Reset all counters (new session)
    pub fn reset(&self) {
        for counter in [
            &self.rx_bytes,
            &self.tx_bytes,
            &self.requests,
            &self.responses,
            &self.table_hits,
            &self.synthesized,
            &self.fallbacks,
            &self.dropped_bytes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            table_hits: self.table_hits.load(Ordering::Relaxed),
            synthesized: self.synthesized.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = Stats::new();
        stats.add_rx(6);
        stats.add_request();
        stats.add_table_hit();
        stats.add_tx(5);
        stats.add_tx(6);

        let snap = stats.snapshot();
        assert_eq!(snap.rx_bytes, 6);
        assert_eq!(snap.tx_bytes, 11);
        assert_eq!(snap.responses, 2);
        assert_eq!(snap.requests, 1);
        assert_eq!(snap.table_hits, 1);
    }

    #[test]
    fn test_reset() {
        let stats = Stats::new();
        stats.add_dropped(3);
        stats.add_fallback();
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = std::sync::Arc::new(Stats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        s.add_rx(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().rx_bytes, 4000);
    }
}
