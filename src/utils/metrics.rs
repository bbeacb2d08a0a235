//! Ingest counters shared across the accumulator and the reporting tick.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

/// Monotone counter; relaxed ordering, totals only.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct IngestMetrics {
    /// Raw record bytes offered to the accumulator.
    pub bytes: Counter,
    /// Records offered, including empty ones that were dropped.
    pub records: Counter,
    /// Assembled events handed to the queue.
    pub events: Counter,
}

impl IngestMetrics {
    pub fn new() -> IngestMetrics {
        IngestMetrics::default()
    }

    pub fn log_totals(&self) {
        info!(
            "ingest totals: {} records, {} bytes, {} events emitted",
            self.records.value(),
            self.bytes.value(),
            self.events.value()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = IngestMetrics::new();
        metrics.records.inc();
        metrics.records.inc();
        metrics.bytes.add(128);
        assert_eq!(metrics.records.value(), 2);
        assert_eq!(metrics.bytes.value(), 128);
        assert_eq!(metrics.events.value(), 0);
    }
}
