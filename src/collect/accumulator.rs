//! Coalesces multi-record audit events before they reach the delivery queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::event::{EventBuilder, RecordType};
use crate::utils::metrics::IngestMetrics;

use super::raw_event::{AccumulatorLimits, RawEvent};
use super::record::RawEventRecord;

struct CacheEntry {
    event: RawEvent,
    last_touched: Instant,
}

struct AccumulatorInner {
    // Oldest-touched first; a touch moves the entry to the back.
    cache: VecDeque<CacheEntry>,
    builder: EventBuilder,
}

pub struct RawEventAccumulator {
    limits: AccumulatorLimits,
    metrics: Arc<IngestMetrics>,
    inner: Mutex<AccumulatorInner>,
}

impl RawEventAccumulator {
    pub fn new(
        builder: EventBuilder,
        limits: AccumulatorLimits,
        metrics: Arc<IngestMetrics>,
    ) -> RawEventAccumulator {
        RawEventAccumulator {
            limits,
            metrics,
            inner: Mutex::new(AccumulatorInner {
                cache: VecDeque::new(),
                builder,
            }),
        }
    }

    pub fn add_record(&self, record: RawEventRecord) -> Result<(), String> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        self.metrics.bytes.add(record.size() as u64);
        self.metrics.records.inc();

        // Empty records carry nothing, but EOE is the completion signal.
        if record.is_empty() && record.record_type() != RecordType::EOE {
            return Ok(());
        }

        let event_id = record.event_id();
        let pos = inner
            .cache
            .iter()
            .position(|entry| entry.event.event_id() == event_id);
        match pos {
            Some(pos) => {
                if let Some(mut entry) = inner.cache.remove(pos) {
                    if entry.event.add_record(record, &self.limits) {
                        self.metrics.events.inc();
                        entry.event.add_event(&mut inner.builder)?;
                    } else {
                        entry.last_touched = Instant::now();
                        inner.cache.push_back(entry);
                    }
                }
            }
            None => {
                let mut event = RawEvent::new(event_id);
                if event.add_record(record, &self.limits) {
                    // Single-record events skip the cache entirely.
                    self.metrics.events.inc();
                    event.add_event(&mut inner.builder)?;
                } else {
                    inner.cache.push_back(CacheEntry {
                        event,
                        last_touched: Instant::now(),
                    });
                }
            }
        }

        // Evict oldest entries past the cache ceiling without waiting for a
        // flush.
        while inner.cache.len() > self.limits.max_cache_entry {
            if let Some(mut entry) = inner.cache.pop_front() {
                self.metrics.events.inc();
                entry.event.add_event(&mut inner.builder)?;
            }
        }
        Ok(())
    }

    /// Emit entries idle for longer than `milliseconds` (oldest first), or
    /// everything when `milliseconds` is zero or negative.
    pub fn flush(&self, milliseconds: i64) -> Result<(), String> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        if milliseconds > 0 {
            let now = Instant::now();
            let max_age = Duration::from_millis(milliseconds as u64);
            loop {
                let evict = match inner.cache.front() {
                    Some(entry) => {
                        inner.cache.len() > self.limits.max_cache_entry
                            || now.duration_since(entry.last_touched) > max_age
                    }
                    None => false,
                };
                if !evict {
                    break;
                }
                if let Some(mut entry) = inner.cache.pop_front() {
                    self.metrics.events.inc();
                    entry.event.add_event(&mut inner.builder)?;
                }
            }
        } else {
            while let Some(mut entry) = inner.cache.pop_front() {
                self.metrics.events.inc();
                entry.event.add_event(&mut inner.builder)?;
            }
        }
        Ok(())
    }

    /// Number of events still being assembled.
    pub fn pending(&self) -> usize {
        self.inner.lock().cache.len()
    }
}
