//! Pending-acknowledgement tracker that decides which cursor is safe to
//! persist.
//!
//! Entries are sequenced under one lock, so adds, skips (auto-cursor) and
//! acks see a total order. Persisting the cursor of the highest acked
//! sequence implicitly acknowledges everything sequenced before it; the
//! receiver may see duplicates after a crash, which is the at-least-once
//! trade-off.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::event::EventId;
use crate::queue::QueueCursor;

struct AckState {
    event_ids: HashMap<EventId, u64>,
    cursors: BTreeMap<u64, (EventId, QueueCursor)>,
    next_seq: u64,
    auto_cursor: Option<(u64, QueueCursor)>,
    closed: bool,
}

pub struct AckQueue {
    max_size: usize,
    state: Mutex<AckState>,
    cond: Condvar,
}

impl AckQueue {
    pub fn new(max_size: usize) -> AckQueue {
        AckQueue {
            max_size,
            state: Mutex::new(AckState {
                event_ids: HashMap::new(),
                cursors: BTreeMap::new(),
                next_seq: 0,
                auto_cursor: None,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Register a pending ack, blocking up to `timeout_ms` for capacity
    /// (negative waits indefinitely). Once closed, the capacity wait is
    /// satisfied immediately and the entry is still inserted; the caller
    /// learns of the dead connection from its next write.
    pub fn add(&self, event_id: EventId, cursor: QueueCursor, timeout_ms: i64) -> bool {
        let mut state = self.state.lock();
        if timeout_ms < 0 {
            while !(state.closed || state.event_ids.len() < self.max_size) {
                self.cond.wait(&mut state);
            }
        } else {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
            loop {
                if state.closed || state.event_ids.len() < self.max_size {
                    break;
                }
                if self.cond.wait_until(&mut state, deadline).timed_out() {
                    if state.closed || state.event_ids.len() < self.max_size {
                        break;
                    }
                    return false;
                }
            }
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.event_ids.insert(event_id, seq);
        state.cursors.insert(seq, (event_id, cursor));
        true
    }

    /// Acknowledge `event_id`. Returns the cursor safe to persist, which
    /// covers every lower-sequence entry still pending.
    pub fn ack(&self, event_id: EventId) -> Option<QueueCursor> {
        let mut state = self.state.lock();
        let mut found = false;
        let mut out = QueueCursor::HEAD;
        let mut acked_seq = 0u64;

        if let Some(seq) = state.event_ids.remove(&event_id) {
            acked_seq = seq;
            self.cond.notify_all();
            // Sweep everything sequenced at or before the acked entry.
            while let Some((&first, _)) = state.cursors.first_key_value() {
                if first > acked_seq {
                    break;
                }
                if let Some((id, cursor)) = state.cursors.remove(&first) {
                    state.event_ids.remove(&id);
                    out = cursor;
                    found = true;
                }
            }
        }

        // A deferred (skipped-event) cursor wins when it is newer than the
        // acked entry and nothing pending is sequenced before it.
        if let Some((auto_seq, auto_cursor)) = state.auto_cursor {
            if (!found || auto_seq > acked_seq)
                && state
                    .cursors
                    .first_key_value()
                    .is_none_or(|(&first, _)| first > auto_seq)
            {
                out = auto_cursor;
                found = true;
                state.auto_cursor = None;
            }
        }

        if found { Some(out) } else { None }
    }

    /// Record progress for an event the writer skipped.
    pub fn set_auto_cursor(&self, cursor: QueueCursor) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.auto_cursor = Some((seq, cursor));
    }

    /// Consume the deferred cursor, if any.
    pub fn get_auto_cursor(&self) -> Option<QueueCursor> {
        self.state.lock().auto_cursor.take().map(|(_, cursor)| cursor)
    }

    /// Cancel a pending ack; paired with `set_auto_cursor` when the writer
    /// decides post-hoc to skip the event.
    pub fn remove(&self, event_id: &EventId) {
        let mut state = self.state.lock();
        if let Some(seq) = state.event_ids.remove(event_id) {
            state.cursors.remove(&seq);
        }
    }

    /// Wait up to `millis` for every pending ack to land.
    pub fn wait(&self, millis: u64) -> bool {
        let deadline = Instant::now() + Duration::from_millis(millis);
        let mut state = self.state.lock();
        while !state.event_ids.is_empty() {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.event_ids.is_empty();
            }
        }
        true
    }

    /// Unblock all waiters permanently, until the next `reset`.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Reinitialize for a fresh connection.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.closed = false;
        state.event_ids.clear();
        state.cursors.clear();
        state.next_seq = 0;
        state.auto_cursor = None;
    }

    pub fn pending(&self) -> usize {
        self.state.lock().event_ids.len()
    }
}
