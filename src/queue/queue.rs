//! Bounded in-memory event queue with monotone cursors.
//!
//! Stands in for the durable queue the shipper drains: every item gets a
//! strictly increasing id, `get` resumes after a caller-held cursor, and
//! `reset` drops the backlog while keeping ids monotone so a stale cursor
//! simply picks up at the next item put after the reset.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::{Condvar, Mutex};

/// Largest frame accepted by `put`.
pub const MAX_ITEM_SIZE: usize = 256 * 1024;
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Opaque position in the queue; `get` returns the first item after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QueueCursor(u64);

impl QueueCursor {
    /// Beginning of the queue.
    pub const HEAD: QueueCursor = QueueCursor(0);
    pub const DATA_SIZE: usize = 8;

    pub fn to_data(self) -> [u8; Self::DATA_SIZE] {
        self.0.to_le_bytes()
    }

    pub fn from_data(data: [u8; Self::DATA_SIZE]) -> QueueCursor {
        QueueCursor(u64::from_le_bytes(data))
    }
}

/// Outcome of [`Queue::get`].
#[derive(Debug, PartialEq, Eq)]
pub enum GetResult {
    Ok { size: usize, next: QueueCursor },
    Timeout,
    Interrupted,
    BufferTooSmall,
}

struct QueueInner {
    items: VecDeque<(u64, Vec<u8>)>,
    next_id: u64,
    interrupted: bool,
}

pub struct Queue {
    max_items: usize,
    inner: Mutex<QueueInner>,
    cond: Condvar,
}

impl Queue {
    pub fn new(max_items: usize) -> Queue {
        Queue {
            max_items,
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                next_id: 1,
                interrupted: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Append one frame. When full, the oldest frame is discarded to keep the
    /// queue bounded.
    pub fn put(&self, data: &[u8]) -> Result<(), String> {
        if data.len() > MAX_ITEM_SIZE {
            return Err(format!(
                "item size {} exceeds limit {}",
                data.len(),
                MAX_ITEM_SIZE
            ));
        }
        let mut inner = self.inner.lock();
        if inner.items.len() >= self.max_items {
            inner.items.pop_front();
            warn!("queue full, dropping oldest item");
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.items.push_back((id, data.to_vec()));
        self.cond.notify_all();
        Ok(())
    }

    /// Copy the first item after `cursor` into `buf`, blocking up to
    /// `timeout` when the queue has nothing past the cursor yet.
    pub fn get(&self, cursor: QueueCursor, buf: &mut [u8], timeout: Duration) -> GetResult {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if inner.interrupted {
                inner.interrupted = false;
                return GetResult::Interrupted;
            }
            if let Some((id, data)) = inner.items.iter().find(|(id, _)| *id > cursor.0) {
                if data.len() > buf.len() {
                    return GetResult::BufferTooSmall;
                }
                buf[..data.len()].copy_from_slice(data);
                return GetResult::Ok {
                    size: data.len(),
                    next: QueueCursor(*id),
                };
            }
            if self.cond.wait_until(&mut inner, deadline).timed_out() {
                return GetResult::Timeout;
            }
        }
    }

    /// Wake one pending `get` with `Interrupted`.
    pub fn interrupt(&self) {
        let mut inner = self.inner.lock();
        inner.interrupted = true;
        self.cond.notify_all();
    }

    /// Drop the backlog. Ids stay monotone, so cursors held by readers remain
    /// valid and resume at the next `put`.
    pub fn reset(&self) {
        self.inner.lock().items.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
