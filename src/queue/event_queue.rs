//! Builder allocator that commits finished frames into the queue.

use std::sync::Arc;

use crate::event::EventBuilderAllocator;

use super::Queue;

/// Owns the staging buffer the [`crate::event::EventBuilder`] serializes
/// into; a commit hands the frame to the durable queue.
pub struct EventQueue {
    buffer: Vec<u8>,
    queue: Arc<Queue>,
}

impl EventQueue {
    pub fn new(queue: Arc<Queue>) -> EventQueue {
        EventQueue {
            buffer: Vec::new(),
            queue,
        }
    }
}

impl EventBuilderAllocator for EventQueue {
    fn allocate(&mut self, size: usize) -> Result<(), String> {
        if self.buffer.len() < size {
            self.buffer.resize(size, 0);
        }
        Ok(())
    }

    fn data(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    fn commit(&mut self, size: usize) -> Result<(), String> {
        self.queue.put(&self.buffer[..size])
    }

    fn rollback(&mut self) {}
}
