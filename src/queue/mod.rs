// Durable-queue collaborator: cursor-addressable storage plus the builder
// allocator adapter that feeds it.

mod event_queue;
mod queue;

pub use event_queue::EventQueue;
pub use queue::{DEFAULT_QUEUE_SIZE, GetResult, MAX_ITEM_SIZE, Queue, QueueCursor};
