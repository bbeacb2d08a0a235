// Delivery side: connection management, ack tracking, cursor persistence,
// and the serializer/filter seams.

mod ack_queue;
mod ack_reader;
mod cursor_writer;
mod filter;
mod format;
mod output;
mod writer;

pub use ack_queue::AckQueue;
pub use ack_reader::AckReader;
pub use cursor_writer::CursorWriter;
pub use filter::{EventFilter, RecordTypeFilter, create_event_filter};
pub use format::{
    ACK_FRAME_SIZE, EventWriter, JsonEventWriter, RawEventWriter, SyslogEventWriter, WriteResult,
    create_event_writer, encode_ack,
};
pub use output::{DEFAULT_ACK_QUEUE_SIZE, DEFAULT_ACK_TIMEOUT, MIN_ACK_TIMEOUT, Output};
pub use writer::{Connection, UnixDomainWriter};
