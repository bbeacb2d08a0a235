// Serialized audit events: identifiers, record types, frame layout, builder.

mod builder;
mod event;
mod record_type;
#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{EventBuilder, EventBuilderAllocator};
pub use event::{
    EVENT_HEADER_SIZE, EVENT_VERSION, Event, EventId, EventRecord, FieldIter, RecordIter,
};
pub use record_type::RecordType;
