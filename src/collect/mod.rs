// Collection side: stitches kernel audit records into whole events and
// enqueues them for delivery.

mod accumulator;
mod raw_event;
mod record;

pub use accumulator::RawEventAccumulator;
pub use raw_event::{AccumulatorLimits, RawEvent};
pub use record::RawEventRecord;
