//! Reliable event delivery core of an audit-log shipper.
//!
//! Records from an audit source are coalesced per event id by the
//! [`collect::RawEventAccumulator`], staged in a cursor-addressable
//! [`queue::Queue`], and shipped downstream by an [`output::Output`] that
//! tracks per-event acknowledgements and persists its progress so delivery
//! resumes after a crash or disconnect without loss and with bounded
//! duplication.

pub mod collect;
pub mod event;
pub mod output;
pub mod queue;
pub mod utils;
