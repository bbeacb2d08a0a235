//! Serializer seam between the output loop and the downstream peer.

use std::ffi::CString;
use std::io;
use std::sync::Arc;

use serde_json::json;

use crate::event::{Event, EventId};

use super::writer::Connection;

/// Acks come back as one fixed frame per delivered event.
pub const ACK_FRAME_SIZE: usize = 16;

/// Result of handing one event to a serializer.
pub enum WriteResult {
    Ok,
    /// The serializer chose not to transmit this event.
    Noop,
    Err(io::Error),
}

pub trait EventWriter: Send + Sync {
    fn write_event(&self, event: &Event, conn: &dyn Connection) -> WriteResult;

    /// Read one ack frame; an error ends the ack loop.
    fn read_ack(&self, conn: &dyn Connection) -> io::Result<EventId> {
        let mut frame = [0u8; ACK_FRAME_SIZE];
        conn.read_exact(&mut frame)?;
        let sec = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let msec = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let serial = u64::from_le_bytes([
            frame[8], frame[9], frame[10], frame[11], frame[12], frame[13], frame[14], frame[15],
        ]);
        Ok(EventId::new(sec, msec, serial))
    }
}

/// Encode an ack for `event_id`; the consumer side of the ack protocol.
pub fn encode_ack(event_id: EventId) -> [u8; ACK_FRAME_SIZE] {
    let mut frame = [0u8; ACK_FRAME_SIZE];
    frame[0..4].copy_from_slice(&event_id.sec.to_le_bytes());
    frame[4..8].copy_from_slice(&event_id.msec.to_le_bytes());
    frame[8..16].copy_from_slice(&event_id.serial.to_le_bytes());
    frame
}

/// Ships the serialized frame verbatim; peers parse the event header.
pub struct RawEventWriter;

impl EventWriter for RawEventWriter {
    fn write_event(&self, event: &Event, conn: &dyn Connection) -> WriteResult {
        match conn.write_all(event.data()) {
            Ok(()) => WriteResult::Ok,
            Err(e) => WriteResult::Err(e),
        }
    }
}

/// One JSON object per line: ids plus decoded records.
pub struct JsonEventWriter;

impl EventWriter for JsonEventWriter {
    fn write_event(&self, event: &Event, conn: &dyn Connection) -> WriteResult {
        let records: Vec<serde_json::Value> = event
            .records()
            .map(|record| {
                let fields: serde_json::Map<String, serde_json::Value> = record
                    .fields()
                    .map(|(name, value)| (name.to_string(), json!(value)))
                    .collect();
                json!({
                    "type": record.name,
                    "text": record.text_lossy(),
                    "fields": fields,
                })
            })
            .collect();
        let mut line = json!({
            "sec": event.seconds(),
            "msec": event.milliseconds(),
            "serial": event.serial(),
            "records": records,
        })
        .to_string();
        line.push('\n');
        match conn.write_all(line.as_bytes()) {
            Ok(()) => WriteResult::Ok,
            Err(e) => WriteResult::Err(e),
        }
    }
}

/// Writes each record to syslog(3); no socket and no acks on this path.
pub struct SyslogEventWriter;

impl EventWriter for SyslogEventWriter {
    fn write_event(&self, event: &Event, _conn: &dyn Connection) -> WriteResult {
        for record in event.records() {
            let message = format!(
                "audit({}): {}: {}",
                event.event_id(),
                record.name,
                record.text_lossy()
            );
            // Interior NULs would truncate the message; strip them.
            let Ok(message) = CString::new(message.replace('\0', " ")) else {
                continue;
            };
            unsafe {
                libc::syslog(libc::LOG_INFO, c"%s".as_ptr(), message.as_ptr());
            }
        }
        WriteResult::Ok
    }

    fn read_ack(&self, _conn: &dyn Connection) -> io::Result<EventId> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "syslog output does not carry acks",
        ))
    }
}

/// Materialize the serializer registered under `format`.
pub fn create_event_writer(format: &str) -> Option<Arc<dyn EventWriter>> {
    match format {
        "raw" => Some(Arc::new(RawEventWriter)),
        "json" => Some(Arc::new(JsonEventWriter)),
        "syslog" => Some(Arc::new(SyslogEventWriter)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_support::VecAllocator;
    use crate::event::{EventBuilder, RecordType};
    use parking_lot::Mutex;

    /// In-memory connection capturing writes and replaying queued reads.
    struct PipeConnection {
        written: Mutex<Vec<u8>>,
        readable: Mutex<Vec<u8>>,
    }

    impl PipeConnection {
        fn new() -> PipeConnection {
            PipeConnection {
                written: Mutex::new(Vec::new()),
                readable: Mutex::new(Vec::new()),
            }
        }
    }

    impl Connection for PipeConnection {
        fn write_all(&self, data: &[u8]) -> io::Result<()> {
            self.written.lock().extend_from_slice(data);
            Ok(())
        }

        fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
            let mut readable = self.readable.lock();
            if readable.len() < buf.len() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "drained"));
            }
            let rest = readable.split_off(buf.len());
            buf.copy_from_slice(&readable);
            *readable = rest;
            Ok(())
        }
    }

    fn sample_frame() -> Vec<u8> {
        let (alloc, committed) = VecAllocator::new();
        let mut builder = EventBuilder::new(Box::new(alloc));
        builder.begin_event(EventId::new(3, 4, 5), 1).unwrap();
        builder
            .add_record(RecordType::USER_CMD, "USER_CMD", b"cmd=\"ls\"")
            .unwrap();
        builder.end_event().unwrap();
        let mut frames = committed.lock().unwrap();
        frames.pop().unwrap()
    }

    #[test]
    fn raw_writer_ships_frame_verbatim() {
        let frame = sample_frame();
        let event = Event::from_bytes(&frame).unwrap();
        let conn = PipeConnection::new();
        assert!(matches!(
            RawEventWriter.write_event(&event, &conn),
            WriteResult::Ok
        ));
        assert_eq!(*conn.written.lock(), frame);
    }

    #[test]
    fn ack_frame_round_trip() {
        let conn = PipeConnection::new();
        let id = EventId::new(7, 8, 9);
        conn.readable.lock().extend_from_slice(&encode_ack(id));
        assert_eq!(RawEventWriter.read_ack(&conn).unwrap(), id);
        assert!(RawEventWriter.read_ack(&conn).is_err());
    }

    #[test]
    fn json_writer_emits_one_line_per_event() {
        let frame = sample_frame();
        let event = Event::from_bytes(&frame).unwrap();
        let conn = PipeConnection::new();
        assert!(matches!(
            JsonEventWriter.write_event(&event, &conn),
            WriteResult::Ok
        ));
        let written = conn.written.lock();
        let line = std::str::from_utf8(&written).unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["serial"], 5);
        assert_eq!(value["records"][0]["type"], "USER_CMD");
    }

    #[test]
    fn factory_knows_registered_formats() {
        assert!(create_event_writer("raw").is_some());
        assert!(create_event_writer("json").is_some());
        assert!(create_event_writer("syslog").is_some());
        assert!(create_event_writer("oms").is_none());
        assert!(create_event_writer("msgpack").is_none());
    }
}
