//! Consumes acknowledgement frames from the downstream peer.

use std::sync::Arc;

use crate::utils::worker::{Runnable, WorkerCtl};

use super::ack_queue::AckQueue;
use super::cursor_writer::CursorWriter;
use super::format::EventWriter;
use super::writer::UnixDomainWriter;

pub struct AckReader {
    event_writer: Arc<dyn EventWriter>,
    writer: Arc<UnixDomainWriter>,
    ack_queue: Arc<AckQueue>,
    cursor_writer: Arc<CursorWriter>,
}

impl AckReader {
    pub fn new(
        event_writer: Arc<dyn EventWriter>,
        writer: Arc<UnixDomainWriter>,
        ack_queue: Arc<AckQueue>,
        cursor_writer: Arc<CursorWriter>,
    ) -> AckReader {
        AckReader {
            event_writer,
            writer,
            ack_queue,
            cursor_writer,
        }
    }
}

impl Runnable for AckReader {
    fn run(&self, _ctl: &WorkerCtl) {
        while let Ok(event_id) = self.event_writer.read_ack(self.writer.as_ref()) {
            if let Some(cursor) = self.ack_queue.ack(event_id) {
                self.cursor_writer.update_cursor(cursor);
            }
        }

        // The connection is gone; close the writer so the send loop exits
        // too.
        self.writer.close();

        if let Some(cursor) = self.ack_queue.get_auto_cursor() {
            self.cursor_writer.update_cursor(cursor);
        }

        // Unblock any pending add() immediately instead of timing out.
        self.ack_queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::output::format::{RawEventWriter, encode_ack};
    use crate::queue::QueueCursor;
    use crate::utils::worker::Worker;
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::thread;
    use std::time::Duration;

    fn cursor(n: u64) -> QueueCursor {
        QueueCursor::from_data(n.to_le_bytes())
    }

    #[test]
    fn acks_advance_cursor_and_teardown_closes_queue() {
        let path = std::env::temp_dir().join(format!(
            "audit-shipper-ackreader-{}.sock",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let writer = Arc::new(UnixDomainWriter::new(path.to_string_lossy().to_string()));
        writer.open().unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        let ack_queue = Arc::new(AckQueue::new(10));
        assert!(ack_queue.add(EventId::new(1, 0, 1), cursor(1), 100));
        assert!(ack_queue.add(EventId::new(1, 0, 2), cursor(2), 100));

        let cursor_writer = Arc::new(CursorWriter::new(
            "test",
            std::env::temp_dir().join(format!("audit-shipper-ackreader-{}.cur", std::process::id())),
        ));

        let reader = AckReader::new(
            Arc::new(RawEventWriter),
            writer.clone(),
            ack_queue.clone(),
            cursor_writer.clone(),
        );
        let worker = Worker::new(Arc::new(reader));
        worker.start();

        peer.write_all(&encode_ack(EventId::new(1, 0, 2))).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cursor_writer.get_cursor(), cursor(2));
        assert_eq!(ack_queue.pending(), 0);

        // Peer disconnect ends the loop, closes the writer, closes the queue.
        drop(peer);
        thread::sleep(Duration::from_millis(50));
        assert!(!writer.is_open());
        assert!(ack_queue.is_closed());
        worker.stop();
        let _ = std::fs::remove_file(&path);
    }
}
