//! Persists the delivery cursor to a small fixed-size file.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use log::error;
use parking_lot::{Condvar, Mutex};

use crate::queue::QueueCursor;
use crate::utils::worker::{Runnable, WorkerCtl};

struct CursorState {
    cursor: QueueCursor,
    updated: bool,
}

/// Holds the latest safe cursor in memory and writes it behind a short
/// coalescing delay from its worker thread.
pub struct CursorWriter {
    name: String,
    path: PathBuf,
    state: Mutex<CursorState>,
    cond: Condvar,
}

impl CursorWriter {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> CursorWriter {
        CursorWriter {
            name: name.into(),
            path: path.into(),
            state: Mutex::new(CursorState {
                cursor: QueueCursor::HEAD,
                updated: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Load the persisted cursor. A missing file is a fresh start from
    /// `HEAD`; any other failure is fatal for the owning output.
    pub fn read(&self) -> Result<(), String> {
        let mut state = self.state.lock();
        let mut file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                state.cursor = QueueCursor::HEAD;
                return Ok(());
            }
            Err(e) => {
                return Err(format!(
                    "failed to open cursor file ({}): {e}",
                    self.path.display()
                ));
            }
        };
        let mut data = [0u8; QueueCursor::DATA_SIZE];
        file.read_exact(&mut data).map_err(|e| {
            format!("failed to read cursor file ({}): {e}", self.path.display())
        })?;
        state.cursor = QueueCursor::from_data(data);
        Ok(())
    }

    /// Persist the current cursor: exactly `DATA_SIZE` bytes, mode 0600.
    pub fn write(&self) -> Result<(), String> {
        let state = self.state.lock();
        let data = state.cursor.to_data();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(0o600)
            .open(&self.path)
            .map_err(|e| {
                format!(
                    "failed to open/create cursor file ({}): {e}",
                    self.path.display()
                )
            })?;
        file.write_all(&data).map_err(|e| {
            format!("failed to write cursor file ({}): {e}", self.path.display())
        })
    }

    /// Remove the cursor file; already gone counts as success.
    pub fn delete(&self) -> Result<(), String> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!(
                "failed to delete cursor file ({}): {e}",
                self.path.display()
            )),
        }
    }

    pub fn get_cursor(&self) -> QueueCursor {
        self.state.lock().cursor
    }

    pub fn update_cursor(&self, cursor: QueueCursor) {
        let mut state = self.state.lock();
        state.cursor = cursor;
        state.updated = true;
        self.cond.notify_all();
    }
}

impl Runnable for CursorWriter {
    /// Write-behind loop: wake on updates, persist, then briefly absorb
    /// bursts before the next write.
    fn run(&self, ctl: &WorkerCtl) {
        while !ctl.is_stopping() {
            {
                let mut state = self.state.lock();
                while !state.updated {
                    self.cond.wait(&mut state);
                }
                state.updated = false;
            }
            if let Err(e) = self.write() {
                error!("Output({}): {e}", self.name);
            }
            ctl.sleep(100);
        }
        if let Err(e) = self.write() {
            error!("Output({}): {e}", self.name);
        }
    }

    fn on_stopping(&self) {
        let mut state = self.state.lock();
        state.updated = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::worker::Worker;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    fn temp_cursor_path(tag: &str) -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        std::env::temp_dir().join(format!(
            "audit-shipper-cursor-{}-{}-{}",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn cursor(n: u64) -> QueueCursor {
        QueueCursor::from_data(n.to_le_bytes())
    }

    #[test]
    fn write_then_read_round_trips() {
        let path = temp_cursor_path("roundtrip");
        let writer = CursorWriter::new("test", path.clone());
        writer.update_cursor(cursor(77));
        writer.write().unwrap();

        let reader = CursorWriter::new("test", path.clone());
        reader.read().unwrap();
        assert_eq!(reader.get_cursor(), cursor(77));
        writer.delete().unwrap();
    }

    #[test]
    fn missing_file_reads_as_head() {
        let path = temp_cursor_path("missing");
        let writer = CursorWriter::new("test", path);
        writer.read().unwrap();
        assert_eq!(writer.get_cursor(), QueueCursor::HEAD);
    }

    #[test]
    fn short_file_fails_read() {
        let path = temp_cursor_path("short");
        fs::write(&path, [1u8; 3]).unwrap();
        let writer = CursorWriter::new("test", path.clone());
        assert!(writer.read().is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn delete_tolerates_missing_file() {
        let path = temp_cursor_path("delete");
        let writer = CursorWriter::new("test", path);
        writer.delete().unwrap();
        writer.delete().unwrap();
    }

    #[test]
    fn worker_persists_updates_and_final_state() {
        let path = temp_cursor_path("worker");
        let writer = Arc::new(CursorWriter::new("test", path.clone()));
        let worker = Worker::new(writer.clone());
        worker.start();

        writer.update_cursor(cursor(5));
        std::thread::sleep(Duration::from_millis(50));
        writer.update_cursor(cursor(9));
        worker.stop();

        let reader = CursorWriter::new("test", path.clone());
        reader.read().unwrap();
        assert_eq!(reader.get_cursor(), cursor(9));
        let _ = fs::remove_file(&path);
    }
}
