//! Downstream unix-domain socket connection shared by the send and ack paths.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

use parking_lot::Mutex;

/// Byte transport the event serializers write into and read acks from.
pub trait Connection: Send + Sync {
    fn write_all(&self, data: &[u8]) -> io::Result<()>;
    fn read_exact(&self, buf: &mut [u8]) -> io::Result<()>;
}

/// Connection to the downstream consumer socket.
///
/// The send loop writes and the ack reader reads concurrently; each call
/// works on its own handle to the shared socket, so `close` from either side
/// unblocks a read pending on the other.
pub struct UnixDomainWriter {
    path: String,
    stream: Mutex<Option<UnixStream>>,
}

impl UnixDomainWriter {
    pub fn new(path: impl Into<String>) -> UnixDomainWriter {
        UnixDomainWriter {
            path: path.into(),
            stream: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn open(&self) -> io::Result<()> {
        let stream = UnixStream::connect(&self.path)?;
        *self.stream.lock() = Some(stream);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.stream.lock().is_some()
    }

    /// Half-close: no more writes; reads drain whatever the peer still sends.
    pub fn close_write(&self) {
        if let Some(stream) = self.stream.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Write);
        }
    }

    /// Full close. Idempotent, callable from any thread.
    pub fn close(&self) {
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn handle(&self) -> io::Result<UnixStream> {
        match self.stream.lock().as_ref() {
            Some(stream) => stream.try_clone(),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            )),
        }
    }
}

impl Connection for UnixDomainWriter {
    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut stream = self.handle()?;
        stream.write_all(data)
    }

    fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
        let mut stream = self.handle()?;
        stream.read_exact(buf)
    }
}
