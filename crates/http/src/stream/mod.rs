//! Deadline-bounded stream contracts.
//!
//! The parser never touches I/O itself; callers read bytes from an
//! [`InputStream`] and feed them in. The serializers write onto an
//! [`OutputStream`]. Every blocking call carries an absolute [`Deadline`] and
//! fails with [`StreamError::Timeout`] instead of waiting past it.
//!
//! # Implementations
//!
//! - [`MemoryStream`]: in-memory input chunks and captured output, for tests
//!   and benchmarks
//! - [`TcpStream`]: blocking `std::net::TcpStream` with deadlines mapped onto
//!   socket timeouts

mod deadline;
mod memory;
mod tcp;

pub use deadline::Deadline;
pub use memory::MemoryStream;
pub use tcp::TcpStream;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::protocol::StreamError;

/// Read size used by [`InputStream::drain`].
pub const DRAIN_CHUNK_SIZE: usize = 2048;

pub trait InputStream {
    /// Whether the stream has reached its end; no further reads will yield data.
    fn closed(&self) -> bool;

    fn open(&mut self, _deadline: Deadline) -> Result<(), StreamError> {
        Ok(())
    }

    fn close(&mut self);

    /// Reads into `into`, returning how many bytes were written to it.
    ///
    /// # Errors
    ///
    /// [`StreamError::Timeout`] when `deadline` passes first,
    /// [`StreamError::Closed`] when the peer has closed the stream.
    fn read(&mut self, into: &mut [u8], deadline: Deadline) -> Result<usize, StreamError>;

    /// Reads at most `count` bytes into a fresh buffer.
    fn read_up_to(&mut self, count: usize, deadline: Deadline) -> Result<Bytes, StreamError> {
        let mut buf = BytesMut::zeroed(count);
        let read = self.read(&mut buf, deadline)?;
        buf.truncate(read);
        Ok(buf.freeze())
    }

    /// Reads until the stream ends and returns everything read. The stream is
    /// closed afterwards.
    ///
    /// Running into [`StreamError::Closed`] is the expected way for this to end
    /// and is not reported; timeouts and I/O failures are.
    fn drain(&mut self, deadline: Deadline) -> Result<Bytes, StreamError> {
        let mut buffer = BytesMut::new();

        while !self.closed() {
            match self.read_up_to(DRAIN_CHUNK_SIZE, deadline) {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(StreamError::Closed) => break,
                Err(e) => return Err(e),
            }
        }

        trace!(len = buffer.len(), "drained input stream");
        self.close();
        Ok(buffer.freeze())
    }
}

pub trait OutputStream {
    fn closed(&self) -> bool;

    fn open(&mut self, _deadline: Deadline) -> Result<(), StreamError> {
        Ok(())
    }

    fn close(&mut self);

    /// Writes all of `bytes` or fails.
    fn write(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), StreamError>;

    fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError>;
}

/// A bidirectional stream such as a socket.
pub trait Stream: InputStream + OutputStream {}

impl<T: InputStream + OutputStream + ?Sized> Stream for T {}

impl<T: InputStream + ?Sized> InputStream for &mut T {
    fn closed(&self) -> bool {
        (**self).closed()
    }

    fn open(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        (**self).open(deadline)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn read(&mut self, into: &mut [u8], deadline: Deadline) -> Result<usize, StreamError> {
        (**self).read(into, deadline)
    }
}

impl<T: InputStream + ?Sized> InputStream for Box<T> {
    fn closed(&self) -> bool {
        (**self).closed()
    }

    fn open(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        (**self).open(deadline)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn read(&mut self, into: &mut [u8], deadline: Deadline) -> Result<usize, StreamError> {
        (**self).read(into, deadline)
    }
}

impl<T: OutputStream + ?Sized> OutputStream for &mut T {
    fn closed(&self) -> bool {
        (**self).closed()
    }

    fn open(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        (**self).open(deadline)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn write(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), StreamError> {
        (**self).write(bytes, deadline)
    }

    fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        (**self).flush(deadline)
    }
}

impl<T: OutputStream + ?Sized> OutputStream for Box<T> {
    fn closed(&self) -> bool {
        (**self).closed()
    }

    fn open(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        (**self).open(deadline)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn write(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), StreamError> {
        (**self).write(bytes, deadline)
    }

    fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        (**self).flush(deadline)
    }
}
