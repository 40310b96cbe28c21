use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::protocol::StreamError;
use crate::stream::{Deadline, InputStream, OutputStream};

/// Blocking TCP stream whose deadlines become socket read/write timeouts.
///
/// A read returning zero bytes means the peer shut down its side; it is
/// reported as [`StreamError::Closed`] and the input side stays closed.
#[derive(Debug)]
pub struct TcpStream {
    inner: std::net::TcpStream,
    read_closed: bool,
    write_closed: bool,
}

impl TcpStream {
    pub fn from_std(inner: std::net::TcpStream) -> Self {
        Self { inner, read_closed: false, write_closed: false }
    }

    /// Connects to the first address `addr` resolves to.
    pub fn connect<A: ToSocketAddrs>(addr: A, deadline: Deadline) -> Result<Self, StreamError> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| StreamError::io(io::Error::new(ErrorKind::InvalidInput, "address resolved to nothing")))?;

        let inner = match timeout_for(deadline)? {
            Some(timeout) => std::net::TcpStream::connect_timeout(&addr, timeout).map_err(map_io_error)?,
            None => std::net::TcpStream::connect(addr).map_err(map_io_error)?,
        };
        debug!(%addr, "tcp stream connected");
        Ok(Self::from_std(inner))
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, StreamError> {
        Ok(self.inner.peer_addr()?)
    }

    pub fn get_ref(&self) -> &std::net::TcpStream {
        &self.inner
    }
}

/// `None` means block without limit.
fn timeout_for(deadline: Deadline) -> Result<Option<Duration>, StreamError> {
    match deadline.remaining() {
        None => Ok(None),
        Some(left) if left.is_zero() => Err(StreamError::Timeout),
        Some(left) => Ok(Some(left)),
    }
}

fn map_io_error(e: io::Error) -> StreamError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => StreamError::Timeout,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
            StreamError::Closed
        }
        _ => StreamError::io(e),
    }
}

impl InputStream for TcpStream {
    fn closed(&self) -> bool {
        self.read_closed
    }

    fn close(&mut self) {
        if !self.read_closed {
            self.read_closed = true;
            // the peer may already be gone, nothing to report
            let _ = self.inner.shutdown(Shutdown::Read);
        }
    }

    fn read(&mut self, into: &mut [u8], deadline: Deadline) -> Result<usize, StreamError> {
        if self.read_closed {
            return Err(StreamError::Closed);
        }
        if into.is_empty() {
            return Ok(0);
        }

        self.inner.set_read_timeout(timeout_for(deadline)?)?;
        loop {
            match self.inner.read(into) {
                Ok(0) => {
                    trace!("peer closed tcp stream");
                    self.read_closed = true;
                    return Err(StreamError::Closed);
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io_error(e)),
            }
        }
    }
}

impl OutputStream for TcpStream {
    fn closed(&self) -> bool {
        self.write_closed
    }

    fn close(&mut self) {
        if !self.write_closed {
            self.write_closed = true;
            let _ = self.inner.shutdown(Shutdown::Write);
        }
    }

    fn write(&mut self, mut bytes: &[u8], deadline: Deadline) -> Result<(), StreamError> {
        if self.write_closed {
            return Err(StreamError::Closed);
        }

        while !bytes.is_empty() {
            self.inner.set_write_timeout(timeout_for(deadline)?)?;
            match self.inner.write(bytes) {
                Ok(0) => {
                    self.write_closed = true;
                    return Err(StreamError::Closed);
                }
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io_error(e)),
            }
        }
        Ok(())
    }

    fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        if deadline.is_elapsed() {
            return Err(StreamError::Timeout);
        }
        self.inner.flush().map_err(map_io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let mut stream = TcpStream::from_std(socket);
            let deadline = Deadline::after(Duration::from_secs(5));
            let received = stream.drain(deadline).unwrap();
            assert_eq!(&received[..], b"ping");
        });

        let mut client = TcpStream::connect(addr, Deadline::after(Duration::from_secs(5))).unwrap();
        client.write(b"ping", Deadline::after(Duration::from_secs(5))).unwrap();
        OutputStream::close(&mut client);

        server.join().unwrap();
    }

    #[test]
    fn elapsed_deadline_times_out_without_blocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr, Deadline::after(Duration::from_secs(5))).unwrap();
        let _accepted = listener.accept().unwrap();

        let mut buf = [0u8; 8];
        assert!(client.read(&mut buf, Deadline::now()).unwrap_err().is_timeout());
        assert!(client.read(&mut buf, Deadline::after(Duration::from_millis(20))).unwrap_err().is_timeout());
    }
}
