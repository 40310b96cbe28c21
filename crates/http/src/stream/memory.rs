use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::protocol::StreamError;
use crate::stream::{Deadline, InputStream, OutputStream};

/// An in-memory stream.
///
/// Input is a queue of chunks and every [`read`](InputStream::read) returns at
/// most one of them, so the chunk boundaries a test sets up are the boundaries
/// the reader observes. An empty chunk reads as `Ok(0)`. Once the queue is empty
/// the input side reports closed.
///
/// Output is captured into a single buffer.
#[derive(Debug, Default)]
pub struct MemoryStream {
    input: VecDeque<Bytes>,
    input_closed: bool,
    output: BytesMut,
    output_closed: bool,
    flushes: usize,
}

impl MemoryStream {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self { input: chunks.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn push_input<B: Into<Bytes>>(&mut self, chunk: B) {
        self.input.push_back(chunk.into());
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.output
    }

    pub fn take_written(&mut self) -> Bytes {
        self.output.split().freeze()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl InputStream for MemoryStream {
    fn closed(&self) -> bool {
        self.input_closed || self.input.is_empty()
    }

    fn close(&mut self) {
        self.input_closed = true;
        self.input.clear();
    }

    fn read(&mut self, into: &mut [u8], deadline: Deadline) -> Result<usize, StreamError> {
        if deadline.is_elapsed() {
            return Err(StreamError::Timeout);
        }

        let Some(mut chunk) = self.input.pop_front() else {
            return Err(StreamError::Closed);
        };

        let len = chunk.len().min(into.len());
        into[..len].copy_from_slice(&chunk[..len]);

        if len < chunk.len() {
            let rest = chunk.split_off(len);
            self.input.push_front(rest);
        }

        Ok(len)
    }
}

impl OutputStream for MemoryStream {
    fn closed(&self) -> bool {
        self.output_closed
    }

    fn close(&mut self) {
        self.output_closed = true;
    }

    fn write(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), StreamError> {
        if deadline.is_elapsed() {
            return Err(StreamError::Timeout);
        }
        if self.output_closed {
            return Err(StreamError::Closed);
        }
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        if deadline.is_elapsed() {
            return Err(StreamError::Timeout);
        }
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_preserve_chunk_boundaries() {
        let mut stream = MemoryStream::from_chunks(["abc", "", "defgh"]);

        assert_eq!(&stream.read_up_to(16, Deadline::never()).unwrap()[..], b"abc");
        assert!(stream.read_up_to(16, Deadline::never()).unwrap().is_empty());
        assert_eq!(&stream.read_up_to(3, Deadline::never()).unwrap()[..], b"def");
        assert!(!InputStream::closed(&stream));
        assert_eq!(&stream.read_up_to(16, Deadline::never()).unwrap()[..], b"gh");
        assert!(InputStream::closed(&stream));
        assert!(stream.read_up_to(16, Deadline::never()).unwrap_err().is_closed());
    }

    #[test]
    fn drain_treats_close_as_end_of_input() {
        let mut stream = MemoryStream::from_chunks(["hello ", "world"]);
        let drained = stream.drain(Deadline::never()).unwrap();
        assert_eq!(&drained[..], b"hello world");
        assert!(InputStream::closed(&stream));
    }

    #[test]
    fn drain_reports_timeouts() {
        let mut stream = MemoryStream::from_chunks(["data"]);
        assert!(stream.drain(Deadline::now()).unwrap_err().is_timeout());
    }

    #[test]
    fn elapsed_deadline_fails_writes() {
        let mut stream = MemoryStream::new();
        stream.write(b"ok", Deadline::never()).unwrap();
        assert!(stream.write(b"late", Deadline::now()).unwrap_err().is_timeout());
        assert_eq!(stream.written(), b"ok");

        OutputStream::close(&mut stream);
        assert!(stream.write(b"closed", Deadline::never()).unwrap_err().is_closed());
    }
}
