//! Message serialization onto an [`OutputStream`].
//!
//! The head is written by [`HeadEncoder`]. How the body follows depends on its
//! variant:
//!
//! - [`Body::Buffer`]: the bytes, verbatim.
//! - [`Body::Reader`]: read in pieces of at most `chunk_size` bytes until the
//!   reader closes or returns two empty reads in a row, each piece framed as a
//!   chunk, then the terminal chunk. A single empty read is skipped.
//! - [`Body::Writer`]: the callback gets a [`ChunkedWriter`] that frames every
//!   write as a chunk; the terminal chunk follows when it returns.
//!
//! Empty pieces are never framed because a zero-length chunk ends the body.
//! The message is flushed once it has been written completely.
//!
//! # Example
//!
//! ```
//! use h1_wire::codec::ResponseSerializer;
//! use h1_wire::protocol::{Body, Response, Status};
//! use h1_wire::stream::{Deadline, MemoryStream};
//!
//! let body = Body::reader(MemoryStream::from_chunks(["abc", "", "de"]));
//! let response = Response::new(Status::from_code(200)).with_header("Transfer-Encoding", "chunked").with_body(body);
//!
//! let mut serializer = ResponseSerializer::new(MemoryStream::new());
//! serializer.serialize(response, Deadline::never()).unwrap();
//!
//! let written = serializer.get_ref().written();
//! assert!(written.ends_with(b"\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n"));
//! ```

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::{trace, warn};

use crate::codec::chunked::{LAST_CHUNK, encode_chunk};
use crate::codec::head_encoder::HeadEncoder;
use crate::protocol::{Body, Request, Response, SendError, StreamError};
use crate::stream::{Deadline, InputStream, OutputStream};

/// Largest piece read from a [`Body::Reader`] at a time.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Writes responses onto a stream.
#[derive(Debug)]
pub struct ResponseSerializer<S> {
    inner: Serializer<S>,
}

impl<S: OutputStream> ResponseSerializer<S> {
    pub fn new(stream: S) -> Self {
        Self::with_chunk_size(stream, DEFAULT_CHUNK_SIZE)
    }

    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn with_chunk_size(stream: S, chunk_size: usize) -> Self {
        Self { inner: Serializer::new(stream, chunk_size) }
    }

    /// Writes `response` and flushes the stream.
    ///
    /// # Errors
    ///
    /// Fails with the first stream error, including a
    /// [timeout](StreamError::Timeout) once `deadline` passes. The stream may
    /// then hold a partial message and should be closed.
    pub fn serialize(&mut self, response: Response, deadline: Deadline) -> Result<(), SendError> {
        self.inner.buffer.clear();
        HeadEncoder.encode(&response, &mut self.inner.buffer)?;
        trace!(status = response.status().code(), head_bytes = self.inner.buffer.len(), "serialize response");
        self.inner.write_message(response.into_body(), deadline)
    }

    pub fn get_ref(&self) -> &S {
        &self.inner.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner.stream
    }

    pub fn into_inner(self) -> S {
        self.inner.stream
    }
}

/// Writes requests onto a stream.
#[derive(Debug)]
pub struct RequestSerializer<S> {
    inner: Serializer<S>,
}

impl<S: OutputStream> RequestSerializer<S> {
    pub fn new(stream: S) -> Self {
        Self::with_chunk_size(stream, DEFAULT_CHUNK_SIZE)
    }

    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn with_chunk_size(stream: S, chunk_size: usize) -> Self {
        Self { inner: Serializer::new(stream, chunk_size) }
    }

    /// Writes `request` and flushes the stream.
    pub fn serialize(&mut self, request: Request, deadline: Deadline) -> Result<(), SendError> {
        self.inner.buffer.clear();
        HeadEncoder.encode(&request, &mut self.inner.buffer)?;
        trace!(method = %request.method(), head_bytes = self.inner.buffer.len(), "serialize request");
        self.inner.write_message(request.into_body(), deadline)
    }

    pub fn get_ref(&self) -> &S {
        &self.inner.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner.stream
    }

    pub fn into_inner(self) -> S {
        self.inner.stream
    }
}

/// State shared by both serializers: the stream and a scratch buffer that
/// holds the encoded head and then each chunk frame in turn.
#[derive(Debug)]
struct Serializer<S> {
    stream: S,
    chunk_size: usize,
    buffer: BytesMut,
}

impl<S: OutputStream> Serializer<S> {
    fn new(stream: S, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { stream, chunk_size, buffer: BytesMut::new() }
    }

    /// Writes the head sitting in `buffer`, then `body`, then flushes.
    fn write_message(&mut self, body: Body, deadline: Deadline) -> Result<(), SendError> {
        match body {
            Body::Buffer(bytes) => {
                if bytes.len() <= self.chunk_size {
                    // small bodies go out in the same write as the head
                    self.buffer.extend_from_slice(&bytes);
                    self.stream.write(&self.buffer, deadline)?;
                } else {
                    self.stream.write(&self.buffer, deadline)?;
                    self.stream.write(&bytes, deadline)?;
                }
            }
            Body::Reader(mut reader) => {
                self.stream.write(&self.buffer, deadline)?;

                let mut chunks = 0_usize;
                let mut empty_reads = 0_usize;
                while !reader.closed() {
                    if deadline.is_elapsed() {
                        return Err(StreamError::Timeout.into());
                    }
                    let chunk = match reader.read_up_to(self.chunk_size, deadline) {
                        Ok(chunk) => chunk,
                        Err(StreamError::Closed) => break,
                        Err(e) => return Err(e.into()),
                    };
                    if chunk.is_empty() {
                        // a lone empty read is skipped, a second one in a row ends the body
                        empty_reads += 1;
                        if empty_reads > 1 {
                            break;
                        }
                        warn!(chunks, "body reader returned an empty read");
                        continue;
                    }
                    empty_reads = 0;

                    self.buffer.clear();
                    encode_chunk(&chunk, &mut self.buffer)?;
                    self.stream.write(&self.buffer, deadline)?;
                    chunks += 1;
                }
                reader.close();

                trace!(chunks, "body reader finished");
                self.stream.write(LAST_CHUNK, deadline)?;
            }
            Body::Writer(callback) => {
                self.stream.write(&self.buffer, deadline)?;

                let mut writer = ChunkedWriter::new(&mut self.stream);
                callback(&mut writer)?;
                trace!(chunks = writer.chunks, "body writer finished");

                self.stream.write(LAST_CHUNK, deadline)?;
            }
        }

        self.stream.flush(deadline)?;
        Ok(())
    }
}

/// The sink handed to a [`Body::Writer`] callback.
///
/// Each non-empty [`write`](OutputStream::write) goes out as one chunk frame.
/// Closing it only stops further writes; the terminal chunk is written by the
/// serializer after the callback returns.
#[derive(Debug)]
pub struct ChunkedWriter<'a, S: ?Sized> {
    stream: &'a mut S,
    buffer: BytesMut,
    chunks: usize,
    closed: bool,
}

impl<'a, S: OutputStream + ?Sized> ChunkedWriter<'a, S> {
    pub fn new(stream: &'a mut S) -> Self {
        Self { stream, buffer: BytesMut::new(), chunks: 0, closed: false }
    }

    /// How many chunk frames have been written.
    pub fn chunks(&self) -> usize {
        self.chunks
    }
}

impl<S: OutputStream + ?Sized> OutputStream for ChunkedWriter<'_, S> {
    fn closed(&self) -> bool {
        self.closed || self.stream.closed()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn write(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if bytes.is_empty() {
            return Ok(());
        }

        self.buffer.clear();
        encode_chunk(bytes, &mut self.buffer)?;
        self.stream.write(&self.buffer, deadline)?;
        self.chunks += 1;
        Ok(())
    }

    fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        self.stream.flush(deadline)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::codec::Parser;
    use crate::protocol::{Method, Status};
    use crate::stream::MemoryStream;
    use http::Uri;

    fn chunked_response(body: Body) -> Response {
        Response::new(Status::from_code(200)).with_header("Transfer-Encoding", "chunked").with_body(body)
    }

    #[test]
    fn buffer_body_is_written_verbatim() {
        let response = Response::new(Status::from_code(200)).with_header("Content-Length", "5").with_body("hello");

        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        serializer.serialize(response, Deadline::never()).unwrap();

        let stream = serializer.into_inner();
        assert_eq!(stream.written(), b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
        assert_eq!(stream.flush_count(), 1);
    }

    #[test]
    fn large_buffer_body() {
        let body = vec![b'x'; 10_000];
        let response = Response::new(Status::from_code(200)).with_body(body.clone());

        let mut serializer = ResponseSerializer::with_chunk_size(MemoryStream::new(), 16);
        serializer.serialize(response, Deadline::never()).unwrap();
        assert!(serializer.get_ref().written().ends_with(&body));
    }

    #[test]
    fn reader_body_skips_empty_reads() {
        let reader = MemoryStream::from_chunks(["abc", "", "de"]);

        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        serializer.serialize(chunked_response(Body::reader(reader)), Deadline::never()).unwrap();

        let written = serializer.get_ref().written();
        let head = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
        assert_eq!(&written[..head.len()], head);
        assert_eq!(&written[head.len()..], b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
    }

    /// Yields its chunks, then empty reads forever without ever closing.
    struct NeverClosing {
        chunks: Vec<&'static [u8]>,
    }

    impl InputStream for NeverClosing {
        fn closed(&self) -> bool {
            false
        }

        fn close(&mut self) {}

        fn read(&mut self, into: &mut [u8], _deadline: Deadline) -> Result<usize, StreamError> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            into[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn reader_body_ends_on_repeated_empty_reads() {
        let reader = NeverClosing { chunks: vec![&b"abc"[..]] };

        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        let deadline = Deadline::after(Duration::from_secs(5));
        serializer.serialize(chunked_response(Body::reader(reader)), deadline).unwrap();

        assert!(serializer.get_ref().written().ends_with(b"\r\n\r\n3\r\nabc\r\n0\r\n\r\n"));
    }

    #[test]
    fn reader_body_is_cut_into_chunk_size_pieces() {
        let reader = MemoryStream::from_chunks(["0123456789abcdefghij"]);

        let mut serializer = ResponseSerializer::with_chunk_size(MemoryStream::new(), 8);
        serializer.serialize(chunked_response(Body::reader(reader)), Deadline::never()).unwrap();

        assert!(serializer.get_ref().written().ends_with(b"8\r\n01234567\r\n8\r\n89abcdef\r\n4\r\nghij\r\n0\r\n\r\n"));
    }

    #[test]
    fn writer_body_frames_every_write() {
        let body = Body::writer(|out| {
            out.write(b"hello", Deadline::never())?;
            out.write(b"", Deadline::never())?;
            out.write(b" world, this is chunked", Deadline::never())?;
            Ok(())
        });

        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        serializer.serialize(chunked_response(body), Deadline::never()).unwrap();

        assert!(
            serializer
                .get_ref()
                .written()
                .ends_with(b"\r\n\r\n5\r\nhello\r\n17\r\n world, this is chunked\r\n0\r\n\r\n")
        );
    }

    #[test]
    fn writer_errors_abort_serialization() {
        let body = Body::writer(|out| {
            out.write(b"partial", Deadline::never())?;
            Err(StreamError::Closed)
        });

        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        let error = serializer.serialize(chunked_response(body), Deadline::never()).unwrap_err();
        assert!(error.as_stream_error().is_closed());
        assert!(!serializer.get_ref().written().ends_with(LAST_CHUNK));
    }

    #[test]
    fn closed_chunked_writer_rejects_writes() {
        let mut sink = MemoryStream::new();
        let mut writer = ChunkedWriter::new(&mut sink);
        writer.write(b"a", Deadline::never()).unwrap();
        writer.close();
        assert!(writer.write(b"b", Deadline::never()).unwrap_err().is_closed());
        assert_eq!(writer.chunks(), 1);
        assert_eq!(sink.written(), b"1\r\na\r\n");
    }

    #[test]
    fn elapsed_deadline_times_out() {
        let response = Response::new(Status::from_code(200)).with_body("late");

        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        let error = serializer.serialize(response, Deadline::now()).unwrap_err();
        assert!(error.is_timeout());
        assert!(serializer.get_ref().written().is_empty());

        let reader = MemoryStream::from_chunks(["never read"]);
        let mut serializer = ResponseSerializer::new(MemoryStream::new());
        let deadline = Deadline::after(Duration::from_millis(0));
        let error = serializer.serialize(chunked_response(Body::reader(reader)), deadline).unwrap_err();
        assert!(error.is_timeout());
    }

    #[test]
    fn chunked_output_parses_back() {
        let reader = MemoryStream::from_chunks(["first piece, ", "", "second piece, ", "third"]);

        let mut serializer = ResponseSerializer::with_chunk_size(MemoryStream::new(), 5);
        serializer.serialize(chunked_response(Body::reader(reader)), Deadline::never()).unwrap();
        let written = serializer.into_inner().take_written();

        let mut parser = Parser::response();
        let messages = parser.parse(&written).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0].body().as_bytes().unwrap()[..], b"first piece, second piece, third");
    }

    #[test]
    fn request_round_trip() {
        let body = Body::writer(|out| {
            for part in ["a", "bc", "def"] {
                out.write(part.as_bytes(), Deadline::never())?;
            }
            out.flush(Deadline::never())
        });
        let request = Request::new(Method::Post, Uri::from_static("/upload?x=1"))
            .with_header("Host", "localhost")
            .with_header("Transfer-Encoding", "chunked")
            .with_body(body);

        let mut serializer = RequestSerializer::new(MemoryStream::new());
        serializer.serialize(request, Deadline::never()).unwrap();
        let mut stream = serializer.into_inner();
        assert_eq!(stream.flush_count(), 2);

        let mut parser = Parser::request();
        let messages = parser.parse(&stream.take_written()).unwrap();
        let request = messages[0].as_request().unwrap();
        assert_eq!(request.method(), &Method::Post);
        assert_eq!(request.url().query(), Some("x=1"));
        assert_eq!(&request.body().as_bytes().unwrap()[..], b"abcdef");
    }
}
