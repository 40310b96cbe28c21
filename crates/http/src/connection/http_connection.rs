use std::error::Error;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::codec::{DEFAULT_CHUNK_SIZE, Mode, Parser, ParserConfig, ResponseSerializer};
use crate::handler::Handler;
use crate::protocol::{Body, HttpError, Message, Method, ParseError, Response, Status, StreamError};
use crate::stream::{Deadline, InputStream, OutputStream, Stream};

/// Tunables for a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Largest read from the stream at a time
    pub read_buffer_size: usize,
    /// How long to wait for the next piece of a request, or for the next request
    pub read_timeout: Duration,
    /// Budget for writing one complete response
    pub write_timeout: Duration,
    /// Chunk size for streamed response bodies
    pub chunk_size: usize,
    pub parser: ParserConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 8 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parser: ParserConfig::default(),
        }
    }
}

/// A server side HTTP/1.x connection.
///
/// `HttpConnection` owns the stream and runs the whole exchange on the calling
/// thread:
/// - reads bytes with a deadline and feeds them to the request parser
/// - passes every complete request to the handler, in arrival order
/// - writes the response, filling in framing headers the handler left out
/// - keeps going until a request asks to close or the peer goes away
#[derive(Debug)]
pub struct HttpConnection<S> {
    stream: S,
    parser: Parser,
    config: ConnectionConfig,
}

impl<S: Stream> HttpConnection<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, ConnectionConfig::default())
    }

    pub fn with_config(stream: S, config: ConnectionConfig) -> Self {
        Self { stream, parser: Parser::with_config(Mode::Request, config.parser), config }
    }

    pub fn process<H: Handler>(mut self, handler: &H) -> Result<(), HttpError> {
        let mut requests = Vec::new();

        loop {
            let deadline = Deadline::after(self.config.read_timeout);
            let chunk = match self.stream.read_up_to(self.config.read_buffer_size, deadline) {
                Ok(chunk) => chunk,
                Err(StreamError::Closed) => return self.finish(),
                Err(StreamError::Timeout) if self.parser.is_idle() => {
                    info!("connection idle for too long, shutdown");
                    self.shutdown();
                    return Ok(());
                }
                Err(e) => {
                    error!(cause = %e, "can't read next request");
                    return Err(e.into());
                }
            };
            trace!(len = chunk.len(), "read from connection");

            let parsed = self.parser.feed(&chunk, |message| {
                requests.push(message);
                Ok::<_, ParseError>(())
            });

            for message in requests.drain(..) {
                if !self.do_process(message, handler)? {
                    debug!("request asked to close the connection");
                    self.shutdown();
                    return Ok(());
                }
            }

            if let Err(e) = parsed {
                error!(cause = %e, code = ?e.scan_error(), "can't parse next request");
                self.send_error(400)?;
                self.shutdown();
                return Err(e.into());
            }
        }
    }

    /// Answers one request, returning whether the connection stays open.
    fn do_process<H: Handler>(&mut self, message: Message, handler: &H) -> Result<bool, HttpError> {
        let Some(request) = message.into_request() else {
            return Err(ParseError::invalid_body("expected a request").into());
        };

        let version = request.version();
        let head_only = *request.method() == Method::Head;
        let mut keep_alive = request.keep_alive();
        debug!(method = %request.method(), path = request.url().path(), %version, keep_alive, "receive request");

        let mut response = match handler.call(request) {
            Ok(response) => response,
            Err(e) => {
                let cause: Box<dyn Error + Send + Sync> = e.into();
                error!(%cause, "handle request error");
                error_response(500)
            }
        };

        keep_alive = keep_alive && !response.headers().has_token("Connection", "close");
        prepare_framing(&mut response, head_only);
        if head_only || response.status().forbids_body() {
            // the framing headers stay, the payload must not reach the wire
            *response.body_mut() = Body::empty();
        }
        if !keep_alive {
            response.headers_mut().insert("Connection", "close");
        } else if !version.keep_alive_by_default() {
            response.headers_mut().insert("Connection", "keep-alive");
        }

        self.send_response(response)?;
        Ok(keep_alive)
    }

    fn send_response(&mut self, response: Response) -> Result<(), HttpError> {
        let deadline = Deadline::after(self.config.write_timeout);
        let mut serializer = ResponseSerializer::with_chunk_size(&mut self.stream, self.config.chunk_size);
        serializer.serialize(response, deadline)?;
        Ok(())
    }

    fn send_error(&mut self, code: u16) -> Result<(), HttpError> {
        let mut response = error_response(code);
        response.headers_mut().insert("Connection", "close");
        self.send_response(response)
    }

    /// The peer closed its side.
    fn finish(mut self) -> Result<(), HttpError> {
        let result = self.parser.finish(|_| Err(ParseError::invalid_body("request completed after the peer closed")));
        self.shutdown();
        match result {
            Ok(()) => {
                info!("can't read more request, break this connection down");
                Ok(())
            }
            Err(e) => {
                warn!(cause = %e, "peer closed in the middle of a request");
                Err(e.into())
            }
        }
    }

    fn shutdown(&mut self) {
        OutputStream::close(&mut self.stream);
        InputStream::close(&mut self.stream);
    }
}

/// Sets `Content-Length` or `Transfer-Encoding` when the handler did not.
fn prepare_framing(response: &mut Response, head_only: bool) {
    if response.status().forbids_body() {
        return;
    }

    let headers = response.headers();
    if headers.contains("Content-Length") || headers.contains("Transfer-Encoding") {
        return;
    }

    let body = response.body();
    if body.is_chunked() {
        response.headers_mut().insert("Transfer-Encoding", "chunked");
        return;
    }

    let length = body.as_bytes().map_or(0, |bytes| bytes.len());
    // empty HEAD answers carry no length
    if head_only && length == 0 {
        return;
    }
    response.headers_mut().insert("Content-Length", length.to_string());
}

fn error_response(code: u16) -> Response {
    Response::new(Status::from_code(code)).with_header("Content-Length", "0")
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::io;

    use indoc::indoc;

    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::Request;
    use crate::stream::MemoryStream;

    fn echo(request: Request) -> Result<Response, Infallible> {
        let body = format!("{} {}", request.method(), request.url().path());
        Ok(Response::new(Status::from_code(200)).with_body(body))
    }

    fn responses(written: &[u8]) -> Vec<Response> {
        let mut parser = Parser::response();
        let mut messages = parser.parse(written).unwrap();
        let mut tail = Vec::new();
        parser
            .finish(|message| {
                tail.push(message);
                Ok::<_, ParseError>(())
            })
            .unwrap();
        messages.extend(tail);
        messages.into_iter().map(|m| m.into_response().unwrap()).collect()
    }

    fn body_text(response: &Response) -> &str {
        std::str::from_utf8(response.body().as_bytes().unwrap()).unwrap()
    }

    #[test]
    fn serves_pipelined_requests() {
        let mut stream = MemoryStream::from_chunks([indoc! {"
        GET /a HTTP/1.1
        Host: localhost

        POST /b HTTP/1.1
        Content-Length: 4

        "}]);
        stream.push_input("data");

        HttpConnection::new(&mut stream).process(&make_handler(echo)).unwrap();

        let responses = responses(stream.written());
        assert_eq!(responses.len(), 2);
        assert_eq!(body_text(&responses[0]), "GET /a");
        assert_eq!(responses[0].headers().get("content-length"), Some("6"));
        assert_eq!(body_text(&responses[1]), "POST /b");
    }

    #[test]
    fn request_split_across_reads() {
        let mut stream = MemoryStream::from_chunks([
            "PUT /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhel",
            "lo\r\n6\r\n world\r\n",
            "0\r\n\r\n",
        ]);

        let handler = make_handler(|request: Request| {
            let body = request.into_body().into_bytes().unwrap_or_default();
            Ok::<_, Infallible>(Response::new(Status::from_code(200)).with_body(body))
        });
        HttpConnection::new(&mut stream).process(&handler).unwrap();

        let responses = responses(stream.written());
        assert_eq!(body_text(&responses[0]), "hello world");
    }

    #[test]
    fn connection_close_stops_processing() {
        let mut stream = MemoryStream::from_chunks([
            "GET /first HTTP/1.1\r\nConnection: close\r\n\r\nGET /second HTTP/1.1\r\n\r\n",
        ]);

        HttpConnection::new(&mut stream).process(&make_handler(echo)).unwrap();

        let responses = responses(stream.written());
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].headers().get("connection"), Some("close"));
        assert!(OutputStream::closed(&stream));
    }

    #[test]
    fn http10_closes_unless_keep_alive() {
        let mut stream = MemoryStream::from_chunks([
            "GET /a HTTP/1.0\r\nConnection: keep-alive\r\n\r\nGET /b HTTP/1.0\r\n\r\nGET /c HTTP/1.0\r\n\r\n",
        ]);

        HttpConnection::new(&mut stream).process(&make_handler(echo)).unwrap();

        let responses = responses(stream.written());
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].headers().get("connection"), Some("keep-alive"));
        assert_eq!(responses[1].headers().get("connection"), Some("close"));
    }

    #[test]
    fn malformed_request_gets_bad_request() {
        let mut stream = MemoryStream::from_chunks(["GET / HTTP/1.1\r\n\r\nBROKEN(\r\n\r\n"]);

        let result = HttpConnection::new(&mut stream).process(&make_handler(echo));
        assert!(matches!(result, Err(HttpError::RequestError { .. })));

        let responses = responses(stream.written());
        let codes: Vec<_> = responses.iter().map(|r| r.status().code()).collect();
        assert_eq!(codes, [200, 400]);
    }

    #[test]
    fn handler_error_becomes_internal_server_error() {
        let mut stream = MemoryStream::from_chunks(["GET /fail HTTP/1.1\r\n\r\nGET /ok HTTP/1.1\r\n\r\n"]);

        let handler = make_handler(|request: Request| {
            if request.url().path() == "/fail" {
                return Err(io::Error::other("boom"));
            }
            Ok(Response::new(Status::from_code(204)))
        });
        HttpConnection::new(&mut stream).process(&handler).unwrap();

        let responses = responses(stream.written());
        let codes: Vec<_> = responses.iter().map(|r| r.status().code()).collect();
        assert_eq!(codes, [500, 204]);
        assert!(!responses[1].headers().contains("content-length"));
    }

    #[test]
    fn bodiless_responses_drop_the_payload() {
        let mut stream = MemoryStream::from_chunks([
            "GET /a HTTP/1.1\r\n\r\nHEAD /b HTTP/1.1\r\n\r\nGET /c HTTP/1.1\r\n\r\n",
        ]);

        let handler = make_handler(|request: Request| {
            let code = if request.url().path() == "/a" { 204 } else { 200 };
            Ok::<_, Infallible>(Response::new(Status::from_code(code)).with_body("oops"))
        });
        HttpConnection::new(&mut stream).process(&handler).unwrap();

        let expected = concat!(
            "HTTP/1.1 204 No Content\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\noops",
        );
        assert_eq!(std::str::from_utf8(stream.written()).unwrap(), expected);
    }

    #[test]
    fn streamed_body_is_sent_chunked() {
        let mut stream = MemoryStream::from_chunks(["GET /stream HTTP/1.1\r\n\r\n"]);

        let handler = make_handler(|_request: Request| {
            let body = Body::writer(|out| {
                out.write(b"one,", Deadline::never())?;
                out.write(b"two", Deadline::never())
            });
            Ok::<_, Infallible>(Response::new(Status::from_code(200)).with_body(body))
        });
        HttpConnection::with_config(&mut stream, ConnectionConfig { chunk_size: 2, ..Default::default() })
            .process(&handler)
            .unwrap();

        assert!(stream.written().ends_with(b"4\r\none,\r\n3\r\ntwo\r\n0\r\n\r\n"));
        let responses = responses(stream.written());
        assert_eq!(responses[0].headers().get("transfer-encoding"), Some("chunked"));
        assert_eq!(body_text(&responses[0]), "one,two");
    }

    #[test]
    fn peer_closing_mid_request_is_an_error() {
        let mut stream = MemoryStream::from_chunks(["POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc"]);

        let result = HttpConnection::new(&mut stream).process(&make_handler(echo));
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::IncompleteMessage })));
        assert!(stream.written().is_empty());
    }
}
