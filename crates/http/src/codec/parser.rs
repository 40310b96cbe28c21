//! Incremental HTTP/1.x message parser.
//!
//! [`Parser`] accepts input in whatever pieces the network delivers it and hands
//! out complete [`Message`]s. It sits on top of the scanner and folds the token
//! events into a per-message context:
//!
//! - bytes of the token in progress are accumulated in a buffer
//! - when an event of a *different* kind arrives, the buffered token is committed
//!   to the context (URL parsed, header merged, body appended) and the buffer is
//!   cleared
//! - on message completion the context is turned into a [`Request`] or
//!   [`Response`], queued, and reset
//!
//! Queued messages are delivered in order before and after every
//! [`feed`](Parser::feed), so a handler error never loses a message.
//!
//! The parser also implements [`Decoder`], which lets it drive a
//! `tokio_util::codec::FramedRead`.
//!
//! # Example
//!
//! ```
//! use h1_wire::codec::Parser;
//!
//! let mut parser = Parser::request();
//! assert!(parser.parse(b"GET /a HTTP/1.1\r\nHo").unwrap().is_empty());
//!
//! let messages = parser.parse(b"st: x\r\n\r\n").unwrap();
//! let request = messages[0].as_request().unwrap();
//! assert_eq!(request.url().path(), "/a");
//! assert_eq!(request.headers().get("host"), Some("x"));
//! ```

use std::collections::VecDeque;

use bytes::BytesMut;
use http::Uri;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::scanner::{Event, EventSink, MessageHead, Mode, ScanError, Scanner};
use crate::protocol::headers::SET_COOKIE;
use crate::protocol::{Body, CookieHeaders, Headers, Message, Method, ParseError, Request, Response, Status, Version};

/// Upper bound on the size of a message's start line and header section.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Upper bound on the number of header lines in a message.
pub const DEFAULT_MAX_HEADERS: usize = 64;

/// Limits applied while scanning the head of each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub max_header_bytes: usize,
    pub max_headers: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_header_bytes: DEFAULT_MAX_HEADER_BYTES, max_headers: DEFAULT_MAX_HEADERS }
    }
}

/// The kind of token the parser is currently accumulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    MessageBegin,
    Url,
    Status,
    HeaderField,
    HeaderValue,
    HeadersComplete,
    Body,
    MessageComplete,
}

/// Everything known about the message in progress.
#[derive(Debug, Default)]
struct Context {
    method: Option<Method>,
    status: Option<Status>,
    version: Version,
    url: Option<Uri>,
    headers: Headers,
    /// name of the header whose value comes next
    field: Option<String>,
    body: BytesMut,
    /// raw `Set-Cookie` values of a response, split after completion
    cookies: Vec<String>,
}

/// Folds scanner events into messages.
#[derive(Debug)]
struct Collector {
    mode: Mode,
    state: State,
    buffer: BytesMut,
    context: Context,
    ready: VecDeque<Message>,
}

impl Collector {
    fn new(mode: Mode) -> Self {
        Self { mode, state: State::None, buffer: BytesMut::new(), context: Context::default(), ready: VecDeque::new() }
    }

    /// Moves the accumulated bytes of the held state into the context.
    fn commit(&mut self, head: &MessageHead) -> Result<(), ParseError> {
        match self.state {
            State::Url => {
                let url = Uri::try_from(&self.buffer[..]).map_err(ParseError::invalid_uri)?;
                self.context.url = Some(url);
            }
            State::Status => {
                let reason = String::from_utf8_lossy(&self.buffer).into_owned();
                self.context.status = Some(Status::new(head.status_code, reason));
            }
            State::HeaderField => {
                let name = std::str::from_utf8(&self.buffer).map_err(ParseError::invalid_header)?;
                self.context.field = Some(name.to_owned());
            }
            State::HeaderValue => {
                let value = std::str::from_utf8(&self.buffer).map_err(ParseError::invalid_header)?;
                let value = value.trim_end_matches([' ', '\t']);
                let name = self.context.field.take().ok_or_else(|| ParseError::invalid_header("header value without a name"))?;

                if self.mode == Mode::Response && name.eq_ignore_ascii_case(SET_COOKIE) {
                    self.context.cookies.push(value.to_owned());
                } else {
                    self.context.headers.append(name, value);
                }
            }
            State::Body => {
                let chunk = self.buffer.split();
                self.context.body.unsplit(chunk);
            }
            State::None | State::MessageBegin | State::HeadersComplete | State::MessageComplete => {}
        }

        self.buffer.clear();
        Ok(())
    }

    fn complete(&mut self) -> Result<(), ParseError> {
        let context = std::mem::take(&mut self.context);
        let body = Body::Buffer(context.body.freeze());

        let message = match self.mode {
            Mode::Request => {
                let method = context.method.ok_or_else(|| ParseError::invalid_header("request without a method"))?;
                let url = context.url.ok_or_else(|| ParseError::invalid_uri("request without a target"))?;
                Message::Request(Request::from_parts(method, url, context.version, context.headers, body))
            }
            Mode::Response => {
                let status = context.status.ok_or_else(|| ParseError::invalid_header("response without a status"))?;
                let mut cookie_headers = CookieHeaders::new();
                for raw in &context.cookies {
                    cookie_headers.insert_raw(raw);
                }
                Message::Response(Response::from_parts(context.version, status, context.headers, cookie_headers, body))
            }
        };

        trace!(queued = self.ready.len() + 1, "message complete");
        self.ready.push_back(message);
        Ok(())
    }
}

impl EventSink for Collector {
    fn on_event(&mut self, head: &MessageHead, event: Event<'_>) -> Result<(), ParseError> {
        let (state, data) = match event {
            Event::MessageBegin => (State::MessageBegin, None),
            Event::Url(data) => (State::Url, Some(data)),
            Event::Status(data) => (State::Status, Some(data)),
            Event::HeaderField(data) => (State::HeaderField, Some(data)),
            Event::HeaderValue(data) => (State::HeaderValue, Some(data)),
            Event::HeadersComplete => (State::HeadersComplete, None),
            Event::Body(data) => (State::Body, Some(data)),
            Event::MessageComplete => (State::MessageComplete, None),
        };

        if state != self.state {
            self.commit(head)?;
            self.state = state;
        }

        if let Some(data) = data {
            self.buffer.extend_from_slice(data);
        }

        match state {
            State::HeadersComplete => {
                self.context.field = None;
                self.context.method = head.method.clone();
                self.context.version = head.version;
            }
            State::MessageComplete => self.complete()?,
            _ => {}
        }

        Ok(())
    }
}

/// Incremental HTTP/1.x parser for one direction of one connection.
#[derive(Debug)]
pub struct Parser {
    scanner: Scanner,
    collector: Collector,
}

impl Parser {
    /// Creates a parser for requests, as read by a server.
    pub fn request() -> Self {
        Self::with_config(Mode::Request, ParserConfig::default())
    }

    /// Creates a parser for responses, as read by a client.
    pub fn response() -> Self {
        Self::with_config(Mode::Response, ParserConfig::default())
    }

    pub fn with_config(mode: Mode, config: ParserConfig) -> Self {
        Self { scanner: Scanner::new(mode, config), collector: Collector::new(mode) }
    }

    pub fn mode(&self) -> Mode {
        self.scanner.mode()
    }

    /// Whether the parser sits between messages with nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.scanner.is_idle() && self.collector.ready.is_empty()
    }

    /// Feeds the next piece of input, passing every completed message to `handler`.
    ///
    /// Messages still queued from an earlier call are delivered first. If
    /// `handler` fails, the error is returned and undelivered messages stay
    /// queued for the next call.
    ///
    /// # Errors
    ///
    /// Malformed input fails with [`ParseError::Protocol`] once the messages
    /// completed before the bad byte have been delivered. The parser must then
    /// be [reset](Parser::reset).
    pub fn feed<F, E>(&mut self, data: &[u8], mut handler: F) -> Result<(), E>
    where
        F: FnMut(Message) -> Result<(), E>,
        E: From<ParseError>,
    {
        self.drain(&mut handler)?;

        let consumed = self.scanner.execute(data, &mut self.collector)?;
        trace!(consumed, submitted = data.len(), "scanned input");

        self.drain(&mut handler)?;

        if consumed != data.len() {
            return Err(self.mismatch(consumed, data.len()).into());
        }
        Ok(())
    }

    /// Feeds `data` and returns the messages it completed.
    pub fn parse(&mut self, data: &[u8]) -> Result<Vec<Message>, ParseError> {
        let mut messages = Vec::new();
        self.feed(data, |message| {
            messages.push(message);
            Ok::<_, ParseError>(())
        })?;
        Ok(messages)
    }

    /// Signals that the peer closed its side of the connection.
    ///
    /// A response whose body runs until the connection closes is completed and
    /// delivered.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError::IncompleteMessage`] when the input stopped in the
    /// middle of a message.
    pub fn finish<F, E>(&mut self, mut handler: F) -> Result<(), E>
    where
        F: FnMut(Message) -> Result<(), E>,
        E: From<ParseError>,
    {
        self.drain(&mut handler)?;
        self.scanner.finish(&mut self.collector)?;
        self.drain(&mut handler)
    }

    /// Discards all state, including queued messages, so the parser can be used
    /// again after a failure.
    pub fn reset(&mut self) {
        debug!(dropped = self.collector.ready.len(), "reset parser");
        self.scanner.reset();
        self.collector = Collector::new(self.collector.mode);
    }

    fn drain<F, E>(&mut self, handler: &mut F) -> Result<(), E>
    where
        F: FnMut(Message) -> Result<(), E>,
    {
        while let Some(message) = self.collector.ready.pop_front() {
            handler(message)?;
        }
        Ok(())
    }

    fn mismatch(&self, consumed: usize, submitted: usize) -> ParseError {
        let code = self.scanner.error().unwrap_or(ScanError::Aborted);
        ParseError::protocol(code, consumed, submitted)
    }
}

impl Decoder for Parser {
    type Item = Message;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.collector.ready.pop_front() {
            return Ok(Some(message));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // everything handed to the scanner is consumed or rejected, nothing stays in `src`
        let data = src.split();
        let consumed = self.scanner.execute(&data, &mut self.collector)?;
        if consumed != data.len() {
            return Err(self.mismatch(consumed, data.len()));
        }

        Ok(self.collector.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }

        self.scanner.finish(&mut self.collector)?;
        Ok(self.collector.ready.pop_front())
    }
}
