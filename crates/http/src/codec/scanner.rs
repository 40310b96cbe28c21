//! Byte-level HTTP/1.x tokenizer.
//!
//! The [`Scanner`] walks its input one state transition at a time and reports
//! token boundaries to an [`EventSink`] in message order:
//!
//! ```text
//! MessageBegin, Url | Status, (HeaderField, HeaderValue)*, HeadersComplete, Body*, MessageComplete
//! ```
//!
//! Token events carry slices of the input. When the input ends inside a token
//! the scanner reports what it has and carries on with the same token on the
//! next call, so one logical token may arrive as several consecutive events of
//! the same kind. Putting those pieces back together is the sink's job.
//!
//! Start line fields that are not text tokens (method, version, status code)
//! are decoded by the scanner itself and exposed through [`MessageHead`].
//!
//! Malformed input stops the scanner on the offending byte. [`Scanner::execute`]
//! then reports fewer bytes consumed than it was given and [`Scanner::error`]
//! holds the diagnostic.

use thiserror::Error;
use tracing::trace;

use crate::codec::ParserConfig;
use crate::codec::chunked::{ChunkSize, ChunkedState};
use crate::ensure;
use crate::protocol::{Method, ParseError, Version};

/// Longest method token we accept.
const MAX_METHOD_LEN: usize = 32;

/// Header names are only remembered far enough to recognise the framing headers.
const NAME_CAPACITY: usize = 32;

const HTTP_PREFIX: &[u8] = b"HTTP/";

/// Diagnostic codes for malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ScanError {
    #[error("invalid method")]
    InvalidMethod,
    #[error("invalid request target")]
    InvalidUrl,
    #[error("invalid http version")]
    InvalidVersion,
    #[error("invalid response status")]
    InvalidStatus,
    #[error("invalid character in header")]
    InvalidHeaderToken,
    #[error("expected CRLF")]
    InvalidConstant,
    #[error("invalid content-length value")]
    InvalidContentLength,
    #[error("conflicting content-length")]
    UnexpectedContentLength,
    #[error("invalid transfer-encoding")]
    InvalidTransferEncoding,
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("header section exceeds the size limit")]
    HeaderOverflow,
    #[error("too many headers")]
    TooManyHeaders,
    #[error("scanning was aborted by the event handler")]
    Aborted,
}

/// Whether the scanner expects requests or responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Request,
    Response,
}

/// Start line fields decoded by the scanner for the message in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHead {
    pub method: Option<Method>,
    pub version: Version,
    pub status_code: u16,
}

/// A token boundary reported by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    MessageBegin,
    Url(&'a [u8]),
    Status(&'a [u8]),
    HeaderField(&'a [u8]),
    HeaderValue(&'a [u8]),
    HeadersComplete,
    Body(&'a [u8]),
    MessageComplete,
}

/// Receives scanner events. An error aborts the scan and is returned from
/// [`Scanner::execute`] as is.
pub trait EventSink {
    fn on_event(&mut self, head: &MessageHead, event: Event<'_>) -> Result<(), ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between messages, skipping stray CRLFs
    MessageStart,
    Method,
    UrlStart,
    Url,
    ReqVersion,
    ReqLineEnd,
    ResVersion,
    StatusCode,
    ReasonStart,
    Reason,
    StartLineLf,
    HeaderLineStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderValueLf,
    HeadersAlmostDone,
    BodyIdentity,
    BodyUntilEof,
    Chunked(ChunkedState),
    /// A previous error left the scanner unusable until reset
    Dead,
}

impl State {
    fn in_head(self) -> bool {
        !matches!(self, State::MessageStart | State::BodyIdentity | State::BodyUntilEof | State::Chunked(_) | State::Dead)
    }
}

/// Which framing header the current header line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    ContentLength,
    TransferEncoding,
    Other,
}

impl HeaderKind {
    fn classify(lowercase_name: &[u8]) -> Self {
        match lowercase_name {
            b"content-length" => HeaderKind::ContentLength,
            b"transfer-encoding" => HeaderKind::TransferEncoding,
            _ => HeaderKind::Other,
        }
    }
}

/// How the body of the current message is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    None,
    Length(u64),
    Chunked,
    UntilEof,
}

/// Why a scan stopped early.
enum Failure {
    Scan(ScanError),
    Sink(ParseError),
}

impl From<ScanError> for Failure {
    fn from(e: ScanError) -> Self {
        Failure::Scan(e)
    }
}

#[derive(Debug)]
pub struct Scanner {
    mode: Mode,
    config: ParserConfig,
    state: State,
    error: Option<ScanError>,

    head: MessageHead,
    method: Vec<u8>,
    version_pos: usize,
    status_digits: u8,
    head_bytes: usize,
    header_count: usize,

    name: Vec<u8>,
    value: Vec<u8>,
    header_kind: HeaderKind,

    content_length: Option<u64>,
    transfer_encoding: bool,
    chunked: bool,

    remaining: u64,
    chunk: ChunkSize,
}

impl Scanner {
    pub fn new(mode: Mode, config: ParserConfig) -> Self {
        Self {
            mode,
            config,
            state: State::MessageStart,
            error: None,
            head: MessageHead::default(),
            method: Vec::new(),
            version_pos: 0,
            status_digits: 0,
            head_bytes: 0,
            header_count: 0,
            name: Vec::with_capacity(NAME_CAPACITY),
            value: Vec::new(),
            header_kind: HeaderKind::Other,
            content_length: None,
            transfer_encoding: false,
            chunked: false,
            remaining: 0,
            chunk: ChunkSize::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The diagnostic recorded by the last failed call, if any.
    pub fn error(&self) -> Option<ScanError> {
        self.error
    }

    /// Whether the scanner sits between messages.
    pub fn is_idle(&self) -> bool {
        self.state == State::MessageStart
    }

    /// Returns the scanner to its initial state, discarding any partial message.
    pub fn reset(&mut self) {
        *self = Scanner::new(self.mode, self.config);
    }

    /// Scans `data`, reporting events to `sink`, and returns how many bytes
    /// were consumed.
    ///
    /// A count smaller than `data.len()` means the input was malformed; the
    /// reason is available from [`Scanner::error`].
    ///
    /// # Errors
    ///
    /// Errors returned by the sink stop the scan and are passed through.
    pub fn execute<S: EventSink>(&mut self, data: &[u8], sink: &mut S) -> Result<usize, ParseError> {
        if self.state == State::Dead {
            return Ok(0);
        }

        let mut pos = 0;
        match self.scan(data, &mut pos, sink) {
            Ok(()) => Ok(data.len()),
            Err(Failure::Scan(code)) => {
                trace!(consumed = pos, submitted = data.len(), %code, "malformed http input");
                self.error = Some(code);
                self.state = State::Dead;
                Ok(pos)
            }
            Err(Failure::Sink(e)) => {
                self.error = Some(ScanError::Aborted);
                self.state = State::Dead;
                Err(e)
            }
        }
    }

    /// Signals that no more input will arrive.
    ///
    /// Completes a body that runs until the connection closes. Ending anywhere
    /// else inside a message is an error.
    pub fn finish<S: EventSink>(&mut self, sink: &mut S) -> Result<(), ParseError> {
        match self.state {
            State::MessageStart => Ok(()),
            State::BodyUntilEof => match self.complete_message(sink) {
                Ok(()) => Ok(()),
                Err(Failure::Sink(e)) => Err(e),
                Err(Failure::Scan(code)) => Err(ParseError::protocol(code, 0, 0)),
            },
            State::Dead => Err(ParseError::protocol(self.error.unwrap_or(ScanError::Aborted), 0, 0)),
            _ => Err(ParseError::IncompleteMessage),
        }
    }

    fn scan<S: EventSink>(&mut self, data: &[u8], pos: &mut usize, sink: &mut S) -> Result<(), Failure> {
        let len = data.len();
        // start of the token in progress; a token carried over from the last call starts at 0
        let mut mark = 0;

        while *pos < len {
            let i = *pos;
            let byte = data[i];

            if self.state.in_head() {
                self.head_bytes += 1;
                ensure!(self.head_bytes <= self.config.max_header_bytes, ScanError::HeaderOverflow.into());
            }

            match self.state {
                State::MessageStart => {
                    if byte == b'\r' || byte == b'\n' {
                        *pos += 1;
                        continue;
                    }
                    self.emit(sink, Event::MessageBegin)?;
                    self.state = match self.mode {
                        Mode::Request => State::Method,
                        Mode::Response => State::ResVersion,
                    };
                    // reprocess this byte in the new state
                    continue;
                }

                // request line
                State::Method => match byte {
                    b' ' => {
                        ensure!(!self.method.is_empty(), ScanError::InvalidMethod.into());
                        let Ok(token) = std::str::from_utf8(&self.method) else {
                            return Err(ScanError::InvalidMethod.into());
                        };
                        self.head.method = Some(Method::from_token(token));
                        self.state = State::UrlStart;
                    }
                    b if is_tchar(b) => {
                        ensure!(self.method.len() < MAX_METHOD_LEN, ScanError::InvalidMethod.into());
                        self.method.push(b);
                    }
                    _ => return Err(ScanError::InvalidMethod.into()),
                },
                State::UrlStart => {
                    ensure!(is_url_char(byte), ScanError::InvalidUrl.into());
                    mark = i;
                    self.state = State::Url;
                }
                State::Url => match byte {
                    b' ' => {
                        self.emit(sink, Event::Url(&data[mark..i]))?;
                        self.version_pos = 0;
                        self.state = State::ReqVersion;
                    }
                    // a request line without a version is HTTP/0.9
                    b'\r' | b'\n' => return Err(ScanError::InvalidVersion.into()),
                    b if is_url_char(b) => {}
                    _ => return Err(ScanError::InvalidUrl.into()),
                },
                State::ReqVersion => {
                    if self.step_version(byte)? {
                        self.state = State::ReqLineEnd;
                    }
                }
                State::ReqLineEnd => match byte {
                    b'\r' => self.state = State::StartLineLf,
                    b'\n' => self.state = State::HeaderLineStart,
                    _ => return Err(ScanError::InvalidVersion.into()),
                },

                // status line
                State::ResVersion => {
                    if self.version_pos == HTTP_PREFIX.len() + 3 {
                        ensure!(byte == b' ', ScanError::InvalidVersion.into());
                        self.status_digits = 0;
                        self.head.status_code = 0;
                        self.state = State::StatusCode;
                    } else {
                        self.step_version(byte)?;
                    }
                }
                State::StatusCode => {
                    if self.status_digits < 3 {
                        ensure!(byte.is_ascii_digit(), ScanError::InvalidStatus.into());
                        self.head.status_code = self.head.status_code * 10 + u16::from(byte - b'0');
                        self.status_digits += 1;
                    } else {
                        ensure!((100..=599).contains(&self.head.status_code), ScanError::InvalidStatus.into());
                        match byte {
                            b' ' => self.state = State::ReasonStart,
                            b'\r' => {
                                self.emit(sink, Event::Status(&[]))?;
                                self.state = State::StartLineLf;
                            }
                            b'\n' => {
                                self.emit(sink, Event::Status(&[]))?;
                                self.state = State::HeaderLineStart;
                            }
                            _ => return Err(ScanError::InvalidStatus.into()),
                        }
                    }
                }
                State::ReasonStart => match byte {
                    b'\r' => {
                        self.emit(sink, Event::Status(&[]))?;
                        self.state = State::StartLineLf;
                    }
                    b'\n' => {
                        self.emit(sink, Event::Status(&[]))?;
                        self.state = State::HeaderLineStart;
                    }
                    b if is_text(b) => {
                        mark = i;
                        self.state = State::Reason;
                    }
                    _ => return Err(ScanError::InvalidStatus.into()),
                },
                State::Reason => match byte {
                    b'\r' => {
                        self.emit(sink, Event::Status(&data[mark..i]))?;
                        self.state = State::StartLineLf;
                    }
                    b'\n' => {
                        self.emit(sink, Event::Status(&data[mark..i]))?;
                        self.state = State::HeaderLineStart;
                    }
                    b if is_text(b) => {}
                    _ => return Err(ScanError::InvalidStatus.into()),
                },
                State::StartLineLf => {
                    ensure!(byte == b'\n', ScanError::InvalidConstant.into());
                    self.state = State::HeaderLineStart;
                }

                // header section
                State::HeaderLineStart => match byte {
                    b'\r' => self.state = State::HeadersAlmostDone,
                    b'\n' => self.headers_done(sink)?,
                    b if is_tchar(b) => {
                        self.header_count += 1;
                        ensure!(self.header_count <= self.config.max_headers, ScanError::TooManyHeaders.into());
                        self.name.clear();
                        mark = i;
                        self.state = State::HeaderField;
                    }
                    // obsolete line folding is not supported
                    _ => return Err(ScanError::InvalidHeaderToken.into()),
                },
                State::HeaderField => match byte {
                    b':' => {
                        self.emit_field(sink, &data[mark..i])?;
                        self.header_kind = HeaderKind::classify(&self.name);
                        self.value.clear();
                        self.state = State::HeaderValueStart;
                    }
                    b if is_tchar(b) => {}
                    _ => return Err(ScanError::InvalidHeaderToken.into()),
                },
                State::HeaderValueStart => match byte {
                    b' ' | b'\t' => {}
                    b'\r' => {
                        self.emit_value(sink, &[])?;
                        self.finish_value()?;
                        self.state = State::HeaderValueLf;
                    }
                    b'\n' => {
                        self.emit_value(sink, &[])?;
                        self.finish_value()?;
                        self.state = State::HeaderLineStart;
                    }
                    b if is_text(b) => {
                        mark = i;
                        self.state = State::HeaderValue;
                    }
                    _ => return Err(ScanError::InvalidHeaderToken.into()),
                },
                State::HeaderValue => match byte {
                    b'\r' => {
                        self.emit_value(sink, &data[mark..i])?;
                        self.finish_value()?;
                        self.state = State::HeaderValueLf;
                    }
                    b'\n' => {
                        self.emit_value(sink, &data[mark..i])?;
                        self.finish_value()?;
                        self.state = State::HeaderLineStart;
                    }
                    b if is_text(b) => {}
                    _ => return Err(ScanError::InvalidHeaderToken.into()),
                },
                State::HeaderValueLf => {
                    ensure!(byte == b'\n', ScanError::InvalidConstant.into());
                    self.state = State::HeaderLineStart;
                }
                State::HeadersAlmostDone => {
                    ensure!(byte == b'\n', ScanError::InvalidConstant.into());
                    self.headers_done(sink)?;
                }

                // body
                State::BodyIdentity => {
                    let available = (len - i) as u64;
                    let take = self.remaining.min(available);
                    // take <= available, which came from a usize
                    let end = i + usize::try_from(take).unwrap_or(len - i);
                    self.emit(sink, Event::Body(&data[i..end]))?;
                    self.remaining -= take;
                    *pos = end;
                    if self.remaining == 0 {
                        self.complete_message(sink)?;
                    }
                    continue;
                }
                State::BodyUntilEof => {
                    self.emit(sink, Event::Body(&data[i..]))?;
                    *pos = len;
                    continue;
                }
                State::Chunked(ChunkedState::Body) => {
                    let available = (len - i) as u64;
                    let take = self.chunk.remaining.min(available);
                    let end = i + usize::try_from(take).unwrap_or(len - i);
                    self.emit(sink, Event::Body(&data[i..end]))?;
                    self.chunk.remaining -= take;
                    *pos = end;
                    if self.chunk.remaining == 0 {
                        self.state = State::Chunked(ChunkedState::BodyCr);
                    }
                    continue;
                }
                State::Chunked(chunked) => {
                    let next = chunked.step(byte, &mut self.chunk)?;
                    if next == ChunkedState::Body {
                        trace!(size = self.chunk.remaining, "reading chunk");
                    }
                    if next == ChunkedState::End {
                        *pos += 1;
                        self.complete_message(sink)?;
                        continue;
                    }
                    self.state = State::Chunked(next);
                }

                State::Dead => return Err(self.error.unwrap_or(ScanError::Aborted).into()),
            }

            *pos += 1;
        }

        // the input ended inside a token: hand over what we have, the rest follows next call
        if mark < len {
            match self.state {
                State::Url => self.emit(sink, Event::Url(&data[mark..]))?,
                State::Reason => self.emit(sink, Event::Status(&data[mark..]))?,
                State::HeaderField => self.emit_field(sink, &data[mark..])?,
                State::HeaderValue => self.emit_value(sink, &data[mark..])?,
                _ => {}
            }
        }

        Ok(())
    }

    fn emit<S: EventSink>(&self, sink: &mut S, event: Event<'_>) -> Result<(), Failure> {
        sink.on_event(&self.head, event).map_err(Failure::Sink)
    }

    fn emit_field<S: EventSink>(&mut self, sink: &mut S, span: &[u8]) -> Result<(), Failure> {
        let room = NAME_CAPACITY.saturating_sub(self.name.len());
        self.name.extend(span.iter().take(room).map(u8::to_ascii_lowercase));
        self.emit(sink, Event::HeaderField(span))
    }

    fn emit_value<S: EventSink>(&mut self, sink: &mut S, span: &[u8]) -> Result<(), Failure> {
        if self.header_kind != HeaderKind::Other {
            self.value.extend_from_slice(span);
        }
        self.emit(sink, Event::HeaderValue(span))
    }

    /// Steps through `HTTP/M.m`, returning true once the minor digit is read.
    fn step_version(&mut self, byte: u8) -> Result<bool, ScanError> {
        let pos = self.version_pos;
        match pos {
            0..=4 => ensure!(byte == HTTP_PREFIX[pos], ScanError::InvalidVersion),
            // HTTP/2 and later don't use this framing
            5 => ensure!(byte == b'1', ScanError::InvalidVersion),
            6 => ensure!(byte == b'.', ScanError::InvalidVersion),
            7 => {
                ensure!(byte.is_ascii_digit(), ScanError::InvalidVersion);
                self.head.version = Version::new(1, byte - b'0');
            }
            _ => return Err(ScanError::InvalidVersion),
        }
        self.version_pos += 1;
        Ok(self.version_pos == HTTP_PREFIX.len() + 3)
    }

    /// Records framing information once a header value is complete.
    fn finish_value(&mut self) -> Result<(), ScanError> {
        match self.header_kind {
            HeaderKind::ContentLength => {
                let text = self.value.trim_ascii();
                ensure!(!text.is_empty() && text.iter().all(u8::is_ascii_digit), ScanError::InvalidContentLength);
                let length = std::str::from_utf8(text)
                    .ok()
                    .and_then(|text| text.parse::<u64>().ok())
                    .ok_or(ScanError::InvalidContentLength)?;
                if let Some(existing) = self.content_length {
                    ensure!(existing == length, ScanError::UnexpectedContentLength);
                }
                self.content_length = Some(length);
            }
            HeaderKind::TransferEncoding => {
                self.transfer_encoding = true;
                self.chunked = is_chunked(&self.value);
            }
            HeaderKind::Other => {}
        }
        self.header_kind = HeaderKind::Other;
        Ok(())
    }

    fn framing(&self) -> Result<Framing, ScanError> {
        let code = self.head.status_code;
        if self.mode == Mode::Response && ((100..200).contains(&code) || code == 204 || code == 304) {
            return Ok(Framing::None);
        }

        // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
        match (self.transfer_encoding, self.content_length) {
            (true, Some(_)) => Err(ScanError::UnexpectedContentLength),
            (true, None) if self.chunked => Ok(Framing::Chunked),
            (true, None) => match self.mode {
                Mode::Request => Err(ScanError::InvalidTransferEncoding),
                Mode::Response => Ok(Framing::UntilEof),
            },
            (false, Some(0)) => Ok(Framing::None),
            (false, Some(length)) => Ok(Framing::Length(length)),
            (false, None) => match self.mode {
                Mode::Request => Ok(Framing::None),
                Mode::Response => Ok(Framing::UntilEof),
            },
        }
    }

    fn headers_done<S: EventSink>(&mut self, sink: &mut S) -> Result<(), Failure> {
        let framing = self.framing()?;
        trace!(head_bytes = self.head_bytes, headers = self.header_count, ?framing, "parsed message head");
        self.emit(sink, Event::HeadersComplete)?;

        match framing {
            Framing::None => self.complete_message(sink)?,
            Framing::Length(length) => {
                self.remaining = length;
                self.state = State::BodyIdentity;
            }
            Framing::Chunked => {
                self.chunk = ChunkSize::default();
                self.state = State::Chunked(ChunkedState::Size);
            }
            Framing::UntilEof => self.state = State::BodyUntilEof,
        }
        Ok(())
    }

    fn complete_message<S: EventSink>(&mut self, sink: &mut S) -> Result<(), Failure> {
        self.emit(sink, Event::MessageComplete)?;

        self.state = State::MessageStart;
        self.head = MessageHead::default();
        self.method.clear();
        self.version_pos = 0;
        self.status_digits = 0;
        self.head_bytes = 0;
        self.header_count = 0;
        self.name.clear();
        self.value.clear();
        self.header_kind = HeaderKind::Other;
        self.content_length = None;
        self.transfer_encoding = false;
        self.chunked = false;
        self.remaining = 0;
        self.chunk = ChunkSize::default();
        Ok(())
    }
}

/// Checks if a Transfer-Encoding value ends with the chunked coding.
///
/// According to RFC 9112, chunked must be the last encoding if present.
fn is_chunked(value: &[u8]) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    value.rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(CHUNKED))
}

/// `tchar` from RFC 9110, the characters allowed in methods and field names.
fn is_tchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

fn is_url_char(byte: u8) -> bool {
    matches!(byte, 0x21..=0x7e | 0x80..=0xff)
}

/// Visible characters, spaces, tabs and obs-text: what field values and reason phrases may contain.
fn is_text(byte: u8) -> bool {
    matches!(byte, b'\t' | 0x20..=0x7e | 0x80..=0xff)
}
