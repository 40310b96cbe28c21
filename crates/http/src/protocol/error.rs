use std::io;
use thiserror::Error;

use crate::codec::ScanError;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("stream error: {source}")]
    StreamError {
        #[from]
        source: StreamError,
    },
}

/// Malformed input seen while parsing a message.
///
/// A parser that returned one of these is left in an undefined state and must be
/// [reset](crate::codec::Parser::reset) before it is fed again.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("protocol error: {code} (consumed {consumed} of {submitted} bytes)")]
    Protocol { code: ScanError, consumed: usize, submitted: usize },

    #[error("invalid http uri: {reason}")]
    InvalidUri { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("input ended in the middle of a message")]
    IncompleteMessage,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn protocol(code: ScanError, consumed: usize, submitted: usize) -> Self {
        Self::Protocol { code, consumed, submitted }
    }

    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns the scanner diagnostic code if this is a protocol error.
    pub fn scan_error(&self) -> Option<ScanError> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Failure of a deadline-bounded stream operation.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("stream operation exceeded its deadline")]
    Timeout,

    #[error("stream closed by peer")]
    Closed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl StreamError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Timeout)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamError::Closed)
    }
}

/// Failure while writing a message onto an output stream.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("stream error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Stream { source: StreamError::io(e) }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        self.as_stream_error().is_timeout()
    }

    /// Returns the underlying stream failure.
    pub fn as_stream_error(&self) -> &StreamError {
        match self {
            Self::Stream { source } => source,
        }
    }
}

impl From<io::Error> for SendError {
    fn from(e: io::Error) -> Self {
        Self::io(e)
    }
}
