//! Message bodies.
//!
//! A [`Body`] is exactly one of:
//!
//! - [`Body::Buffer`]: the whole payload, already in memory. The parser always
//!   produces this variant.
//! - [`Body::Reader`]: a pull source the serializer reads from until it closes.
//! - [`Body::Writer`]: a callback the serializer hands a write sink to.
//!
//! The last two have no length up front and are written with chunked framing.

use std::fmt;

use bytes::Bytes;

use crate::protocol::StreamError;
use crate::stream::{InputStream, OutputStream};

/// Callback behind [`Body::Writer`]. The sink it receives frames every write
/// as a chunk and is only valid for the duration of the call.
pub type BodyWriter = Box<dyn FnOnce(&mut dyn OutputStream) -> Result<(), StreamError> + Send>;

pub enum Body {
    Buffer(Bytes),
    Reader(Box<dyn InputStream + Send>),
    Writer(BodyWriter),
}

impl Body {
    pub fn empty() -> Self {
        Body::Buffer(Bytes::new())
    }

    pub fn reader<R>(reader: R) -> Self
    where
        R: InputStream + Send + 'static,
    {
        Body::Reader(Box::new(reader))
    }

    pub fn writer<F>(f: F) -> Self
    where
        F: FnOnce(&mut dyn OutputStream) -> Result<(), StreamError> + Send + 'static,
    {
        Body::Writer(Box::new(f))
    }

    /// Returns true if the body length is unknown and must be sent chunked
    #[inline]
    pub fn is_chunked(&self) -> bool {
        !matches!(self, Body::Buffer(_))
    }

    /// Returns the buffered bytes, `None` for streamed bodies
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Buffer(bytes) => Some(bytes),
            Body::Reader(_) | Body::Writer(_) => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Body::Buffer(bytes) => Some(bytes),
            Body::Reader(_) | Body::Writer(_) => None,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Buffer(bytes) => f.debug_tuple("Buffer").field(bytes).finish(),
            Body::Reader(_) => f.write_str("Reader(..)"),
            Body::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Buffer(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Buffer(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(string: String) -> Self {
        Body::Buffer(Bytes::from(string))
    }
}

impl From<&'static str> for Body {
    fn from(string: &'static str) -> Self {
        Body::Buffer(Bytes::from_static(string.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Buffer(Bytes::from_static(bytes))
    }
}
