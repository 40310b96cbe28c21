//! Chunked transfer coding as specified in
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! Decoding is a byte-at-a-time state machine driven by the scanner: everything
//! except the chunk data itself goes through [`ChunkedState::step`], while chunk
//! data is sliced out in bulk by the scanner and reported as body events.
//!
//! Encoding writes the `HEX CRLF data CRLF` frames and the `0 CRLF CRLF`
//! terminator into a `BytesMut`.

use std::io::{self, Write};

use bytes::{BufMut, BytesMut};

use crate::codec::ScanError;
use ChunkedState::*;

/// The terminal zero-length chunk with an empty trailer section
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read optional trailer fields
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

/// Size bookkeeping for the chunk currently being read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ChunkSize {
    /// bytes of chunk data still expected
    pub(crate) remaining: u64,
    /// hex digits seen on the current size line
    pub(crate) digits: u8,
}

impl ChunkedState {
    /// Advances the framing state machine by one byte.
    ///
    /// Must not be called in the [`Body`] state, whose bytes are chunk data, nor
    /// in [`End`].
    pub(crate) fn step(self, byte: u8, size: &mut ChunkSize) -> Result<ChunkedState, ScanError> {
        match self {
            Size => read_size(byte, size),
            SizeLws => read_size_lws(byte),
            Extension => read_extension(byte),
            SizeLf => read_size_lf(byte, size),
            BodyCr => expect(byte, b'\r', BodyLf),
            BodyLf => {
                let next = expect(byte, b'\n', Size)?;
                *size = ChunkSize::default();
                Ok(next)
            }
            Trailer => Ok(if byte == b'\r' { TrailerLf } else { Trailer }),
            TrailerLf => expect(byte, b'\n', EndCr),
            // anything but CR starts a trailer field, which we skip
            EndCr => Ok(if byte == b'\r' { EndLf } else { Trailer }),
            EndLf => expect(byte, b'\n', End),
            Body | End => Err(ScanError::InvalidChunkSize),
        }
    }
}

fn expect(byte: u8, wanted: u8, next: ChunkedState) -> Result<ChunkedState, ScanError> {
    if byte == wanted { Ok(next) } else { Err(ScanError::InvalidConstant) }
}

/// Reads one hex digit of the chunk size, or the delimiter ending it.
fn read_size(byte: u8, size: &mut ChunkSize) -> Result<ChunkedState, ScanError> {
    let digit = match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte + 10 - b'a',
        b'A'..=b'F' => byte + 10 - b'A',
        b'\t' | b' ' if size.digits > 0 => return Ok(SizeLws),
        b';' if size.digits > 0 => return Ok(Extension),
        b'\r' if size.digits > 0 => return Ok(SizeLf),
        _ => return Err(ScanError::InvalidChunkSize),
    };

    size.remaining = size
        .remaining
        .checked_mul(16)
        .and_then(|value| value.checked_add(u64::from(digit)))
        .ok_or(ScanError::InvalidChunkSize)?;
    size.digits = size.digits.saturating_add(1);
    Ok(Size)
}

fn read_size_lws(byte: u8) -> Result<ChunkedState, ScanError> {
    match byte {
        // LWS can follow the chunk size, but no more digits can come
        b'\t' | b' ' => Ok(SizeLws),
        b';' => Ok(Extension),
        b'\r' => Ok(SizeLf),
        _ => Err(ScanError::InvalidChunkSize),
    }
}

fn read_extension(byte: u8) -> Result<ChunkedState, ScanError> {
    // Extensions are ignored up to the next CRLF, but a bare LF inside one is
    // rejected rather than guessed at.
    match byte {
        b'\r' => Ok(SizeLf),
        b'\n' => Err(ScanError::InvalidChunkSize),
        _ => Ok(Extension),
    }
}

fn read_size_lf(byte: u8, size: &ChunkSize) -> Result<ChunkedState, ScanError> {
    match byte {
        b'\n' if size.remaining == 0 => Ok(EndCr),
        b'\n' => Ok(Body),
        _ => Err(ScanError::InvalidConstant),
    }
}

/// Writes one `HEX CRLF data CRLF` frame. Empty input writes nothing, because a
/// zero-length frame would end the body.
pub fn encode_chunk(data: &[u8], dst: &mut BytesMut) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    dst.reserve(data.len() + 20);
    write!(helper::Writer(dst), "{:x}\r\n", data.len())?;
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
    Ok(())
}

/// Writes the terminal chunk.
pub fn encode_eof(dst: &mut BytesMut) {
    dst.put_slice(LAST_CHUNK);
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &[u8]) -> Result<(ChunkedState, ChunkSize), ScanError> {
        let mut state = Size;
        let mut size = ChunkSize::default();
        for &byte in input {
            state = state.step(byte, &mut size)?;
        }
        Ok((state, size))
    }

    #[test]
    fn size_line_with_extension() {
        let (state, size) = run(b"1A;name=value\r\n").unwrap();
        assert_eq!(state, Body);
        assert_eq!(size.remaining, 26);
    }

    #[test]
    fn size_line_with_whitespace() {
        let (state, size) = run(b"5 \t\r\n").unwrap();
        assert_eq!(state, Body);
        assert_eq!(size.remaining, 5);
    }

    #[test]
    fn last_chunk_with_trailers() {
        let (state, _) = run(b"0\r\nExpires: never\r\n\r\n").unwrap();
        assert_eq!(state, End);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(run(b"xyz").unwrap_err(), ScanError::InvalidChunkSize);
        assert_eq!(run(b"\r\n").unwrap_err(), ScanError::InvalidChunkSize);
        assert_eq!(run(b"5;ext\n").unwrap_err(), ScanError::InvalidChunkSize);
        assert_eq!(run(b"fffffffffffffffff").unwrap_err(), ScanError::InvalidChunkSize);
        assert_eq!(run(b"5\rx").unwrap_err(), ScanError::InvalidConstant);
    }

    #[test]
    fn encodes_frames() {
        let mut dst = BytesMut::new();
        encode_chunk(b"hello world!", &mut dst).unwrap();
        encode_chunk(b"", &mut dst).unwrap();
        encode_eof(&mut dst);
        assert_eq!(&dst[..], b"c\r\nhello world!\r\n0\r\n\r\n");
    }
}
