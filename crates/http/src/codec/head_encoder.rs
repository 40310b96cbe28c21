//! Start line and header section encoding.
//!
//! [`HeadEncoder`] writes everything up to and including the blank line that
//! ends the header section:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n          METHOD URL HTTP/1.1\r\n
//! Name: value\r\n              Name: value\r\n
//! Set-Cookie: a=1\r\n          \r\n
//! \r\n
//! ```
//!
//! Headers are written in insertion order exactly as stored. Framing headers
//! (`Content-Length`, `Transfer-Encoding`) are the caller's responsibility.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::headers::SET_COOKIE;
use crate::protocol::{CookieHeaders, Headers, Request, Response, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadEncoder;

impl Encoder<&Response> for HeadEncoder {
    type Error = SendError;

    fn encode(&mut self, response: &Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEADER_SIZE);

        let status = response.status();
        write!(FastWrite(dst), "{} {} {}\r\n", response.version(), status.code(), status.reason_phrase())?;

        encode_headers(response.headers(), dst);
        encode_cookies(response.cookie_headers(), dst);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<&Request> for HeadEncoder {
    type Error = SendError;

    fn encode(&mut self, request: &Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEADER_SIZE);

        write!(FastWrite(dst), "{} {} {}\r\n", request.method(), request.url(), request.version())?;

        encode_headers(request.headers(), dst);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn encode_headers(headers: &Headers, dst: &mut BytesMut) {
    for (name, value) in headers {
        encode_line(name, value, dst);
    }
}

fn encode_cookies(cookies: &CookieHeaders, dst: &mut BytesMut) {
    for cookie in cookies.iter() {
        encode_line(SET_COOKIE, cookie, dst);
    }
}

fn encode_line(name: &str, value: &str, dst: &mut BytesMut) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// Fast writer implementation for writing to BytesMut.
///
/// Skips the intermediate `String` a `format!` would allocate.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Method, Status, Version};
    use http::Uri;

    #[test]
    fn response_head() {
        let response = Response::new(Status::from_code(404))
            .with_header("Content-Type", "text/plain")
            .with_header("Vary", "Accept")
            .with_header("vary", "Cookie")
            .with_cookie("a=1")
            .with_cookie("b=2; Path=/")
            .with_header("Content-Length", "0");

        let mut dst = BytesMut::new();
        HeadEncoder.encode(&response, &mut dst).unwrap();
        assert_eq!(
            &dst[..],
            b"HTTP/1.1 404 Not Found\r\n\
              Content-Type: text/plain\r\n\
              Vary: Accept, Cookie\r\n\
              Content-Length: 0\r\n\
              Set-Cookie: a=1\r\n\
              Set-Cookie: b=2; Path=/\r\n\
              \r\n"
        );
    }

    #[test]
    fn empty_reason_keeps_the_separator() {
        let response = Response::new(Status::new(299, "")).with_version(Version::HTTP_10);
        let mut dst = BytesMut::new();
        HeadEncoder.encode(&response, &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.0 299 \r\n\r\n");
    }

    #[test]
    fn request_head() {
        let request = Request::new(Method::Other("PROPFIND".into()), Uri::from_static("/dav/?depth=1"))
            .with_header("Host", "example.com")
            .with_header("Set-Cookie", "kept=1");

        let mut dst = BytesMut::new();
        HeadEncoder.encode(&request, &mut dst).unwrap();
        assert_eq!(&dst[..], b"PROPFIND /dav/?depth=1 HTTP/1.1\r\nHost: example.com\r\nSet-Cookie: kept=1\r\n\r\n");
    }
}
