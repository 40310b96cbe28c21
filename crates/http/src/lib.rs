//! An incremental HTTP/1.x message parser and chunked serializer
//!
//! This crate implements the wire layer of an HTTP/1.x stack: turning bytes from
//! the network into messages and messages back into bytes. Input may arrive in
//! fragments of any size, including one byte at a time, and several pipelined
//! messages may share a single read.
//!
//! # Features
//!
//! - Incremental parsing of requests and responses
//! - Pipelined messages and partial tokens across reads
//! - Content-Length, chunked and read-until-close bodies
//! - Buffered, pull (reader) and push (writer) response bodies
//! - Chunked transfer encoding for bodies of unknown length
//! - Deadline-bounded blocking streams
//! - A blocking keep-alive connection loop
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::net::TcpListener;
//!
//! use h1_wire::connection::HttpConnection;
//! use h1_wire::handler::make_handler;
//! use h1_wire::protocol::{Request, Response, Status};
//! use h1_wire::stream::TcpStream;
//! use tracing::{error, info};
//!
//! fn hello_world(request: Request) -> Result<Response, Infallible> {
//!     info!(path = request.url().path(), "request path");
//!     Ok(Response::new(Status::from_code(200)).with_body("Hello World!\r\n"))
//! }
//!
//! let listener = TcpListener::bind("127.0.0.1:8080").unwrap();
//! let handler = make_handler(hello_world);
//!
//! for stream in listener.incoming() {
//!     let stream = TcpStream::from_std(stream.unwrap());
//!     if let Err(e) = HttpConnection::new(stream).process(&handler) {
//!         error!("service has error, cause {}, connection shutdown", e);
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`protocol`]: Message model and error types
//! - [`stream`]: Deadline-bounded input/output stream contracts
//! - [`codec`]: Parser and serializers
//! - [`connection`]: Per-connection read/dispatch/write loop
//! - [`handler`]: Request handler traits and utilities
//!
//! # Core Components
//!
//! ## Parsing
//!
//! [`codec::Parser`] is fed bytes and delivers every message they complete.
//! Bytes of a token that spans two reads are carried over, so callers never need
//! to buffer or realign input themselves. The parser also implements
//! `tokio_util::codec::Decoder`.
//!
//! ## Serializing
//!
//! [`codec::ResponseSerializer`] and [`codec::RequestSerializer`] write a message
//! onto an [`stream::OutputStream`]. Bodies without a known length are framed as
//! chunks and terminated with a zero-length chunk.
//!
//! ## Error Handling
//!
//! The crate uses custom error types that implement `std::error::Error`:
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Malformed input
//! - [`protocol::StreamError`]: Timeouts and closed peers
//! - [`protocol::SendError`]: Response sending errors
//!
//! # Limitations
//!
//! - HTTP/1.x only (HTTP/2 or HTTP/3 is not supported)
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB by default
//! - Maximum number of headers: 64 by default
//! - Bodies are buffered in full before a request is dispatched

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod stream;

mod utils;
pub(crate) use utils::ensure;
