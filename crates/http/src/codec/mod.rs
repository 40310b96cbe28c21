//! HTTP/1.x wire codec.
//!
//! # Architecture
//!
//! - Decoding:
//!   - an internal byte-level scanner tokenizes the input and reports token
//!     boundaries in message order
//!   - [`Parser`] folds those tokens into complete [`Message`](crate::protocol::Message)s,
//!     across any fragmentation of the input
//!
//! - Encoding:
//!   - [`HeadEncoder`] writes the start line and header section
//!   - [`ResponseSerializer`] / [`RequestSerializer`] write whole messages onto an
//!     [`OutputStream`](crate::stream::OutputStream), framing bodies of unknown
//!     length with chunked transfer coding
//!   - [`encode_chunk`] / [`encode_eof`] are the chunk framing primitives
//!
//! # Example
//!
//! ```
//! use h1_wire::codec::{Parser, ResponseSerializer};
//! use h1_wire::protocol::{Response, Status};
//! use h1_wire::stream::{Deadline, MemoryStream};
//!
//! let mut parser = Parser::request();
//! let requests = parser.parse(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
//! assert_eq!(requests.len(), 1);
//!
//! let response = Response::new(Status::from_code(200)).with_header("Content-Length", "2").with_body("hi");
//! let mut serializer = ResponseSerializer::new(MemoryStream::new());
//! serializer.serialize(response, Deadline::never()).unwrap();
//! assert_eq!(serializer.get_ref().written(), b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
//! ```

mod chunked;
mod head_encoder;
mod parser;
mod scanner;
mod serializer;

pub use chunked::{LAST_CHUNK, encode_chunk, encode_eof};
pub use head_encoder::HeadEncoder;
pub use parser::{DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADERS, Parser, ParserConfig};
pub use scanner::{Mode, ScanError};
pub use serializer::{ChunkedWriter, DEFAULT_CHUNK_SIZE, RequestSerializer, ResponseSerializer};
