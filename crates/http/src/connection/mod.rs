//! Blocking connection handling.
//!
//! [`HttpConnection`] drives one server side connection on the calling thread:
//! read with a deadline, parse, dispatch to a [`Handler`](crate::handler::Handler),
//! serialize the response, repeat while the connection stays persistent.
//!
//! Failures are reported through [`HttpError`](crate::protocol::HttpError):
//! malformed requests are answered with `400 Bad Request` before the error is
//! returned, handler failures with `500 Internal Server Error` without ending
//! the connection.

mod http_connection;

pub use http_connection::ConnectionConfig;
pub use http_connection::HttpConnection;
