//! Core HTTP message model.
//!
//! These are the values the [parser](crate::codec::Parser) produces and the
//! [serializers](crate::codec::ResponseSerializer) consume.
//!
//! # Architecture
//!
//! - **Start line**: [`Method`], [`Version`] and [`Status`]
//!
//! - **Headers** ([`headers`]): [`Headers`] folds repeated fields and keeps
//!   insertion order, [`CookieHeaders`] keeps `Set-Cookie` values apart
//!
//! - **Bodies** ([`body`]): [`Body`] is a buffer, a pull reader or a push writer
//!
//! - **Messages**: [`Request`], [`Response`] and the [`Message`] sum of both
//!
//! - **Error Handling**:
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Malformed input
//!   - [`StreamError`]: Timeouts and closed peers
//!   - [`SendError`]: Response sending errors

mod message;
pub use message::Message;

mod method;
pub use method::Method;

mod version;
pub use version::Version;

mod status;
pub use status::Status;

pub mod headers;
pub use headers::CookieHeaders;
pub use headers::Headers;

pub mod body;
pub use body::Body;

mod request;
pub use request::Request;

mod response;
pub use response::Response;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::StreamError;
