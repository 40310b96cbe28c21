//! HTTP response message.
//!
//! `Set-Cookie` values live in [`CookieHeaders`] rather than in the folded
//! [`Headers`]; the serializer writes each one on its own line.

use crate::protocol::{Body, CookieHeaders, Headers, Status, Version};

#[derive(Debug)]
pub struct Response {
    version: Version,
    status: Status,
    headers: Headers,
    cookie_headers: CookieHeaders,
    body: Body,
}

impl Response {
    pub fn new(status: Status) -> Self {
        Self {
            version: Version::HTTP_11,
            status,
            headers: Headers::new(),
            cookie_headers: CookieHeaders::new(),
            body: Body::empty(),
        }
    }

    pub fn from_parts(version: Version, status: Status, headers: Headers, cookie_headers: CookieHeaders, body: Body) -> Self {
        Self { version, status, headers, cookie_headers, body }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_header<N: Into<String>, V: AsRef<str>>(mut self, name: N, value: V) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_cookie<S: Into<String>>(mut self, cookie: S) -> Self {
        self.cookie_headers.insert(cookie);
        self
    }

    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn cookie_headers(&self) -> &CookieHeaders {
        &self.cookie_headers
    }

    pub fn cookie_headers_mut(&mut self) -> &mut CookieHeaders {
        &mut self.cookie_headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}
