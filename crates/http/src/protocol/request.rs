//! HTTP request message.

use http::Uri;

use crate::protocol::{Body, Headers, Method, Version};

/// A request as produced by the parser: start line fields, folded headers and body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Uri,
    version: Version,
    headers: Headers,
    body: Body,
}

impl Request {
    pub fn new(method: Method, url: Uri) -> Self {
        Self { method, url, version: Version::HTTP_11, headers: Headers::new(), body: Body::empty() }
    }

    pub fn from_parts(method: Method, url: Uri, version: Version, headers: Headers, body: Body) -> Self {
        Self { method, url, version, headers, body }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_header<N: Into<String>, V: AsRef<str>>(mut self, name: N, value: V) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns a reference to the request target.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Whether the connection may be reused after this request is answered.
    ///
    /// HTTP/1.1 connections persist unless the client sent `Connection: close`;
    /// HTTP/1.0 connections only persist with an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        self.version.keep_alive_by_default() || self.headers.has_token("Connection", "keep-alive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_rules() {
        let request = Request::new(Method::Get, Uri::from_static("/"));
        assert!(request.keep_alive());

        let request = Request::new(Method::Get, Uri::from_static("/")).with_header("Connection", "close");
        assert!(!request.keep_alive());

        let request = Request::new(Method::Get, Uri::from_static("/")).with_version(Version::HTTP_10);
        assert!(!request.keep_alive());

        let request = Request::new(Method::Get, Uri::from_static("/"))
            .with_version(Version::HTTP_10)
            .with_header("Connection", "Keep-Alive");
        assert!(request.keep_alive());
    }
}
