//! Header containers shared by requests and responses.
//!
//! [`Headers`] keeps one entry per distinct field name. Names compare
//! case-insensitively but keep the casing they were first seen with, and entries
//! serialize in the order their names were first inserted. Repeated fields are
//! folded into one value joined with `", "`.
//!
//! `Set-Cookie` can't be folded that way (cookie attributes contain commas), so
//! responses keep those values apart in a [`CookieHeaders`] set.

use std::slice;

/// Separator used when a repeated field is folded into a single value.
pub const VALUE_SEPARATOR: &str = ", ";

pub const SET_COOKIE: &str = "Set-Cookie";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Default::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Sets `name` to `value`, replacing any existing value but keeping the
    /// entry's original position and casing.
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Adds `value` under `name`, joining it onto an existing value with `", "`.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: AsRef<str>,
    {
        let name = name.into();
        let value = value.as_ref();
        match self.position(&name) {
            Some(index) => {
                let existing = &mut self.entries[index].1;
                existing.reserve(VALUE_SEPARATOR.len() + value.len());
                existing.push_str(VALUE_SEPARATOR);
                existing.push_str(value);
            }
            None => self.entries.push((name, value.to_owned())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|index| self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { inner: self.entries.iter() }
    }

    /// Whether a comma separated header contains `token`, compared case-insensitively.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get(name).is_some_and(|value| value.split(',').any(|item| item.trim().eq_ignore_ascii_case(token)))
    }
}

#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: slice::Iter<'a, (String, String)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: AsRef<str>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// Deduplicated `Set-Cookie` values in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieHeaders {
    cookies: Vec<String>,
}

impl CookieHeaders {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts a single cookie, returning false if it was already present.
    pub fn insert<S: Into<String>>(&mut self, cookie: S) -> bool {
        let cookie = cookie.into();
        if self.cookies.contains(&cookie) {
            return false;
        }
        self.cookies.push(cookie);
        true
    }

    /// Inserts a raw header value that may hold several cookies joined with `", "`.
    ///
    /// This is not a plain split on `", "`. A segment only starts a new cookie
    /// when it looks like `name=value`. Any other segment is glued back onto the
    /// cookie before it, so the comma inside an `Expires=Wed, 21 Oct 2015 ...`
    /// attribute stays put. The same rule keeps `"a=1, foo"` as one cookie.
    ///
    /// ```
    /// use h1_wire::protocol::CookieHeaders;
    ///
    /// let mut cookies = CookieHeaders::new();
    /// cookies.insert_raw("id=x; Expires=Wed, 21 Oct 2015 07:28:00 GMT, lang=en");
    /// cookies.insert_raw("a=1, foo");
    /// let all: Vec<_> = cookies.iter().collect();
    /// assert_eq!(all, ["id=x; Expires=Wed, 21 Oct 2015 07:28:00 GMT", "lang=en", "a=1, foo"]);
    /// ```
    pub fn insert_raw(&mut self, raw: &str) {
        for cookie in split_cookies(raw) {
            self.insert(cookie);
        }
    }

    pub fn contains(&self, cookie: &str) -> bool {
        self.cookies.iter().any(|c| c == cookie)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.cookies.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CookieHeaders {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut cookies = CookieHeaders::new();
        for cookie in iter {
            cookies.insert(cookie);
        }
        cookies
    }
}

fn split_cookies(raw: &str) -> Vec<String> {
    let mut cookies: Vec<String> = Vec::new();
    for segment in raw.split(VALUE_SEPARATOR) {
        match cookies.last_mut() {
            Some(current) if !starts_cookie(segment) => {
                current.push_str(VALUE_SEPARATOR);
                current.push_str(segment);
            }
            _ => cookies.push(segment.to_owned()),
        }
    }
    cookies.retain(|cookie| !cookie.is_empty());
    cookies
}

fn starts_cookie(segment: &str) -> bool {
    let pair = segment.split(';').next().unwrap_or_default();
    match pair.split_once('=') {
        Some((name, _)) => !name.is_empty() && !name.contains(' '),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive_and_keep_first_casing() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/plain");
        headers.append("accept", "a");
        headers.append("ACCEPT", "b");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("Accept"), Some("a, b"));

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["Content-Type", "accept"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut headers: Headers = [("Host", "a"), ("Content-Length", "1")].into_iter().collect();
        headers.insert("host", "b");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, [("Host", "b"), ("Content-Length", "1")]);
        assert_eq!(headers.remove("HOST"), Some("b".to_owned()));
        assert!(!headers.contains("host"));
    }

    #[test]
    fn token_lookup() {
        let mut headers = Headers::new();
        headers.insert("Connection", "Keep-Alive, Upgrade");
        assert!(headers.has_token("connection", "keep-alive"));
        assert!(headers.has_token("connection", "upgrade"));
        assert!(!headers.has_token("connection", "close"));
    }

    #[test]
    fn cookies_split_and_dedup() {
        let mut cookies = CookieHeaders::new();
        cookies.insert_raw("a=1, b=2");
        cookies.insert_raw("b=2");
        cookies.insert_raw("c=3; Path=/");

        let all: Vec<_> = cookies.iter().collect();
        assert_eq!(all, ["a=1", "b=2", "c=3; Path=/"]);
    }

    #[test]
    fn cookie_expires_attribute_is_not_split() {
        let mut cookies = CookieHeaders::new();
        cookies.insert_raw("id=a3fWa; Expires=Wed, 21 Oct 2015 07:28:00 GMT, lang=en");

        let all: Vec<_> = cookies.iter().collect();
        assert_eq!(all, ["id=a3fWa; Expires=Wed, 21 Oct 2015 07:28:00 GMT", "lang=en"]);
    }

    #[test]
    fn segment_without_name_joins_previous_cookie() {
        let mut cookies = CookieHeaders::new();
        cookies.insert_raw("a=1, foo");
        assert_eq!(cookies.iter().collect::<Vec<_>>(), ["a=1, foo"]);
    }
}
