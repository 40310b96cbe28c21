//! Response status: numeric code plus reason phrase.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
    reason_phrase: String,
}

impl Status {
    pub fn new<S: Into<String>>(code: u16, reason_phrase: S) -> Self {
        Self { code, reason_phrase: reason_phrase.into() }
    }

    /// Builds a status carrying the canonical reason phrase for `code`,
    /// or an empty phrase when the code has none.
    pub fn from_code(code: u16) -> Self {
        let reason = http::StatusCode::from_u16(code).ok().and_then(|status| status.canonical_reason()).unwrap_or_default();
        Self::new(code, reason)
    }

    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[inline]
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Responses with these codes never carry a body regardless of their headers.
    pub fn forbids_body(&self) -> bool {
        self.is_informational() || self.code == 204 || self.code == 304
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase)
    }
}
