use std::time::{Duration, Instant};

/// An absolute point in time after which a blocking stream call fails with
/// [`StreamError::Timeout`](crate::protocol::StreamError::Timeout).
///
/// Deadlines are absolute so one budget can be threaded through a sequence of
/// calls; a caller that wants to abort early passes an already elapsed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never elapses.
    pub const fn never() -> Self {
        Self { at: None }
    }

    pub const fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn after(timeout: Duration) -> Self {
        // overflow means "further than we can represent", which is never
        Self { at: Instant::now().checked_add(timeout) }
    }

    /// A deadline that has already elapsed.
    pub fn now() -> Self {
        Self::at(Instant::now())
    }

    pub fn is_elapsed(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before the deadline, `None` when it never elapses.
    /// Returns `Some(Duration::ZERO)` once elapsed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::never()
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Self::at(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_and_remaining() {
        assert!(!Deadline::never().is_elapsed());
        assert_eq!(Deadline::never().remaining(), None);

        assert!(Deadline::now().is_elapsed());
        assert_eq!(Deadline::now().remaining(), Some(Duration::ZERO));

        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_elapsed());
        assert!(deadline.remaining().is_some_and(|left| left > Duration::from_secs(30)));
    }
}
