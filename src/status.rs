//! Stream health tracking.
//!
//! Every reader and writer carries a [`Status`]. A stream starts healthy
//! and latches unhealthy on the first failure or on [`Status::mark_closed`];
//! once unhealthy, mutating operations short-circuit and return `false`.

use core::fmt;

/// Terminal failure recorded on a stream.
///
/// The protocol reports failures through return values and the stream's
/// health flag rather than `Result`s; this type carries the human-readable
/// reason and lifts into [`std::io::Error`] at an I/O boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StreamError {
    message: Box<str>,
}

impl StreamError {
    fn new(message: impl Into<Box<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<StreamError> for std::io::Error {
    fn from(err: StreamError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err)
    }
}

/// Health state of a stream: healthy, closed, or failed.
#[derive(Debug, Default)]
pub struct Status {
    closed: bool,
    error: Option<StreamError>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the stream accepts further operations.
    #[inline]
    pub fn healthy(&self) -> bool {
        !self.closed && self.error.is_none()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// Reason the stream became unhealthy; empty while healthy.
    pub fn message(&self) -> &str {
        match &self.error {
            Some(err) => err.message(),
            None if self.closed => "stream closed",
            None => "",
        }
    }

    /// Records a failure. The first failure wins; later ones are dropped.
    ///
    /// Returns `false` so slow paths can `return status.fail(..)`.
    pub fn fail(&mut self, message: impl Into<Box<str>>) -> bool {
        if self.error.is_none() {
            self.error = Some(StreamError::new(message));
        }
        false
    }

    /// Records the position-overflow failure.
    pub fn fail_overflow(&mut self) -> bool {
        self.fail("Stream position overflow")
    }

    /// Marks the stream closed. A recorded failure survives the transition.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.healthy() {
            write!(f, "healthy")
        } else {
            write!(f, "{}", self.message())
        }
    }
}
