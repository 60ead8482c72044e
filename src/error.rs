//! Error types shared by futures, tokens, and combinators.
//!
//! Failures are never thrown synchronously anywhere in this crate. Every
//! outcome, success, ordinary failure, or cancellation, travels through the
//! same result channel of a [`Future`](crate::future::Future), so `recover`
//! and `on_error` handlers observe cancellation like any other failure unless
//! they ask for it by kind.
//!
//! A future whose failure no one observes is silently dropped. That is
//! documented behavior, not a bug: there is no out-of-band failure reporting
//! channel beyond observer callbacks.

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The computation was cancelled through a
    /// [`CancellationToken`](crate::cancel::CancellationToken).
    Cancelled,
    /// Sentinel seeding a retry chain before the first real attempt has run.
    ///
    /// Never surfaces to callers: the first recovery stage always consumes it.
    Deferred,
    /// Every member of a combinator's input failed.
    AllFailed,
    /// A combinator was given no futures to wait on.
    Empty,
    /// An opaque computation failure, optionally carrying a message and an
    /// underlying source error.
    Other,
}

impl ErrorKind {
    /// Returns a short static description of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Deferred => "deferred",
            Self::AllFailed => "all futures failed",
            Self::Empty => "no futures",
            Self::Other => "computation failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type carried by every failed future.
///
/// `Error` is cheap to clone: a resolved future fans its result out to any
/// number of observers, each of which receives its own copy.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Creates the sentinel error that seeds a retry chain.
    #[must_use]
    pub(crate) const fn deferred() -> Self {
        Self::new(ErrorKind::Deferred)
    }

    /// Creates an opaque failure with a message.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other).with_message(message)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Result alias used throughout the crate and carried inside futures.
pub type Result<T> = std::result::Result<T, Error>;
