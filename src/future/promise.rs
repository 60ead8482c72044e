//! Write capabilities over a future's cell.

use std::sync::Arc;

use super::{Future, Shared};
use crate::error::{Error, Result};

/// The write-once counterpart to a [`Future`].
///
/// Exactly one promise exists per future created through this path. The
/// owner must eventually call [`Promise::resolve`] or [`Promise::reject`];
/// only the first call has any effect, later calls are observably ignored.
pub struct Promise<T> {
    future: Future<T>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a promise with a fresh pending future.
    #[must_use]
    pub fn new() -> Self {
        Self {
            future: Future::pending(),
        }
    }

    /// A read-handle to the paired future.
    #[must_use]
    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }

    /// Resolves the paired future with a success value.
    pub fn resolve(&self, value: T) {
        self.future.send(Ok(value));
    }

    /// Rejects the paired future with an error.
    pub fn reject(&self, error: Error) {
        self.future.send(Err(error));
    }

    /// Completes the paired future with an already-built result.
    pub fn complete(&self, result: Result<T>) {
        self.future.send(result);
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// Completion callback handed to a computation by [`Future::create`].
///
/// Clone it if the computation forks into exclusive completion paths; the
/// first effective call wins and every later call is a no-op.
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Completer<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Completes the future with a success value.
    pub fn resolve(self, value: T) {
        self.shared.send(Ok(value));
    }

    /// Completes the future with an error.
    pub fn reject(self, error: Error) {
        self.shared.send(Err(error));
    }

    /// Completes the future with an already-built result.
    pub fn complete(self, result: Result<T>) {
        self.shared.send(result);
    }
}

impl<T> std::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}
