//! Registered interest in a future's result.

use crate::context::Context;
use crate::error::{Error, Result};

/// A registered callback plus its delivery context and interest kind.
///
/// Pure value type: an observer has no identity beyond its closure. Each
/// observer is notified at most once; payloads are cloned per delivery so
/// every observer owns its copy.
pub(crate) enum Observer<T> {
    /// Wants the full result, success or failure.
    Result {
        context: Context,
        callback: Box<dyn FnOnce(Result<T>) + Send>,
    },
    /// Wants successes only.
    Success {
        context: Context,
        callback: Box<dyn FnOnce(T) + Send>,
    },
    /// Wants failures only.
    Failure {
        context: Context,
        callback: Box<dyn FnOnce(Error) + Send>,
    },
}

impl<T: Clone + Send + 'static> Observer<T> {
    /// Dispatches the callback on its context if the result matches the
    /// observer's interest kind.
    pub(crate) fn notify(self, result: &Result<T>) {
        match (self, result) {
            (Self::Result { context, callback }, _) => {
                let result = result.clone();
                context.submit(move || callback(result));
            }
            (Self::Success { context, callback }, Ok(value)) => {
                let value = value.clone();
                context.submit(move || callback(value));
            }
            (Self::Failure { context, callback }, Err(error)) => {
                let error = error.clone();
                context.submit(move || callback(error));
            }
            // Interest kind does not match the outcome; drop silently.
            _ => {}
        }
    }
}
