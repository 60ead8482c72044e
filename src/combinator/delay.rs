//! Delay primitives: timed futures and deferred operations.

use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::context::Context;
use crate::future::{Future, Promise};

/// A future that resolves to `()` once `duration` has elapsed on the
/// context's timer.
///
/// If `token` fires before the deadline, the future fails with a
/// cancellation error right away rather than waiting the delay out. The
/// timer entry itself is not withdrawn; when it fires later it finds the
/// cell already written and does nothing.
pub fn delayed(
    context: &Context,
    duration: Duration,
    token: Option<&CancellationToken>,
) -> Future<()> {
    let promise = Promise::new();
    let future = promise.future();
    if let Some(token) = token {
        future.attach_cancellation(token);
    }
    context.submit_after(duration, move || promise.resolve(()));
    future
}

/// A deferred computation behind a delay.
///
/// `run` starts the delay and invokes the factory only after it elapses;
/// `cancel` trips the token, short-circuiting the delay so the factory is
/// never called. Consuming `run(self)` makes "factory runs at most once"
/// structural.
pub struct DelayedOperation<T> {
    factory: Box<dyn FnOnce() -> Future<T> + Send>,
    token: CancellationToken,
    delay: Future<()>,
}

impl<T: Clone + Send + 'static> DelayedOperation<T> {
    /// Pairs `factory` with a delay on `context`.
    ///
    /// Without an explicit token the operation creates its own, so
    /// [`DelayedOperation::cancel`] always has something to fire.
    pub fn new<F>(
        context: &Context,
        delay: Duration,
        token: Option<&CancellationToken>,
        factory: F,
    ) -> Self
    where
        F: FnOnce() -> Future<T> + Send + 'static,
    {
        let token = token.cloned().unwrap_or_default();
        let delay = delayed(context, delay, Some(&token));
        Self {
            factory: Box::new(factory),
            token,
            delay,
        }
    }

    /// Fires the operation's token. The pending delay resolves to a
    /// cancellation failure and the factory will not run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The token governing this operation.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Starts waiting. Returns the future for the deferred computation's
    /// result; on the cancelled path the factory is skipped and the
    /// cancellation failure is forwarded instead.
    pub fn run(self) -> Future<T> {
        let factory = self.factory;
        self.delay.flat_map(move |()| factory())
    }
}

impl<T> std::fmt::Debug for DelayedOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedOperation")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
