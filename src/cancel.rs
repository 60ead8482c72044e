//! Cooperative cancellation tokens.
//!
//! A [`CancellationToken`] is a one-shot, shareable cancel signal threaded
//! through a chain of derived futures. Firing it does not halt work already
//! running on an execution surface; it resolves every attached future to a
//! cancellation failure, and computations embedding genuinely long-running
//! work are expected to poll [`CancellationToken::is_cancelled`] and abort
//! on their own.
//!
//! Internally cancellation is itself modeled as a future: the token owns a
//! `Promise<()>` that is rejected with a cancellation error at most once, so
//! listener registration, exactly-once delivery, and the fire/complete race
//! all reuse the single-assignment cell.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::context::Context;
use crate::error::Error;
use crate::future::Promise;

/// Shared state behind a token and all of its clones.
pub(crate) struct TokenInner {
    /// Monotone: false to true once, never reset.
    fired: AtomicBool,
    /// The cancellation signal. Rejecting it notifies every listener.
    signal: Promise<()>,
}

/// A one-shot cancellation signal.
///
/// Clones share the same signal. The token is owned jointly by whoever
/// created it and every computation it was attached to; futures themselves
/// hold it only weakly and never extend its lifetime.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Creates an unfired token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                fired: AtomicBool::new(false),
                signal: Promise::new(),
            }),
        }
    }

    /// Fires the token. The first call rejects the internal signal, which
    /// notifies every attached future and registered callback; later calls
    /// are no-ops.
    pub fn cancel(&self) {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::trace!("cancellation token fired");
        self.inner.signal.reject(Error::cancelled());
    }

    /// True once [`CancellationToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Registers a callback invoked once when the token fires, delivered
    /// asynchronously on `context`.
    ///
    /// Callbacks are dispatched in registration order, each independently;
    /// there is no cross-callback ordering guarantee beyond that. If the
    /// token already fired, the callback is dispatched immediately, still
    /// asynchronously.
    pub fn on_cancelled<F>(&self, context: &Context, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .signal
            .future()
            .on_error(context, move |_| callback());
    }

    /// Immediate-delivery registration used to wire futures to the token.
    pub(crate) fn on_cancelled_internal<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .signal
            .future()
            .on_error_internal(move |_| callback());
    }

    pub(crate) fn downgrade(&self) -> Weak<TokenInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<TokenInner>) -> Self {
        Self { inner }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("fired", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Executor;
    use crate::future::Future;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn starts_unfired() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();

        token.on_cancelled_internal(move || tx.send(()).unwrap());
        token.cancel();
        token.cancel();

        assert!(token.is_cancelled());
        rx.try_recv().unwrap();
        // One firing, not two.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clones_share_the_signal() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn late_listener_fires_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let (tx, rx) = mpsc::channel();
        token.on_cancelled_internal(move || tx.send(()).unwrap());
        rx.try_recv().unwrap();
    }

    #[test]
    fn listener_delivery_uses_context() {
        let executor = Executor::new();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();

        token.on_cancelled(&executor.main(), move || tx.send(()).unwrap());
        token.cancel();

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn attached_future_fails_when_token_fires_first() {
        let executor = Executor::new();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let future = Future::create(&executor.background(), Some(&token), move |completer, tok| {
            // Simulated long fetch: wait for the cancel, observe it, give up.
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(tok.unwrap().is_cancelled());
            completer.resolve(1);
        });

        future.on_error_internal(move |error| done_tx.send(error).unwrap());
        token.cancel();
        tx.send(()).unwrap();

        let error = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(error.is_cancelled());
        // The computation's own completion lost the race and was ignored.
        assert!(future.peek().unwrap().is_err());
    }

    #[test]
    fn computation_first_beats_token() {
        let executor = Executor::new();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();

        let future = Future::create(&executor.background(), Some(&token), |completer, _| {
            completer.resolve(5);
        });
        future.on_result_internal(move |r| tx.send(r).unwrap());

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.unwrap(), 5);

        // Firing afterwards does not rewrite the resolved cell.
        token.cancel();
        assert_eq!(future.peek().unwrap().unwrap(), 5);
    }

    #[test]
    fn future_holds_token_weakly() {
        let future: Future<i32> = Future::pending();
        {
            let token = CancellationToken::new();
            future.attach_cancellation(&token);
            assert!(future.cancellation_token().is_some());
        }
        // All strong references are gone; the future must not keep the token
        // alive.
        assert!(future.cancellation_token().is_none());
    }
}
