//! The future/promise pair: a single-assignment result cell with observers.
//!
//! A [`Future`] is the read side of one asynchronous result. It starts
//! pending, transitions to resolved exactly once, and is immutable after
//! that. Any number of observers may register interest; each is notified
//! exactly once, on the execution surface it asked for, no matter how the
//! race between registration and completion plays out.
//!
//! # Completion
//!
//! Exactly one of these resolves a future, whichever comes first:
//!
//! - the computation passed to [`Future::create`] calls its [`Completer`]
//! - the paired [`Promise`](crate::future::Promise) is resolved or rejected
//! - an attached [`CancellationToken`](crate::cancel::CancellationToken)
//!   fires, failing the future with a cancellation error
//!
//! The losers of that race become no-ops through the single-assignment rule.
//!
//! # Delivery
//!
//! Observer callbacks never run on the caller's stack at registration time,
//! even when the future is already resolved; delivery always goes through
//! the observer's context. Adapter transforms ([`Future::map`] and friends)
//! are the exception by design: they run inline on whichever surface
//! resolved the source future.

mod observer;
mod promise;

pub use promise::{Completer, Promise};

use observer::Observer;
use smallvec::SmallVec;
use std::mem;
use std::sync::{Arc, Mutex, Weak};

use crate::cancel::{CancellationToken, TokenInner};
use crate::context::Context;
use crate::error::{Error, Result};

/// State behind one future: the cell, its observers, and a non-owning link
/// to the cancellation token.
pub(crate) struct Shared<T> {
    cell: Mutex<CellState<T>>,
    /// Weak so a future never extends its token's lifetime; the token side
    /// holds the strong references to interested cells instead.
    token: Mutex<Option<Weak<TokenInner>>>,
}

struct CellState<T> {
    /// Single-assignment: once `Some`, never changes.
    cached: Option<Result<T>>,
    /// Observers registered before completion, in registration order.
    /// Drained exactly once when the cell is written; late registrations are
    /// dispatched directly and never join the list.
    observers: SmallVec<[Observer<T>; 2]>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn pending() -> Self {
        Self {
            cell: Mutex::new(CellState {
                cached: None,
                observers: SmallVec::new(),
            }),
            token: Mutex::new(None),
        }
    }

    fn resolved_with(result: Result<T>) -> Self {
        Self {
            cell: Mutex::new(CellState {
                cached: Some(result),
                observers: SmallVec::new(),
            }),
            token: Mutex::new(None),
        }
    }

    /// The write path. Sets the cell if and only if it is still empty, then
    /// drains and dispatches every registered observer.
    ///
    /// This critical section is the only place the write-once and
    /// drain-exactly-once invariants are enforced together; it is atomic
    /// with respect to concurrent [`Shared::add_observer`] calls.
    pub(crate) fn send(&self, result: Result<T>) {
        let observers = {
            let mut cell = self.cell.lock().unwrap();
            if cell.cached.is_some() {
                return;
            }
            cell.cached = Some(result.clone());
            mem::take(&mut cell.observers)
        };
        // Lock released: dispatch submits to other surfaces and, for
        // combinator-internal observers, may run callbacks inline.
        for observer in observers {
            observer.notify(&result);
        }
    }

    /// Appends an observer if the cell is still pending, otherwise
    /// dispatches it right away with the cached result.
    fn add_observer(&self, observer: Observer<T>) {
        let ready = {
            let mut cell = self.cell.lock().unwrap();
            match cell.cached.clone() {
                Some(result) => Some((observer, result)),
                None => {
                    cell.observers.push(observer);
                    None
                }
            }
        };
        if let Some((observer, result)) = ready {
            observer.notify(&result);
        }
    }

    fn peek(&self) -> Option<Result<T>> {
        self.cell.lock().unwrap().cached.clone()
    }
}

/// A read-handle to a computation's eventual result.
///
/// Cloning is cheap and shares the same underlying cell. The result type
/// must be `Clone` because a resolved future fans its value out to every
/// observer.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Schedules `compute` on `context` and returns a pending future for its
    /// result.
    ///
    /// The computation receives a [`Completer`] it must eventually invoke,
    /// plus the token, so long-running work can observe cancellation and
    /// abort early. If `token` fires before the computation completes, the
    /// future fails with a cancellation error and the computation's own
    /// completion becomes a no-op.
    pub fn create<F>(context: &Context, token: Option<&CancellationToken>, compute: F) -> Self
    where
        F: FnOnce(Completer<T>, Option<CancellationToken>) + Send + 'static,
    {
        let future = Self::pending();
        if let Some(token) = token {
            future.attach_cancellation(token);
        }
        let completer = Completer::new(Arc::clone(&future.shared));
        let token = token.cloned();
        context.submit(move || compute(completer, token));
        future
    }

    /// A future already resolved with `value`. No scheduling occurs.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// A future already failed with `error`. No scheduling occurs.
    #[must_use]
    pub fn failed(error: Error) -> Self {
        Self::from_result(Err(error))
    }

    /// A future already completed with `result`. No scheduling occurs.
    #[must_use]
    pub fn from_result(result: Result<T>) -> Self {
        Self {
            shared: Arc::new(Shared::resolved_with(result)),
        }
    }

    /// A future with no cached result and no scheduled computation. It
    /// resolves only once a [`Completer`] for it is invoked or an attached
    /// token fires.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            shared: Arc::new(Shared::pending()),
        }
    }

    /// Non-blocking read of the cached result, if the future has resolved.
    #[must_use]
    pub fn peek(&self) -> Option<Result<T>> {
        self.shared.peek()
    }

    /// True once the future has resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.shared.cell.lock().unwrap().cached.is_some()
    }

    /// Registers a callback for the full result, delivered on `context`.
    ///
    /// The callback fires exactly once: either when the future resolves, or
    /// immediately (still asynchronously) if it already has. Returns `self`
    /// for chaining.
    pub fn on_result<F>(&self, context: &Context, callback: F) -> &Self
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.shared.add_observer(Observer::Result {
            context: context.clone(),
            callback: Box::new(callback),
        });
        self
    }

    /// Registers a callback invoked only on success, delivered on `context`.
    pub fn on_success<F>(&self, context: &Context, callback: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.shared.add_observer(Observer::Success {
            context: context.clone(),
            callback: Box::new(callback),
        });
        self
    }

    /// Registers a callback invoked only on failure, delivered on `context`.
    ///
    /// Cancellation arrives here too, as an error of kind
    /// [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).
    pub fn on_error<F>(&self, context: &Context, callback: F) -> &Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.shared.add_observer(Observer::Failure {
            context: context.clone(),
            callback: Box::new(callback),
        });
        self
    }

    /// Transforms a success synchronously; failures pass through unchanged.
    ///
    /// The derived future inherits this future's cancellation token. The
    /// transform runs inline on whichever surface resolves this future.
    pub fn map<U, F>(&self, transform: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let derived = Future::<U>::pending();
        if let Some(token) = self.cancellation_token() {
            derived.attach_cancellation(&token);
        }
        let target = derived.clone();
        self.on_result_internal(move |result| target.send(result.map(transform)));
        derived
    }

    /// On success, starts the future produced by `transform` and forwards
    /// its eventual result; failures pass through without invoking
    /// `transform`.
    ///
    /// This future's token is also attached to the inner future, merging
    /// cancellation sources rather than replacing whatever token the inner
    /// future already carries.
    pub fn flat_map<U, F>(&self, transform: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let token = self.cancellation_token();
        let derived = Future::<U>::pending();
        if let Some(token) = &token {
            derived.attach_cancellation(token);
        }
        let target = derived.clone();
        self.on_result_internal(move |result| match result {
            Ok(value) => {
                let inner = transform(value);
                if let Some(token) = &token {
                    inner.attach_cancellation(token);
                }
                inner.on_result_internal(move |inner_result| target.send(inner_result));
            }
            Err(error) => target.send(Err(error)),
        });
        derived
    }

    /// On failure, starts the replacement future produced by `transform` and
    /// forwards its result; successes pass through.
    ///
    /// `transform` runs on `context`, since recovery typically starts fresh
    /// work.
    pub fn recover<F>(&self, context: &Context, transform: F) -> Self
    where
        F: FnOnce(Error) -> Self + Send + 'static,
    {
        let token = self.cancellation_token();
        let derived = Self::pending();
        if let Some(token) = &token {
            derived.attach_cancellation(token);
        }
        let target = derived.clone();
        self.on_result(context, move |result| match result {
            Ok(value) => target.send(Ok(value)),
            Err(error) => {
                let replacement = transform(error);
                if let Some(token) = &token {
                    replacement.attach_cancellation(token);
                }
                replacement.on_result_internal(move |inner_result| target.send(inner_result));
            }
        });
        derived
    }

    /// On failure, resolves to `value` instead; successes pass through.
    pub fn recover_default(&self, context: &Context, value: T) -> Self {
        self.recover(context, move |_| Self::resolved(value))
    }

    /// Unconditionally feeds the result to `transform` and forwards the
    /// replacement future's result, success or failure alike.
    pub fn then<U, F>(&self, transform: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> Future<U> + Send + 'static,
    {
        let token = self.cancellation_token();
        let derived = Future::<U>::pending();
        if let Some(token) = &token {
            derived.attach_cancellation(token);
        }
        let target = derived.clone();
        self.on_result_internal(move |result| {
            let replacement = transform(result);
            if let Some(token) = &token {
                replacement.attach_cancellation(token);
            }
            replacement.on_result_internal(move |inner_result| target.send(inner_result));
        });
        derived
    }

    /// Links this future to `token`: if the token fires first, the future
    /// fails with a cancellation error.
    ///
    /// Attaching more than one token merges them. Every attached token can
    /// fail the future; the single-assignment rule makes the first one win.
    /// The most recently attached token is the one derived futures inherit.
    pub fn attach_cancellation(&self, token: &CancellationToken) {
        {
            let mut slot = self.shared.token.lock().unwrap();
            *slot = Some(token.downgrade());
        }
        let shared = Arc::clone(&self.shared);
        token.on_cancelled_internal(move || shared.send(Err(Error::cancelled())));
    }

    /// The token most recently attached to this future, if it is still
    /// alive.
    #[must_use]
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.shared
            .token
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(CancellationToken::from_inner)
    }

    /// Write path used by [`Completer`], [`Promise`], combinators, and
    /// cancellation. Idempotent.
    pub(crate) fn send(&self, result: Result<T>) {
        self.shared.send(result);
    }

    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    /// Observer with immediate delivery, for combinator bookkeeping only.
    pub(crate) fn on_result_internal<F>(&self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.shared.add_observer(Observer::Result {
            context: Context::immediate(),
            callback: Box::new(callback),
        });
    }

    pub(crate) fn on_success_internal<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.shared.add_observer(Observer::Success {
            context: Context::immediate(),
            callback: Box::new(callback),
        });
    }

    pub(crate) fn on_error_internal<F>(&self, callback: F)
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.shared.add_observer(Observer::Failure {
            context: Context::immediate(),
            callback: Box::new(callback),
        });
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("handles", &Arc::strong_count(&self.shared))
            .finish()
    }
}
