//! Pledge: a callback-based future/promise primitive with cancellation,
//! combinators, and a pluggable execution-context model.
//!
//! # Overview
//!
//! A [`Future`] is a single-assignment result cell shared across threads:
//! it resolves exactly once, to either a value or an error, and notifies
//! every registered observer exactly once on the execution surface that
//! observer asked for. The matching [`Promise`] is the write-once producer
//! handle. [`CancellationToken`] threads a one-shot, cooperative cancel
//! signal through chains of derived futures, and the combinators compose
//! many futures into one with precise join/race/retry semantics.
//!
//! Computations and callbacks run on [`Context`] surfaces owned by an
//! [`Executor`]: one serialized FIFO queue, priority-classed worker pools,
//! and caller-named serial queues. There are no globals; everything that
//! runs somewhere was handed the surface explicitly.
//!
//! # Core guarantees
//!
//! - **Write once**: a resolved future's value never changes; losers of the
//!   complete/cancel race are no-ops
//! - **Notify exactly once**: every observer fires once, never zero times,
//!   never twice, regardless of registration/completion races
//! - **Always asynchronous**: observer callbacks are dispatched on their
//!   requested surface even when the future was already resolved, never
//!   reentrantly on the registering stack
//! - **Cancellation is an error, not a channel**: a fired token fails the
//!   future with a cancellation error that flows through the same
//!   observers and `recover` handlers as any other failure
//!
//! # Example
//!
//! ```
//! use pledge::{Executor, Future};
//!
//! let executor = Executor::new();
//! let (tx, rx) = std::sync::mpsc::channel();
//!
//! Future::create(&executor.background(), None, |completer, _| {
//!     completer.resolve(6 * 7);
//! })
//! .map(|n| n + 1)
//! .on_success(&executor.main(), move |n| {
//!     tx.send(n).unwrap();
//! });
//!
//! assert_eq!(rx.recv().unwrap(), 43);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod cancel;
pub mod combinator;
pub mod context;
pub mod error;
pub mod future;

pub use cancel::CancellationToken;
pub use combinator::{
    all, all_completed, delayed, first_resolved, parallelize, retrying, retrying_with_backoff,
    Backoff, DelayedOperation,
};
pub use context::{Context, Executor, ExecutorBuilder, Priority, ShutdownError};
pub use error::{Error, ErrorKind, Result};
pub use future::{Completer, Future, Promise};
