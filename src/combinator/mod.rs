//! Combinators composing many futures into one.
//!
//! Every combinator is built from the public future primitives plus a
//! private per-invocation accumulator; none of them reaches into the
//! result cell's locking. The combinators:
//!
//! - [`all`]: join N same-typed futures, fail fast on the first failure
//! - [`all_completed`]: join N futures into their individual outcomes
//! - [`first_resolved`]: race, first success wins, all-fail aggregates
//! - [`parallelize`]: heterogeneous pair join
//! - [`delayed`]: a timed unit future, cut short by cancellation
//! - [`DelayedOperation`]: a delay fused with a deferred computation
//! - [`retrying`]: attempt/retry chains with a [`Backoff`] schedule

mod all;
mod delay;
mod first;
mod pair;
mod retry;

pub use all::{all, all_completed};
pub use delay::{delayed, DelayedOperation};
pub use first::first_resolved;
pub use pair::parallelize;
pub use retry::{retrying, retrying_with_backoff, Backoff};
