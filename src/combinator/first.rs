//! Race combinator: first success wins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::future::Future;

/// Resolves with the value of whichever input future succeeds first.
///
/// Member failures only count down; the race fails, with an aggregate
/// error, once every member has failed. A tie between simultaneous
/// successes goes to whichever reaches the cell first. An empty input fails
/// immediately.
pub fn first_resolved<T, I>(futures: I) -> Future<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<Future<T>> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::failed(Error::new(ErrorKind::Empty));
    }

    let count = futures.len();
    let winner: Future<T> = Future::pending();
    let losses = Arc::new(AtomicUsize::new(0));

    for future in &futures {
        let on_value = winner.clone();
        future.on_success_internal(move |value| on_value.send(Ok(value)));

        let on_failure = winner.clone();
        let losses = Arc::clone(&losses);
        future.on_error_internal(move |_| {
            if losses.fetch_add(1, Ordering::AcqRel) + 1 == count {
                on_failure.send(Err(Error::new(ErrorKind::AllFailed)
                    .with_message(format!("all {count} futures failed"))));
            }
        });
    }

    winner
}
