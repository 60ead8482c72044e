//! Join combinators: wait for many futures of the same type.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::future::Future;

/// Accumulator shared by the member-future observers of one join.
///
/// Slot order is input order, so the result sequence is index-stable no
/// matter which member completes first.
struct JoinState<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

/// Joins N futures into one future of all their values, preserving input
/// order.
///
/// An empty input resolves immediately to an empty vector. The join fails
/// with the first member failure it observes without waiting for the
/// remaining members; under simultaneous failures the winner is whichever
/// one reaches the cell first. Outstanding members are left running, not
/// cancelled; cleaning up abandoned work is the caller's responsibility.
pub fn all<T, I>(futures: I) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<Future<T>> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::resolved(Vec::new());
    }

    let count = futures.len();
    let joined: Future<Vec<T>> = Future::pending();
    let state = Arc::new(Mutex::new(JoinState {
        slots: (0..count).map(|_| None).collect(),
        remaining: count,
    }));

    for (index, future) in futures.iter().enumerate() {
        let state = Arc::clone(&state);
        let on_value = joined.clone();
        future.on_success_internal(move |value| {
            let collected = {
                let mut state = state.lock().unwrap();
                if state.slots[index].is_none() {
                    state.slots[index] = Some(value);
                    state.remaining -= 1;
                }
                if state.remaining == 0 {
                    Some(state.slots.iter_mut().filter_map(Option::take).collect())
                } else {
                    None
                }
            };
            if let Some(values) = collected {
                on_value.send(Ok(values));
            }
        });

        let on_failure = joined.clone();
        future.on_error_internal(move |error| on_failure.send(Err(error)));
    }

    joined
}

/// Joins N futures into one future of their individual outcomes, preserving
/// input order.
///
/// Unlike [`all`] this waits for every member to report and never fails
/// itself; each slot carries that member's own success or failure. An empty
/// input resolves immediately to an empty vector.
pub fn all_completed<T, I>(futures: I) -> Future<Vec<Result<T>>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<Future<T>> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::resolved(Vec::new());
    }

    let count = futures.len();
    let joined: Future<Vec<Result<T>>> = Future::pending();
    let state = Arc::new(Mutex::new(JoinState {
        slots: (0..count).map(|_| None).collect(),
        remaining: count,
    }));

    for (index, future) in futures.iter().enumerate() {
        let state = Arc::clone(&state);
        let joined = joined.clone();
        future.on_result_internal(move |result| {
            let collected = {
                let mut state = state.lock().unwrap();
                if state.slots[index].is_none() {
                    state.slots[index] = Some(result);
                    state.remaining -= 1;
                }
                if state.remaining == 0 {
                    Some(state.slots.iter_mut().filter_map(Option::take).collect())
                } else {
                    None
                }
            };
            if let Some(results) = collected {
                joined.send(Ok(results));
            }
        });
    }

    joined
}
