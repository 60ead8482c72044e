//! Heterogeneous two-future join.

use std::sync::{Arc, Mutex};

use crate::future::Future;

/// Runs two futures of different result types in parallel and joins them
/// into a pair. If either side fails, the join fails with that error.
///
/// The accumulator holds one typed slot per side, so no type erasure or
/// downcasting is involved.
pub fn parallelize<A, B>(a: Future<A>, b: Future<B>) -> Future<(A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let joined: Future<(A, B)> = Future::pending();
    let slots: Arc<Mutex<(Option<A>, Option<B>)>> = Arc::new(Mutex::new((None, None)));

    {
        let slots = Arc::clone(&slots);
        let on_value = joined.clone();
        a.on_success_internal(move |value| {
            let pair = {
                let mut slots = slots.lock().unwrap();
                slots.0 = Some(value);
                if slots.1.is_some() {
                    slots.0.take().zip(slots.1.take())
                } else {
                    None
                }
            };
            if let Some(pair) = pair {
                on_value.send(Ok(pair));
            }
        });
        let on_failure = joined.clone();
        a.on_error_internal(move |error| on_failure.send(Err(error)));
    }

    {
        let on_value = joined.clone();
        b.on_success_internal(move |value| {
            let pair = {
                let mut slots = slots.lock().unwrap();
                slots.1 = Some(value);
                if slots.0.is_some() {
                    slots.0.take().zip(slots.1.take())
                } else {
                    None
                }
            };
            if let Some(pair) = pair {
                on_value.send(Ok(pair));
            }
        });
        let on_failure = joined.clone();
        b.on_error_internal(move |error| on_failure.send(Err(error)));
    }

    joined
}
