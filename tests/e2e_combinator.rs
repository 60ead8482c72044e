//! End-to-end combinator semantics: joins, races, pairs, and retries.

mod common;

use common::{recv, test_executor};
use pledge::{
    all, all_completed, first_resolved, parallelize, retrying, Completer, Error, ErrorKind, Future,
    Promise,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

#[test]
fn all_with_empty_input_resolves_to_empty() {
    let joined: Future<Vec<u8>> = all(Vec::new());
    assert_eq!(joined.peek().unwrap().unwrap(), Vec::<u8>::new());

    let completed: Future<Vec<pledge::Result<u8>>> = all_completed(Vec::new());
    assert!(completed.peek().unwrap().unwrap().is_empty());
}

#[test]
fn all_fails_when_exactly_one_member_fails() {
    let executor = test_executor();
    let ctx = executor.background();
    let (tx, rx) = mpsc::channel();

    let futures: Vec<Future<usize>> = (0..5)
        .map(|i| {
            Future::create(&ctx, None, move |completer, _| {
                if i == 3 {
                    completer.reject(Error::other("slot 3 broke"));
                } else {
                    completer.resolve(i);
                }
            })
        })
        .collect();

    all(futures).on_result(&executor.main(), move |result| tx.send(result).unwrap());

    let error = recv(&rx).unwrap_err();
    assert_eq!(error.message(), Some("slot 3 broke"));
}

#[test]
fn all_completed_reports_every_slot_even_with_failures() {
    let executor = test_executor();
    let ctx = executor.background();
    let (tx, rx) = mpsc::channel();

    let futures: Vec<Future<usize>> = (0..5)
        .map(|i| {
            Future::create(&ctx, None, move |completer, _| {
                if i == 3 {
                    completer.reject(Error::other("slot 3 broke"));
                } else {
                    completer.resolve(i * 100);
                }
            })
        })
        .collect();

    all_completed(futures).on_result(&executor.main(), move |result| tx.send(result).unwrap());

    let outcomes = recv(&rx).unwrap();
    assert_eq!(outcomes.len(), 5);
    let failures = outcomes.iter().filter(|r| r.is_err()).count();
    assert_eq!(failures, 1);
    assert!(outcomes[3].is_err());
    assert_eq!(outcomes[4].as_ref().unwrap(), &400);
}

#[test]
fn first_resolved_prefers_success_over_failure() {
    let executor = test_executor();
    let failing: Promise<i32> = Promise::new();
    let succeeding: Promise<i32> = Promise::new();
    let (tx, rx) = mpsc::channel();

    first_resolved([failing.future(), succeeding.future()])
        .on_result(&executor.main(), move |result| tx.send(result).unwrap());

    failing.reject(Error::other("first to report, still loses"));
    succeeding.resolve(7);

    assert_eq!(recv(&rx).unwrap(), 7);
}

#[test]
fn first_resolved_aggregates_when_everything_fails() {
    let executor = test_executor();
    let a: Promise<i32> = Promise::new();
    let b: Promise<i32> = Promise::new();
    let (tx, rx) = mpsc::channel();

    first_resolved([a.future(), b.future()])
        .on_result(&executor.main(), move |result| tx.send(result).unwrap());

    a.reject(Error::other("a down"));
    b.reject(Error::other("b down"));

    let error = recv(&rx).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AllFailed);
}

#[test]
fn parallelize_joins_mixed_types_from_real_surfaces() {
    let executor = test_executor();
    let (tx, rx) = mpsc::channel();

    let count = Future::create(&executor.background(), None, |completer, _| {
        completer.resolve(3_usize);
    });
    let label = Future::create(&executor.serial("labels"), None, |completer, _| {
        completer.resolve("thumbnails".to_owned());
    });

    parallelize(count, label).on_result(&executor.main(), move |result| tx.send(result).unwrap());

    let (n, s) = recv(&rx).unwrap();
    assert_eq!((n, s.as_str()), (3, "thumbnails"));
}

#[test]
fn retrying_exhausts_attempts_with_flat_zero_delay() {
    let executor = test_executor();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts2 = Arc::clone(&attempts);
    let (tx, rx) = mpsc::channel();

    retrying(
        &executor.background(),
        2,
        Duration::ZERO,
        None,
        |_| true,
        move |completer: Completer<()>, _| {
            attempts2.fetch_add(1, Ordering::SeqCst);
            completer.reject(Error::other("still down"));
        },
    )
    .on_result(&executor.main(), move |result| tx.send(result).unwrap());

    assert!(recv(&rx).is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn retrying_stops_immediately_when_vetoed() {
    let executor = test_executor();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts2 = Arc::clone(&attempts);
    let (tx, rx) = mpsc::channel();

    let started = std::time::Instant::now();
    retrying(
        &executor.background(),
        3,
        Duration::from_secs(10),
        None,
        |_| false,
        move |completer: Completer<()>, _| {
            attempts2.fetch_add(1, Ordering::SeqCst);
            completer.reject(Error::other("permanent"));
        },
    )
    .on_result(&executor.main(), move |result| tx.send(result).unwrap());

    let error = recv(&rx).unwrap_err();
    assert_eq!(error.message(), Some("permanent"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    // Vetoed retries never touch the delay schedule.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn retrying_recovers_when_an_attempt_finally_succeeds() {
    let executor = test_executor();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts2 = Arc::clone(&attempts);
    let (tx, rx) = mpsc::channel();

    retrying(
        &executor.background(),
        4,
        Duration::from_millis(10),
        None,
        |_| true,
        move |completer, _| {
            let n = attempts2.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 3 {
                completer.resolve("finally");
            } else {
                completer.reject(Error::other("flaky"));
            }
        },
    )
    .on_result(&executor.main(), move |result| tx.send(result).unwrap());

    assert_eq!(recv(&rx).unwrap(), "finally");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Join results always come back in input order, whatever the values.
    #[test]
    fn all_preserves_input_order(values in proptest::collection::vec(any::<i64>(), 0..24)) {
        let futures: Vec<Future<i64>> = values.iter().copied().map(Future::resolved).collect();
        let joined = all(futures);
        // Members are pre-resolved, so the join is too.
        let collected = joined.peek().unwrap().unwrap();
        prop_assert_eq!(collected, values);
    }

    /// The per-slot report of `all_completed` matches each member's own
    /// outcome at the same index.
    #[test]
    fn all_completed_is_index_stable(outcomes in proptest::collection::vec(any::<bool>(), 0..24)) {
        let futures: Vec<Future<usize>> = outcomes
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                if *ok {
                    Future::resolved(i)
                } else {
                    Future::failed(Error::other(format!("slot {i}")))
                }
            })
            .collect();

        let collected = all_completed(futures).peek().unwrap().unwrap();
        prop_assert_eq!(collected.len(), outcomes.len());
        for (i, ok) in outcomes.iter().enumerate() {
            prop_assert_eq!(collected[i].is_ok(), *ok);
            if *ok {
                prop_assert_eq!(collected[i].as_ref().unwrap(), &i);
            }
        }
    }
}
