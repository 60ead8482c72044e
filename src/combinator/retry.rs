//! Retry combinator over a recovery chain.
//!
//! A retried computation is expressed as a chain of `recover` stages seeded
//! with an internal sentinel failure: the first stage consumes the sentinel
//! and launches attempt one with no delay; each later stage only runs if
//! the previous attempt failed, waits its scheduled delay, and tries again.
//! Exhausting the chain surfaces the last failure unchanged.

use std::sync::Arc;
use std::time::Duration;

use super::delay::DelayedOperation;
use crate::cancel::CancellationToken;
use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::future::{Completer, Future};

/// Delay schedule for retry attempts.
///
/// Whatever the shape, the slot before the first attempt is always zero:
/// a retrying computation starts immediately and only waits between
/// attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl Backoff {
    /// The same delay before every retry.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            multiplier: 1.0,
            max: delay,
        }
    }

    /// No delay between attempts.
    #[must_use]
    pub const fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Exponentially growing delays starting at `initial`, doubling each
    /// retry, capped at 30 seconds by default.
    #[must_use]
    pub const fn exponential(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(30),
        }
    }

    /// Sets the growth factor. Clamped to at least 1.0.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Caps the delay between any two attempts.
    #[must_use]
    pub const fn with_max_delay(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// The delay scheduled before the given zero-based attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: usize) -> Duration {
        if attempt == 0 || self.initial.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(scaled).map_or(self.max, |delay| delay.min(self.max))
    }
}

/// Runs `compute` up to `max_retries + 1` times, waiting `delay` before
/// each retry.
///
/// The first attempt starts immediately. Before each retry (never before
/// the first attempt) `should_continue` is asked about the previous
/// failure; the first `false` stops the chain and surfaces that failure
/// unchanged. If every attempt fails, the last failure is surfaced. If
/// `token` fires, in-between delays are cut short and no further attempt
/// starts.
pub fn retrying<T, F, P>(
    context: &Context,
    max_retries: usize,
    delay: Duration,
    token: Option<&CancellationToken>,
    should_continue: P,
    compute: F,
) -> Future<T>
where
    T: Clone + Send + 'static,
    F: Fn(Completer<T>, Option<CancellationToken>) + Send + Sync + 'static,
    P: Fn(&Error) -> bool + Send + Sync + 'static,
{
    retrying_with_backoff(
        context,
        max_retries,
        &Backoff::fixed(delay),
        token,
        should_continue,
        compute,
    )
}

/// [`retrying`] with an arbitrary [`Backoff`] schedule between attempts.
pub fn retrying_with_backoff<T, F, P>(
    context: &Context,
    max_retries: usize,
    backoff: &Backoff,
    token: Option<&CancellationToken>,
    should_continue: P,
    compute: F,
) -> Future<T>
where
    T: Clone + Send + 'static,
    F: Fn(Completer<T>, Option<CancellationToken>) + Send + Sync + 'static,
    P: Fn(&Error) -> bool + Send + Sync + 'static,
{
    let compute = Arc::new(compute);
    let should_continue = Arc::new(should_continue);
    let token = token.cloned();

    let mut chain: Future<T> = Future::failed(Error::deferred());
    for attempt in 0..=max_retries {
        let delay = backoff.delay_before(attempt);
        let stage_context = context.clone();
        let stage_token = token.clone();
        let compute = Arc::clone(&compute);
        let should_continue = Arc::clone(&should_continue);

        chain = chain.recover(context, move |error| {
            // The sentinel only seeds the chain; a real failure from the
            // previous attempt is what the predicate gets to veto.
            if error.kind() != ErrorKind::Deferred && !should_continue(&error) {
                return Future::failed(error);
            }
            let run_context = stage_context.clone();
            let run_token = stage_token.clone();
            DelayedOperation::new(&stage_context, delay, stage_token.as_ref(), move || {
                Future::create(&run_context, run_token.as_ref(), move |completer, tok| {
                    compute(completer, tok);
                })
            })
            .run()
        });
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Executor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn recv<T>(rx: &mpsc::Receiver<T>) -> T {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn no_delay_before_the_first_attempt() {
        let fixed = Backoff::fixed(Duration::from_secs(3));
        assert_eq!(fixed.delay_before(0), Duration::ZERO);
        assert_eq!(fixed.delay_before(1), Duration::from_secs(3));
        assert_eq!(fixed.delay_before(4), Duration::from_secs(3));

        let exponential = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(exponential.delay_before(0), Duration::ZERO);
    }

    #[test]
    fn exponential_growth_is_capped() {
        let backoff = Backoff::exponential(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4));
        assert_eq!(backoff.delay_before(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_before(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_before(3), Duration::from_secs(4));
        assert_eq!(backoff.delay_before(10), Duration::from_secs(4));
    }

    #[test]
    fn multiplier_is_clamped() {
        let backoff = Backoff::exponential(Duration::from_secs(1)).with_multiplier(0.1);
        assert_eq!(backoff.delay_before(2), Duration::from_secs(1));
    }

    #[test]
    fn exhausts_all_attempts_and_surfaces_last_failure() {
        let executor = Executor::new();
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
                let n = attempts2.fetch_add(1, Ordering::SeqCst) + 1;
                completer.reject(Error::other(format!("attempt {n} failed")));
            },
        )
        .on_result_internal(move |r| tx.send(r).unwrap());

        let error = recv(&rx).unwrap_err();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(error.message(), Some("attempt 3 failed"));
    }

    #[test]
    fn veto_stops_after_the_first_attempt() {
        let executor = Executor::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = Arc::clone(&attempts);
        let (tx, rx) = mpsc::channel();

        retrying(
            &executor.background(),
            3,
            Duration::ZERO,
            None,
            |_| false,
            move |completer: Completer<()>, _| {
                attempts2.fetch_add(1, Ordering::SeqCst);
                completer.reject(Error::other("always down"));
            },
        )
        .on_result_internal(move |r| tx.send(r).unwrap());

        let error = recv(&rx).unwrap_err();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(error.message(), Some("always down"));
    }

    #[test]
    fn succeeds_midway_without_burning_remaining_attempts() {
        let executor = Executor::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = Arc::clone(&attempts);
        let (tx, rx) = mpsc::channel();

        retrying(
            &executor.background(),
            5,
            Duration::ZERO,
            None,
            |_| true,
            move |completer, _| {
                let n = attempts2.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 2 {
                    completer.resolve(n);
                } else {
                    completer.reject(Error::other("not yet"));
                }
            },
        )
        .on_result_internal(move |r| tx.send(r).unwrap());

        assert_eq!(recv(&rx).unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let executor = Executor::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = Arc::clone(&attempts);
        let (tx, rx) = mpsc::channel();

        retrying(
            &executor.background(),
            0,
            Duration::ZERO,
            None,
            |_| true,
            move |completer: Completer<()>, _| {
                attempts2.fetch_add(1, Ordering::SeqCst);
                completer.reject(Error::other("no second chance"));
            },
        )
        .on_result_internal(move |r| tx.send(r).unwrap());

        assert!(recv(&rx).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_stops_the_chain_between_attempts() {
        let executor = Executor::new();
        let token = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = Arc::clone(&attempts);
        let token2 = token.clone();
        let (tx, rx) = mpsc::channel();

        retrying(
            &executor.background(),
            5,
            Duration::from_secs(10),
            Some(&token),
            |_| true,
            move |completer: Completer<()>, _| {
                attempts2.fetch_add(1, Ordering::SeqCst);
                // Cancel while the chain is waiting out the retry delay.
                token2.cancel();
                completer.reject(Error::other("flaky"));
            },
        )
        .on_result_internal(move |r| tx.send(r).unwrap());

        let error = recv(&rx).unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
