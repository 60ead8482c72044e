//! Execution contexts: the surfaces computations and callbacks run on.
//!
//! An [`Executor`] owns every surface: one serialized `main` queue, a worker
//! pool per [`Priority`] class, caller-named serial queues, and a timer
//! thread. A [`Context`] is a cheap cloneable handle to exactly one surface;
//! futures take contexts by reference and never reach for ambient globals,
//! so the surface a computation runs on is always visible at the call site.
//!
//! # Ordering
//!
//! Work submitted to the same serialized surface runs in FIFO order. Pool
//! surfaces and distinct surfaces give no relative ordering guarantee.

mod builder;
mod executor;
mod pool;
mod serial;
mod timer;

pub use builder::ExecutorBuilder;
pub use executor::{Executor, ShutdownError};

use pool::WorkerPool;
use serial::SerialQueue;
use std::fmt;
use std::time::Duration;
use timer::Timer;

/// A unit of work handed to an execution surface.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Priority class of a concurrent execution surface.
///
/// Each class maps to its own worker pool; the class expresses intent and
/// thread naming, not a strict scheduling relationship between pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Latency-sensitive work the caller is actively waiting on.
    High,
    /// The ordinary class for asynchronous computations.
    Default,
    /// Work that can yield to the other classes.
    Low,
    /// Bulk or maintenance work with no latency expectation.
    Background,
}

impl Priority {
    /// All classes, in descending priority order.
    pub const ALL: [Self; 4] = [Self::High, Self::Default, Self::Low, Self::Background];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Default => 1,
            Self::Low => 2,
            Self::Background => 3,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Default => "default",
            Self::Low => "low",
            Self::Background => "background",
        }
    }
}

/// A handle to one execution surface.
///
/// Submitting work never blocks: `submit` enqueues and returns. Contexts stay
/// valid after their [`Executor`] shuts down, but jobs submitted to a
/// shut-down surface are dropped.
#[derive(Clone)]
pub struct Context {
    dispatch: Dispatch,
    timer: Option<Timer>,
}

#[derive(Clone)]
enum Dispatch {
    Serial(SerialQueue),
    Pool(WorkerPool),
    /// Runs the job on the submitting thread. Reserved for combinator
    /// bookkeeping; never handed out publicly, so observer callbacks keep
    /// their always-asynchronous delivery guarantee.
    Immediate,
}

impl Context {
    pub(crate) fn serial(queue: SerialQueue, timer: Timer) -> Self {
        Self {
            dispatch: Dispatch::Serial(queue),
            timer: Some(timer),
        }
    }

    pub(crate) fn pooled(pool: WorkerPool, timer: Timer) -> Self {
        Self {
            dispatch: Dispatch::Pool(pool),
            timer: Some(timer),
        }
    }

    /// Surface that runs jobs inline on the submitting thread.
    pub(crate) const fn immediate() -> Self {
        Self {
            dispatch: Dispatch::Immediate,
            timer: None,
        }
    }

    /// Submits a job for asynchronous execution on this surface.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.submit_boxed(Box::new(job));
    }

    /// Submits a job to run once `delay` has elapsed.
    ///
    /// A zero delay submits directly, skipping the timer thread.
    pub fn submit_after(&self, delay: Duration, job: impl FnOnce() + Send + 'static) {
        if delay.is_zero() {
            self.submit_boxed(Box::new(job));
            return;
        }
        match &self.timer {
            Some(timer) => timer.schedule(delay, self.clone(), Box::new(job)),
            // Only the immediate surface has no timer; it is internal and
            // never used with a delay.
            None => self.submit_boxed(Box::new(job)),
        }
    }

    pub(crate) fn submit_boxed(&self, job: Job) {
        match &self.dispatch {
            Dispatch::Serial(queue) => queue.submit(job),
            Dispatch::Pool(pool) => pool.submit(job),
            Dispatch::Immediate => job(),
        }
    }

    /// The name of the underlying surface, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.dispatch {
            Dispatch::Serial(queue) => queue.name(),
            Dispatch::Pool(pool) => pool.name(),
            Dispatch::Immediate => "immediate",
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("name", &self.name()).finish()
    }
}
