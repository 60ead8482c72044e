//! Timer thread for deadline-based job submission.
//!
//! A single thread owns a min-heap of deadlines. When an entry becomes due
//! its job is handed to the target context, so the job itself runs on that
//! context's surface, never on the timer thread.
//!
//! Entries are never removed early. A job whose future was already resolved
//! by cancellation still fires at its deadline and becomes a no-op through
//! the single-assignment rule.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{Context, Job};

/// A cloneable handle to the timer thread.
#[derive(Clone)]
pub(crate) struct Timer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    name: String,
    state: Mutex<TimerState>,
    condvar: Condvar,
}

struct TimerState {
    heap: BinaryHeap<TimerEntry>,
    /// Tie-break so equal deadlines fire in schedule order.
    next_generation: u64,
    shutdown: bool,
    running: bool,
}

struct TimerEntry {
    deadline: Instant,
    generation: u64,
    target: Context,
    job: Job,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse ordering for a min-heap, earliest deadline first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Timer {
    /// Spawns the timer thread and returns a handle to it.
    pub(crate) fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let inner = Arc::new(TimerInner {
            name: name.clone(),
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_generation: 0,
                shutdown: false,
                running: true,
            }),
            condvar: Condvar::new(),
        });

        let worker = Arc::clone(&inner);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || timer_loop(&worker));
        if let Err(err) = spawned {
            inner.state.lock().running = false;
            tracing::warn!(timer = %name, %err, "failed to spawn timer thread");
        }

        Self { inner }
    }

    /// Schedules `job` to be submitted to `target` once `delay` has elapsed.
    pub(crate) fn schedule(&self, delay: Duration, target: Context, job: Job) {
        let deadline = Instant::now() + delay;
        let mut state = self.inner.state.lock();
        if state.shutdown || !state.running {
            drop(state);
            tracing::warn!(timer = %self.inner.name, "job scheduled on a shut-down timer, dropping");
            return;
        }
        let generation = state.next_generation;
        state.next_generation += 1;
        state.heap.push(TimerEntry {
            deadline,
            generation,
            target,
            job,
        });
        drop(state);
        self.inner.condvar.notify_one();
    }

    /// Stops the timer thread. Entries not yet due are dropped.
    pub(crate) fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.shutdown = true;
        drop(state);
        self.inner.condvar.notify_all();
    }

    /// Initiates shutdown and waits for the thread to exit.
    pub(crate) fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let deadline = Instant::now() + timeout;
        loop {
            {
                let state = self.inner.state.lock();
                if !state.running {
                    return true;
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.inner.condvar.notify_all();
            thread::sleep(Duration::from_millis(5).min(remaining));
        }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Timer")
            .field("name", &self.inner.name)
            .field("pending", &state.heap.len())
            .field("running", &state.running)
            .finish()
    }
}

fn timer_loop(inner: &TimerInner) {
    tracing::trace!(timer = %inner.name, "timer thread started");
    let mut state = inner.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        let now = Instant::now();
        match state.heap.peek().map(|entry| entry.deadline) {
            Some(deadline) if deadline <= now => {
                if let Some(entry) = state.heap.pop() {
                    drop(state);
                    entry.target.submit_boxed(entry.job);
                    state = inner.state.lock();
                }
            }
            Some(deadline) => {
                inner.condvar.wait_until(&mut state, deadline);
            }
            None => {
                inner.condvar.wait(&mut state);
            }
        }
    }
    state.running = false;
    tracing::trace!(timer = %inner.name, "timer thread exited");
}
