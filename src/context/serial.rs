//! Serialized execution surface backed by a dedicated thread.
//!
//! Jobs submitted to one serial queue run in FIFO order, one at a time.
//! Different queues give no ordering guarantee relative to each other.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::Job;

/// A cloneable handle to a serialized FIFO queue with its own worker thread.
#[derive(Clone)]
pub(crate) struct SerialQueue {
    inner: Arc<SerialInner>,
}

struct SerialInner {
    name: String,
    state: Mutex<SerialState>,
    condvar: Condvar,
    /// True while the worker thread is inside its loop.
    running: AtomicBool,
}

struct SerialState {
    queue: VecDeque<Job>,
    shutdown: bool,
}

impl SerialQueue {
    /// Spawns the worker thread and returns a handle to the queue.
    pub(crate) fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let inner = Arc::new(SerialInner {
            name: name.clone(),
            state: Mutex::new(SerialState {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let worker = Arc::clone(&inner);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || serial_worker_loop(&worker));
        if let Err(err) = spawned {
            inner.running.store(false, Ordering::Release);
            tracing::warn!(queue = %name, %err, "failed to spawn serial queue thread");
        }

        Self { inner }
    }

    /// Enqueues a job. Jobs run in submission order.
    ///
    /// After shutdown the job is dropped.
    pub(crate) fn submit(&self, job: Job) {
        let mut state = self.inner.state.lock().unwrap();
        if state.shutdown || !self.inner.running.load(Ordering::Acquire) {
            drop(state);
            tracing::warn!(queue = %self.inner.name, "job submitted to a shut-down serial queue, dropping");
            return;
        }
        state.queue.push_back(job);
        drop(state);
        self.inner.condvar.notify_one();
    }

    pub(crate) fn name(&self) -> &str {
        &self.inner.name
    }

    /// Stops accepting jobs. Already-queued jobs still run.
    pub(crate) fn shutdown(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.shutdown = true;
        drop(state);
        self.inner.condvar.notify_all();
    }

    /// Initiates shutdown and waits for the queue to drain.
    ///
    /// Returns `true` if the worker exited before the deadline.
    pub(crate) fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let deadline = Instant::now() + timeout;
        while self.inner.running.load(Ordering::Acquire) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.inner.condvar.notify_all();
            thread::sleep(Duration::from_millis(5).min(remaining));
        }
        true
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("name", &self.inner.name)
            .field("running", &self.inner.running.load(Ordering::Relaxed))
            .finish()
    }
}

fn serial_worker_loop(inner: &SerialInner) {
    tracing::trace!(queue = %inner.name, "serial queue thread started");
    loop {
        let job = {
            let mut state = inner.state.lock().unwrap();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    break Some(job);
                }
                if state.shutdown {
                    break None;
                }
                state = inner.condvar.wait(state).unwrap();
            }
        };

        match job {
            Some(job) => job(),
            None => break,
        }
    }
    inner.running.store(false, Ordering::Release);
    tracing::trace!(queue = %inner.name, "serial queue thread exited");
}
