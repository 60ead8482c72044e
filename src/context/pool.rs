//! Worker pool for the concurrent execution surfaces.
//!
//! Each priority class owns one pool. Threads are spawned lazily up to
//! `max_threads` and retired when idle beyond a threshold, so an unused
//! priority class costs nothing. Submission order is FIFO through a lock-free
//! queue, but with more than one thread there is no ordering guarantee
//! between jobs.
//!
//! Shutdown is graceful: no new jobs are accepted, queued jobs still run,
//! and [`WorkerPool::shutdown_and_wait`] bounds the drain.

use crossbeam_queue::SegQueue;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::Job;

/// Default idle timeout before retiring excess threads.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A cloneable handle to a pool of worker threads.
#[derive(Clone)]
pub(crate) struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    /// Minimum number of threads to keep alive.
    min_threads: usize,
    /// Maximum number of threads allowed.
    max_threads: usize,
    /// Current number of live threads.
    active_threads: AtomicUsize,
    /// Number of threads currently executing a job.
    busy_threads: AtomicUsize,
    /// Number of queued jobs not yet picked up.
    pending_count: AtomicUsize,
    /// Monotone counter for thread names.
    next_thread_id: AtomicUsize,
    /// Work queue.
    queue: SegQueue<Job>,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Condition variable for thread parking.
    condvar: Condvar,
    /// Mutex for the condition variable.
    mutex: Mutex<()>,
    /// Idle timeout for threads above `min_threads`.
    idle_timeout: Duration,
    /// Thread name prefix.
    name: String,
    /// Join handles, drained after the workers exit.
    thread_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub(crate) struct PoolOptions {
    pub(crate) min_threads: usize,
    pub(crate) max_threads: usize,
    pub(crate) idle_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_threads: 0,
            max_threads: 4,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl WorkerPool {
    /// Creates a new pool. Threads are only spawned up front for
    /// `min_threads`; the rest appear on demand.
    pub(crate) fn new(name: impl Into<String>, options: PoolOptions) -> Self {
        let max_threads = options.max_threads.max(1).max(options.min_threads);

        let inner = Arc::new(PoolInner {
            min_threads: options.min_threads,
            max_threads,
            active_threads: AtomicUsize::new(0),
            busy_threads: AtomicUsize::new(0),
            pending_count: AtomicUsize::new(0),
            next_thread_id: AtomicUsize::new(0),
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
            idle_timeout: options.idle_timeout,
            name: name.into(),
            thread_handles: Mutex::new(Vec::new()),
        });

        let pool = Self { inner };
        for _ in 0..options.min_threads {
            spawn_thread(&pool.inner);
        }
        pool
    }

    /// Enqueues a job for execution on some pool thread.
    ///
    /// After shutdown the job is dropped.
    pub(crate) fn submit(&self, job: Job) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            tracing::warn!(pool = %self.inner.name, "job submitted to a shut-down pool, dropping");
            return;
        }

        self.inner.queue.push(job);
        self.inner.pending_count.fetch_add(1, Ordering::Relaxed);

        maybe_spawn_thread(&self.inner);
        self.notify_one();
    }

    pub(crate) fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of queued jobs not yet picked up.
    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Relaxed)
    }

    /// Number of live threads.
    #[cfg(test)]
    pub(crate) fn active_threads(&self) -> usize {
        self.inner.active_threads.load(Ordering::Relaxed)
    }

    /// Stops accepting jobs and wakes every parked thread.
    pub(crate) fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.notify_all();
    }

    /// Initiates shutdown and waits for all threads to exit.
    ///
    /// Returns `true` if the pool drained before the deadline.
    pub(crate) fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let deadline = Instant::now() + timeout;
        while self.inner.active_threads.load(Ordering::Acquire) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            // Wake any parked threads so they notice the shutdown flag.
            self.notify_all();
            thread::sleep(Duration::from_millis(5).min(remaining));
        }

        let mut handles = self.inner.thread_handles.lock().unwrap();
        for handle in handles.drain(..) {
            // Workers have already left their loop, join returns immediately.
            let _ = handle.join();
        }
        true
    }

    fn notify_one(&self) {
        let _guard = self.inner.mutex.lock().unwrap();
        self.inner.condvar.notify_one();
    }

    fn notify_all(&self) {
        let _guard = self.inner.mutex.lock().unwrap();
        self.inner.condvar.notify_all();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("max_threads", &self.inner.max_threads)
            .field(
                "active_threads",
                &self.inner.active_threads.load(Ordering::Relaxed),
            )
            .field(
                "pending_jobs",
                &self.inner.pending_count.load(Ordering::Relaxed),
            )
            .finish()
    }
}

fn spawn_thread(inner: &Arc<PoolInner>) {
    let worker = Arc::clone(inner);
    let thread_id = inner.next_thread_id.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-{}", inner.name, thread_id);

    inner.active_threads.fetch_add(1, Ordering::Relaxed);
    let spawned = thread::Builder::new().name(name).spawn(move || {
        worker_loop(&worker);
        worker.active_threads.fetch_sub(1, Ordering::Relaxed);
    });

    match spawned {
        Ok(handle) => inner.thread_handles.lock().unwrap().push(handle),
        Err(err) => {
            inner.active_threads.fetch_sub(1, Ordering::Relaxed);
            tracing::warn!(pool = %inner.name, %err, "failed to spawn pool thread");
        }
    }
}

/// Spawn another thread when every live thread is busy and work is waiting.
fn maybe_spawn_thread(inner: &Arc<PoolInner>) {
    let active = inner.active_threads.load(Ordering::Relaxed);
    let busy = inner.busy_threads.load(Ordering::Relaxed);
    let pending = inner.pending_count.load(Ordering::Relaxed);

    if active < inner.max_threads && busy >= active && pending > 0 {
        spawn_thread(inner);
    }
}

fn worker_loop(inner: &PoolInner) {
    tracing::trace!(pool = %inner.name, "pool thread started");
    loop {
        if let Some(job) = inner.queue.pop() {
            inner.pending_count.fetch_sub(1, Ordering::Relaxed);

            inner.busy_threads.fetch_add(1, Ordering::Relaxed);
            job();
            inner.busy_threads.fetch_sub(1, Ordering::Relaxed);
            continue;
        }

        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }

        let active = inner.active_threads.load(Ordering::Relaxed);
        if active > inner.min_threads {
            let guard = inner.mutex.lock().unwrap();
            // Submissions notify under this mutex; re-checking here closes
            // the window between the empty pop and the wait.
            if !inner.queue.is_empty() || inner.shutdown.load(Ordering::Acquire) {
                continue;
            }
            // Park with a timeout, then retire if still idle.
            let (_guard, wait) = inner
                .condvar
                .wait_timeout(guard, inner.idle_timeout)
                .unwrap();
            if wait.timed_out()
                && inner.queue.is_empty()
                && inner.active_threads.load(Ordering::Relaxed) > inner.min_threads
            {
                break;
            }
        } else {
            let guard = inner.mutex.lock().unwrap();
            if !inner.queue.is_empty() || inner.shutdown.load(Ordering::Acquire) {
                continue;
            }
            let _guard = inner.condvar.wait(guard).unwrap();
        }
    }
    tracing::trace!(pool = %inner.name, "pool thread exited");
}
