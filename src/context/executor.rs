//! The executor owning every execution surface.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::builder::{ExecutorBuilder, ExecutorConfig};
use super::pool::{PoolOptions, WorkerPool};
use super::serial::SerialQueue;
use super::timer::Timer;
use super::{Context, Priority};

/// Error returned when a bounded shutdown cannot drain in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    /// At least one surface still had live threads when the deadline passed.
    #[error("executor shutdown timed out after {0:?}")]
    TimedOut(Duration),
}

/// Owner of the execution surfaces: one serialized `main` queue, a worker
/// pool per [`Priority`] class, named serial queues created on demand, and
/// the timer thread.
///
/// Collaborators receive the surfaces they need as [`Context`] values through
/// their constructors; there is no global executor and no ambient lookup.
///
/// Dropping the last handle initiates a background shutdown; queued jobs
/// still run but new submissions are dropped. Use [`Executor::shutdown`] for
/// a bounded, observable drain.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    main: SerialQueue,
    pools: [WorkerPool; 4],
    named: Mutex<HashMap<String, SerialQueue>>,
    timer: Timer,
    name_prefix: String,
}

impl Executor {
    /// Creates an executor with default settings.
    #[must_use]
    pub fn new() -> Self {
        ExecutorBuilder::new().build()
    }

    /// Returns a builder for custom settings.
    #[must_use]
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::new()
    }

    pub(crate) fn from_config(config: &ExecutorConfig) -> Self {
        let prefix = config.thread_name_prefix.as_str();
        let timer = Timer::spawn(format!("{prefix}-timer"));
        let main = SerialQueue::spawn(format!("{prefix}-main"));

        let pools = Priority::ALL.map(|priority| {
            WorkerPool::new(
                format!("{prefix}-{}", priority.label()),
                PoolOptions {
                    min_threads: 0,
                    max_threads: config.pool_max_threads,
                    idle_timeout: config.idle_timeout,
                },
            )
        });

        Self {
            inner: Arc::new(ExecutorInner {
                main,
                pools,
                named: Mutex::new(HashMap::new()),
                timer,
                name_prefix: prefix.to_owned(),
            }),
        }
    }

    /// The serialized surface. There is exactly one; work submitted here runs
    /// in FIFO order on a dedicated thread.
    #[must_use]
    pub fn main(&self) -> Context {
        Context::serial(self.inner.main.clone(), self.inner.timer.clone())
    }

    /// The concurrent surface for the given priority class.
    #[must_use]
    pub fn pool(&self, priority: Priority) -> Context {
        Context::pooled(
            self.inner.pools[priority.index()].clone(),
            self.inner.timer.clone(),
        )
    }

    /// Shorthand for [`Executor::pool`] with [`Priority::Background`].
    #[must_use]
    pub fn background(&self) -> Context {
        self.pool(Priority::Background)
    }

    /// A caller-named serialized surface.
    ///
    /// The first call with a given name spawns the queue; later calls return
    /// a handle to the same queue, so all work submitted under one name runs
    /// in FIFO order no matter which handle submitted it.
    #[must_use]
    pub fn serial(&self, name: &str) -> Context {
        let mut named = self.inner.named.lock();
        let queue = named
            .entry(name.to_owned())
            .or_insert_with(|| {
                SerialQueue::spawn(format!("{}-{name}", self.inner.name_prefix))
            })
            .clone();
        drop(named);
        Context::serial(queue, self.inner.timer.clone())
    }

    /// Shuts every surface down and waits for the drain, bounded by
    /// `timeout`.
    ///
    /// Queued jobs still run; new submissions are dropped from the moment
    /// this is called.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::TimedOut`] if any surface still had live
    /// threads when the deadline passed.
    pub fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        let deadline = Instant::now() + timeout;
        let remaining = |deadline: Instant| deadline.saturating_duration_since(Instant::now());

        let mut clean = self.inner.timer.shutdown_and_wait(remaining(deadline));
        clean &= self.inner.main.shutdown_and_wait(remaining(deadline));
        for pool in &self.inner.pools {
            clean &= pool.shutdown_and_wait(remaining(deadline));
        }
        let named: Vec<SerialQueue> = self.inner.named.lock().values().cloned().collect();
        for queue in named {
            clean &= queue.shutdown_and_wait(remaining(deadline));
        }

        if clean {
            Ok(())
        } else {
            Err(ShutdownError::TimedOut(timeout))
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        // Signal-only: queued jobs drain on their own threads, nothing joins.
        self.timer.shutdown();
        self.main.shutdown();
        for pool in &self.pools {
            pool.shutdown();
        }
        for queue in self.named.lock().values() {
            queue.shutdown();
        }
        tracing::debug!(prefix = %self.name_prefix, "executor shut down");
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("prefix", &self.inner.name_prefix)
            .field("named_queues", &self.inner.named.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn main_is_fifo() {
        let executor = Executor::new();
        let main = executor.main();
        let (tx, rx) = mpsc::channel();

        for i in 0..50 {
            let tx = tx.clone();
            main.submit(move || tx.send(i).unwrap());
        }
        drop(tx);

        let seen: Vec<i32> = rx.iter().take(50).collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn same_name_is_same_queue() {
        let executor = Executor::new();
        let a = executor.serial("io");
        let b = executor.serial("io");
        let (tx, rx) = mpsc::channel();

        // Interleave submissions through both handles; one queue means the
        // combined order is still FIFO.
        for i in 0..20 {
            let tx = tx.clone();
            let ctx = if i % 2 == 0 { &a } else { &b };
            ctx.submit(move || tx.send(i).unwrap());
        }
        drop(tx);

        let seen: Vec<i32> = rx.iter().take(20).collect();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn pools_execute_work() {
        let executor = Executor::new();
        let (tx, rx) = mpsc::channel();

        for priority in Priority::ALL {
            let tx = tx.clone();
            executor.pool(priority).submit(move || tx.send(priority).unwrap());
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        seen.sort_by_key(|p| p.index());
        assert_eq!(seen, Priority::ALL.to_vec());
    }

    #[test]
    fn shutdown_is_bounded_and_clean_when_idle() {
        let executor = Executor::new();
        let (tx, rx) = mpsc::channel();
        executor.main().submit(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(executor.shutdown(Duration::from_secs(5)), Ok(()));
    }
}
