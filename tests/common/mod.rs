#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::sync::mpsc;
use std::sync::Once;
use std::time::Duration;

use pledge::{Executor, ExecutorBuilder};

static INIT_LOGGING: Once = Once::new();

/// Timeout applied when a test waits on a callback.
pub const WAIT: Duration = Duration::from_secs(5);

/// Initializes test logging once per process, honoring `RUST_LOG`.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A test executor with logging initialized.
pub fn test_executor() -> Executor {
    init_logging();
    ExecutorBuilder::new()
        .thread_name_prefix("pledge-test")
        .build()
}

/// Receives one value or panics with a descriptive timeout.
pub fn recv<T>(rx: &mpsc::Receiver<T>) -> T {
    rx.recv_timeout(WAIT).expect("timed out waiting for callback")
}

/// Asserts that no further value arrives within a short grace period.
pub fn assert_silent<T>(rx: &mpsc::Receiver<T>) {
    assert!(
        rx.recv_timeout(Duration::from_millis(150)).is_err(),
        "received an extra notification"
    );
}
