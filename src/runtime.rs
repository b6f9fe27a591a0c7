//! Async runtime seam.
//!
//! Every timer, timeout and lock the crate uses goes through this module so the
//! rest of the code never names the runtime directly. The HTTP stack (reqwest)
//! runs on tokio, so tokio backs all of it.

use std::future::Future;
use std::time::Duration;

/// Sleep for the specified duration without blocking the executor thread.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Run a future with a timeout.
///
/// Returns `Err(TimedOut)` if the timeout expires before the future completes.
pub async fn timeout<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimedOut)
}

/// Error returned when a timeout expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

impl std::fmt::Display for TimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimedOut {}

/// A measurement of monotonically increasing time.
///
/// Backed by tokio's clock so paused-time tests observe the same elapsed
/// durations as the timers.
#[derive(Debug, Clone, Copy)]
pub struct Instant(tokio::time::Instant);

impl Instant {
    /// Returns the current instant.
    pub fn now() -> Self {
        Instant(tokio::time::Instant::now())
    }

    /// Returns the duration elapsed since this instant was created.
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

pub use tokio::sync::Mutex;
