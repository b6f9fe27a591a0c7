//! Retry classification and bounded backoff.

use std::future::Future;
use std::time::Duration;

use log::{info, warn};

use crate::config::BridgeConfig;
use crate::errors::Error;
use crate::runtime;

type Result<T> = std::result::Result<T, Error>;

/// Whether a failed operation is worth attempting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient failure; another attempt may succeed.
    Retryable,
    /// Deterministic failure; retrying would repeat it.
    Fatal,
}

/// Classify an error as retryable or fatal.
///
/// Only transport failures and busy responses (5xx, 408, 429) are retryable.
/// Authentication, link-button and bridge protocol errors are always fatal.
pub fn classify(err: &Error) -> ErrorClass {
    match err {
        Error::Transport { .. } | Error::ServerBusy { .. } => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

/// Whether an HTTP status marks a busy or timed-out bridge.
pub fn is_busy_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Bounded retry with an explicit table of backoff delays.
///
/// An operation is attempted at most `max_retries + 1` times. The wait before
/// retry `n` is `delays[n]`, with the last entry repeating once the table runs
/// out.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hue_bridge_rs::RetryPolicy;
///
/// let policy = RetryPolicy::new(5, vec![Duration::from_secs(1), Duration::from_secs(2)]);
/// assert_eq!(policy.delay_for(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_for(4), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_RETRIES,
            Self::DEFAULT_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_DELAYS_MS: [u64; 3] = [1000, 2000, 4000];

    pub fn new(max_retries: u32, delays: Vec<Duration>) -> Self {
        RetryPolicy {
            max_retries,
            delays,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delays.clone())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn should_retry(&self, err: &Error) -> bool {
        classify(err) == ErrorClass::Retryable
    }

    /// Backoff before the retry with the given zero-based index.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let idx = retry.min(self.delays.len().saturating_sub(1));
        self.delays.get(idx).copied().unwrap_or(Duration::ZERO)
    }

    /// Run `operation` until it succeeds, fails fatally, or retries run out.
    ///
    /// Attempts never overlap: the next one starts only after the backoff of
    /// the previous one has elapsed. A retryable failure that outlives every
    /// attempt is returned as [`Error::RetriesExhausted`] carrying the attempt
    /// count and the last cause; fatal failures are returned unchanged.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        info!("{} succeeded after {} retries", label, retry);
                    }
                    return Ok(value);
                }
                Err(err) if !self.should_retry(&err) => return Err(err),
                Err(err) if retry >= self.max_retries => {
                    return Err(Error::RetriesExhausted {
                        label: label.to_string(),
                        attempts: retry + 1,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(retry as usize);
                    warn!(
                        "{} attempt {} failed: {}; retrying in {:?}",
                        label,
                        retry + 1,
                        err,
                        delay
                    );
                    runtime::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}
