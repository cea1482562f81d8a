//! Progressive Polling
//!
//! Retries a fallible async read until a condition holds or the deadline
//! passes. Reads that fail or report "not ready" are retried silently; the
//! last error is kept for diagnostics only.
//!
//! Delays between attempts escalate along a [`BackoffSchedule`] so settled UI
//! is confirmed on the first read while slow UI is not hammered.

use crate::config::{DEFAULT_BACKOFF_MS, DEFAULT_TIMEOUT_MS};
use crate::result::{ExpectError, ExpectResult};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

/// Escalating delays between poll attempts; the last delay repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            delays: DEFAULT_BACKOFF_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

impl BackoffSchedule {
    /// Build a schedule from millisecond delays.
    ///
    /// The schedule must be non-empty and every delay must be positive.
    pub fn from_millis(delays_ms: &[u64]) -> ExpectResult<Self> {
        if delays_ms.is_empty() {
            return Err(ExpectError::Config {
                message: "backoff schedule must contain at least one delay".to_string(),
            });
        }
        if delays_ms.contains(&0) {
            return Err(ExpectError::Config {
                message: "backoff delays must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            delays: delays_ms.iter().copied().map(Duration::from_millis).collect(),
        })
    }

    /// A schedule that always waits the same interval
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            delays: vec![interval],
        }
    }

    /// Delay to wait after the given zero-based attempt
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let index = attempt.min(self.delays.len().saturating_sub(1));
        self.delays.get(index).copied().unwrap_or_default()
    }

    /// All configured delays
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

/// Timing options for one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Total time budget
    pub timeout: Duration,
    /// Delays between attempts
    pub backoff: BackoffSchedule,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            backoff: BackoffSchedule::default(),
        }
    }
}

impl PollOptions {
    /// Create options with the given timeout and the default schedule
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            backoff: BackoffSchedule::default(),
        }
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the backoff schedule
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Outcome of one [`poll_until`] call
#[derive(Debug, Clone)]
pub struct PollOutcome<T, E = ExpectError> {
    /// Last value read without error, whether or not it satisfied the condition
    pub value: Option<T>,
    /// Whether the condition was satisfied before the deadline
    pub pass: bool,
    /// Most recent read error, only kept on failure
    pub last_error: Option<E>,
    /// Number of callback invocations
    pub attempts: usize,
    /// Time spent polling
    pub elapsed: Duration,
}

impl<T, E> PollOutcome<T, E> {
    /// Whether the condition was met
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        self.pass
    }

    /// Convert into the satisfying value, or a timeout error
    pub fn into_value(self, timeout: Duration) -> ExpectResult<T> {
        match (self.pass, self.value) {
            (true, Some(value)) => Ok(value),
            _ => Err(ExpectError::Timeout {
                ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Poll `callback` until `condition` accepts its value or the timeout elapses.
///
/// - `Err(_)` from the callback is a transient failure and is retried.
/// - `Ok(None)` means "not ready yet" and is retried.
/// - `Ok(Some(v))` with `condition(&v)` returns immediately with `pass: true`.
///
/// At least one attempt is always made. The loop never sleeps past the
/// deadline: if the next delay would overrun it, polling stops. An attempt
/// still pending when the deadline passes is dropped and recorded as an
/// [`ExpectError::Timeout`] in `last_error`.
pub async fn poll_until<T, E, F, Fut, C>(
    mut callback: F,
    condition: C,
    options: &PollOptions,
) -> PollOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    C: Fn(&T) -> bool,
    E: Display + From<ExpectError>,
{
    let start = Instant::now();
    let mut value = None;
    let mut last_error = None;
    let mut attempts = 0;

    loop {
        attempts += 1;

        let remaining = options.timeout.saturating_sub(start.elapsed());
        let Ok(result) = timeout(remaining, callback()).await else {
            debug!(attempt = attempts, "read still pending at deadline");
            last_error = Some(E::from(ExpectError::Timeout {
                ms: options.timeout.as_millis() as u64,
            }));
            break;
        };

        match result {
            Ok(Some(current)) => {
                if condition(&current) {
                    let elapsed = start.elapsed();
                    debug!(attempts, ?elapsed, "poll condition met");
                    return PollOutcome {
                        value: Some(current),
                        pass: true,
                        last_error: None,
                        attempts,
                        elapsed,
                    };
                }
                trace!(attempt = attempts, "condition not met");
                value = Some(current);
            }
            Ok(None) => trace!(attempt = attempts, "value not ready"),
            Err(err) => {
                trace!(attempt = attempts, error = %err, "read failed");
                last_error = Some(err);
            }
        }

        let elapsed = start.elapsed();
        let delay = options.backoff.delay_for(attempts - 1);
        if elapsed >= options.timeout || elapsed + delay > options.timeout {
            break;
        }
        sleep(delay).await;
    }

    let elapsed = start.elapsed();
    debug!(attempts, ?elapsed, timeout = ?options.timeout, "poll timed out");
    PollOutcome {
        value,
        pass: false,
        last_error,
        attempts,
        elapsed,
    }
}
