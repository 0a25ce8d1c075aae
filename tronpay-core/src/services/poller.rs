//! Transaction status poller
//!
//! Repeats a status query at a fixed interval until the value is no longer
//! pending. Queries in one chain are strictly sequential: the next one is
//! scheduled only after the previous one resolved, and no timer is created
//! once a final value arrives.
//!
//! Cancellation is cooperative. The token is checked before every query and
//! races every wait and every in-flight query; a cancelled chain never
//! reports a value.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::result::{Error, Result};

/// Fixed delay between status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Polling limits. The default polls every two seconds with no cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Give up after this many queries
    pub max_attempts: Option<u32>,
    /// Give up when the next wait would end past this much elapsed time
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            timeout: None,
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Final value of a poll chain
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    pub value: T,
    /// Number of queries issued, including the last one
    pub attempts: u32,
}

/// Runs one poll chain at a time under a cancellation token
#[derive(Debug, Clone)]
pub struct Poller {
    config: PollConfig,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(config: PollConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Query until `is_pending` returns false.
    ///
    /// A query error ends the chain immediately; it is not retried.
    pub async fn run<T, F, Fut, P>(&self, mut query: F, is_pending: P) -> Result<PollOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&T) -> bool,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempts += 1;
            let value = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                result = query() => result?,
            };

            if !is_pending(&value) {
                return Ok(PollOutcome { value, attempts });
            }

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::PollTimeout { attempts });
            }
            if let Some(timeout) = self.config.timeout {
                if started.elapsed() + self.config.interval > timeout {
                    return Err(Error::PollTimeout { attempts });
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }
}
