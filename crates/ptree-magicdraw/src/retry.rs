//! Rate-limit retry and cooperative cancellation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{info, warn};

use crate::{error::ExtractError, gateway::GatewayError};

/// Longest uninterrupted sleep while backing off.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// A cloneable cancel signal shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`ExtractError::Cancelled`] once the flag is raised.
    pub fn check(&self) -> Result<(), ExtractError> {
        if self.is_cancelled() {
            Err(ExtractError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Back-off policy for rate-limited fetches.
///
/// The default retries forever with a fixed ten-minute wait. Only
/// [`GatewayError::RateLimited`] is retried; any other error is returned
/// immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: Option<u32>,
    backoff: Duration,
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff: Duration::from_secs(600),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the number of retries; `None` retries forever.
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Adds a uniformly random extra wait in `[0, jitter]` to each back-off.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Runs `fetch` until it stops being rate limited.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::Cancelled`] if `cancel` is raised before an attempt or
    ///   during a back-off wait.
    /// - [`ExtractError::RateLimitExhausted`] once a configured retry bound is
    ///   reached.
    /// - [`ExtractError::Gateway`] for any non-throttling gateway error.
    pub fn run<T>(
        &self,
        element_id: &str,
        cancel: &CancellationFlag,
        mut fetch: impl FnMut() -> Result<T, GatewayError>,
    ) -> Result<T, ExtractError> {
        let mut retries = 0u32;
        loop {
            cancel.check()?;
            match fetch() {
                Err(err) if err.is_rate_limited() => {
                    if self.max_retries.is_some_and(|max| retries >= max) {
                        return Err(ExtractError::RateLimitExhausted {
                            element_id: element_id.to_string(),
                            attempts: retries + 1,
                        });
                    }
                    retries += 1;
                    let wait = self.next_wait();
                    warn!(
                        element_id,
                        retry = retries,
                        wait_secs = wait.as_secs();
                        "REST API connections exceeded, waiting before retrying"
                    );
                    sleep_cancellable(wait, cancel)?;
                }
                Err(err) => return Err(err.into()),
                Ok(value) => {
                    if retries > 0 {
                        info!(element_id, retries; "Fetch succeeded after rate limiting");
                    }
                    return Ok(value);
                }
            }
        }
    }

    fn next_wait(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.backoff;
        }
        let extra = rand::random_range(0..=self.jitter.as_millis() as u64);
        self.backoff + Duration::from_millis(extra)
    }
}

fn sleep_cancellable(wait: Duration, cancel: &CancellationFlag) -> Result<(), ExtractError> {
    let mut remaining = wait;
    while !remaining.is_zero() {
        cancel.check()?;
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    cancel.check()
}
