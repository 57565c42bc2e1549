//! Retry bookkeeping with exponential backoff between attempts
//!
//! Attempts within one logical call are strictly sequential and totally
//! ordered; every transient failure consumes one retry slot against the
//! configured limit.

use std::collections::HashMap;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::config;
use crate::error::Result;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Base delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: config::DEFAULT_HTTP_CONNECTION_RETRY,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with a custom retry limit
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Resolve the retry limit from configuration
    pub fn from_config(config: &HashMap<String, String>) -> Result<Self> {
        Ok(Self::new(config::retry_limit(config)?))
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier,
            max_elapsed_time: None, // the retry limit is enforced separately
            ..Default::default()
        };
        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }
        backoff
    }
}

/// Decision on whether to retry an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay
    Retry { delay: Duration },
    /// The retry limit is exhausted
    NoRetry,
}

/// Tracks retries consumed within one logical call.
#[derive(Debug)]
pub struct RetryHandler {
    policy: RetryPolicy,
    retries: u32,
    backoff: ExponentialBackoff,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            retries: 0,
            backoff,
        }
    }

    /// Consumes one retry slot. Every transient failure is counted against
    /// the configured limit; there is no uncounted retry path.
    pub fn try_consume(&mut self) -> RetryDecision {
        if self.retries >= self.policy.max_retries {
            return RetryDecision::NoRetry;
        }
        self.retries += 1;
        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.policy.max_delay);
        RetryDecision::Retry { delay }
    }

    /// Number of retries consumed so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn limit(&self) -> u32 {
        self.policy.max_retries
    }
}
