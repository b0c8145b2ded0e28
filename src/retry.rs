//! Retry engine: attempts, timeout escalation and backoff.
//!
//! Packet loss and the odd garbled reply are normal on the device's local
//! network, so every command goes through [`RetryEngine::execute`]:
//!
//! 1. The command is encoded once; every attempt resends the same bytes.
//! 2. Attempt `n` waits up to `base_timeout + (n - 1) * timeout_step`.
//! 3. A `result` ends the loop. A transient failure (timeout, socket error,
//!    undecodable or oddly shaped reply, device parse error) sleeps
//!    `backoff_unit * 2^n` and tries again. Any other device error ends the
//!    loop at once.
//! 4. When attempts run out the caller gets [`VenusError::Exhausted`].
//!
//! With the defaults (2 s base, 3 attempts) a command that never gets an
//! answer gives up after 2 + 3 + 4 s of waiting plus 2 + 4 s of backoff.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{Result, VenusError};
use crate::response::AttemptOutcome;
use crate::transport::Transport;

/// Default number of attempts per command.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Largest accepted `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Default timeout of the first attempt.
pub const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Retry schedule for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per command, 1 to [`MAX_ATTEMPTS_LIMIT`].
    pub max_attempts: u32,
    /// Timeout of the first attempt.
    pub base_timeout: Duration,
    /// Added to the timeout for each further attempt.
    pub timeout_step: Duration,
    /// Backoff after attempt `n` is `backoff_unit * 2^n`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_timeout: DEFAULT_BASE_TIMEOUT,
            timeout_step: Duration::from_secs(1),
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Timeout for attempt `attempt` (1-based).
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use venus_udp::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.attempt_timeout(1), Duration::from_secs(2));
    /// assert_eq!(policy.attempt_timeout(3), Duration::from_secs(4));
    /// ```
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        self.base_timeout
            .saturating_add(self.timeout_step.saturating_mul(attempt.saturating_sub(1)))
    }

    /// Pause after failed attempt `attempt` (1-based) before the next one.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use venus_udp::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_secs(2));
    /// assert_eq!(policy.backoff(2), Duration::from_secs(4));
    /// ```
    pub fn backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .map_or(Duration::MAX, |factor| self.backoff_unit.saturating_mul(factor))
    }

    /// Longest time one command can take: every timeout plus every backoff.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.clamp(1, MAX_ATTEMPTS_LIMIT);
        let waiting = (1..=attempts).fold(Duration::ZERO, |acc, n| {
            acc.saturating_add(self.attempt_timeout(n))
        });
        (1..attempts).fold(waiting, |acc, n| acc.saturating_add(self.backoff(n)))
    }

    /// Checks that the policy can run and stays bounded.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(VenusError::validation(
                "max_attempts",
                format!("must be 1-{MAX_ATTEMPTS_LIMIT}"),
            ));
        }
        if self.base_timeout.is_zero() {
            return Err(VenusError::validation("base_timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Runs commands over a transport under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryEngine<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryEngine<T> {
    /// Creates an engine.
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// The retry schedule.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs `command` until it succeeds, is rejected, or attempts run out.
    ///
    /// # Errors
    ///
    /// - `VenusError::Protocol` if the device rejects the command with any
    ///   code other than the parse error code
    /// - `VenusError::Exhausted` if every attempt failed transiently; `last`
    ///   holds the final attempt's error
    pub async fn execute(&self, command: &Command) -> Result<Map<String, Value>> {
        let request = command.to_bytes();
        let max_attempts = self.policy.max_attempts.clamp(1, MAX_ATTEMPTS_LIMIT);
        let mut last = VenusError::unexpected_response("no attempt made");

        for attempt in 1..=max_attempts {
            let timeout = self.policy.attempt_timeout(attempt);
            debug!(
                method = command.method(),
                id = command.id(),
                attempt,
                max_attempts,
                ?timeout,
                "sending command"
            );

            let exchange = tokio::time::timeout(timeout, self.transport.exchange(&request, timeout))
                .await
                .unwrap_or(Err(VenusError::Timeout));

            let err = match AttemptOutcome::from_exchange(exchange).into_result() {
                Ok(result) => {
                    debug!(method = command.method(), attempt, "command succeeded");
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(method = command.method(), attempt, error = %err, "device rejected command");
                return Err(err);
            }

            if attempt < max_attempts {
                let backoff = self.policy.backoff(attempt);
                warn!(
                    method = command.method(),
                    attempt,
                    max_attempts,
                    error = %err,
                    ?backoff,
                    "retrying command"
                );
                tokio::time::sleep(backoff).await;
            } else {
                warn!(method = command.method(), attempt, error = %err, "giving up on command");
            }
            last = err;
        }

        Err(VenusError::Exhausted {
            method: command.method().to_string(),
            attempts: max_attempts,
            last: Box::new(last),
        })
    }
}
