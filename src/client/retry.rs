//! Request pacing and rate-limit recovery.
//!
//! A single [`RateLimiter`] sits in front of every remote call. It keeps one
//! shared "gate" instant: no request may start before it. Each call reserves
//! the next slot after the gate, and a `429` pushes the gate forward for
//! everyone, so concurrent fetch sessions back off together.
//!
//! The gate lives in a `parking_lot::Mutex` that is only held for the few
//! instructions that read and bump it, never across an `.await`. Dropping a
//! call mid-sleep therefore leaves the limiter consistent.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ApiResponse;
use crate::error::{ChatsweepError, Result};

/// Timing knobs for [`RateLimiter`]. All durations are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per request, counting the first one.
    pub max_attempts: u32,
    /// Minimum spacing between consecutive requests.
    pub request_delay_ms: u64,
    /// Upper bound of the random extra spacing.
    pub request_jitter_ms: u64,
    /// Added on top of the server's `retry_after`.
    pub rate_limit_padding_ms: u64,
    /// Used when a `429` carries no readable `retry_after`.
    pub default_retry_after_ms: u64,
    /// Scanned records between breathers.
    pub burst_every: usize,
    pub burst_pause_ms: u64,
    pub burst_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            request_delay_ms: 50,
            request_jitter_ms: 50,
            rate_limit_padding_ms: 100,
            default_retry_after_ms: 1000,
            burst_every: 300,
            burst_pause_ms: 500,
            burst_jitter_ms: 300,
        }
    }
}

impl RetryPolicy {
    /// No pacing at all. Rate-limit waits still honor `retry_after`.
    pub fn immediate() -> Self {
        Self {
            request_delay_ms: 0,
            request_jitter_ms: 0,
            rate_limit_padding_ms: 0,
            burst_pause_ms: 0,
            burst_jitter_ms: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_burst_every(mut self, burst_every: usize) -> Self {
        self.burst_every = burst_every;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

/// Shared pacing gate plus the retry loop.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RetryPolicy,
    gate: Mutex<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RateLimiter {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            gate: Mutex::new(Instant::now()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `send` until it succeeds, fails for good, or runs out of attempts.
    ///
    /// `send` is called once per attempt and must build a fresh request each
    /// time.
    ///
    /// # Errors
    ///
    /// - `401` gives [`ChatsweepError::Authentication`]
    /// - `403` gives [`ChatsweepError::PermissionDenied`]
    /// - any other non-2xx status except `429` gives [`ChatsweepError::RemoteApi`]
    /// - too many `429`s or transient network errors give
    ///   [`ChatsweepError::RetryExhausted`]
    pub async fn execute<F, Fut>(&self, endpoint: &str, mut send: F) -> Result<ApiResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.wait_turn().await;

            let response = match send().await {
                Ok(response) => response,
                Err(err) if err.is_transient() => {
                    warn!(endpoint, attempt, error = %err, "Transient transport error, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            };

            match response.status {
                200..=299 => {
                    debug!(endpoint, attempt, status = response.status, "Request succeeded");
                    return Ok(response);
                }
                429 => {
                    let (wait, global) = self.retry_after(&response.body);
                    warn!(
                        endpoint,
                        attempt,
                        global,
                        retry_after_ms = wait.as_millis() as u64,
                        "Rate limited"
                    );
                    self.hold_for(wait);
                }
                401 => return Err(ChatsweepError::authentication(endpoint)),
                403 => return Err(ChatsweepError::permission_denied(endpoint)),
                status => return Err(ChatsweepError::remote_api(status, response.body, endpoint)),
            }
        }

        Err(ChatsweepError::retry_exhausted(endpoint, max_attempts))
    }

    /// Pauses every caller for `burst_pause + jitter`.
    pub async fn breather(&self) {
        let pause = Duration::from_millis(self.policy.burst_pause_ms)
            + jitter(self.policy.burst_jitter_ms);
        debug!(pause_ms = pause.as_millis() as u64, "Taking a breather");
        let until = self.hold_for(pause);
        tokio::time::sleep_until(until).await;
    }

    /// Reserves the next request slot and sleeps until it.
    async fn wait_turn(&self) {
        let spacing = Duration::from_millis(self.policy.request_delay_ms)
            + jitter(self.policy.request_jitter_ms);
        let slot = {
            let mut gate = self.gate.lock();
            let slot = (*gate).max(Instant::now()) + spacing;
            *gate = slot;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }

    /// Moves the gate to at least `now + wait`. Returns the new gate.
    fn hold_for(&self, wait: Duration) -> Instant {
        let until = Instant::now() + wait;
        let mut gate = self.gate.lock();
        if *gate < until {
            *gate = until;
        }
        *gate
    }

    /// Wait advised by a `429` body, plus padding and jitter.
    fn retry_after(&self, body: &str) -> (Duration, bool) {
        let parsed = serde_json::from_str::<RateLimitBody>(body).ok();
        let global = parsed.as_ref().is_some_and(|b| b.global);
        let advised = parsed
            .and_then(|b| b.retry_after)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map_or(
                Duration::from_millis(self.policy.default_retry_after_ms),
                Duration::from_secs_f64,
            );
        let padding = Duration::from_millis(self.policy.rate_limit_padding_ms)
            + jitter(self.policy.request_jitter_ms);
        (advised + padding, global)
    }
}

fn jitter(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.burst_every, 300);
        assert_eq!(policy.default_retry_after_ms, 1000);
    }

    #[test]
    fn test_immediate_policy_has_no_delays() {
        let policy = RetryPolicy::immediate();
        assert_eq!(policy.request_delay_ms, 0);
        assert_eq!(policy.request_jitter_ms, 0);
        assert_eq!(policy.burst_pause_ms, 0);
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_policy_deserializes_partial() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.request_delay_ms, 50);
    }

    #[test]
    fn test_retry_after_parsing() {
        let limiter = RateLimiter::new(RetryPolicy::immediate());
        let (wait, global) = limiter.retry_after(r#"{"retry_after": 1.25, "global": true}"#);
        assert_eq!(wait, Duration::from_millis(1250));
        assert!(global);

        let (fallback, global) = limiter.retry_after("not json");
        assert_eq!(fallback, Duration::from_millis(1000));
        assert!(!global);
    }

    #[test]
    fn test_negative_retry_after_falls_back() {
        let limiter = RateLimiter::new(RetryPolicy::immediate());
        let (wait, _) = limiter.retry_after(r#"{"retry_after": -3}"#);
        assert_eq!(wait, Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_bounds() {
        assert_eq!(jitter(0), Duration::ZERO);
        for _ in 0..100 {
            assert!(jitter(10) <= Duration::from_millis(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_spaces_requests() {
        let policy = RetryPolicy {
            request_jitter_ms: 0,
            ..RetryPolicy::default()
        };
        let limiter = RateLimiter::new(policy);
        let start = Instant::now();
        limiter.wait_turn().await;
        limiter.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
