//! Bounded backoff for rate-limited requests.
//!
//! [`Retrying`] wraps any [`Transport`] and re-issues a request while the
//! server answers `429 Too Many Requests`. Every other non-success status is
//! surfaced immediately as [`HubError::Http`].

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{HubError, HubRequest, HubResponse, Transport};

/// Attempts per logical request when nothing else is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Longest `Retry-After` hint honoured when nothing else is configured.
pub const DEFAULT_MAX_HINT: Duration = Duration::from_secs(600);

/// Configuration of the rate-limit backoff.
///
/// # Defaults
///
/// ```text
/// max_attempts: 5 (1 initial + 4 retries)
/// base_delay: 500ms
/// max_delay: 30s (computed backoff only, NOT Retry-After)
/// max_hint: 10min (Retry-After only)
/// min_delay: 100ms
/// jitter_pct: 20%
/// ```
///
/// A `Retry-After` hint from the server replaces the computed backoff and
/// is not capped by `max_delay`. It is capped by `max_hint` so a hostile or
/// broken server cannot stall the caller indefinitely. Hints of zero or
/// less are raised to `min_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Requests per logical call, including the first. Values below 1 are
    /// treated as 1.
    pub max_attempts: u32,
    /// Delay before the first retry when the server gives no hint.
    pub base_delay: Duration,
    /// Cap on computed exponential delays.
    pub max_delay: Duration,
    /// Cap on server `Retry-After` hints.
    pub max_hint: Duration,
    /// Floor for every delay.
    pub min_delay: Duration,
    /// Jitter as a percentage of the computed delay (0-100).
    pub jitter_pct: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_hint: DEFAULT_MAX_HINT,
            min_delay: Duration::from_millis(100),
            jitter_pct: 20,
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up on the first rate-limit response.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_hint: Duration::ZERO,
            min_delay: Duration::ZERO,
            jitter_pct: 0,
        }
    }

    /// Set the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay.
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the cap on server `Retry-After` hints.
    #[must_use]
    pub const fn with_max_hint(mut self, max_hint: Duration) -> Self {
        self.max_hint = max_hint;
        self
    }

    /// Set the jitter percentage; values above 100 are capped.
    #[must_use]
    pub const fn with_jitter_pct(mut self, jitter_pct: u8) -> Self {
        self.jitter_pct = if jitter_pct > 100 { 100 } else { jitter_pct };
        self
    }

    /// Effective attempt budget.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 { 1 } else { self.max_attempts }
    }

    /// Delay to wait after the `attempt`-th request was rate limited.
    ///
    /// `hint` is the server's `Retry-After`; `rng_u64` supplies the jitter.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32, hint: Option<Duration>, rng_u64: u64) -> Duration {
        let delay = hint.map_or_else(
            || {
                let exp = attempt.saturating_sub(1).min(30);
                let computed = self.base_delay.saturating_mul(1u32 << exp);
                self.apply_jitter(computed.min(self.max_delay), rng_u64)
            },
            |server| server.min(self.max_hint),
        );
        delay.max(self.min_delay)
    }

    /// Uniform jitter in `[delay - pct, delay + pct]`.
    fn apply_jitter(&self, delay: Duration, rng_u64: u64) -> Duration {
        let jitter_pct = u64::from(self.jitter_pct.min(100));
        if jitter_pct == 0 || delay.is_zero() {
            return delay;
        }
        let delay_ns = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let jitter_ns = delay_ns
            .saturating_mul(jitter_pct)
            .checked_div(100)
            .unwrap_or_default();
        if jitter_ns == 0 {
            return delay;
        }
        let r = rng_u64
            .checked_rem(jitter_ns.saturating_mul(2).saturating_add(1))
            .unwrap_or_default();
        if r < jitter_ns {
            Duration::from_nanos(delay_ns.saturating_sub(jitter_ns - r))
        } else {
            Duration::from_nanos(delay_ns.saturating_add(r - jitter_ns))
        }
    }
}

/// Attempts and waiting time of one logical request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    waited: Duration,
}

impl RetryState {
    /// Requests issued so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total time slept between requests.
    #[must_use]
    pub const fn waited(&self) -> Duration {
        self.waited
    }

    fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    fn record_wait(&mut self, delay: Duration) {
        self.waited = self.waited.saturating_add(delay);
    }
}

/// A sleep was cut short by cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("sleep interrupted by cancellation")]
pub struct Interrupted;

/// Blocks the calling thread between retries.
pub trait Sleeper {
    /// Sleep for `duration` unless `cancel` fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when `cancel` is triggered before the delay
    /// elapses.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted>;
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
        (**self).sleep(duration, cancel)
    }
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
        (**self).sleep(duration, cancel)
    }
}

/// Transport decorator retrying rate-limited requests.
///
/// Successful responses pass through; any other status becomes
/// [`HubError::Http`] and rate limiting beyond the budget becomes
/// [`HubError::RetryExhausted`]. Transport errors are not retried.
///
/// ```
/// use std::time::Duration;
/// use geohub_core::test_support::{RecordingSleeper, ScriptedTransport};
/// use geohub_core::{HubRequest, HubResponse, RetryPolicy, Retrying, Transport};
///
/// let transport = ScriptedTransport::new([
///     Ok(HubResponse::rate_limited(Some("1"))),
///     Ok(HubResponse::ok_json(&serde_json::json!({"ok": true}))),
/// ]);
/// let sleeper = RecordingSleeper::default();
/// let retrying = Retrying::new(&transport, &sleeper, RetryPolicy::default());
/// let response = retrying.execute(&HubRequest::get(["hub"])).expect("second attempt succeeds");
/// assert_eq!(response.status, 200);
/// assert_eq!(sleeper.total(), Duration::from_secs(1));
/// ```
#[derive(Debug)]
pub struct Retrying<T, S> {
    inner: T,
    sleeper: S,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<T, S> Retrying<T, S> {
    /// Wrap `inner`, sleeping through `sleeper`.
    pub fn new(inner: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            sleeper,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits and further attempts when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token observed by this decorator.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Wrapped transport.
    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport, S: Sleeper> Transport for Retrying<T, S> {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        let path = request.path();
        let max_attempts = self.policy.attempts();
        let mut state = RetryState::default();
        loop {
            if self.cancel.is_cancelled() {
                return Err(HubError::Cancelled);
            }
            state.record_attempt();
            let response = self.inner.execute(request)?;
            if !response.is_rate_limited() {
                return response.ensure_success(&path);
            }
            if state.attempts() >= max_attempts {
                return Err(HubError::RetryExhausted {
                    path,
                    attempts: state.attempts(),
                    waited: state.waited(),
                });
            }
            let delay =
                self.policy
                    .backoff_delay(state.attempts(), response.retry_after(), rand::random());
            warn!(
                "rate limited on {path} (attempt {}/{max_attempts}); retrying in {delay:?}",
                state.attempts()
            );
            self.sleeper
                .sleep(delay, &self.cancel)
                .map_err(|Interrupted| HubError::Cancelled)?;
            state.record_wait(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSleeper, ScriptedTransport};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn no_jitter() -> RetryPolicy {
        RetryPolicy::default().with_jitter_pct(0)
    }

    fn ok() -> Result<HubResponse, HubError> {
        Ok(HubResponse::ok_json(&json!({"features": []})))
    }

    fn limited() -> Result<HubResponse, HubError> {
        Ok(HubResponse::rate_limited(None))
    }

    #[rstest]
    #[case(1, Duration::from_millis(500))]
    #[case(2, Duration::from_secs(1))]
    #[case(4, Duration::from_secs(4))]
    #[case(10, Duration::from_secs(30))]
    fn computed_delay_doubles_and_caps(
        no_jitter: RetryPolicy,
        #[case] attempt: u32,
        #[case] expected: Duration,
    ) {
        assert_eq!(no_jitter.backoff_delay(attempt, None, 0), expected);
    }

    #[rstest]
    fn server_hint_ignores_max_delay(no_jitter: RetryPolicy) {
        let hint = Duration::from_secs(120);
        assert_eq!(no_jitter.backoff_delay(1, Some(hint), 0), hint);
    }

    #[rstest]
    fn huge_server_hint_is_capped(no_jitter: RetryPolicy) {
        let hint = Duration::from_secs(1_000_000_000);
        assert_eq!(no_jitter.backoff_delay(1, Some(hint), 0), DEFAULT_MAX_HINT);

        let strict = no_jitter.with_max_hint(Duration::from_secs(5));
        assert_eq!(strict.backoff_delay(1, Some(hint), 0), Duration::from_secs(5));
    }

    #[rstest]
    fn zero_hint_is_clamped(no_jitter: RetryPolicy) {
        assert_eq!(
            no_jitter.backoff_delay(1, Some(Duration::ZERO), 0),
            Duration::from_millis(100)
        );
    }

    #[rstest]
    #[case(0)]
    #[case(u64::MAX)]
    #[case(123_456_789)]
    fn jitter_stays_within_bounds(#[case] rng: u64) {
        let policy = RetryPolicy::default();
        let delay = policy.backoff_delay(1, None, rng);
        assert!(delay >= Duration::from_millis(400), "{delay:?}");
        assert!(delay <= Duration::from_millis(600), "{delay:?}");
    }

    #[rstest]
    fn retries_until_success(no_jitter: RetryPolicy) {
        let transport = ScriptedTransport::new([limited(), limited(), ok()]);
        let sleeper = RecordingSleeper::default();
        let retrying = Retrying::new(&transport, &sleeper, no_jitter);

        let response = retrying
            .execute(&HubRequest::get(["hub"]))
            .expect("third attempt succeeds");

        assert_eq!(response.status, 200);
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(500), Duration::from_secs(1)]
        );
    }

    #[rstest]
    fn absurd_retry_after_header_waits_at_most_the_cap(no_jitter: RetryPolicy) {
        let transport = ScriptedTransport::new([
            Ok(HubResponse::rate_limited(Some("1000000000"))),
            ok(),
        ]);
        let sleeper = RecordingSleeper::default();
        let retrying = Retrying::new(&transport, &sleeper, no_jitter);

        retrying
            .execute(&HubRequest::get(["hub"]))
            .expect("second attempt succeeds");

        assert_eq!(sleeper.recorded(), vec![DEFAULT_MAX_HINT]);
    }

    #[rstest]
    fn exhausts_after_max_attempts(no_jitter: RetryPolicy) {
        let transport = ScriptedTransport::repeating(HubResponse::rate_limited(Some("0.5")));
        let sleeper = RecordingSleeper::default();
        let retrying = Retrying::new(&transport, &sleeper, no_jitter.with_max_attempts(3));

        let err = retrying
            .execute(&HubRequest::get(["hub", "spaces"]))
            .expect_err("budget should run out");

        assert_eq!(
            err,
            HubError::RetryExhausted {
                path: "/hub/spaces".to_owned(),
                attempts: 3,
                waited: Duration::from_secs(1),
            }
        );
        assert_eq!(transport.requests().len(), 3);
    }

    #[rstest]
    fn other_statuses_fail_immediately(no_jitter: RetryPolicy) {
        let transport = ScriptedTransport::new([Ok(HubResponse::new(503, "down")), ok()]);
        let sleeper = RecordingSleeper::default();
        let retrying = Retrying::new(&transport, &sleeper, no_jitter);

        let err = retrying
            .execute(&HubRequest::get(["hub"]))
            .expect_err("503 is not retried");

        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.requests().len(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[rstest]
    fn cancellation_interrupts_the_wait(no_jitter: RetryPolicy) {
        let transport = ScriptedTransport::repeating(HubResponse::rate_limited(None));
        let cancel = CancellationToken::new();
        let sleeper = RecordingSleeper::cancelling(cancel.clone());
        let retrying =
            Retrying::new(&transport, &sleeper, no_jitter).with_cancellation(cancel.clone());

        let err = retrying
            .execute(&HubRequest::get(["hub"]))
            .expect_err("cancelled while waiting");

        assert_eq!(err, HubError::Cancelled);
        assert_eq!(transport.requests().len(), 1);
        assert!(cancel.is_cancelled());
    }

    #[rstest]
    fn zero_attempt_budget_still_sends_once() {
        let transport = ScriptedTransport::new([limited()]);
        let sleeper = RecordingSleeper::default();
        let retrying = Retrying::new(&transport, &sleeper, RetryPolicy::no_retry().with_max_attempts(0));

        let err = retrying
            .execute(&HubRequest::get(["hub"]))
            .expect_err("single attempt is rate limited");

        assert!(err.is_retry_exhausted());
        assert_eq!(transport.requests().len(), 1);
    }
}
