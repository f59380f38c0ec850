//! Retry policy and call pacing.
//!
//! ## Three failure classes, three policies
//!
//! | Class | Example | Policy |
//! |-------|---------|--------|
//! | [`FailureClass::Transient`] | HTTP 500 / 503 | retry, at most `max_attempts` calls |
//! | [`FailureClass::Quota`] | HTTP 429 | sleep `quota_cooldown`, retry, not counted |
//! | [`FailureClass::Terminal`] | malformed JSON, 403 | give up now |
//!
//! Quota answers get their own unbounded loop because the quota resets on a
//! schedule this program does not control; waiting is the only thing that
//! works. A malformed answer is a content problem, so asking again with the
//! same prompt would mostly reproduce it.
//!
//! [`RetryPolicy::run`] takes the call as a closure and knows nothing about
//! HTTP, which keeps it testable with scripted outcomes.
//!
//! ## Pacing
//!
//! [`Pacer`] is the orthogonal "pause after every Nth call" rule used to stay
//! under a known request ceiling. It counts every outbound call, retries
//! included, and sleeps regardless of the call's outcome.

use crate::config::{ExportConfig, Pacing};
use crate::error::{Classify, FailureClass};
use crate::progress::ProgressCallback;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Counters for one [`RetryPolicy::run`] invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Calls made, of any outcome.
    pub calls: u32,
    /// Calls that ended in a transient fault; bounded by `max_attempts`.
    pub faults: u32,
    /// Quota cooldowns taken.
    pub cooldowns: u32,
    /// Time spent sleeping inside the policy.
    pub paused: Duration,
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Transient faults reached `max_attempts`.
    Exhausted { last: E, state: RetryState },
    /// Quota cooldowns reached `max_cooldowns`.
    CooldownsExhausted { last: E, state: RetryState },
    /// A terminal error; no retry was made.
    Terminal { error: E, state: RetryState },
}

impl<E> RetryError<E> {
    pub fn state(&self) -> RetryState {
        match self {
            RetryError::Exhausted { state, .. }
            | RetryError::CooldownsExhausted { state, .. }
            | RetryError::Terminal { state, .. } => *state,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::CooldownsExhausted { last, .. } => {
                last
            }
            RetryError::Terminal { error, .. } => error,
        }
    }
}

/// Fault-classifying retry policy.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total calls allowed when every call is a transient fault. Minimum 1.
    pub max_attempts: u32,
    /// Base delay before a fault retry, doubled each time. Zero retries immediately.
    pub backoff: Duration,
    /// Sleep after a quota answer.
    pub quota_cooldown: Duration,
    /// Optional cap on quota cooldowns.
    pub max_cooldowns: Option<u32>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("quota_cooldown", &self.quota_cooldown)
            .field("max_cooldowns", &self.max_cooldowns)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::ZERO,
            quota_cooldown: Duration::from_secs(60),
            max_cooldowns: None,
            progress: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, quota_cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            quota_cooldown,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            quota_cooldown: config.quota_cooldown(),
            max_cooldowns: config.max_cooldowns,
            progress: config.progress_callback.clone(),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_cooldowns(mut self, cap: Option<u32>) -> Self {
        self.max_cooldowns = cap;
        self
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `label` names the work item in log lines.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        mut op: F,
    ) -> Result<(T, RetryState), RetryError<E>>
    where
        E: Classify + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = RetryState::default();

        loop {
            state.calls += 1;
            let err = match op().await {
                Ok(value) => return Ok((value, state)),
                Err(e) => e,
            };

            match err.class() {
                FailureClass::Transient => {
                    state.faults += 1;
                    if state.faults >= self.max_attempts {
                        error!(
                            "{}: service fault persisted after {} attempts: {}",
                            label, state.faults, err
                        );
                        return Err(RetryError::Exhausted { last: err, state });
                    }
                    warn!(
                        "{}: service fault, retry {}/{}: {}",
                        label,
                        state.faults,
                        self.max_attempts - 1,
                        err
                    );
                    let delay = self.fault_delay(state.faults);
                    if !delay.is_zero() {
                        sleep(delay).await;
                        state.paused += delay;
                    }
                }
                FailureClass::Quota => {
                    if let Some(cap) = self.max_cooldowns {
                        if state.cooldowns >= cap {
                            error!("{}: quota still exhausted after {} cooldowns", label, cap);
                            return Err(RetryError::CooldownsExhausted { last: err, state });
                        }
                    }
                    state.cooldowns += 1;
                    warn!(
                        "{}: quota exhausted, cooling down {}s before retrying: {}",
                        label,
                        self.quota_cooldown.as_secs(),
                        err
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_pause(self.quota_cooldown.as_secs(), "quota exhausted");
                    }
                    sleep(self.quota_cooldown).await;
                    state.paused += self.quota_cooldown;
                }
                FailureClass::Terminal => {
                    error!("{}: {}", label, err);
                    return Err(RetryError::Terminal { error: err, state });
                }
            }
        }
    }

    /// Delay before the retry that follows fault number `fault` (1-based).
    fn fault_delay(&self, fault: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        self.backoff
            .saturating_mul(2u32.saturating_pow(fault.saturating_sub(1)))
    }
}

/// Pause after every Nth outbound call.
pub struct Pacer {
    pacing: Option<Pacing>,
    calls: AtomicU32,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Pacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer")
            .field("pacing", &self.pacing)
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl Pacer {
    /// `None` disables pausing; calls are still counted.
    pub fn new(pacing: Option<Pacing>) -> Self {
        Self {
            pacing,
            calls: AtomicU32::new(0),
            progress: None,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            pacing: config.pacing,
            calls: AtomicU32::new(0),
            progress: config.progress_callback.clone(),
        }
    }

    /// Outbound calls recorded so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Record one outbound call and pause if it was the Nth.
    pub async fn after_call(&self) {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(pacing) = self.pacing else {
            return;
        };
        if pacing.every > 0 && n % pacing.every == 0 {
            info!(
                "{} calls made, pausing {}s to respect the rate limit",
                n, pacing.pause_secs
            );
            if let Some(ref cb) = self.progress {
                cb.on_pause(pacing.pause_secs, "rate-limit pacing");
            }
            sleep(pacing.pause()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn fault() -> ProviderError {
        ProviderError::ServerFault {
            status: 500,
            message: "INTERNAL".into(),
        }
    }

    fn quota() -> ProviderError {
        ProviderError::QuotaExhausted {
            message: "RESOURCE_EXHAUSTED".into(),
        }
    }

    /// Replays outcomes in order, then keeps succeeding.
    struct Script {
        outcomes: Mutex<VecDeque<Result<&'static str, ProviderError>>>,
        calls: AtomicU32,
    }

    impl Script {
        fn new(outcomes: Vec<Result<&'static str, ProviderError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn next(&self) -> impl Future<Output = Result<&'static str, ProviderError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("ok"));
            async move { outcome }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn faults_below_ceiling_eventually_succeed() {
        let script = Script::new(vec![Err(fault()), Err(fault()), Err(fault()), Err(fault())]);
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let start = Instant::now();

        let (value, state) = policy.run("doc.pdf", || script.next()).await.expect("succeeds");

        assert_eq!(value, "ok");
        assert_eq!(script.calls(), 5);
        assert_eq!(state.faults, 4);
        assert_eq!(state.calls, 5);
        // Immediate retries: no virtual time passes.
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn faults_at_ceiling_give_up_with_bounded_calls() {
        let script = Script::new((0..20).map(|_| Err(fault())).collect());
        let policy = RetryPolicy::new(5, Duration::from_secs(60));

        let err = policy.run("doc.pdf", || script.next()).await.unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { .. }));
        assert_eq!(script.calls(), 5);
        assert_eq!(err.state().faults, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_cools_down_without_consuming_attempts() {
        let script = Script::new(vec![Err(quota()), Err(quota()), Err(quota())]);
        // A single attempt allowed, yet three quota answers are survived.
        let policy = RetryPolicy::new(1, Duration::from_secs(60));
        let start = Instant::now();

        let (_, state) = policy.run("doc.pdf", || script.next()).await.expect("succeeds");

        assert_eq!(script.calls(), 4);
        assert_eq!(state.cooldowns, 3);
        assert_eq!(state.faults, 0);
        assert_eq!(state.paused, Duration::from_secs(180));
        assert!(start.elapsed() >= Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_and_faults_compose() {
        let script = Script::new(vec![Err(fault()), Err(quota()), Err(fault()), Err(quota())]);
        let policy = RetryPolicy::new(3, Duration::from_secs(10));

        let (_, state) = policy.run("doc.pdf", || script.next()).await.expect("succeeds");

        assert_eq!(state.calls, 5);
        assert_eq!(state.faults, 2);
        assert_eq!(state.cooldowns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_cap_is_honoured() {
        let script = Script::new((0..10).map(|_| Err(quota())).collect());
        let policy = RetryPolicy::new(5, Duration::from_secs(60)).with_max_cooldowns(Some(2));

        let err = policy.run("doc.pdf", || script.next()).await.unwrap_err();

        assert!(matches!(err, RetryError::CooldownsExhausted { .. }));
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_is_not_retried() {
        let script = Script::new(vec![Err(ProviderError::Rejected {
            status: 400,
            message: "bad request".into(),
        })]);
        let policy = RetryPolicy::default();

        let err = policy.run("doc.pdf", || script.next()).await.unwrap_err();

        assert!(matches!(err, RetryError::Terminal { .. }));
        assert_eq!(script.calls(), 1);
        assert!(err.into_inner().to_string().contains("bad request"));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles() {
        let script = Script::new(vec![Err(fault()), Err(fault()), Err(fault())]);
        let policy = RetryPolicy::new(5, Duration::from_secs(60))
            .with_backoff(Duration::from_millis(500));

        let (_, state) = policy.run("doc.pdf", || script.next()).await.expect("succeeds");

        // 500 ms + 1 s + 2 s
        assert_eq!(state.paused, Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_pauses_every_nth_call() {
        let pacer = Pacer::new(Some(Pacing {
            every: 3,
            pause_secs: 60,
        }));
        let start = Instant::now();

        for _ in 0..7 {
            pacer.after_call().await;
        }

        assert_eq!(pacer.calls(), 7);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(120), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(180), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_pacer_only_counts() {
        let pacer = Pacer::new(None);
        let start = Instant::now();
        for _ in 0..25 {
            pacer.after_call().await;
        }
        assert_eq!(pacer.calls(), 25);
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
