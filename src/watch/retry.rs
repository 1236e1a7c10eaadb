//! Bounded retry with configurable backoff
//!
//! The acknowledgement wait for the watch start command runs under this
//! policy: a fixed attempt ceiling with a delay schedule between attempts,
//! returning a tri-state outcome so abandonment is distinct from exhaustion.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay between every attempt
    Fixed,
    /// Delay multiplied by `base` after each attempt
    Exponential { base: f64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential { base: 2.0 }
    }
}

/// Retry policy with a fixed attempt ceiling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, at least one
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Backoff strategy
    #[serde(default)]
    pub backoff: Backoff,

    /// Delay before the second attempt
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Ceiling on any single delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Add jitter to delays
    #[serde(default)]
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(4)
}

fn default_jitter_factor() -> f64 {
    0.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: Backoff::default(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
        }
    }
}

/// Result of driving an operation under a retry policy
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded within the attempt ceiling
    Ok(T),
    /// Every attempt failed
    Exhausted { attempts: u32, last_error: E },
    /// The wait was abandoned between attempts
    Cancelled,
}

impl RetryPolicy {
    /// Delay before retrying after the given zero-based attempt, clamped to
    /// `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.initial_delay,
            Backoff::Exponential { base } => {
                self.initial_delay.mul_f64(base.powi(attempt.min(16) as i32))
            }
        };
        let capped = base.min(self.max_delay);
        if self.jitter {
            let factor = 1.0 + rand::rng().random_range(-self.jitter_factor..=self.jitter_factor);
            capped.mul_f64(factor.max(0.0))
        } else {
            capped
        }
    }

    /// Drive `op` until it succeeds, the attempt ceiling is reached, or the
    /// `abandoned` signal flips true. Abandonment is only observed between
    /// attempts; an in-flight attempt is never force-cancelled.
    pub async fn run<F, Fut, T, E>(
        &self,
        mut op: F,
        mut abandoned: Option<watch::Receiver<bool>>,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.attempts.max(1);

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt - 1);
                debug!(attempt, ?delay, "waiting before retry");
                if let Some(rx) = abandoned.as_mut() {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        result = rx.wait_for(|abandon| *abandon) => {
                            if result.is_ok() {
                                debug!(attempt, "retry abandoned during backoff");
                                return RetryOutcome::Cancelled;
                            }
                        }
                    }
                } else {
                    sleep(delay).await;
                }
            }

            if let Some(rx) = abandoned.as_ref() {
                if *rx.borrow() {
                    debug!(attempt, "retry abandoned before attempt");
                    return RetryOutcome::Cancelled;
                }
            }

            match op(attempt).await {
                Ok(value) => return RetryOutcome::Ok(value),
                Err(error) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts, %error, "attempt failed"
                    );
                    if attempt + 1 >= max_attempts {
                        return RetryOutcome::Exhausted {
                            attempts: max_attempts,
                            last_error: error,
                        };
                    }
                }
            }
        }

        unreachable!("loop always returns within the attempt ceiling")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fixed(attempts: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Backoff::Fixed,
            initial_delay: Duration::from_millis(delay_ms),
            max_delay: Duration::from_secs(4),
            jitter: false,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn fixed_backoff_schedule() {
        let policy = fixed(5, 500);
        for attempt in 0..5 {
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn exponential_backoff_doubles_and_clamps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        // Clamped at max_delay from here on
        assert_eq!(policy.delay_for(10), Duration::from_secs(4));
    }

    #[test]
    fn jitter_stays_within_factor() {
        let policy = RetryPolicy {
            jitter: true,
            jitter_factor: 0.2,
            backoff: Backoff::Fixed,
            ..RetryPolicy::default()
        };
        for _ in 0..100 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt() {
        let policy = fixed(3, 100);
        let outcome: RetryOutcome<u32, String> = policy.run(|_| async { Ok(42) }, None).await;
        assert!(matches!(outcome, RetryOutcome::Ok(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let policy = fixed(3, 100);
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<u32, String> = policy
            .run(
                |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("not yet".to_string())
                        } else {
                            Ok(n)
                        }
                    }
                },
                None,
            )
            .await;
        assert!(matches!(outcome, RetryOutcome::Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_ceiling() {
        let policy = fixed(3, 100);
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<(), String> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("no ack".to_string()) }
                },
                None,
            )
            .await;
        match outcome {
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "no ack");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_signal_cancels_between_attempts() {
        let policy = fixed(5, 60_000);
        let (tx, rx) = watch::channel(false);

        let run = policy.run(
            |_| async { Err::<(), _>("no ack".to_string()) },
            Some(rx),
        );
        let abandon = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(true).unwrap();
        };

        let (outcome, ()) = tokio::join!(run, abandon);
        assert!(matches!(outcome, RetryOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn already_abandoned_runs_nothing() {
        let policy = fixed(3, 100);
        let (tx, rx) = watch::channel(true);
        let calls = AtomicU32::new(0);

        let outcome: RetryOutcome<(), String> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("no ack".to_string()) }
                },
                Some(rx),
            )
            .await;

        assert!(matches!(outcome, RetryOutcome::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(tx);
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let policy = fixed(0, 100);
        let outcome: RetryOutcome<(), String> = tokio_test::block_on(
            policy.run(|_| async { Err("still fails".to_string()) }, None),
        );
        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted { attempts: 1, .. }
        ));
    }

    #[test]
    fn policy_deserializes_from_toml_with_humantime() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            attempts = 4
            initial_delay = "250ms"
            max_delay = "2s"
            backoff = "fixed"
            "#,
        )
        .unwrap();
        assert_eq!(policy.attempts, 4);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.backoff, Backoff::Fixed);
    }
}
