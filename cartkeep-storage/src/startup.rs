//! Startup probing for remote backends.
//!
//! A remote backend is usable once one liveness probe succeeds. Until then the
//! store moves through [`StartupState`]:
//!
//! ```text
//! Probing(1) -> Ready
//!            -> (wait) Probing(2) -> ... -> Probing(max) -> Failed
//! ```
//!
//! Every wait races the caller's [`OpContext`]; a cancelled or expired context
//! ends the sequence at once.

use std::future::Future;

use cartkeep_core::{OpContext, StartupPolicy, UnavailableError};

/// Where a startup sequence currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupState {
    /// About to send probe number `attempt` (1-based).
    Probing { attempt: u32 },
    /// A probe succeeded after `attempts` tries.
    Ready { attempts: u32 },
    /// The backend never became ready.
    Failed(UnavailableError),
}

impl StartupState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StartupState::Probing { .. })
    }
}

/// Drives [`StartupState`] to a terminal state.
#[derive(Debug, Clone)]
pub struct Startup {
    policy: StartupPolicy,
    component: &'static str,
}

impl Startup {
    pub fn new(policy: StartupPolicy) -> Self {
        Self {
            policy,
            component: "backend",
        }
    }

    /// Name used in log events.
    pub fn with_component(mut self, component: &'static str) -> Self {
        self.component = component;
        self
    }

    /// Probe until ready, the attempts run out, or `ctx` ends.
    ///
    /// Returns the number of probes sent. `probe` receives the attempt number
    /// and must bound its own duration.
    pub async fn run<F, Fut>(
        &self,
        ctx: &OpContext,
        mut probe: F,
    ) -> Result<u32, UnavailableError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut state = StartupState::Probing { attempt: 1 };

        loop {
            state = match state {
                StartupState::Probing { attempt } => {
                    if let Err(reason) = ctx.check() {
                        StartupState::Failed(UnavailableError::Aborted {
                            attempts: attempt - 1,
                            reason,
                        })
                    } else if probe(attempt).await {
                        StartupState::Ready { attempts: attempt }
                    } else if let Err(reason) = ctx.check() {
                        // The probe may have failed because `ctx` ended under it.
                        StartupState::Failed(UnavailableError::Aborted {
                            attempts: attempt,
                            reason,
                        })
                    } else if attempt >= max_attempts {
                        StartupState::Failed(UnavailableError::Exhausted { attempts: attempt })
                    } else {
                        let delay = self.policy.delay_for_attempt(attempt);
                        tracing::warn!(
                            component = self.component,
                            attempt,
                            max_attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            "Liveness probe failed"
                        );
                        match ctx.sleep(delay).await {
                            Ok(()) => StartupState::Probing {
                                attempt: attempt + 1,
                            },
                            Err(reason) => StartupState::Failed(UnavailableError::Aborted {
                                attempts: attempt,
                                reason,
                            }),
                        }
                    }
                }
                StartupState::Ready { attempts } => {
                    tracing::info!(component = self.component, attempts, "Backend ready");
                    return Ok(attempts);
                }
                StartupState::Failed(err) => {
                    tracing::error!(
                        component = self.component,
                        error = %err,
                        "Backend unavailable"
                    );
                    return Err(err);
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartkeep_core::ContextError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn counting_probe(
        succeed_on: Option<u32>,
    ) -> (Arc<AtomicU32>, impl FnMut(u32) -> std::future::Ready<bool>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let probe = move |attempt: u32| {
            seen.fetch_add(1, Ordering::SeqCst);
            std::future::ready(succeed_on.is_some_and(|n| attempt >= n))
        };
        (calls, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_probe_does_not_wait() {
        let (calls, probe) = counting_probe(Some(1));
        let start = Instant::now();

        let attempts = Startup::new(StartupPolicy::default())
            .run(&OpContext::background(), probe)
            .await
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_failures_backs_off() {
        let (calls, probe) = counting_probe(Some(4));
        let start = Instant::now();

        let attempts = Startup::new(StartupPolicy::default())
            .run(&OpContext::background(), probe)
            .await
            .unwrap();

        assert_eq!(attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_waits_exactly_the_backoff_sum() {
        let policy = StartupPolicy::default();
        let expected = policy.total_backoff();
        let (calls, probe) = counting_probe(None);
        let start = Instant::now();

        let err = Startup::new(policy)
            .run(&OpContext::background(), probe)
            .await
            .unwrap_err();

        assert_eq!(err, UnavailableError::Exhausted { attempts: 30 });
        assert_eq!(calls.load(Ordering::SeqCst), 30);
        // No wait after the last probe.
        assert_eq!(start.elapsed(), expected);
        assert_eq!(expected, Duration::from_secs(751));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_aborts_immediately() {
        let (ctx, handle) = OpContext::background().with_cancel();
        let (calls, probe) = counting_probe(None);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            handle.cancel();
        });
        let start = Instant::now();

        let err = Startup::new(StartupPolicy::default())
            .run(&ctx, probe)
            .await
            .unwrap_err();

        // Probes at 0s, 1s, 3s, 7s; the 8s wait is cut short at 10s.
        assert_eq!(
            err,
            UnavailableError::Aborted {
                attempts: 4,
                reason: ContextError::Cancelled
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_backoff_aborts() {
        let ctx = OpContext::background().with_timeout(Duration::from_secs(60));
        let (_calls, probe) = counting_probe(None);
        let start = Instant::now();

        let err = Startup::new(StartupPolicy::default())
            .run(&ctx, probe)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            UnavailableError::Aborted {
                attempts: 6,
                reason: ContextError::DeadlineExceeded
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_sends_no_probe() {
        let (ctx, handle) = OpContext::background().with_cancel();
        handle.cancel();
        let (calls, probe) = counting_probe(Some(1));

        let err = Startup::new(StartupPolicy::default())
            .run(&ctx, probe)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            UnavailableError::Aborted {
                attempts: 0,
                reason: ContextError::Cancelled
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_policy_respects_max_attempts() {
        let policy = StartupPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(150),
            multiplier: 2,
        };
        let (calls, probe) = counting_probe(None);
        let start = Instant::now();

        let err = Startup::new(policy)
            .with_component("test")
            .run(&OpContext::background(), probe)
            .await
            .unwrap_err();

        assert_eq!(err, UnavailableError::Exhausted { attempts: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_last_probe_reports_abort() {
        let policy = StartupPolicy {
            max_attempts: 2,
            ..StartupPolicy::default()
        };
        let (ctx, handle) = OpContext::background().with_cancel();
        let probe_ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            handle.cancel();
        });
        let start = Instant::now();

        // Each probe takes 10s unless the context ends first.
        let err = Startup::new(policy)
            .run(&ctx, |_| {
                let probe_ctx = probe_ctx.clone();
                async move {
                    let _ = probe_ctx.sleep(Duration::from_secs(10)).await;
                    false
                }
            })
            .await
            .unwrap_err();

        // Probe 1 runs 0s..10s, the wait ends at 11s, probe 2 is cut at 12s.
        assert_eq!(
            err,
            UnavailableError::Aborted {
                attempts: 2,
                reason: ContextError::Cancelled
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!StartupState::Probing { attempt: 1 }.is_terminal());
        assert!(StartupState::Ready { attempts: 1 }.is_terminal());
        assert!(StartupState::Failed(UnavailableError::Exhausted { attempts: 30 }).is_terminal());
    }
}
