//! Cancellable, deadline-bounded operation context.
//!
//! Every store operation takes an [`OpContext`]. A context carries an optional
//! deadline and any number of cancellation signals inherited from its
//! ancestors; it is cheap to clone and to derive children from.
//!
//! ```text
//! background ── with_timeout(10s) ── with_cancel() ──→ (ctx, handle)
//!                                                        │
//!                            handle.cancel() ────────────┘  cancels ctx and
//!                                                           every child of ctx
//! ```
//!
//! Deadlines are measured with `tokio::time::Instant`, so tests running on a
//! paused clock see them fire deterministically.

use std::future::{pending, Future};
use std::time::Duration;

use futures_util::future::select_all;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::ContextError;

/// Execution context for a single store call (or a startup sequence).
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    signals: Vec<watch::Receiver<bool>>,
}

/// Cancels the context returned alongside it by [`OpContext::with_cancel`].
///
/// Dropping the handle does not cancel anything.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child that expires at `deadline`, or at the parent's deadline
    /// if that is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            signals: self.signals.clone(),
        }
    }

    /// Derive a child that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child that can be cancelled independently of its parent.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut child = self.clone();
        child.signals.push(rx);
        (child, CancelHandle { tx })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|rx| *rx.borrow())
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) -> ContextError {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };
        let signal = async {
            if self.signals.is_empty() {
                pending::<()>().await;
            } else {
                let waits = self
                    .signals
                    .iter()
                    .cloned()
                    .map(|rx| Box::pin(wait_for_cancel(rx)));
                select_all(waits).await;
            }
        };

        tokio::select! {
            biased;
            _ = signal => ContextError::Cancelled,
            _ = deadline => ContextError::DeadlineExceeded,
        }
    }

    /// Run `fut` unless the context finishes first.
    ///
    /// When the context wins, `fut` is dropped without being polled again.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration`, waking early with an error if the context ends.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        self.run(tokio::time::sleep(duration)).await
    }
}

async fn wait_for_cancel(mut rx: watch::Receiver<bool>) {
    loop {
        let cancelled = *rx.borrow_and_update();
        if cancelled {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped without cancelling: this signal never fires.
            pending::<()>().await;
        }
    }
}
