//! Process shutdown signals.
//!
//! SIGINT and, on Unix, SIGTERM both request a graceful stop. Orchestrators
//! send SIGTERM before killing a container.

use std::io;

use cartkeep_core::CancelHandle;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Listener for the signals that stop the server.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the signal handlers. Must be called inside a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the first shutdown signal and return its name.
    pub async fn recv(mut self) -> &'static str {
        let interrupted = tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            name = self.wait_terminate() => return name,
        };
        match interrupted {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGINT");
                self.wait_terminate().await
            }
        }
    }

    #[cfg(unix)]
    async fn wait_terminate(&mut self) -> &'static str {
        match self.terminate.recv().await {
            Some(()) => "SIGTERM",
            None => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn wait_terminate(&mut self) -> &'static str {
        std::future::pending().await
    }

    /// Cancel `handle` once a shutdown signal arrives.
    pub async fn cancel_on_signal(self, handle: CancelHandle) {
        let signal = self.recv().await;
        tracing::info!(signal, "Shutdown signal received");
        handle.cancel();
    }
}
