//! Termination signal handling.

use std::fmt;
use std::future::Future;
use std::io;
use tokio::sync::watch;
use tracing::info;

/// Signal that ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Installs SIGINT and SIGTERM handlers and returns a future resolving to
/// the first signal received.
///
/// Signals that arrive between installation and the first poll of the
/// future are not lost.
pub fn install_signal_handlers() -> io::Result<impl Future<Output = ShutdownSignal>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        Ok(async move {
            tokio::select! {
                _ = interrupt.recv() => ShutdownSignal::Interrupt,
                _ = terminate.recv() => ShutdownSignal::Terminate,
            }
        })
    }

    #[cfg(not(unix))]
    {
        Ok(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            ShutdownSignal::Interrupt
        })
    }
}

/// Waits for `signal` and tells every holder of the receiver side to stop.
pub async fn supervise<F>(signal: F, shutdown: watch::Sender<bool>) -> ShutdownSignal
where
    F: Future<Output = ShutdownSignal>,
{
    let received = signal.await;
    info!("Received {}, exiting", received);
    // Receivers may already be gone
    let _ = shutdown.send(true);
    received
}
