use std::future::Future;
use std::sync::Arc;

use futures::future;
use thiserror::Error;
use tokio::select;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{self, Duration, Instant};
use tracing::{info, warn};

/// Why a [`RunContext`] stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    #[error("received {0}")]
    Interrupted(&'static str),

    #[error("cancelled by caller")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation and deadline shared by every cluster call of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    rx: watch::Receiver<Option<CancelReason>>,
    deadline: Option<Instant>,
}

/// Cancels the [`RunContext`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(Some(CancelReason::Cancelled));
    }
}

impl RunContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (_, rx) = watch::channel(None);
        RunContext { rx, deadline: None }
    }

    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(None);
        (
            RunContext { rx, deadline: None },
            CancelHandle { tx: Arc::new(tx) },
        )
    }

    /// A context cancelled by SIGINT or SIGTERM.
    pub fn from_signals() -> Self {
        RunContext {
            rx: spawn_signal_listener(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A fresh context bounded only by `grace`, for work that must still run
    /// after a run's own context was cancelled.
    pub fn detached(grace: Duration) -> Self {
        RunContext::background().with_timeout(grace)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason if the context is already done.
    pub fn err(&self) -> Option<CancelReason> {
        if let Some(reason) = *self.rx.borrow() {
            return Some(reason);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        let flagged = async move {
            loop {
                let current = *rx.borrow_and_update();
                if let Some(reason) = current {
                    return reason;
                }
                if rx.changed().await.is_err() {
                    return future::pending::<CancelReason>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => select! {
                reason = flagged => reason,
                _ = time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => flagged.await,
        }
    }

    /// Drives `fut` unless the context finishes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, CancelReason> {
        if let Some(reason) = self.err() {
            return Err(reason);
        }
        select! {
            biased;
            reason = self.cancelled() => Err(reason),
            output = fut => Ok(output),
        }
    }
}

fn spawn_signal_listener() -> watch::Receiver<Option<CancelReason>> {
    let (cancel_tx, cancel_rx) = watch::channel(None);

    tokio::spawn(async move {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).ok();

        let term_future = async {
            if let Some(ref mut sigterm) = sigterm {
                sigterm.recv().await;
                Some("SIGTERM")
            } else {
                future::pending::<Option<&'static str>>().await
            }
        };

        select! {
            res = signal::ctrl_c() => {
                if res.is_ok() {
                    info!("Received SIGINT. Cancelling run...");
                    let _ = cancel_tx.send(Some(CancelReason::Interrupted("SIGINT")));
                } else {
                    warn!("Failed to listen for SIGINT: {:?}", res.err());
                    future::pending::<()>().await;
                }
            }
            _ = term_future => {
                info!("Received SIGTERM. Cancelling run...");
                let _ = cancel_tx.send(Some(CancelReason::Interrupted("SIGTERM")));
            }
        }
    });

    cancel_rx
}
