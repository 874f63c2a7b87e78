//! Cancellation contexts for anchor operations
//!
//! A [`Context`] is passed top-down into every operation that may wait on the
//! network. It is done once any ancestor has been cancelled or the tightest
//! deadline in its lineage has passed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Reason a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Clone, Default)]
pub struct Context {
    signals: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels the context it was created with, and every context derived from it.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context that is never done.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut child = self.clone();
        child.signals.push(rx);
        (child, CancelHandle { tx: Arc::new(tx) })
    }

    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        });
        child
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check, `None` while the context is live.
    pub fn err(&self) -> Option<ContextError> {
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is done. Never resolves for a background
    /// context.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }

        let mut waiters: Vec<BoxFuture<'static, ContextError>> = self
            .signals
            .iter()
            .cloned()
            .map(|mut rx| {
                async move {
                    // A dropped handle can no longer cancel.
                    if rx.wait_for(|canceled| *canceled).await.is_err() {
                        future::pending::<()>().await;
                    }
                    ContextError::Canceled
                }
                .boxed()
            })
            .collect();

        if let Some(deadline) = self.deadline {
            waiters.push(
                async move {
                    tokio::time::sleep_until(deadline).await;
                    ContextError::DeadlineExceeded
                }
                .boxed(),
            );
        }

        if waiters.is_empty() {
            return future::pending().await;
        }
        let (err, _, _) = future::select_all(waiters).await;
        err
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("signals", &self.signals.len())
            .field("deadline", &self.deadline)
            .field("err", &self.err())
            .finish()
    }
}
