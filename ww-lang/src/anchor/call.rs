//! In-flight anchor calls
//!
//! Every anchor operation returns a [`Call`] immediately. The call is a
//! write-once cell: it moves from pending to resolved or failed exactly once,
//! and any number of observers may [`Call::wait`] on it concurrently.
//!
//! Each call owns a release hook (freeing the transport's bookkeeping for
//! the call, or cancelling it remotely if it is still pending). Callers
//! release explicitly once they stop waiting; dropping the last handle runs
//! the hook as a backstop. Either way it runs exactly once.
//!
//! Releasing a call that is still pending abandons it: the cell moves to a
//! terminal cancelled state, every later wait reports the cancellation and
//! a late outcome from the owner is discarded.

use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::anchor::context::{Context, ContextError};
use crate::anchor::path::Path;
use crate::runtime::error::{RuntimeError, RuntimeResult};

/// Failure reported by the party that owns a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("{0}")]
    Remote(String),
    #[error("call abandoned before it resolved")]
    Abandoned,
    #[error("connection closed")]
    ConnectionClosed,
}

#[derive(Debug, Clone)]
enum CallState<T> {
    Pending,
    Resolved(T),
    Failed(CallError),
    /// Released while pending.
    Cancelled(ContextError),
}

impl<T> CallState<T> {
    fn is_pending(&self) -> bool {
        matches!(self, CallState::Pending)
    }
}

/// Receives the reason a still-pending call is abandoned.
type ReleaseHook = Box<dyn FnOnce(ContextError) + Send + 'static>;

/// Runs its hook at most once, on `release()` or on drop.
struct Release {
    hook: Mutex<Option<ReleaseHook>>,
    /// Why the last wait gave up, if one did.
    interrupted: Mutex<Option<ContextError>>,
    path: Path,
}

impl Release {
    fn new(path: Path, hook: Option<ReleaseHook>) -> Self {
        Self {
            hook: Mutex::new(hook),
            interrupted: Mutex::new(None),
            path,
        }
    }

    fn interrupt(&self, err: ContextError) {
        match self.interrupted.lock() {
            Ok(mut guard) => *guard = Some(err),
            Err(poisoned) => *poisoned.into_inner() = Some(err),
        }
    }

    fn run(&self, explicit: bool) {
        let hook = match self.hook.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(hook) = hook {
            if !explicit {
                debug!(path = %self.path, "call released by drop");
            }
            let reason = match self.interrupted.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            hook(reason.unwrap_or(ContextError::Canceled));
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        self.run(false);
    }
}

/// Observer side of an in-flight call.
pub struct Call<T> {
    state: watch::Receiver<CallState<T>>,
    release: Arc<Release>,
}

impl<T> Clone for Call<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            release: Arc::clone(&self.release),
        }
    }
}

/// Owner side of an in-flight call. Dropping it unresolved fails the call
/// with [`CallError::Abandoned`].
pub struct Resolver<T> {
    state: Option<Arc<watch::Sender<CallState<T>>>>,
}

/// Creates a pending call for `path`. `release` is invoked exactly once when
/// the call is released (explicitly or by dropping the last handle).
pub fn pending<T, F>(path: Path, release: F) -> (Call<T>, Resolver<T>)
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = watch::channel(CallState::Pending);
    let tx = Arc::new(tx);
    let cell = Arc::clone(&tx);
    let hook_path = path.clone();
    let hook: ReleaseHook = Box::new(move |reason| {
        let abandoned = cell.send_if_modified(|current| {
            if current.is_pending() {
                *current = CallState::Cancelled(reason);
                true
            } else {
                false
            }
        });
        if abandoned {
            debug!(path = %hook_path, %reason, "pending call abandoned");
        }
        release();
    });
    let call = Call {
        state: rx,
        release: Arc::new(Release::new(path, Some(hook))),
    };
    (call, Resolver { state: Some(tx) })
}

impl<T> Call<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A call that has already resolved and holds no resources.
    pub fn ready(path: Path, value: T) -> Self {
        Self::settled(path, CallState::Resolved(value))
    }

    /// A call that has already failed.
    pub fn failed(path: Path, err: CallError) -> Self {
        Self::settled(path, CallState::Failed(err))
    }

    fn settled(path: Path, state: CallState<T>) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self {
            state: rx,
            release: Arc::new(Release::new(path, None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.release.path
    }

    pub fn is_done(&self) -> bool {
        !self.state.borrow().is_pending()
    }

    /// Waits until the call settles or `ctx` is done, whichever comes first.
    /// An interrupted wait leaves the call pending; releasing it afterwards
    /// abandons it with the context's reason.
    pub async fn wait(&self, ctx: &Context) -> RuntimeResult<T> {
        let mut state = self.state.clone();
        let settled = async {
            let observed = state
                .wait_for(|s| !s.is_pending())
                .await
                .map(|guard| (*guard).clone());
            match observed {
                Ok(settled) => settled,
                // The sender is gone; whatever it left behind is final.
                Err(_) => match &*state.borrow() {
                    CallState::Pending => CallState::Failed(CallError::Abandoned),
                    other => other.clone(),
                },
            }
        };

        let outcome = tokio::select! {
            biased;
            state = settled => state,
            err = ctx.done() => {
                debug!(path = %self.path(), %err, "wait interrupted by context");
                self.release.interrupt(err);
                return Err(RuntimeError::Cancelled(err));
            }
        };

        match outcome {
            CallState::Resolved(value) => Ok(value),
            CallState::Failed(err) => Err(RuntimeError::RemoteCall {
                path: self.path().to_string(),
                message: err.to_string(),
            }),
            CallState::Cancelled(err) => Err(RuntimeError::Cancelled(err)),
            CallState::Pending => Err(RuntimeError::Internal(
                "call observed pending after settling".to_string(),
            )),
        }
    }

    /// Releases the resources held for this call. Idempotent and safe to
    /// call from any clone, whether or not the call has settled.
    pub fn release(&self) {
        self.release.run(true);
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.state.borrow() {
            CallState::Pending => "pending",
            CallState::Resolved(_) => "resolved",
            CallState::Failed(_) => "failed",
            CallState::Cancelled(_) => "cancelled",
        };
        f.debug_struct("Call")
            .field("path", &self.release.path)
            .field("status", &status)
            .finish()
    }
}

impl<T> Resolver<T> {
    pub fn resolve(mut self, value: T) {
        self.settle(CallState::Resolved(value));
    }

    pub fn fail(mut self, err: CallError) {
        self.settle(CallState::Failed(err));
    }

    /// Settles with whichever side of `result` is present.
    pub fn complete(self, result: Result<T, CallError>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(err) => self.fail(err),
        }
    }

    fn settle(&mut self, next: CallState<T>) {
        let Some(tx) = self.state.take() else {
            return;
        };
        let mut abandoned = false;
        let written = tx.send_if_modified(|current| match current {
            CallState::Pending => {
                *current = next;
                true
            }
            CallState::Cancelled(_) => {
                abandoned = true;
                false
            }
            _ => false,
        });
        if abandoned {
            debug!("outcome arrived after the call was abandoned");
        } else if !written {
            warn!("call settled more than once; keeping the first outcome");
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if self.state.is_some() {
            self.settle(CallState::Failed(CallError::Abandoned));
        }
    }
}
