//! Anchor namespace
//!
//! An [`Anchor`] is a handle to a node in the (possibly remote) namespace
//! tree. Walking is purely local; nothing touches the network until `ls`,
//! `load`, `store` or `spawn` is awaited. Each of those issues exactly one
//! [`Call`] through the anchor's [`AnchorProvider`], waits on it under the
//! caller's [`Context`], and releases it on every exit path.

pub mod call;
pub mod context;
pub mod path;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

pub use call::{Call, CallError, Resolver};
pub use context::{CancelHandle, Context, ContextError};
pub use path::Path;

use crate::runtime::error::RuntimeResult;
use crate::runtime::values::Value;

/// Capability to operate on a namespace, local or remote.
///
/// Implementations must return immediately; the work happens behind the
/// returned [`Call`].
pub trait AnchorProvider: Send + Sync {
    /// Identifies the connection the provider speaks over. Anchors over the
    /// same connection and path denote the same node.
    fn connection_id(&self) -> u64;

    /// Names of the children of `path`.
    fn ls(&self, path: &Path) -> Call<Vec<String>>;

    fn load(&self, path: &Path) -> Call<Value>;

    fn store(&self, path: &Path, value: Value) -> Call<()>;

    /// Starts a process bound to `path`; resolves to the process id.
    fn spawn(&self, path: &Path, args: Vec<Value>) -> Call<String>;
}

#[derive(Clone)]
pub struct Anchor {
    provider: Arc<dyn AnchorProvider>,
    path: Path,
}

impl Anchor {
    /// Root anchor of the namespace served by `provider`.
    pub fn root(provider: Arc<dyn AnchorProvider>) -> Self {
        Self {
            provider,
            path: Path::root(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection_id(&self) -> u64 {
        self.provider.connection_id()
    }

    /// Anchor at `self.path / path`. Never fails and never blocks.
    pub fn walk(&self, path: &Path) -> Anchor {
        Anchor {
            provider: Arc::clone(&self.provider),
            path: self.path.join(path),
        }
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path))]
    pub async fn ls(&self, ctx: &Context) -> RuntimeResult<Vec<Anchor>> {
        let call = self.provider.ls(&self.path);
        let outcome = call.wait(ctx).await;
        call.release();

        let names = outcome?;
        debug!(children = names.len(), "listed anchor");
        names
            .iter()
            .map(|name| Ok(self.walk(&Path::new([name.as_str()])?)))
            .collect()
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path))]
    pub async fn load(&self, ctx: &Context) -> RuntimeResult<Value> {
        let call = self.provider.load(&self.path);
        let outcome = call.wait(ctx).await;
        call.release();
        outcome
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path))]
    pub async fn store(&self, ctx: &Context, value: Value) -> RuntimeResult<()> {
        let call = self.provider.store(&self.path, value);
        let outcome = call.wait(ctx).await;
        call.release();
        outcome
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path))]
    pub async fn spawn(&self, ctx: &Context, args: Vec<Value>) -> RuntimeResult<String> {
        let call = self.provider.spawn(&self.path, args);
        let outcome = call.wait(ctx).await;
        call.release();
        outcome
    }
}

impl PartialEq for Anchor {
    fn eq(&self, other: &Self) -> bool {
        self.connection_id() == other.connection_id() && self.path == other.path
    }
}

impl Eq for Anchor {}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("connection", &self.connection_id())
            .field("path", &self.path)
            .finish()
    }
}
