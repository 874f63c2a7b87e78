//! Anchor RPC
//!
//! Connections are obtained from a [`Dialer`] and closed with
//! [`Conn::hang_up`]. The helpers here follow the same shape: dial, operate,
//! hang up on every exit path.

pub mod client;
pub mod server;
pub mod transport;
pub mod wire;

use thiserror::Error;
use tracing::instrument;
use ww_lang::anchor::{Anchor, Context, ContextError, Path};
use ww_lang::runtime::{RuntimeError, RuntimeResult};

pub use client::Conn;
pub use transport::{pipe, Dialer, LocalDialer, Pipe};

/// Protocol identifier spoken by anchor sessions.
pub const ANCHOR_PROTOCOL: &str = "/ww/0.1.0/anchor";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("unsupported protocol {0}")]
    UnsupportedProtocol(String),

    #[error("dial failed: {0}")]
    Dial(String),

    #[error("dial interrupted: {0}")]
    Cancelled(ContextError),

    #[error("frame codec: {0}")]
    Codec(String),
}

impl From<RpcError> for RuntimeError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Cancelled(e) => RuntimeError::Cancelled(e),
            other => RuntimeError::RemoteCall {
                path: Path::root().to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Dials `protocol`, giving up when `ctx` is done.
#[instrument(level = "debug", skip(ctx, dialer))]
pub async fn dial(ctx: &Context, dialer: &dyn Dialer, protocol: &str) -> Result<Conn, RpcError> {
    tokio::select! {
        biased;
        err = ctx.done() => Err(RpcError::Cancelled(err)),
        pipe = dialer.dial(protocol) => Ok(Conn::new(pipe?, protocol)),
    }
}

/// Lists the children of `path` on the peer behind `dialer`.
pub async fn ls(
    ctx: &Context,
    dialer: &dyn Dialer,
    protocol: &str,
    path: &Path,
) -> RuntimeResult<Vec<Path>> {
    let conn = dial(ctx, dialer, protocol).await?;
    let outcome = conn.root().walk(path).ls(ctx).await;
    conn.hang_up();
    Ok(outcome?.into_iter().map(|a| a.path().clone()).collect())
}

/// Dials and walks to `path`. The returned handle keeps the connection open
/// until it is closed (or dropped).
pub async fn walk(
    ctx: &Context,
    dialer: &dyn Dialer,
    protocol: &str,
    path: &Path,
) -> Result<Walked, RpcError> {
    let conn = dial(ctx, dialer, protocol).await?;
    let anchor = conn.root().walk(path);
    Ok(Walked { conn, anchor })
}

/// An anchor together with the connection it lives on.
#[derive(Debug)]
pub struct Walked {
    conn: Conn,
    anchor: Anchor,
}

impl Walked {
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn close(self) {
        self.conn.hang_up();
    }
}
