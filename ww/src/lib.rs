// ww host library
// Serves an anchor namespace over RPC and runs processes spawned into it.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod config;
pub mod datum;
pub mod host;
pub mod logging;
pub mod namespace;
pub mod rpc;

pub use config::{ConfigError, WwConfig};
pub use datum::Datum;
pub use host::Host;
pub use namespace::Namespace;
pub use rpc::{Conn, Dialer, LocalDialer, RpcError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique id for anchors' equality; shared by local namespaces and remote
/// connections so the two never collide.
pub(crate) fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}
