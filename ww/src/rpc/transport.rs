//! In-process duplex byte transport and the dialer abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use super::{server, RpcError};
use crate::namespace::Namespace;

/// One end of a duplex byte pipe. Each message is one encoded frame.
#[derive(Debug)]
pub struct Pipe {
    pub tx: mpsc::UnboundedSender<Vec<u8>>,
    pub rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Two connected ends.
pub fn pipe() -> (Pipe, Pipe) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (Pipe { tx: a_tx, rx: a_rx }, Pipe { tx: b_tx, rx: b_rx })
}

/// Opens connections to a peer speaking `protocol`.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, protocol: &str) -> Result<Pipe, RpcError>;
}

/// Dials a namespace in the same process. Each dial starts a fresh server
/// session.
#[derive(Debug, Clone)]
pub struct LocalDialer {
    namespace: Arc<Namespace>,
    protocol: String,
}

impl LocalDialer {
    pub fn new(namespace: Arc<Namespace>, protocol: impl Into<String>) -> Self {
        Self {
            namespace,
            protocol: protocol.into(),
        }
    }
}

#[async_trait]
impl Dialer for LocalDialer {
    async fn dial(&self, protocol: &str) -> Result<Pipe, RpcError> {
        if protocol != self.protocol {
            return Err(RpcError::UnsupportedProtocol(protocol.to_string()));
        }
        let (client, server_end) = pipe();
        info!(host = %self.namespace.host(), %protocol, "accepted local dial");
        tokio::spawn(server::serve(Arc::clone(&self.namespace), server_end));
        Ok(client)
    }
}
