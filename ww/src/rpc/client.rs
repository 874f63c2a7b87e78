//! Client side of an anchor connection.
//!
//! A [`Conn`] owns one duplex pipe. Calls are tracked in a pending table
//! keyed by frame id; a reader task settles them as responses arrive.
//! Releasing a call that is still pending removes it from the table and
//! tells the server to abort the request.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ww_lang::anchor::call::{self, Resolver};
use ww_lang::anchor::{Anchor, AnchorProvider, Call, CallError, Path};
use ww_lang::Value;

use super::transport::Pipe;
use super::wire::{self, Body, Frame, Request, Response};
use crate::datum::Datum;

enum PendingCall {
    Ls(Resolver<Vec<String>>),
    Load(Resolver<Value>),
    Store(Resolver<()>),
    Spawn(Resolver<String>),
}

impl PendingCall {
    fn settle(self, response: Response) {
        match (self, response) {
            (PendingCall::Ls(r), Response::Children(names)) => r.resolve(names),
            (PendingCall::Load(r), Response::Value(datum)) => {
                r.complete(datum.into_value().map_err(|e| CallError::Remote(e.to_string())))
            }
            (PendingCall::Store(r), Response::Stored) => r.resolve(()),
            (PendingCall::Spawn(r), Response::Spawned(pid)) => r.resolve(pid),
            (pending, Response::Error(message)) => pending.fail(CallError::Remote(message)),
            (pending, other) => pending.fail(CallError::Remote(format!(
                "unexpected response {:?}",
                other
            ))),
        }
    }

    fn fail(self, err: CallError) {
        match self {
            PendingCall::Ls(r) => r.fail(err),
            PendingCall::Load(r) => r.fail(err),
            PendingCall::Store(r) => r.fail(err),
            PendingCall::Spawn(r) => r.fail(err),
        }
    }
}

type PendingTable = Arc<DashMap<u64, PendingCall>>;
type Outbound = Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>;

/// Shared connection state; also the [`AnchorProvider`] behind every anchor
/// walked from [`Conn::root`].
struct Session {
    connection_id: u64,
    protocol: String,
    next_id: AtomicU64,
    closed: AtomicBool,
    pending: PendingTable,
    outbound: Outbound,
}

impl Session {
    fn send(outbound: &Outbound, frame: &Frame) -> Result<(), CallError> {
        let bytes = wire::encode(frame).map_err(|e| CallError::Remote(e.to_string()))?;
        let guard = match outbound.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(tx) => tx.send(bytes).map_err(|_| CallError::ConnectionClosed),
            None => Err(CallError::ConnectionClosed),
        }
    }

    fn issue<T>(
        &self,
        path: &Path,
        request: Request,
        track: fn(Resolver<T>) -> PendingCall,
    ) -> Call<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Call::failed(path.clone(), CallError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let outbound = Arc::clone(&self.outbound);
        let (call, resolver) = call::pending(path.clone(), move || {
            // Still pending means nobody will read the answer.
            if pending.remove(&id).is_some() {
                debug!(id, "cancelling released call");
                if let Err(err) = Session::send(&outbound, &Frame { id, body: Body::Cancel }) {
                    warn!(id, error = %err, "could not send cancel for released call");
                }
            }
        });

        self.pending.insert(id, track(resolver));
        let frame = Frame {
            id,
            body: Body::Request(request),
        };
        if let Err(err) = Session::send(&self.outbound, &frame) {
            if let Some((_, pending)) = self.pending.remove(&id) {
                pending.fail(err);
            }
        }
        call
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        match self.outbound.lock() {
            Ok(mut guard) => drop(guard.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                pending.fail(CallError::ConnectionClosed);
            }
        }
    }
}

impl AnchorProvider for Session {
    fn connection_id(&self) -> u64 {
        self.connection_id
    }

    fn ls(&self, path: &Path) -> Call<Vec<String>> {
        self.issue(path, Request::Ls { path: path.to_string() }, PendingCall::Ls)
    }

    fn load(&self, path: &Path) -> Call<Value> {
        self.issue(path, Request::Load { path: path.to_string() }, PendingCall::Load)
    }

    fn store(&self, path: &Path, value: Value) -> Call<()> {
        match Datum::try_from(&value) {
            Ok(value) => self.issue(
                path,
                Request::Store {
                    path: path.to_string(),
                    value,
                },
                PendingCall::Store,
            ),
            Err(e) => Call::failed(path.clone(), CallError::Remote(e.to_string())),
        }
    }

    fn spawn(&self, path: &Path, args: Vec<Value>) -> Call<String> {
        let args = args.iter().map(Datum::try_from).collect::<Result<Vec<_>, _>>();
        match args {
            Ok(args) => self.issue(
                path,
                Request::Spawn {
                    path: path.to_string(),
                    args,
                },
                PendingCall::Spawn,
            ),
            Err(e) => Call::failed(path.clone(), CallError::Remote(e.to_string())),
        }
    }
}

/// An open connection. Hang up explicitly when done; dropping the last
/// handle hangs up as a backstop.
pub struct Conn {
    session: Arc<Session>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Conn {
    /// Takes ownership of the client end of a pipe and starts reading
    /// responses from it.
    pub fn new(pipe: Pipe, protocol: impl Into<String>) -> Self {
        let Pipe { tx, rx } = pipe;
        let session = Arc::new(Session {
            connection_id: crate::next_connection_id(),
            protocol: protocol.into(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            pending: Arc::new(DashMap::new()),
            outbound: Arc::new(Mutex::new(Some(tx))),
        });
        let reader = tokio::spawn(read_responses(Arc::clone(&session), rx));
        info!(
            connection = session.connection_id,
            protocol = %session.protocol,
            "connection open"
        );
        Self {
            session,
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Root anchor of the remote namespace.
    pub fn root(&self) -> Anchor {
        Anchor::root(Arc::clone(&self.session) as Arc<dyn AnchorProvider>)
    }

    pub fn connection_id(&self) -> u64 {
        self.session.connection_id
    }

    pub fn is_closed(&self) -> bool {
        self.session.closed.load(Ordering::SeqCst)
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.session.pending.len()
    }

    /// Closes the connection. Outstanding and future calls fail with
    /// [`CallError::ConnectionClosed`]. Idempotent.
    pub fn hang_up(&self) {
        if self.session.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.close();
        let reader = match self.reader.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(reader) = reader {
            reader.abort();
        }
        info!(connection = self.session.connection_id, "connection closed");
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!(connection = self.session.connection_id, "hanging up on drop");
            self.hang_up();
        }
    }
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("connection_id", &self.session.connection_id)
            .field("protocol", &self.session.protocol)
            .field("pending", &self.pending_calls())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn read_responses(session: Arc<Session>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        let frame = match wire::decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                continue;
            }
        };
        match frame.body {
            Body::Response(response) => match session.pending.remove(&frame.id) {
                Some((_, pending)) => pending.settle(response),
                None => debug!(id = frame.id, "response for a released call"),
            },
            _ => warn!(id = frame.id, "ignoring non-response frame from server"),
        }
    }

    // The server went away.
    session.closed.store(true, Ordering::SeqCst);
    session.close();
    debug!(connection = session.connection_id, "remote end closed");
}
