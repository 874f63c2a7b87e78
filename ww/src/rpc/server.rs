//! Server side of an anchor session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use ww_lang::anchor::{AnchorProvider, Call, Context, Path};
use ww_lang::runtime::{RuntimeError, RuntimeResult};
use ww_lang::Value;

use super::transport::Pipe;
use super::wire::{self, Body, Frame, Request, Response};
use crate::datum::Datum;
use crate::namespace::Namespace;

/// Serves requests arriving on `pipe` until the client hangs up. Each
/// request runs in its own task so a `Cancel` frame can abort it.
#[instrument(level = "info", skip_all, fields(host = %namespace.host()))]
pub async fn serve(namespace: Arc<Namespace>, pipe: Pipe) {
    let Pipe { tx, mut rx } = pipe;
    let mut tasks: HashMap<u64, JoinHandle<()>> = HashMap::new();

    while let Some(bytes) = rx.recv().await {
        let frame = match wire::decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                continue;
            }
        };
        tasks.retain(|_, task| !task.is_finished());

        match frame.body {
            Body::Request(request) => {
                let namespace = Arc::clone(&namespace);
                let tx = tx.clone();
                let id = frame.id;
                tasks.insert(
                    id,
                    tokio::spawn(async move {
                        let response = handle(&*namespace, request).await;
                        respond(&tx, id, response);
                    }),
                );
            }
            Body::Cancel => {
                if let Some(task) = tasks.remove(&frame.id) {
                    task.abort();
                    debug!(id = frame.id, "request cancelled by client");
                }
            }
            Body::Response(_) => warn!(id = frame.id, "ignoring response frame sent by client"),
        }
    }

    for (_, task) in tasks.drain() {
        task.abort();
    }
    info!("session closed");
}

#[instrument(level = "debug", skip_all, fields(kind = request.kind(), path = request.path()))]
async fn handle(provider: &dyn AnchorProvider, request: Request) -> Response {
    let path = match Path::parse(request.path()) {
        Ok(path) => path,
        Err(e) => return Response::Error(e.to_string()),
    };

    let outcome = match request {
        Request::Ls { .. } => wait(provider.ls(&path)).await.map(Response::Children),
        Request::Load { .. } => wait(provider.load(&path))
            .await
            .and_then(|value| Datum::try_from(&value).map_err(|e| e.to_string()))
            .map(Response::Value),
        Request::Store { value, .. } => match value.into_value() {
            Ok(value) => wait(provider.store(&path, value)).await.map(|()| Response::Stored),
            Err(e) => Err(e.to_string()),
        },
        Request::Spawn { args, .. } => match into_values(args) {
            Ok(args) => wait(provider.spawn(&path, args)).await.map(Response::Spawned),
            Err(e) => Err(e.to_string()),
        },
    };
    outcome.unwrap_or_else(Response::Error)
}

fn into_values(items: Vec<Datum>) -> RuntimeResult<Vec<Value>> {
    items.into_iter().map(Datum::into_value).collect()
}

/// Waits on a local call and releases it. Remote-call errors are unwrapped
/// to their message; the client attaches the path again on its side.
async fn wait<T>(call: Call<T>) -> Result<T, String>
where
    T: Clone + Send + Sync + 'static,
{
    let outcome = call.wait(&Context::background()).await;
    call.release();
    outcome.map_err(|e| match e {
        RuntimeError::RemoteCall { message, .. } => message,
        other => other.to_string(),
    })
}

fn respond(tx: &mpsc::UnboundedSender<Vec<u8>>, id: u64, response: Response) {
    let frame = Frame {
        id,
        body: Body::Response(response),
    };
    match wire::encode(&frame) {
        Ok(bytes) => {
            if tx.send(bytes).is_err() {
                debug!(id, "client gone before response");
            }
        }
        Err(e) => warn!(id, error = %e, "cannot encode response"),
    }
}
