// End-to-end tests for anchor RPC over the in-process transport.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use ww::datum::Datum;
use ww::namespace::{Namespace, ProcessStatus, SpawnSettings};
use ww::rpc::wire::{self, Body, Request};
use ww::rpc::{self, Conn, LocalDialer, RpcError, ANCHOR_PROTOCOL};
use ww_lang::anchor::{Context, Path};
use ww_lang::runtime::{Environment, Evaluator, Runtime, RuntimeError};
use ww_lang::Value;

fn path(p: &str) -> Path {
    Path::parse(p).unwrap()
}

fn namespace() -> Arc<Namespace> {
    Namespace::new("test-host", SpawnSettings::default())
}

async fn connect(ns: &Arc<Namespace>) -> Conn {
    let dialer = LocalDialer::new(Arc::clone(ns), ANCHOR_PROTOCOL);
    rpc::dial(&Context::background(), &dialer, ANCHOR_PROTOCOL)
        .await
        .unwrap()
}

async fn wait_for_exit(ns: &Namespace, at: &Path) -> ProcessStatus {
    for _ in 0..200 {
        if let Some(record) = ns.process(at).unwrap() {
            if !record.status.is_running() {
                return record.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("process at {} never finished", at);
}

#[tokio::test]
async fn load_and_store_through_a_connection() {
    let ns = namespace();
    ns.set(&path("/cluster/node1"), Datum::Integer(42)).unwrap();
    let conn = connect(&ns).await;
    let ctx = Context::background();

    let node = conn.root().walk(&path("/cluster/node1"));
    assert_eq!(node.load(&ctx).await.unwrap(), Value::Integer(42));

    node.store(&ctx, Value::string("seven")).await.unwrap();
    assert_eq!(
        ns.get(&path("/cluster/node1")).unwrap(),
        Some(Datum::String("seven".to_string()))
    );
    assert_eq!(conn.pending_calls(), 0);
    conn.hang_up();
}

#[tokio::test]
async fn evaluator_over_a_remote_root() {
    let ns = namespace();
    let conn = connect(&ns).await;
    let runtime = Runtime::with_core(conn.root());

    runtime.eval_str("(/a/x 1) (/a/y [1 2 3])").await.unwrap();
    assert_eq!(runtime.eval_str("(/a/x)").await.unwrap(), Value::Integer(1));
    assert_eq!(
        runtime.eval_str("(count (/a/y))").await.unwrap(),
        Value::Integer(3)
    );

    let listed = runtime.eval_str("(ls /a)").await.unwrap();
    let names: Vec<String> = listed
        .as_seq()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names, vec!["/a/x".to_string(), "/a/y".to_string()]);
    conn.hang_up();
}

#[tokio::test]
async fn functions_cannot_be_stored_remotely() {
    let ns = namespace();
    let conn = connect(&ns).await;
    let runtime = Runtime::with_core(conn.root());

    let err = runtime.eval_str("(/f (fn [x] x))").await.unwrap_err();
    assert!(matches!(err, RuntimeError::RemoteCall { ref path, .. } if path == "/f"));
    assert_eq!(ns.get(&path("/f")).unwrap(), None);
    conn.hang_up();
}

#[tokio::test]
async fn remote_spawn_runs_forms_on_the_host() {
    let ns = namespace();
    let conn = connect(&ns).await;
    let runtime = Runtime::with_core(conn.root());

    let handle = runtime
        .eval_str("(go /jobs/sum (def base 40) (+ base 2))")
        .await
        .unwrap();
    match &handle {
        Value::Anchor(anchor) => assert_eq!(anchor.path(), &path("/jobs/sum")),
        other => panic!("expected an anchor, got {}", other),
    }

    assert_eq!(wait_for_exit(&ns, &path("/jobs/sum")).await, ProcessStatus::Exited);
    assert_eq!(ns.get(&path("/jobs/sum")).unwrap(), Some(Datum::Integer(42)));
    assert_eq!(runtime.eval_str("(/jobs/sum)").await.unwrap(), Value::Integer(42));
    conn.hang_up();
}

#[tokio::test]
async fn failing_process_is_recorded() {
    let ns = namespace();
    let conn = connect(&ns).await;
    let runtime = Runtime::with_core(conn.root());

    runtime.eval_str("(go /jobs/bad (nope 1))").await.unwrap();
    let status = wait_for_exit(&ns, &path("/jobs/bad")).await;
    assert!(matches!(status, ProcessStatus::Failed(ref reason) if reason.contains("nope")));
    assert_eq!(ns.get(&path("/jobs/bad")).unwrap(), None);
    conn.hang_up();
}

#[tokio::test]
async fn concurrent_loads_share_one_connection() {
    let ns = namespace();
    for i in 0..16 {
        ns.set(&path(&format!("/n/{}", i)), Datum::Integer(i)).unwrap();
    }
    let conn = connect(&ns).await;
    let ctx = Context::background();
    let root = conn.root();

    let anchors: Vec<_> = (0..16).map(|i| root.walk(&path(&format!("/n/{}", i)))).collect();
    let values = join_all(anchors.iter().map(|a| a.load(&ctx))).await;
    let values: Vec<Value> = values.into_iter().map(Result::unwrap).collect();
    assert_eq!(values, (0..16).map(Value::Integer).collect::<Vec<_>>());
    conn.hang_up();
}

#[tokio::test]
async fn hang_up_fails_later_calls() {
    let ns = namespace();
    let conn = connect(&ns).await;
    let anchor = conn.root().walk(&path("/x"));

    conn.hang_up();
    conn.hang_up();
    assert!(conn.is_closed());

    let err = anchor.load(&Context::background()).await.unwrap_err();
    assert!(
        matches!(err, RuntimeError::RemoteCall { ref message, .. } if message == "connection closed")
    );
}

#[tokio::test]
async fn dial_rejects_unknown_protocol() {
    let dialer = LocalDialer::new(namespace(), ANCHOR_PROTOCOL);
    let err = rpc::dial(&Context::background(), &dialer, "/other/1.0")
        .await
        .unwrap_err();
    assert_eq!(err, RpcError::UnsupportedProtocol("/other/1.0".to_string()));
}

#[tokio::test]
async fn ls_helper_closes_its_connection() {
    let ns = namespace();
    ns.set(&path("/b"), Datum::Nil).unwrap();
    ns.set(&path("/a"), Datum::Nil).unwrap();
    let dialer = LocalDialer::new(Arc::clone(&ns), ANCHOR_PROTOCOL);

    let children = rpc::ls(&Context::background(), &dialer, ANCHOR_PROTOCOL, &Path::root())
        .await
        .unwrap();
    assert_eq!(children, vec![path("/b"), path("/a")]);
}

#[tokio::test]
async fn releasing_a_pending_call_sends_cancel() {
    let (client, mut server) = rpc::pipe();
    let conn = Conn::new(client, ANCHOR_PROTOCOL);
    let anchor = conn.root().walk(&path("/slow"));
    let (ctx, cancel) = Context::background().with_cancel();

    let waiting = tokio::spawn(async move { anchor.load(&ctx).await });

    let request = wire::decode(&server.rx.recv().await.unwrap()).unwrap();
    assert_eq!(
        request.body,
        Body::Request(Request::Load {
            path: "/slow".to_string()
        })
    );
    assert_eq!(conn.pending_calls(), 1);

    cancel.cancel();
    let err = waiting.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());

    let cancel_frame = wire::decode(&server.rx.recv().await.unwrap()).unwrap();
    assert_eq!(cancel_frame.id, request.id);
    assert_eq!(cancel_frame.body, Body::Cancel);
    assert_eq!(conn.pending_calls(), 0);
    conn.hang_up();
}

#[tokio::test]
async fn evaluator_context_bounds_remote_waits() {
    let (client, _server) = rpc::pipe();
    let conn = Conn::new(client, ANCHOR_PROTOCOL);
    let ctx = Context::background().with_timeout(Duration::from_millis(20));
    let runtime = Runtime::new(
        Evaluator::new(conn.root()).with_context(ctx),
        Environment::with_core(),
    );

    let err = runtime.eval_str("(/never)").await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(conn.pending_calls(), 0);
    conn.hang_up();
}

#[tokio::test]
async fn walk_helper_keeps_the_connection_until_closed() {
    let ns = namespace();
    ns.set(&path("/deep/leaf"), Datum::Boolean(true)).unwrap();
    let dialer = LocalDialer::new(Arc::clone(&ns), ANCHOR_PROTOCOL);
    let ctx = Context::background();

    let walked = rpc::walk(&ctx, &dialer, ANCHOR_PROTOCOL, &path("/deep"))
        .await
        .unwrap();
    let leaf = walked.anchor().walk(&path("/leaf"));
    assert_eq!(leaf.load(&ctx).await.unwrap(), Value::Boolean(true));

    walked.close();
    assert!(leaf.load(&ctx).await.is_err());
}

#[tokio::test]
async fn runaway_recursion_in_a_process_fails_the_process() {
    let ns = namespace();
    let conn = connect(&ns).await;
    let runtime = Runtime::with_core(conn.root());

    runtime
        .eval_str("(go /jobs/deep (def down (fn [n] (down (+ n 1)))) (down 0))")
        .await
        .unwrap();
    let status = wait_for_exit(&ns, &path("/jobs/deep")).await;
    assert!(
        matches!(status, ProcessStatus::Failed(ref reason) if reason.contains("stack overflow")),
        "{:?}",
        status
    );
    assert_eq!(runtime.eval_str("(+ 1 1)").await.unwrap(), Value::Integer(2));
    conn.hang_up();
}

#[tokio::test]
async fn release_after_the_peer_stops_reading_still_clears_the_call() {
    let (client, server) = rpc::pipe();
    let rpc::Pipe { tx: _server_tx, rx: mut server_rx } = server;
    let conn = Conn::new(client, ANCHOR_PROTOCOL);
    let anchor = conn.root().walk(&path("/slow"));
    let (ctx, cancel) = Context::background().with_cancel();

    let waiting = tokio::spawn(async move { anchor.load(&ctx).await });
    server_rx.recv().await.unwrap();
    drop(server_rx);

    cancel.cancel();
    let err = waiting.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(conn.pending_calls(), 0);
    assert!(!conn.is_closed());
    conn.hang_up();
}
