// Shared anchor providers for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ww_lang::anchor::call::{self, Resolver};
use ww_lang::anchor::{Anchor, AnchorProvider, Call, CallError, Path};
use ww_lang::runtime::{Environment, Evaluator, Runtime};
use ww_lang::Value;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Namespace held in a flat map, resolving every call immediately.
#[derive(Default)]
pub struct MemoryProvider {
    id: u64,
    nodes: Mutex<BTreeMap<Path, Value>>,
    pub spawned: Mutex<Vec<(Path, Vec<Value>)>>,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            ..Default::default()
        })
    }

    pub fn seed(&self, path: &str, value: Value) {
        self.nodes
            .lock()
            .unwrap()
            .insert(Path::parse(path).unwrap(), value);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.nodes
            .lock()
            .unwrap()
            .get(&Path::parse(path).unwrap())
            .cloned()
    }
}

impl AnchorProvider for MemoryProvider {
    fn connection_id(&self) -> u64 {
        self.id
    }

    fn ls(&self, path: &Path) -> Call<Vec<String>> {
        let nodes = self.nodes.lock().unwrap();
        let mut names: Vec<String> = nodes
            .keys()
            .filter(|p| p.len() > path.len() && p.starts_with(path))
            .map(|p| p.segments()[path.len()].clone())
            .collect();
        names.dedup();
        Call::ready(path.clone(), names)
    }

    fn load(&self, path: &Path) -> Call<Value> {
        let value = self.nodes.lock().unwrap().get(path).cloned();
        Call::ready(path.clone(), value.unwrap_or(Value::Nil))
    }

    fn store(&self, path: &Path, value: Value) -> Call<()> {
        if let Value::Function(_) = value {
            return Call::failed(
                path.clone(),
                CallError::Remote("functions cannot be stored".to_string()),
            );
        }
        self.nodes.lock().unwrap().insert(path.clone(), value);
        Call::ready(path.clone(), ())
    }

    fn spawn(&self, path: &Path, args: Vec<Value>) -> Call<String> {
        let mut spawned = self.spawned.lock().unwrap();
        spawned.push((path.clone(), args));
        Call::ready(path.clone(), format!("proc-{}", spawned.len()))
    }
}

/// Provider whose calls stay pending until the test settles them.
#[derive(Default)]
pub struct PendingProvider {
    pub releases: Arc<AtomicUsize>,
    pub loads: Mutex<Vec<Resolver<Value>>>,
}

impl PendingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn released(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn track<T>(&self, path: &Path) -> (Call<T>, Resolver<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let releases = Arc::clone(&self.releases);
        call::pending(path.clone(), move || {
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }
}

impl AnchorProvider for PendingProvider {
    fn connection_id(&self) -> u64 {
        0
    }

    fn ls(&self, path: &Path) -> Call<Vec<String>> {
        Call::failed(path.clone(), CallError::ConnectionClosed)
    }

    fn load(&self, path: &Path) -> Call<Value> {
        let (call, resolver) = self.track(path);
        self.loads.lock().unwrap().push(resolver);
        call
    }

    fn store(&self, path: &Path, _value: Value) -> Call<()> {
        Call::failed(path.clone(), CallError::ConnectionClosed)
    }

    fn spawn(&self, path: &Path, _args: Vec<Value>) -> Call<String> {
        Call::failed(path.clone(), CallError::ConnectionClosed)
    }
}

pub fn runtime_over(provider: Arc<dyn AnchorProvider>) -> Runtime {
    Runtime::with_core(Anchor::root(provider))
}

pub fn runtime_with(evaluator: Evaluator) -> Runtime {
    Runtime::new(evaluator, Environment::with_core())
}

pub async fn eval(runtime: &Runtime, source: &str) -> Value {
    runtime
        .eval_str(source)
        .await
        .unwrap_or_else(|e| panic!("evaluating {:?} failed: {}", source, e))
}
