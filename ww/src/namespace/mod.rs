//! Host namespace
//!
//! The tree of anchors a host serves. Each node may hold a value, a process
//! record and any number of children (kept in insertion order). The
//! namespace is itself an [`AnchorProvider`], so code running on the host
//! addresses it exactly the way a remote peer does.

pub mod process;

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};
use ww_lang::anchor::{Anchor, AnchorProvider, Call, CallError, Path};
use ww_lang::runtime::{Environment, Evaluator, DEFAULT_MAX_CALL_DEPTH};
use ww_lang::Value;

use crate::datum::Datum;
pub use process::{ProcessRecord, ProcessStatus};

/// Evaluation settings for processes spawned on this host.
#[derive(Debug, Clone)]
pub struct SpawnSettings {
    pub max_call_depth: usize,
    pub import_roots: Vec<PathBuf>,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            import_roots: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Node {
    value: Option<Datum>,
    process: Option<ProcessRecord>,
    children: IndexMap<String, Node>,
}

impl Node {
    fn find(&self, path: &Path) -> Option<&Node> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    /// Walks to `path`, creating missing nodes on the way.
    fn find_or_create(&mut self, path: &Path) -> &mut Node {
        path.segments().iter().fold(self, |node, segment| {
            node.children.entry(segment.clone()).or_default()
        })
    }
}

pub struct Namespace {
    connection_id: u64,
    host: String,
    settings: SpawnSettings,
    root: RwLock<Node>,
    this: Weak<Namespace>,
}

impl Namespace {
    pub fn new(host: impl Into<String>, settings: SpawnSettings) -> Arc<Self> {
        Arc::new_cyclic(|this| Namespace {
            connection_id: crate::next_connection_id(),
            host: host.into(),
            settings,
            root: RwLock::new(Node::default()),
            this: this.clone(),
        })
    }

    /// Root anchor over this namespace, for code running on the host.
    pub fn anchor(self: &Arc<Self>) -> Anchor {
        Anchor::root(Arc::clone(self) as Arc<dyn AnchorProvider>)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn get(&self, path: &Path) -> Result<Option<Datum>, CallError> {
        Ok(self.read()?.find(path).and_then(|node| node.value.clone()))
    }

    pub fn set(&self, path: &Path, value: Datum) -> Result<(), CallError> {
        self.write()?.find_or_create(path).value = Some(value);
        Ok(())
    }

    /// Child names in insertion order; empty for a missing node.
    pub fn children(&self, path: &Path) -> Result<Vec<String>, CallError> {
        Ok(self
            .read()?
            .find(path)
            .map(|node| node.children.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub fn process(&self, path: &Path) -> Result<Option<ProcessRecord>, CallError> {
        Ok(self.read()?.find(path).and_then(|node| node.process.clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Node>, CallError> {
        self.root
            .read()
            .map_err(|_| CallError::Remote("namespace lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Node>, CallError> {
        self.root
            .write()
            .map_err(|_| CallError::Remote("namespace lock poisoned".to_string()))
    }

    /// Records a process at `path` and starts evaluating `forms` in the
    /// background. Returns the process id as soon as the task is scheduled.
    #[instrument(level = "debug", skip(self, forms), fields(host = %self.host))]
    pub fn start_process(&self, path: &Path, forms: Vec<Value>) -> Result<String, CallError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| CallError::Remote("no async runtime to run the process".to_string()))?;
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| CallError::Remote("namespace is shutting down".to_string()))?;

        let record = ProcessRecord::start(&self.host);
        let pid = record.id.clone();
        if let Some(previous) = self.write()?.find_or_create(path).process.replace(record) {
            if previous.status.is_running() {
                warn!(%path, pid = %previous.id, "replacing a running process record");
            }
        }
        info!(%path, %pid, forms = forms.len(), "process started");

        let task_path = path.clone();
        let task_pid = pid.clone();
        runtime.spawn(async move { this.run_process(task_path, task_pid, forms).await });
        Ok(pid)
    }

    async fn run_process(self: Arc<Self>, path: Path, pid: String, forms: Vec<Value>) {
        let evaluator = Evaluator::new(self.anchor())
            .with_max_call_depth(self.settings.max_call_depth)
            .with_import_roots(self.settings.import_roots.clone());
        let env = Environment::with_core();

        let outcome = evaluator
            .eval_forms(&env, &forms)
            .await
            .and_then(|value| Datum::try_from(&value));
        let status = match outcome {
            Ok(datum) => match self.set(&path, datum) {
                Ok(()) => ProcessStatus::Exited,
                Err(e) => ProcessStatus::Failed(e.to_string()),
            },
            Err(e) => ProcessStatus::Failed(e.to_string()),
        };

        match &status {
            ProcessStatus::Failed(reason) => warn!(%path, %pid, %reason, "process failed"),
            _ => info!(%path, %pid, "process exited"),
        }
        self.finish_process(&path, &pid, status);
    }

    fn finish_process(&self, path: &Path, pid: &str, status: ProcessStatus) {
        let Ok(mut root) = self.write() else {
            warn!(%path, %pid, "cannot record process exit: namespace lock poisoned");
            return;
        };
        match root.find_or_create(path).process.as_mut() {
            Some(record) if record.id == pid => record.finish(status),
            _ => debug!(%path, %pid, "process record was replaced before exit"),
        }
    }
}

impl AnchorProvider for Namespace {
    fn connection_id(&self) -> u64 {
        self.connection_id
    }

    fn ls(&self, path: &Path) -> Call<Vec<String>> {
        settle(path, self.children(path))
    }

    fn load(&self, path: &Path) -> Call<Value> {
        let value = self.get(path).and_then(|datum| {
            datum
                .map(Datum::into_value)
                .transpose()
                .map(|value| value.unwrap_or(Value::Nil))
                .map_err(|e| CallError::Remote(e.to_string()))
        });
        settle(path, value)
    }

    fn store(&self, path: &Path, value: Value) -> Call<()> {
        let stored = Datum::try_from(&value)
            .map_err(|e| CallError::Remote(e.to_string()))
            .and_then(|datum| self.set(path, datum));
        settle(path, stored)
    }

    fn spawn(&self, path: &Path, args: Vec<Value>) -> Call<String> {
        settle(path, self.start_process(path, args))
    }
}

fn settle<T>(path: &Path, result: Result<T, CallError>) -> Call<T>
where
    T: Clone + Send + Sync + 'static,
{
    match result {
        Ok(value) => Call::ready(path.clone(), value),
        Err(err) => Call::failed(path.clone(), err),
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("host", &self.host)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}
