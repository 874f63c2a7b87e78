// Environment for symbol bindings and scope management

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::ast::Symbol;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::stdlib;
use crate::runtime::values::Value;

/// A lexical scope frame. Cloning is cheap; clones share the same frame.
///
/// Child frames are immutable once created, so resolving through them takes
/// no lock. The root frame is the one shared-mutable scope: every `define`
/// lands there, whichever frame it is called on.
#[derive(Clone)]
pub struct Environment {
    frame: Arc<Frame>,
}

struct Frame {
    name: String,
    depth: usize,
    parent: Option<Environment>,
    root: Option<Environment>,
    bindings: Bindings,
}

enum Bindings {
    Root(DashMap<Symbol, Value>),
    Local(HashMap<Symbol, Value>),
}

impl Bindings {
    fn get(&self, name: &Symbol) -> Option<Value> {
        match self {
            Bindings::Root(map) => map.get(name).map(|v| v.value().clone()),
            Bindings::Local(map) => map.get(name).cloned(),
        }
    }

    fn names(&self) -> Vec<String> {
        match self {
            Bindings::Root(map) => map.iter().map(|e| e.key().0.clone()).collect(),
            Bindings::Local(map) => map.keys().map(|s| s.0.clone()).collect(),
        }
    }
}

impl Environment {
    /// Creates a new, empty root environment.
    pub fn new() -> Self {
        Environment {
            frame: Arc::new(Frame {
                name: "root".to_string(),
                depth: 0,
                parent: None,
                root: None,
                bindings: Bindings::Root(DashMap::new()),
            }),
        }
    }

    /// Creates a root environment with the core builtins bound.
    pub fn with_core() -> Self {
        let env = Self::new();
        stdlib::load_core(&env);
        env
    }

    /// Derives a child frame seeded with `bindings`. `name` is only used for
    /// diagnostics.
    pub fn child(&self, name: impl Into<String>, bindings: HashMap<Symbol, Value>) -> Self {
        Environment {
            frame: Arc::new(Frame {
                name: name.into(),
                depth: self.frame.depth + 1,
                parent: Some(self.clone()),
                root: Some(self.root()),
                bindings: Bindings::Local(bindings),
            }),
        }
    }

    /// Looks up a symbol by searching this frame and then its parents.
    pub fn lookup(&self, name: &Symbol) -> Option<Value> {
        let mut env = Some(self);
        while let Some(current) = env {
            if let Some(value) = current.frame.bindings.get(name) {
                return Some(value);
            }
            env = current.frame.parent.as_ref();
        }
        None
    }

    pub fn resolve(&self, name: &Symbol) -> RuntimeResult<Value> {
        self.lookup(name)
            .ok_or_else(|| RuntimeError::not_found(name.as_str()))
    }

    /// Binds `name` in the root frame. Safe under concurrent definition from
    /// any number of evaluation flows; the last writer wins.
    pub fn define(&self, name: Symbol, value: Value) {
        let root = self.root();
        if let Bindings::Root(map) = &root.frame.bindings {
            map.insert(name, value);
        }
    }

    pub fn root(&self) -> Environment {
        match &self.frame.root {
            Some(root) => root.clone(),
            None => self.clone(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.frame.parent.is_none()
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.frame.parent.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.frame.name
    }

    /// Number of frames between this one and the root.
    pub fn depth(&self) -> usize {
        self.frame.depth
    }

    pub fn symbol_names(&self) -> Vec<String> {
        let mut names = self.frame.bindings.names();
        if let Some(parent) = self.parent() {
            names.extend(parent.symbol_names());
        }
        names.sort();
        names.dedup();
        names
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.frame.name)
            .field("depth", &self.depth())
            .finish()
    }
}
