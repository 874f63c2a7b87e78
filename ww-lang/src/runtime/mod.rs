//! ww runtime system
//!
//! Values, environments, the call convention and the evaluator. [`Runtime`]
//! ties an evaluator to a root environment for callers that just want to
//! run source text.

pub mod environment;
pub mod error;
pub mod evaluator;
pub mod param_binding;
pub mod stdlib;
pub mod values;

pub use environment::Environment;
pub use error::{RuntimeError, RuntimeResult};
pub use evaluator::{Evaluator, DEFAULT_MAX_CALL_DEPTH};
pub use values::{Arity, BuiltinFunction, Clause, Function, Lambda, Value};

use crate::anchor::Anchor;

/// An evaluator bound to a root environment.
#[derive(Clone, Debug)]
pub struct Runtime {
    evaluator: Evaluator,
    env: Environment,
}

impl Runtime {
    pub fn new(evaluator: Evaluator, env: Environment) -> Self {
        Self { evaluator, env }
    }

    /// Runtime over `root` with the core builtins and default settings.
    pub fn with_core(root: Anchor) -> Self {
        Self::new(Evaluator::new(root), Environment::with_core())
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Parses every form in `source`, analyzes them all, then evaluates
    /// them in order. Returns the last value, or nil for empty input.
    pub async fn eval_str(&self, source: &str) -> RuntimeResult<Value> {
        self.evaluator.eval_source(&self.env, source, "<input>").await
    }

    pub async fn eval_form(&self, form: &Value) -> RuntimeResult<Value> {
        self.evaluator.eval_forms(&self.env, std::slice::from_ref(form)).await
    }
}
