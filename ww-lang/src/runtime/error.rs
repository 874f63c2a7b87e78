// Error handling for the ww runtime

use thiserror::Error;

use crate::anchor::context::ContextError;
use crate::parser::ParseError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while analysing or evaluating ww expressions.
///
/// Evaluation never recovers from these internally; each node either
/// succeeds or returns the first error raised by its sub-evaluations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Unresolved symbol, after walking every frame up to the root
    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    /// No call clause accepts the number of supplied arguments
    #[error("arity mismatch in {function}: expected {expected}, got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Wrong kind of value for an operation, e.g. invoking a non-invocable
    #[error("type error in {operation}: expected {expected}, got {actual}")]
    Type {
        expected: String,
        actual: String,
        operation: String,
    },

    /// Malformed path value
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A remote anchor call failed; `path` is the anchor it targeted
    #[error("remote call failed at {path}: {message}")]
    RemoteCall { path: String, message: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The context was done before a remote call settled
    #[error("{0}")]
    Cancelled(ContextError),

    /// Malformed special form
    #[error("syntax error in {form}: {message}")]
    Syntax { form: String, message: String },

    #[error("parse error in {location}: {message}")]
    Parse { location: String, message: String },

    #[error("cannot read {location}: {message}")]
    Io { location: String, message: String },

    #[error("stack overflow: {0}")]
    StackOverflow(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn not_found(symbol: impl Into<String>) -> Self {
        RuntimeError::NotFound {
            symbol: symbol.into(),
        }
    }

    pub fn type_error(
        expected: impl Into<String>,
        actual: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        RuntimeError::Type {
            expected: expected.into(),
            actual: actual.into(),
            operation: operation.into(),
        }
    }

    pub fn syntax(form: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Syntax {
            form: form.into(),
            message: message.into(),
        }
    }

    /// Attaches a source location to a reader error.
    pub fn parse(location: impl Into<String>, err: ParseError) -> Self {
        RuntimeError::Parse {
            location: location.into(),
            message: err.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RuntimeError::Cancelled(_))
    }
}

impl From<ContextError> for RuntimeError {
    fn from(err: ContextError) -> Self {
        RuntimeError::Cancelled(err)
    }
}

impl From<ParseError> for RuntimeError {
    fn from(err: ParseError) -> Self {
        RuntimeError::parse("<input>", err)
    }
}
