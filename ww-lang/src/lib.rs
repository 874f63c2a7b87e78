// ww language core
// Reader, analyzer and evaluator for an expression language whose paths
// address a (possibly remote) anchor namespace.

pub mod analyzer;
pub mod anchor;
pub mod ast;
pub mod parser;
pub mod runtime;

pub use analyzer::{Analyzer, DefaultAnalyzer};
pub use anchor::{Anchor, AnchorProvider, Call, CallError, Context, ContextError, Path};
pub use ast::{Expression, Symbol};
pub use parser::{parse, ParseError};
pub use runtime::{Environment, Evaluator, Runtime, RuntimeError, RuntimeResult, Value};
