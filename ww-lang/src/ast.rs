// Analyzed expression nodes.
// Nodes are immutable once built and may be evaluated any number of times,
// against any environment.

use std::fmt;
use std::sync::Arc;

use crate::anchor::Path;
use crate::runtime::values::{Lambda, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Const(ConstExpr),
    If(IfExpr),
    Resolve(ResolveExpr),
    Def(DefExpr),
    Call(CallExpr),
    Invoke(InvokeExpr),
    Path(PathExpr),
    PathList(PathListExpr),
    Vector(VectorExpr),
    LocalSpawn(LocalSpawnExpr),
    RemoteSpawn(RemoteSpawnExpr),
    Import(ImportExpr),
    Do(DoExpr),
    Quote(QuoteExpr),
}

impl Expression {
    /// Node kind, for tracing.
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Const(_) => "const",
            Expression::If(_) => "if",
            Expression::Resolve(_) => "resolve",
            Expression::Def(_) => "def",
            Expression::Call(_) => "call",
            Expression::Invoke(_) => "invoke",
            Expression::Path(_) => "path",
            Expression::PathList(_) => "ls",
            Expression::Vector(_) => "vector",
            Expression::LocalSpawn(_) => "go",
            Expression::RemoteSpawn(_) => "go-remote",
            Expression::Import(_) => "import",
            Expression::Do(_) => "do",
            Expression::Quote(_) => "quote",
        }
    }

    pub fn constant(value: Value) -> Self {
        Expression::Const(ConstExpr { value })
    }
}

#[derive(Debug, Clone)]
pub struct ConstExpr {
    pub value: Value,
}

/// A missing `test` counts as falsy, so the else branch runs.
#[derive(Debug, Clone)]
pub struct IfExpr {
    pub test: Option<Box<Expression>>,
    pub then: Option<Box<Expression>>,
    pub otherwise: Option<Box<Expression>>,
}

#[derive(Debug, Clone)]
pub struct ResolveExpr {
    pub symbol: Symbol,
}

#[derive(Debug, Clone)]
pub struct DefExpr {
    pub name: Symbol,
    pub value: Option<Box<Expression>>,
}

/// Application of a function known at analysis time.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub function: Arc<Lambda>,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct InvokeExpr {
    pub target: Box<Expression>,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct PathExpr {
    pub path: Path,
}

#[derive(Debug, Clone)]
pub struct PathListExpr {
    pub path: Path,
}

/// `forms` keeps the raw elements so evaluation can hand back the source
/// sequence when nothing changed.
#[derive(Debug, Clone)]
pub struct VectorExpr {
    pub forms: Arc<Vec<Value>>,
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct LocalSpawnExpr {
    pub args: Vec<Value>,
}

/// Arguments stay unevaluated; the host that owns `path` evaluates them.
#[derive(Debug, Clone)]
pub struct RemoteSpawnExpr {
    pub path: Path,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct ImportExpr {
    pub locations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DoExpr {
    pub body: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct QuoteExpr {
    pub form: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Analyzer, DefaultAnalyzer};
    use crate::parser::parse_one;
    use crate::runtime::environment::Environment;

    #[test]
    fn analyzed_forms_report_their_kind() {
        let env = Environment::new();
        let kinds: Vec<&str> = ["(go /p 1)", "(go 1)", "(ls /a)", "[x 1]", "(f 1)", "'x", "/a"]
            .iter()
            .map(|src| {
                let form = parse_one(src).unwrap();
                DefaultAnalyzer.analyze(&env, &form).unwrap().kind()
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["go-remote", "go", "ls", "vector", "invoke", "quote", "path"]
        );
    }
}
