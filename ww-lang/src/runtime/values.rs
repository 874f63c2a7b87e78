// Runtime value system for ww
// Values are what expressions evaluate to; they are also the raw forms the
// reader produces, so code and data share one representation.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;

use crate::anchor::{Anchor, Path};
use crate::ast::{Expression, Symbol};
use crate::runtime::error::RuntimeResult;

/// Every value that crosses the evaluator boundary is one of these tags.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Arc<str>),
    Symbol(Symbol),
    List(Arc<Vec<Value>>),
    Vector(Arc<Vec<Value>>),
    Path(Path),
    Function(Function),
    Anchor(Anchor),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Symbol(Symbol(name.into()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Arc::new(items))
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            _ => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Path(_) => "path",
            Value::Function(_) => "function",
            Value::Anchor(_) => "anchor",
        }
    }

    /// Whether `invoke` accepts this value as a target.
    pub fn is_invocable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Path(_) | Value::Anchor(_))
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list or vector.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Vector(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Canonical byte representation. Two values with equal bytes are
    /// representationally identical; nothing deeper is implied (functions
    /// compare by identity, anchors by connection and path).
    pub fn repr_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_repr(&mut out);
        out
    }

    fn encode_repr(&self, out: &mut Vec<u8>) {
        fn bytes(out: &mut Vec<u8>, b: &[u8]) {
            out.extend_from_slice(&(b.len() as u64).to_le_bytes());
            out.extend_from_slice(b);
        }

        match self {
            Value::Nil => out.push(0),
            Value::Boolean(b) => {
                out.push(1);
                out.push(u8::from(*b));
            }
            Value::Integer(i) => {
                out.push(2);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Value::Float(f) => {
                out.push(3);
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::String(s) => {
                out.push(4);
                bytes(out, s.as_bytes());
            }
            Value::Symbol(s) => {
                out.push(5);
                bytes(out, s.0.as_bytes());
            }
            Value::List(items) | Value::Vector(items) => {
                out.push(if matches!(self, Value::List(_)) { 6 } else { 7 });
                out.extend_from_slice(&(items.len() as u64).to_le_bytes());
                for item in items.iter() {
                    item.encode_repr(out);
                }
            }
            Value::Path(p) => {
                out.push(8);
                bytes(out, p.to_string().as_bytes());
            }
            Value::Function(f) => {
                out.push(9);
                out.extend_from_slice(&(f.identity() as u64).to_le_bytes());
            }
            Value::Anchor(a) => {
                out.push(10);
                out.extend_from_slice(&a.connection_id().to_le_bytes());
                bytes(out, a.path().to_string().as_bytes());
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Path> for Value {
    fn from(p: Path) -> Self {
        Value::Path(p)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:?}", fl),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "{}", s.0),
            Value::List(items) => write!(f, "({})", items.iter().join(" ")),
            Value::Vector(items) => write!(f, "[{}]", items.iter().join(" ")),
            Value::Path(p) => write!(f, "{}", p),
            Value::Function(func) => write!(f, "#<fn {}>", func.name()),
            Value::Anchor(a) => write!(f, "#<anchor {}>", a.path()),
        }
    }
}

#[derive(Clone)]
pub enum Function {
    Lambda(Arc<Lambda>),
    Builtin(Arc<BuiltinFunction>),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Lambda(l) => l.name.as_deref().unwrap_or("anonymous"),
            Function::Builtin(b) => &b.name,
        }
    }

    fn identity(&self) -> usize {
        match self {
            Function::Lambda(l) => Arc::as_ptr(l) as usize,
            Function::Builtin(b) => Arc::as_ptr(b) as usize,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Lambda(l) => write!(f, "Lambda({}, {} clauses)", self.name(), l.clauses.len()),
            Function::Builtin(b) => write!(f, "Builtin({})", b.name),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Lambda(a), Function::Lambda(b)) => Arc::ptr_eq(a, b),
            // Builtins compare by name and arity, not by function pointer
            (Function::Builtin(a), Function::Builtin(b)) => a.name == b.name && a.arity == b.arity,
            _ => false,
        }
    }
}

/// A user function: one or more clauses, selected by argument count.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub name: Option<String>,
    pub clauses: Vec<Clause>,
}

/// One parameter list and body. When `variadic` is set, the last parameter
/// collects every argument from its position onward.
#[derive(Debug, Clone)]
pub struct Clause {
    pub params: Vec<Symbol>,
    pub variadic: bool,
    pub body: Vec<Expression>,
}

impl Clause {
    /// Number of parameters bound one-to-one.
    pub fn fixed_arity(&self) -> usize {
        if self.variadic {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }

    pub fn accepts(&self, argc: usize) -> bool {
        if self.variadic {
            argc >= self.fixed_arity()
        } else {
            argc == self.params.len()
        }
    }

    pub fn arity_label(&self) -> String {
        if self.variadic {
            format!("at least {}", self.fixed_arity())
        } else {
            self.params.len().to_string()
        }
    }
}

pub type BuiltinFn = Arc<dyn Fn(Vec<Value>) -> RuntimeResult<Value> + Send + Sync>;

#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub arity: Arity,
    pub func: BuiltinFn,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Minimum number of arguments
    Variadic(usize),
}

impl Arity {
    pub fn accepts(&self, argc: usize) -> bool {
        match self {
            Arity::Fixed(n) => argc == *n,
            Arity::Variadic(min) => argc >= *min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Variadic(min) => write!(f, "at least {}", min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn repr_distinguishes_list_from_vector() {
        let items = vec![Value::Integer(1)];
        assert_ne!(
            Value::list(items.clone()).repr_bytes(),
            Value::vector(items).repr_bytes()
        );
        assert_eq!(Value::string("a").repr_bytes(), Value::string("a").repr_bytes());
        assert_ne!(Value::string("a").repr_bytes(), Value::symbol("a").repr_bytes());
    }

    #[test]
    fn display() {
        let v = Value::vector(vec![
            Value::Integer(1),
            Value::string("x"),
            Value::Path(Path::parse("/a/b").unwrap()),
            Value::list(vec![Value::symbol("f"), Value::Nil]),
        ]);
        assert_eq!(v.to_string(), r#"[1 "x" /a/b (f nil)]"#);
    }

    #[test]
    fn clause_arity() {
        let clause = Clause {
            params: vec![Symbol::from("a"), Symbol::from("rest")],
            variadic: true,
            body: vec![],
        };
        assert!(clause.accepts(1));
        assert!(clause.accepts(4));
        assert!(!clause.accepts(0));
        assert_eq!(clause.arity_label(), "at least 1");
    }
}
