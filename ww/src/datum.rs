//! Wire-safe values.
//!
//! A [`Datum`] is the closed subset of [`Value`] that can be stored in the
//! namespace and carried over RPC. Functions and anchors are bound to a
//! process or a connection and never leave it.

use serde::{Deserialize, Serialize};
use ww_lang::anchor::Path;
use ww_lang::runtime::{RuntimeError, RuntimeResult};
use ww_lang::{Symbol, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Symbol(String),
    List(Vec<Datum>),
    Vector(Vec<Datum>),
    /// Textual path form
    Path(String),
}

impl Datum {
    pub fn into_value(self) -> RuntimeResult<Value> {
        Ok(match self {
            Datum::Nil => Value::Nil,
            Datum::Boolean(b) => Value::Boolean(b),
            Datum::Integer(i) => Value::Integer(i),
            Datum::Float(f) => Value::Float(f),
            Datum::String(s) => Value::from(s),
            Datum::Symbol(s) => Value::Symbol(Symbol(s)),
            Datum::List(items) => Value::list(into_values(items)?),
            Datum::Vector(items) => Value::vector(into_values(items)?),
            Datum::Path(p) => Value::Path(Path::parse(&p)?),
        })
    }
}

fn into_values(items: Vec<Datum>) -> RuntimeResult<Vec<Value>> {
    items.into_iter().map(Datum::into_value).collect()
}

impl TryFrom<&Value> for Datum {
    type Error = RuntimeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let seq = |items: &[Value]| items.iter().map(Datum::try_from).collect::<RuntimeResult<Vec<_>>>();
        Ok(match value {
            Value::Nil => Datum::Nil,
            Value::Boolean(b) => Datum::Boolean(*b),
            Value::Integer(i) => Datum::Integer(*i),
            Value::Float(f) => Datum::Float(*f),
            Value::String(s) => Datum::String(s.to_string()),
            Value::Symbol(s) => Datum::Symbol(s.0.clone()),
            Value::List(items) => Datum::List(seq(items)?),
            Value::Vector(items) => Datum::Vector(seq(items)?),
            Value::Path(p) => Datum::Path(p.to_string()),
            other @ (Value::Function(_) | Value::Anchor(_)) => {
                return Err(RuntimeError::type_error(
                    "storable value",
                    other.type_name(),
                    "store",
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ww_lang::parser::parse_one;

    #[test]
    fn converts_data_both_ways() {
        let value = parse_one(r#"[1 2.5 "s" sym /a/b (nil true)]"#).unwrap();
        let datum = Datum::try_from(&value).unwrap();
        assert_eq!(datum.into_value().unwrap(), value);
    }

    #[test]
    fn functions_are_not_storable() {
        let env = ww_lang::Environment::with_core();
        let plus = env.resolve(&Symbol::from("+")).unwrap();
        let nested = Value::vector(vec![Value::Integer(1), plus]);
        assert!(matches!(
            Datum::try_from(&nested),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn malformed_wire_path_is_rejected() {
        assert!(Datum::Path("relative".to_string()).into_value().is_err());
    }
}
