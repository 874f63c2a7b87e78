// Core builtins bound into a fresh root environment.
// The full standard library lives outside this crate.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::ast::Symbol;
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::values::{Arity, BuiltinFunction, Function, Value};

pub fn load_core(env: &Environment) {
    builtin(env, "+", Arity::Variadic(0), add);
    builtin(env, "-", Arity::Variadic(1), subtract);
    builtin(env, "*", Arity::Variadic(0), multiply);
    builtin(env, "=", Arity::Variadic(1), equal);
    builtin(env, "<", Arity::Variadic(1), |args| compare_chain("<", args, Ordering::Less));
    builtin(env, ">", Arity::Variadic(1), |args| {
        compare_chain(">", args, Ordering::Greater)
    });
    builtin(env, "not", Arity::Fixed(1), |args| {
        Ok(Value::Boolean(!args[0].is_truthy()))
    });
    builtin(env, "list", Arity::Variadic(0), |args| Ok(Value::list(args)));
    builtin(env, "vector", Arity::Variadic(0), |args| Ok(Value::vector(args)));
    builtin(env, "count", Arity::Fixed(1), count);
    builtin(env, "first", Arity::Fixed(1), first);
    builtin(env, "rest", Arity::Fixed(1), rest);
    builtin(env, "str", Arity::Variadic(0), to_str);
    builtin(env, "nil?", Arity::Fixed(1), |args| Ok(Value::Boolean(args[0].is_nil())));
    builtin(env, "path?", Arity::Fixed(1), |args| {
        Ok(Value::Boolean(matches!(args[0], Value::Path(_))))
    });
}

fn builtin<F>(env: &Environment, name: &str, arity: Arity, func: F)
where
    F: Fn(Vec<Value>) -> RuntimeResult<Value> + Send + Sync + 'static,
{
    env.define(
        Symbol::from(name),
        Value::Function(Function::Builtin(Arc::new(BuiltinFunction {
            name: name.to_string(),
            arity,
            func: Arc::new(func),
        }))),
    );
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(op: &str, value: &Value) -> RuntimeResult<Num> {
        match value {
            Value::Integer(i) => Ok(Num::Int(*i)),
            Value::Float(f) => Ok(Num::Float(*f)),
            other => Err(RuntimeError::type_error("number", other.type_name(), op)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::Integer(i),
            Num::Float(f) => Value::Float(f),
        }
    }
}

fn fold_numbers(
    op: &str,
    init: Num,
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> RuntimeResult<Value> {
    let mut acc = init;
    for arg in args {
        let next = Num::from_value(op, arg)?;
        acc = match (acc, next) {
            (Num::Int(a), Num::Int(b)) => Num::Int(int_op(a, b).ok_or_else(|| {
                RuntimeError::type_error("integer in range", "overflow", op)
            })?),
            (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
        };
    }
    Ok(acc.into_value())
}

fn add(args: Vec<Value>) -> RuntimeResult<Value> {
    fold_numbers("+", Num::Int(0), &args, i64::checked_add, |a, b| a + b)
}

fn multiply(args: Vec<Value>) -> RuntimeResult<Value> {
    fold_numbers("*", Num::Int(1), &args, i64::checked_mul, |a, b| a * b)
}

fn subtract(args: Vec<Value>) -> RuntimeResult<Value> {
    let first = Num::from_value("-", &args[0])?;
    if args.len() == 1 {
        return fold_numbers("-", Num::Int(0), &args, i64::checked_sub, |a, b| a - b);
    }
    fold_numbers("-", first, &args[1..], i64::checked_sub, |a, b| a - b)
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => {
            (*x as f64) == *y
        }
        _ => a == b,
    }
}

fn equal(args: Vec<Value>) -> RuntimeResult<Value> {
    Ok(Value::Boolean(
        args.windows(2).all(|pair| numeric_eq(&pair[0], &pair[1])),
    ))
}

fn compare_chain(op: &str, args: Vec<Value>, wanted: Ordering) -> RuntimeResult<Value> {
    let nums = args
        .iter()
        .map(|a| Num::from_value(op, a))
        .collect::<RuntimeResult<Vec<_>>>()?;
    let holds = nums.windows(2).all(|pair| {
        let ordering = match (pair[0], pair[1]) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        };
        ordering == Some(wanted)
    });
    Ok(Value::Boolean(holds))
}

fn count(args: Vec<Value>) -> RuntimeResult<Value> {
    let n = match &args[0] {
        Value::Nil => 0,
        Value::String(s) => s.chars().count(),
        Value::List(items) | Value::Vector(items) => items.len(),
        other => {
            return Err(RuntimeError::type_error(
                "collection",
                other.type_name(),
                "count",
            ))
        }
    };
    Ok(Value::Integer(n as i64))
}

fn first(args: Vec<Value>) -> RuntimeResult<Value> {
    match &args[0] {
        Value::Nil => Ok(Value::Nil),
        Value::List(items) | Value::Vector(items) => {
            Ok(items.first().cloned().unwrap_or(Value::Nil))
        }
        other => Err(RuntimeError::type_error("sequence", other.type_name(), "first")),
    }
}

fn rest(args: Vec<Value>) -> RuntimeResult<Value> {
    match &args[0] {
        Value::Nil => Ok(Value::list(vec![])),
        Value::List(items) | Value::Vector(items) => {
            Ok(Value::list(items.iter().skip(1).cloned().collect()))
        }
        other => Err(RuntimeError::type_error("sequence", other.type_name(), "rest")),
    }
}

fn to_str(args: Vec<Value>) -> RuntimeResult<Value> {
    let mut out = String::new();
    for arg in &args {
        match arg {
            Value::Nil => {}
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
    }
    Ok(Value::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let env = Environment::with_core();
        match env.resolve(&Symbol::from(name))? {
            Value::Function(Function::Builtin(b)) => (b.func)(args),
            other => panic!("{} is not a builtin: {:?}", name, other),
        }
    }

    #[test]
    fn arithmetic_promotes_to_float() {
        assert_eq!(
            call("+", vec![Value::Integer(1), Value::Integer(2)]).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            call("+", vec![Value::Integer(1), Value::Float(0.5)]).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(call("-", vec![Value::Integer(4)]).unwrap(), Value::Integer(-4));
        assert_eq!(
            call("-", vec![Value::Integer(10), Value::Integer(3), Value::Integer(2)]).unwrap(),
            Value::Integer(5)
        );
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(call("*", vec![Value::Integer(i64::MAX), Value::Integer(2)]).is_err());
    }

    #[test]
    fn comparisons_chain() {
        let nums = |xs: &[i64]| xs.iter().map(|x| Value::Integer(*x)).collect::<Vec<_>>();
        assert_eq!(call("<", nums(&[1, 2, 3])).unwrap(), Value::Boolean(true));
        assert_eq!(call("<", nums(&[1, 3, 2])).unwrap(), Value::Boolean(false));
        assert_eq!(call(">", nums(&[3, 2])).unwrap(), Value::Boolean(true));
        assert_eq!(
            call("=", vec![Value::Integer(1), Value::Float(1.0)]).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn sequence_helpers() {
        let xs = Value::vector(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(call("count", vec![xs.clone()]).unwrap(), Value::Integer(2));
        assert_eq!(call("first", vec![xs.clone()]).unwrap(), Value::Integer(1));
        assert_eq!(
            call("rest", vec![xs]).unwrap(),
            Value::list(vec![Value::Integer(2)])
        );
        assert_eq!(call("first", vec![Value::Nil]).unwrap(), Value::Nil);
        assert_eq!(
            call("str", vec![Value::string("a"), Value::Integer(1), Value::Nil]).unwrap(),
            Value::string("a1")
        );
    }
}
