use std::collections::HashMap;

use crate::ast::Symbol;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::values::{Clause, Lambda, Value};

pub type BoundParams = HashMap<Symbol, Value>;

/// Picks the clause that accepts `argc` arguments. A fixed clause with an
/// exact match wins over a variadic one.
pub fn select_clause(lambda: &Lambda, argc: usize) -> RuntimeResult<&Clause> {
    lambda
        .clauses
        .iter()
        .find(|c| !c.variadic && c.params.len() == argc)
        .or_else(|| lambda.clauses.iter().find(|c| c.variadic && c.accepts(argc)))
        .ok_or_else(|| RuntimeError::Arity {
            function: lambda.name.clone().unwrap_or_else(|| "anonymous".to_string()),
            expected: lambda
                .clauses
                .iter()
                .map(Clause::arity_label)
                .collect::<Vec<_>>()
                .join(" or "),
            actual: argc,
        })
}

/// Binds evaluated arguments to the clause's parameters. For a variadic
/// clause the final parameter receives a list of every argument from its
/// position onward, empty when there are none.
pub fn bind_arguments(clause: &Clause, args: Vec<Value>) -> RuntimeResult<BoundParams> {
    if !clause.accepts(args.len()) {
        return Err(RuntimeError::Internal(format!(
            "clause of arity {} bound to {} arguments",
            clause.arity_label(),
            args.len()
        )));
    }

    let fixed = clause.fixed_arity();
    let mut bound = BoundParams::with_capacity(clause.params.len());
    let mut args = args.into_iter();
    for param in &clause.params[..fixed] {
        if let Some(arg) = args.next() {
            bound.insert(param.clone(), arg);
        }
    }
    if clause.variadic {
        if let Some(rest) = clause.params.last() {
            bound.insert(rest.clone(), Value::list(args.collect()));
        }
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(params: &[&str], variadic: bool) -> Clause {
        Clause {
            params: params.iter().map(|p| Symbol::from(*p)).collect(),
            variadic,
            body: vec![],
        }
    }

    #[test]
    fn exact_clause_preferred_over_variadic() {
        let lambda = Lambda {
            name: Some("f".to_string()),
            clauses: vec![clause(&["xs"], true), clause(&["a", "b"], false)],
        };
        assert!(!select_clause(&lambda, 2).unwrap().variadic);
        assert!(select_clause(&lambda, 3).unwrap().variadic);
        assert!(select_clause(&lambda, 0).unwrap().variadic);
    }

    #[test]
    fn no_matching_clause_is_arity_error() {
        let lambda = Lambda {
            name: Some("f".to_string()),
            clauses: vec![clause(&["a"], false), clause(&["a", "b", "c"], false)],
        };
        match select_clause(&lambda, 2).unwrap_err() {
            RuntimeError::Arity {
                function,
                expected,
                actual,
            } => {
                assert_eq!(function, "f");
                assert_eq!(expected, "1 or 3");
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn variadic_tail_is_empty_with_exact_fixed_args() {
        let c = clause(&["a", "rest"], true);
        let bound = bind_arguments(&c, vec![Value::Integer(1)]).unwrap();
        assert_eq!(bound[&Symbol::from("a")], Value::Integer(1));
        assert_eq!(bound[&Symbol::from("rest")], Value::list(vec![]));
    }

    #[test]
    fn variadic_tail_collects_trailing_args_in_order() {
        let c = clause(&["a", "rest"], true);
        let bound = bind_arguments(
            &c,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )
        .unwrap();
        assert_eq!(
            bound[&Symbol::from("rest")],
            Value::list(vec![Value::Integer(2), Value::Integer(3)])
        );
    }
}
