//! Analyzer: raw forms to [`Expression`] nodes.
//!
//! Special forms are recognised by the head symbol of a list:
//! `quote if def do fn import go ls path`. A list whose head is a literal
//! `(fn ...)` form becomes a [`CallExpr`]; any other list is an invocation.

use std::sync::Arc;

use crate::anchor::Path;
use crate::ast::*;
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::values::{Clause, Function, Lambda, Value};

/// Turns one raw form into an evaluable expression.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, env: &Environment, form: &Value) -> RuntimeResult<Expression>;

    /// Analyzes every form, stopping at the first failure.
    fn analyze_all(&self, env: &Environment, forms: &[Value]) -> RuntimeResult<Vec<Expression>> {
        forms.iter().map(|form| self.analyze(env, form)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAnalyzer;

impl Analyzer for DefaultAnalyzer {
    fn analyze(&self, env: &Environment, form: &Value) -> RuntimeResult<Expression> {
        match form {
            Value::Symbol(symbol) => Ok(Expression::Resolve(ResolveExpr {
                symbol: symbol.clone(),
            })),
            Value::Path(path) => Ok(Expression::Path(PathExpr { path: path.clone() })),
            Value::Vector(items) => Ok(Expression::Vector(VectorExpr {
                forms: Arc::clone(items),
                elements: self.analyze_all(env, items)?,
            })),
            Value::List(items) if items.is_empty() => Ok(Expression::constant(form.clone())),
            Value::List(items) => self.analyze_list(env, items),
            other => Ok(Expression::constant(other.clone())),
        }
    }
}

impl DefaultAnalyzer {
    fn analyze_list(&self, env: &Environment, items: &[Value]) -> RuntimeResult<Expression> {
        let head = &items[0];
        let args = &items[1..];

        if let Value::Symbol(symbol) = head {
            match symbol.as_str() {
                "quote" => return self.analyze_quote(args),
                "if" => return self.analyze_if(env, args),
                "def" => return self.analyze_def(env, args),
                "do" => {
                    return Ok(Expression::Do(DoExpr {
                        body: self.analyze_all(env, args)?,
                    }))
                }
                "fn" => {
                    let lambda = self.analyze_fn(env, args)?;
                    return Ok(Expression::constant(Value::Function(Function::Lambda(lambda))));
                }
                "import" => return self.analyze_import(args),
                "go" => return self.analyze_go(args),
                "ls" => return self.analyze_ls(args),
                "path" => return self.analyze_path(args),
                _ => {}
            }
        }

        if let Some(fn_args) = fn_form(head) {
            return Ok(Expression::Call(CallExpr {
                function: self.analyze_fn(env, fn_args)?,
                args: self.analyze_all(env, args)?,
            }));
        }

        Ok(Expression::Invoke(InvokeExpr {
            target: Box::new(self.analyze(env, head)?),
            args: self.analyze_all(env, args)?,
        }))
    }

    fn analyze_quote(&self, args: &[Value]) -> RuntimeResult<Expression> {
        match args {
            [form] => Ok(Expression::Quote(QuoteExpr { form: form.clone() })),
            _ => Err(RuntimeError::syntax("quote", "expects exactly one form")),
        }
    }

    fn analyze_if(&self, env: &Environment, args: &[Value]) -> RuntimeResult<Expression> {
        if args.len() > 3 {
            return Err(RuntimeError::syntax(
                "if",
                format!("expects at most 3 forms, got {}", args.len()),
            ));
        }
        let branch = |i: usize| -> RuntimeResult<Option<Box<Expression>>> {
            args.get(i)
                .map(|form| self.analyze(env, form).map(Box::new))
                .transpose()
        };
        Ok(Expression::If(IfExpr {
            test: branch(0)?,
            then: branch(1)?,
            otherwise: branch(2)?,
        }))
    }

    fn analyze_def(&self, env: &Environment, args: &[Value]) -> RuntimeResult<Expression> {
        let (name, value) = match args {
            [name] => (name, None),
            [name, value] => (name, Some(value)),
            _ => return Err(RuntimeError::syntax("def", "expects a name and at most one value")),
        };
        let name = name
            .as_symbol()
            .cloned()
            .ok_or_else(|| RuntimeError::syntax("def", format!("name must be a symbol, got {}", name)))?;
        Ok(Expression::Def(DefExpr {
            name,
            value: value
                .map(|form| self.analyze(env, form).map(Box::new))
                .transpose()?,
        }))
    }

    /// `(fn name? [params] body...)` or `(fn name? ([params] body...) ...)`.
    fn analyze_fn(&self, env: &Environment, args: &[Value]) -> RuntimeResult<Arc<Lambda>> {
        let (name, rest) = match args.first() {
            Some(Value::Symbol(name)) => (Some(name.0.clone()), &args[1..]),
            _ => (None, args),
        };

        let clauses = match rest.first() {
            Some(Value::Vector(params)) => vec![self.analyze_clause(env, params, &rest[1..])?],
            Some(Value::List(_)) => rest
                .iter()
                .map(|clause| match clause {
                    Value::List(parts) => match parts.split_first() {
                        Some((Value::Vector(params), body)) => {
                            self.analyze_clause(env, params, body)
                        }
                        _ => Err(RuntimeError::syntax(
                            "fn",
                            "clause must start with a parameter vector",
                        )),
                    },
                    other => Err(RuntimeError::syntax(
                        "fn",
                        format!("expected a clause list, got {}", other),
                    )),
                })
                .collect::<RuntimeResult<Vec<_>>>()?,
            _ => return Err(RuntimeError::syntax("fn", "missing parameter vector")),
        };

        Ok(Arc::new(Lambda { name, clauses }))
    }

    fn analyze_clause(
        &self,
        env: &Environment,
        params: &[Value],
        body: &[Value],
    ) -> RuntimeResult<Clause> {
        let mut names = Vec::with_capacity(params.len());
        let mut variadic = false;
        let mut iter = params.iter().peekable();
        while let Some(param) = iter.next() {
            let symbol = param.as_symbol().ok_or_else(|| {
                RuntimeError::syntax("fn", format!("parameter must be a symbol, got {}", param))
            })?;
            if symbol.as_str() == "&" {
                match (iter.next().and_then(Value::as_symbol), iter.peek()) {
                    (Some(rest), None) => {
                        names.push(rest.clone());
                        variadic = true;
                    }
                    _ => {
                        return Err(RuntimeError::syntax(
                            "fn",
                            "'&' must be followed by exactly one parameter",
                        ))
                    }
                }
                continue;
            }
            names.push(symbol.clone());
        }

        Ok(Clause {
            params: names,
            variadic,
            body: self.analyze_all(env, body)?,
        })
    }

    fn analyze_import(&self, args: &[Value]) -> RuntimeResult<Expression> {
        let locations = args
            .iter()
            .map(|arg| {
                arg.as_str().map(str::to_string).ok_or_else(|| {
                    RuntimeError::syntax("import", format!("location must be a string, got {}", arg))
                })
            })
            .collect::<RuntimeResult<Vec<_>>>()?;
        Ok(Expression::Import(ImportExpr { locations }))
    }

    fn analyze_go(&self, args: &[Value]) -> RuntimeResult<Expression> {
        match args.split_first() {
            Some((Value::Path(path), rest)) => Ok(Expression::RemoteSpawn(RemoteSpawnExpr {
                path: path.clone(),
                args: rest.to_vec(),
            })),
            _ => Ok(Expression::LocalSpawn(LocalSpawnExpr {
                args: args.to_vec(),
            })),
        }
    }

    fn analyze_ls(&self, args: &[Value]) -> RuntimeResult<Expression> {
        match args {
            [] => Ok(Expression::PathList(PathListExpr { path: Path::root() })),
            [Value::Path(path)] => Ok(Expression::PathList(PathListExpr { path: path.clone() })),
            _ => Err(RuntimeError::syntax("ls", "expects a single path literal")),
        }
    }

    fn analyze_path(&self, args: &[Value]) -> RuntimeResult<Expression> {
        let path = match args {
            [Value::String(text)] => Path::parse(text)?,
            [Value::Path(path)] => path.clone(),
            _ => return Err(RuntimeError::syntax("path", "expects a single path string")),
        };
        Ok(Expression::Path(PathExpr { path }))
    }
}

/// Arguments of a literal `(fn ...)` form.
fn fn_form(form: &Value) -> Option<&[Value]> {
    match form {
        Value::List(items) => match items.split_first() {
            Some((Value::Symbol(head), rest)) if head.as_str() == "fn" => Some(rest),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;

    fn analyze(src: &str) -> RuntimeResult<Expression> {
        DefaultAnalyzer.analyze(&Environment::new(), &parse_one(src).unwrap())
    }

    #[test]
    fn literal_fn_head_becomes_call() {
        match analyze("((fn [a b] a) 1 2)").unwrap() {
            Expression::Call(call) => {
                assert_eq!(call.args.len(), 2);
                assert_eq!(call.function.clauses[0].params.len(), 2);
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert!(matches!(analyze("(f 1)").unwrap(), Expression::Invoke(_)));
    }

    #[test]
    fn multi_clause_fn_with_variadic_tail() {
        let expr = analyze("(fn f ([] 0) ([x & more] x))").unwrap();
        let Expression::Const(ConstExpr {
            value: Value::Function(Function::Lambda(lambda)),
        }) = expr
        else {
            panic!("expected lambda constant");
        };
        assert_eq!(lambda.name.as_deref(), Some("f"));
        assert_eq!(lambda.clauses.len(), 2);
        assert!(lambda.clauses[1].variadic);
        assert_eq!(lambda.clauses[1].params.len(), 2);
    }

    #[test]
    fn malformed_special_forms() {
        assert!(analyze("(fn [& a b] a)").is_err());
        assert!(analyze("(def 1 2)").is_err());
        assert!(analyze("(if 1 2 3 4)").is_err());
        assert!(analyze("(path \"a/b\")").is_err());
        assert!(analyze("(import foo)").is_err());
    }

    #[test]
    fn go_dispatches_on_path_literal() {
        assert!(matches!(
            analyze("(go /a (+ 1 2))").unwrap(),
            Expression::RemoteSpawn(RemoteSpawnExpr { ref args, .. }) if args.len() == 1
        ));
        assert!(matches!(analyze("(go (+ 1 2))").unwrap(), Expression::LocalSpawn(_)));
    }

    #[test]
    fn if_without_forms_has_no_test() {
        let Expression::If(expr) = analyze("(if)").unwrap() else {
            panic!("expected if");
        };
        assert!(expr.test.is_none() && expr.then.is_none() && expr.otherwise.is_none());
    }
}
