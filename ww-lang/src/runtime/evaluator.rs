// ww evaluator - walks analyzed expressions against an environment

use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use async_recursion::async_recursion;
use futures::future::poll_fn;
use tracing::{debug, instrument, trace};

use crate::analyzer::{Analyzer, DefaultAnalyzer};
use crate::anchor::{Anchor, Context, Path};
use crate::ast::*;
use crate::parser;
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::param_binding::{bind_arguments, select_clause};
use crate::runtime::values::{Function, Lambda, Value};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Remaining native stack below which a poll moves to a fresh segment.
const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each extra stack segment.
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Evaluates expressions for one flow of control.
///
/// The evaluator holds the root [`Anchor`] that path expressions resolve
/// against and the [`Context`] that bounds every anchor operation it issues.
/// Evaluation is sequential; it only suspends while waiting on an anchor call.
#[derive(Clone)]
pub struct Evaluator {
    root: Anchor,
    ctx: Context,
    analyzer: Arc<dyn Analyzer>,
    import_roots: Vec<PathBuf>,
    max_call_depth: usize,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("root", &self.root)
            .field("ctx", &self.ctx)
            .field("import_roots", &self.import_roots)
            .field("max_call_depth", &self.max_call_depth)
            .finish()
    }
}

impl Evaluator {
    pub fn new(root: Anchor) -> Self {
        Evaluator {
            root,
            ctx: Context::background(),
            analyzer: Arc::new(DefaultAnalyzer),
            import_roots: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Directories searched, in order, for relative import locations.
    pub fn with_import_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.import_roots = roots;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn root(&self) -> &Anchor {
        &self.root
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    /// Reads, analyzes and evaluates `source` as a single `do` block.
    /// Every form is analyzed before any is evaluated.
    pub async fn eval_source(
        &self,
        env: &Environment,
        source: &str,
        location: &str,
    ) -> RuntimeResult<Value> {
        let forms = parser::parse(source).map_err(|e| RuntimeError::parse(location, e))?;
        self.eval_forms(env, &forms).await
    }

    pub async fn eval_forms(&self, env: &Environment, forms: &[Value]) -> RuntimeResult<Value> {
        let body = self.analyzer.analyze_all(env, forms)?;
        self.eval_do(&DoExpr { body }, env).await
    }

    /// Evaluates one expression. Nested evaluation recurses through native
    /// polls; each poll grows the stack on demand so recursion is bounded by
    /// the call-depth guard, not by the thread's stack size.
    #[async_recursion]
    pub async fn eval(&self, expr: &Expression, env: &Environment) -> RuntimeResult<Value> {
        trace!(kind = expr.kind(), depth = env.depth(), "eval");
        let mut node = pin!(self.eval_node(expr, env));
        poll_fn(move |cx| {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || node.as_mut().poll(cx))
        })
        .await
    }

    async fn eval_node(&self, expr: &Expression, env: &Environment) -> RuntimeResult<Value> {
        match expr {
            Expression::Const(c) => Ok(c.value.clone()),
            Expression::Quote(q) => Ok(q.form.clone()),
            Expression::If(e) => self.eval_if(e, env).await,
            Expression::Resolve(r) => env.resolve(&r.symbol),
            Expression::Def(d) => self.eval_def(d, env).await,
            Expression::Call(c) => self.eval_call(c, env).await,
            Expression::Invoke(i) => self.eval_invoke(i, env).await,
            Expression::Path(p) => Ok(Value::Path(p.path.clone())),
            Expression::PathList(p) => self.eval_path_list(p).await,
            Expression::Vector(v) => self.eval_vector(v, env).await,
            Expression::LocalSpawn(_) => Err(RuntimeError::NotImplemented(
                "local process spawning".to_string(),
            )),
            Expression::RemoteSpawn(s) => self.eval_remote_spawn(s).await,
            Expression::Import(i) => self.eval_import(i, env).await,
            Expression::Do(d) => self.eval_do(d, env).await,
        }
    }

    async fn eval_if(&self, expr: &IfExpr, env: &Environment) -> RuntimeResult<Value> {
        let truthy = match &expr.test {
            Some(test) => self.eval(test, env).await?.is_truthy(),
            None => false,
        };
        let branch = if truthy { &expr.then } else { &expr.otherwise };
        match branch {
            Some(branch) => self.eval(branch, env).await,
            None => Ok(Value::Nil),
        }
    }

    async fn eval_def(&self, expr: &DefExpr, env: &Environment) -> RuntimeResult<Value> {
        let value = match &expr.value {
            Some(value) => self.eval(value, env).await?,
            None => Value::Nil,
        };
        debug!(symbol = %expr.name, kind = value.type_name(), "def");
        env.define(expr.name.clone(), value);
        Ok(Value::Symbol(expr.name.clone()))
    }

    async fn eval_call(&self, expr: &CallExpr, env: &Environment) -> RuntimeResult<Value> {
        // The clause is chosen before any argument is evaluated.
        select_clause(&expr.function, expr.args.len())?;
        let args = self.eval_args(&expr.args, env).await?;
        self.apply_lambda(&expr.function, args, env).await
    }

    async fn eval_invoke(&self, expr: &InvokeExpr, env: &Environment) -> RuntimeResult<Value> {
        let target = self.eval(&expr.target, env).await?;
        let args = self.eval_args(&expr.args, env).await?;
        self.apply(&target, args, env).await
    }

    async fn eval_args(&self, args: &[Expression], env: &Environment) -> RuntimeResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env).await?);
        }
        Ok(values)
    }

    /// Applies an invocable value to already-evaluated arguments. Lambda
    /// bodies run in a child of `env`.
    pub async fn apply(
        &self,
        target: &Value,
        args: Vec<Value>,
        env: &Environment,
    ) -> RuntimeResult<Value> {
        match target {
            Value::Function(Function::Builtin(builtin)) => {
                if !builtin.arity.accepts(args.len()) {
                    return Err(RuntimeError::Arity {
                        function: builtin.name.clone(),
                        expected: builtin.arity.to_string(),
                        actual: args.len(),
                    });
                }
                (builtin.func)(args)
            }
            Value::Function(Function::Lambda(lambda)) => self.apply_lambda(lambda, args, env).await,
            Value::Path(path) => self.select(&self.root.walk(path), args).await,
            Value::Anchor(anchor) => self.select(anchor, args).await,
            other => Err(RuntimeError::type_error(
                "invocable",
                other.type_name(),
                "invoke",
            )),
        }
    }

    async fn apply_lambda(
        &self,
        lambda: &Arc<Lambda>,
        args: Vec<Value>,
        env: &Environment,
    ) -> RuntimeResult<Value> {
        let name = lambda.name.as_deref().unwrap_or("anonymous");
        if env.depth() >= self.max_call_depth {
            return Err(RuntimeError::StackOverflow(format!(
                "call depth {} exceeded in {}",
                self.max_call_depth, name
            )));
        }

        let clause = select_clause(lambda, args.len())?;
        let scope = bind_arguments(clause, args)?;
        let child = env.child(name, scope);
        self.eval_body(&clause.body, &child).await
    }

    /// Data selector semantics: zero arguments load, one argument stores.
    async fn select(&self, anchor: &Anchor, mut args: Vec<Value>) -> RuntimeResult<Value> {
        match args.len() {
            0 => anchor.load(&self.ctx).await,
            1 => {
                let value = args.remove(0);
                anchor.store(&self.ctx, value).await?;
                Ok(Value::Nil)
            }
            n => Err(RuntimeError::Arity {
                function: anchor.path().to_string(),
                expected: "0 or 1".to_string(),
                actual: n,
            }),
        }
    }

    async fn eval_path_list(&self, expr: &PathListExpr) -> RuntimeResult<Value> {
        let children = self.root.walk(&expr.path).ls(&self.ctx).await?;
        Ok(Value::vector(
            children
                .into_iter()
                .map(|anchor| Value::Path(anchor.path().clone()))
                .collect(),
        ))
    }

    async fn eval_vector(&self, expr: &VectorExpr, env: &Environment) -> RuntimeResult<Value> {
        let mut items = Arc::clone(&expr.forms);
        for (i, element) in expr.elements.iter().enumerate() {
            let value = self.eval(element, env).await?;
            if value.repr_bytes() != expr.forms[i].repr_bytes() {
                Arc::make_mut(&mut items)[i] = value;
            }
        }
        Ok(Value::Vector(items))
    }

    async fn eval_remote_spawn(&self, expr: &RemoteSpawnExpr) -> RuntimeResult<Value> {
        let anchor = self.root.walk(&expr.path);
        let pid = anchor.spawn(&self.ctx, expr.args.clone()).await?;
        debug!(path = %anchor.path(), %pid, "spawned remote process");
        Ok(Value::Anchor(anchor))
    }

    #[instrument(level = "debug", skip_all, fields(locations = expr.locations.len()))]
    async fn eval_import(&self, expr: &ImportExpr, env: &Environment) -> RuntimeResult<Value> {
        let mut result = Value::Nil;
        for location in &expr.locations {
            let file = self.resolve_location(location).await;
            let source = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| RuntimeError::Io {
                    location: location.clone(),
                    message: e.to_string(),
                })?;
            debug!(%location, file = %file.display(), "importing");
            result = self.eval_source(env, &source, location).await?;
        }
        Ok(result)
    }

    async fn resolve_location(&self, location: &str) -> PathBuf {
        let direct = PathBuf::from(location);
        if direct.is_absolute() || self.import_roots.is_empty() {
            return direct;
        }
        for root in &self.import_roots {
            let candidate = root.join(location);
            if tokio::fs::metadata(&candidate).await.is_ok() {
                return candidate;
            }
        }
        self.import_roots[0].join(location)
    }

    async fn eval_do(&self, expr: &DoExpr, env: &Environment) -> RuntimeResult<Value> {
        self.eval_body(&expr.body, env).await
    }

    async fn eval_body(&self, body: &[Expression], env: &Environment) -> RuntimeResult<Value> {
        let mut result = Value::Nil;
        for expr in body {
            result = self.eval(expr, env).await?;
        }
        Ok(result)
    }

    /// Anchor for `path` under this evaluator's root.
    pub fn walk(&self, path: &Path) -> Anchor {
        self.root.walk(path)
    }
}
