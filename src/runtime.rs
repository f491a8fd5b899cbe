use std::{cell::Cell, rc::Rc};

use tracing::{debug, trace, warn};

use crate::{
    ast::{unquote_string, Expr},
    diagnostics::{call_error, Diagnostic, DiagnosticKind, Result, SprigError},
    invoke::invoke,
    parser,
    scope::{Scope, ScopeRef},
    value::{Value, ValueKind},
};

/// Nested evaluations allowed before a submission is abandoned.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 256;

thread_local! {
    static EVAL_DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_EVAL_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_EVAL_DEPTH) };
}

/// Sets the evaluation depth limit of the current thread. Returns the
/// previous limit.
pub fn set_max_eval_depth(depth: usize) -> usize {
    MAX_EVAL_DEPTH.with(|max| max.replace(depth))
}

/// One level of nested evaluation, released on drop (unwinding included).
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self> {
        let depth = EVAL_DEPTH.with(Cell::get);
        let max = MAX_EVAL_DEPTH.with(Cell::get);
        if depth >= max {
            warn!(max, "evaluation depth limit exceeded");
            return Err(call_error(format!(
                "evaluation depth limit exceeded (max: {max})"
            )));
        }
        EVAL_DEPTH.with(|current| current.set(depth + 1));
        Ok(DepthGuard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EVAL_DEPTH.with(|current| current.set(current.get().saturating_sub(1)));
    }
}

/// Settings for an [`Interpreter`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Label attached to failures from [`Interpreter::execute`].
    pub source_name: String,
    /// Install the standard constants, special forms and functions.
    pub prelude: bool,
    /// Deepest nesting of evaluations before a Call failure is raised.
    pub max_eval_depth: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            source_name: "<input>".to_string(),
            prelude: true,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }
}

pub struct Interpreter {
    scope: ScopeRef,
    context: ExecutionContext,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        Self::with_scope(Scope::new_root(), context)
    }

    /// Uses `scope` as the root scope, e.g. one already populated by the
    /// embedder.
    pub fn with_scope(scope: ScopeRef, context: ExecutionContext) -> Self {
        if context.prelude {
            crate::stdlib::install(&scope);
        }
        Self { scope, context }
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn bind(&self, name: impl Into<String>, value: Value) {
        self.scope.borrow_mut().bind(name, value, None);
    }

    pub fn bind_doc(&self, name: impl Into<String>, value: Value, doc: impl Into<String>) {
        self.scope.borrow_mut().bind(name, value, Some(doc.into()));
    }

    /// Parses and evaluates one submission to completion.
    pub fn execute(&self, source: &str) -> Result<Value> {
        self.execute_named(&self.context.source_name, source)
    }

    pub fn execute_named(&self, name: &str, source: &str) -> Result<Value> {
        let expr = parser::parse(name, source)?;
        debug!(source = name, form = expr.kind_name(), "executing");
        let previous = set_max_eval_depth(self.context.max_eval_depth);
        let result = expr.eval(&self.scope);
        set_max_eval_depth(previous);
        result.map_err(|err| err.with_source(name))
    }
}

impl Expr {
    pub fn eval(&self, scope: &ScopeRef) -> Result<Value> {
        let _depth = DepthGuard::enter()?;
        match self {
            Expr::Symbol(name) => Scope::lookup(scope, name).ok_or_else(|| {
                SprigError::from(Diagnostic::new(
                    DiagnosticKind::Resolution,
                    format!("unable to resolve symbol `{name}`"),
                ))
            }),
            Expr::Number(number) => number.value().map(Value::number),
            Expr::String(raw) => Ok(Value::string(unquote_string(raw))),
            Expr::List(items) => eval_list(scope, items),
            Expr::Vector(items) => items
                .iter()
                .map(|item| item.eval(scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::vector),
            Expr::Quote(inner) => Ok(Value::expr((**inner).clone())),
            Expr::Module(forms) => eval_sequence(scope, forms),
            Expr::Value(value) => Ok(value.clone()),
        }
    }

    /// Evaluates the expression a quote defers. Any other expression is
    /// evaluated, and a quoted expression it yields is evaluated in turn.
    pub fn unquote_eval(&self, scope: &ScopeRef) -> Result<Value> {
        if let Expr::Quote(inner) = self {
            return inner.eval(scope);
        }
        let value = self.eval(scope)?;
        match value.kind() {
            ValueKind::Expr(expr) => expr.eval(scope),
            _ => Ok(value),
        }
    }
}

fn eval_list(scope: &ScopeRef, items: &[Expr]) -> Result<Value> {
    let Some((head, rest)) = items.split_first() else {
        return Ok(Value::vector(Vec::new()));
    };

    let callee = head.eval(scope)?;
    if let ValueKind::Macro(mac) = callee.kind() {
        let name = head.as_symbol().unwrap_or("");
        trace!(name, form = %mac.name, argc = rest.len(), "expanding macro");
        return mac.expand(scope, name, rest);
    }

    let mut args = Vec::with_capacity(rest.len());
    for arg in rest {
        args.push(arg.eval(scope)?);
    }
    invoke(&callee, args)
}

/// Evaluates `exprs` in order and yields the last value, nil when empty.
pub fn eval_sequence(scope: &ScopeRef, exprs: &[Expr]) -> Result<Value> {
    let mut last = Value::nil();
    for expr in exprs {
        last = expr.eval(scope)?;
    }
    Ok(last)
}

/// Evaluates `exprs` as a sequence inside a fresh child of `scope`.
pub fn eval_in_child(scope: &ScopeRef, exprs: &[Expr]) -> Result<Value> {
    let local = Scope::with_parent(Rc::clone(scope));
    eval_sequence(&local, exprs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_eval_runs_what_eval_defers() {
        let interpreter = Interpreter::new();
        let quoted = Expr::Quote(Box::new(Expr::List(vec![
            Expr::symbol("add"),
            Expr::number("1"),
            Expr::number("2"),
        ])));

        let deferred = quoted.eval(interpreter.scope()).unwrap();
        assert!(matches!(deferred.kind(), ValueKind::Expr(Expr::List(_))));

        let value = quoted.unquote_eval(interpreter.scope()).unwrap();
        assert_eq!(value, Value::number(3.0));
        assert_eq!(
            Expr::number("4").unquote_eval(interpreter.scope()).unwrap(),
            Value::number(4.0)
        );
    }

    #[test]
    fn depth_limit_is_a_call_failure_and_resets() {
        let interpreter = Interpreter::with_context(ExecutionContext {
            max_eval_depth: 8,
            ..ExecutionContext::default()
        });
        assert_eq!(interpreter.context().max_eval_depth, 8);

        let err = interpreter.execute("(do (do (do (do (do (do (do (do 1))))))))").unwrap_err();
        assert_eq!(err.kind(), Some(&DiagnosticKind::Call));
        assert!(err.to_string().contains("depth limit exceeded (max: 8)"));

        assert_eq!(interpreter.execute("(do (do 1))").unwrap(), Value::number(1.0));
        assert_eq!(EVAL_DEPTH.with(Cell::get), 0);
    }
}
