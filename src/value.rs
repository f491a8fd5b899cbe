use std::{fmt, rc::Rc};

use crate::{
    ast::Expr,
    diagnostics::Result,
    invoke::HostFn,
    scope::ScopeRef,
};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn nil() -> Self {
        Self::new(ValueKind::Nil)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn vector(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Vector(values))
    }

    /// An unevaluated expression handle, as produced by quoting.
    pub fn expr(expr: Expr) -> Self {
        Self::new(ValueKind::Expr(expr))
    }

    /// Wraps a typed Rust function or closure. Its parameter types and
    /// count are recorded for checking and conversion at call time.
    pub fn native<F, Args>(name: impl Into<String>, function: F) -> Self
    where
        F: HostFn<Args>,
    {
        Self::new(ValueKind::NativeFunction(NativeFunction::new(name, function)))
    }

    /// Wraps a raw callback accepting at least `min` arguments.
    pub fn variadic<F>(name: impl Into<String>, min: usize, callback: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Self::callback(name, Arity::AtLeast(min), Vec::new(), callback)
    }

    /// Wraps a raw callback. Its failures are passed on unchanged, unlike
    /// the errors of typed functions, which become Call failures.
    pub fn callback<F>(
        name: impl Into<String>,
        arity: Arity,
        params: Vec<&'static str>,
        callback: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name: name.into(),
            arity,
            params,
            callback: Rc::new(callback),
        }))
    }

    pub fn macro_form<F>(name: impl Into<String>, expand: F) -> Self
    where
        F: Fn(&ScopeRef, &str, &[Expr]) -> Result<Value> + 'static,
    {
        Self::new(ValueKind::Macro(Macro {
            name: name.into(),
            expand: Rc::new(expand),
        }))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    /// Only nil and `false` count as false.
    pub fn is_truthy(&self) -> bool {
        !matches!(&*self.0, ValueKind::Nil | ValueKind::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(&*self.0, ValueKind::Nil)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            &*self.0,
            ValueKind::Macro(_) | ValueKind::Function(_) | ValueKind::NativeFunction(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Nil => "nil",
            ValueKind::Bool(_) => "bool",
            ValueKind::Number(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::Vector(_) => "vector",
            ValueKind::Expr(_) => "expression",
            ValueKind::Macro(_) => "macro",
            ValueKind::Function(_) => "function",
            ValueKind::NativeFunction(_) => "native-function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Nil, ValueKind::Nil) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Vector(a), ValueKind::Vector(b)) => a == b,
            _ => Rc::ptr_eq(&self.0, &other.0),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "{s:?}"),
            ValueKind::Vector(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Expr(expr) => write!(f, "'{expr}"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Vector(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            ValueKind::Expr(expr) => write!(f, "{expr}"),
            ValueKind::Macro(mac) => write!(f, "<macro {}>", mac.name),
            ValueKind::Function(fun) => write!(
                f,
                "<fn {}>",
                fun.name.as_deref().unwrap_or("anonymous")
            ),
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
        }
    }
}

#[derive(Clone)]
pub enum ValueKind {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Vector(Vec<Value>),
    Expr(Expr),
    Macro(Macro),
    Function(Closure),
    NativeFunction(NativeFunction),
}

/// A callable that receives its arguments unevaluated, together with the
/// calling scope and the symbol it was invoked through.
#[derive(Clone)]
pub struct Macro {
    pub name: String,
    pub expand: Rc<dyn Fn(&ScopeRef, &str, &[Expr]) -> Result<Value>>,
}

impl Macro {
    pub fn expand(&self, scope: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
        (self.expand)(scope, name, args)
    }
}

/// A function defined by `lambda` or `defn`.
#[derive(Clone)]
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<[Expr]>,
    pub scope: ScopeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: Arity,
    /// Declared parameter type names; empty for variadic callbacks.
    pub params: Vec<&'static str>,
    pub callback: Rc<dyn Fn(&[Value]) -> Result<Value>>,
}

impl NativeFunction {
    pub fn new<F, Args>(name: impl Into<String>, function: F) -> Self
    where
        F: HostFn<Args>,
    {
        let params = F::param_types();
        Self {
            name: name.into(),
            arity: Arity::Exact(params.len()),
            params,
            callback: Rc::new(move |args: &[Value]| function.call(args)),
        }
    }

    pub fn signature(&self) -> String {
        match self.arity {
            Arity::Exact(_) => format!("({})", self.params.join(", ")),
            Arity::AtLeast(n) => format!("(at least {n} values)"),
        }
    }
}
