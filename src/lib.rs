//! Core library for the sprig LISP dialect: an embeddable interpreter with
//! lexing, parsing, evaluation, host function binding and a REPL.

pub mod ast;
pub mod diagnostics;
pub mod forms;
pub mod invoke;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod scope;
pub mod stdlib;
pub mod value;

pub use ast::Expr;
pub use diagnostics::{Diagnostic, DiagnosticKind, SourceSpan, SprigError};
pub use invoke::{invoke, FromValue, HostFn, IntoValue};
pub use parser::parse;
pub use repl::Repl;
pub use runtime::{ExecutionContext, Interpreter};
pub use scope::{Scope, ScopeRef};
pub use value::{Value, ValueKind};
