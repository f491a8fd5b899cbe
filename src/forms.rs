//! Special forms. Each one is an ordinary macro value: it receives the
//! calling scope, the name it was invoked through and its unevaluated
//! arguments, and decides itself what to evaluate and where.

use std::{io::Write, rc::Rc};

use crate::{
    ast::Expr,
    diagnostics::{macro_error, Result},
    runtime::{eval_in_child, eval_sequence},
    scope::{Scope, ScopeRef},
    value::{Closure, Value, ValueKind},
};

type Form = fn(&ScopeRef, &str, &[Expr]) -> Result<Value>;

pub(crate) const FORMS: &[(&str, Form, &str)] = &[
    ("do", do_form, "Evaluates each expression in order and returns the last.\nUsage: (do expr1 expr2 ...)"),
    ("let", let_form, "Like do, but inside a new child scope.\nUsage: (let expr1 expr2 ...)"),
    ("label", label, "Binds a value in the current scope.\nUsage: (label <symbol> expr)"),
    ("global", global, "Binds a value in the root scope.\nUsage: (global <symbol> expr)"),
    ("cond", cond, "Evaluates the action of the first test that is neither nil nor false.\nUsage: (cond (test1 action1) (test2 action2) ...)"),
    ("lambda", lambda, "Defines an anonymous function.\nUsage: (lambda [params] body...)"),
    ("defn", defn, "Defines a named function in the current scope.\nUsage: (defn <name> [params] body...)"),
    ("->", thread_first, "Threads a value through calls as their first argument.\nUsage: (-> expr (f a) (g b) ...)"),
    ("->>", thread_last, "Threads a value through calls as their last argument.\nUsage: (->> expr (f a) (g b) ...)"),
    ("quote", quote, "Returns its argument unevaluated.\nUsage: (quote expr) or 'expr"),
    ("eval", unquote, "Evaluates a quoted expression in the current scope.\nUsage: (eval expr)"),
    ("doc", doc, "Shows the documentation of a bound symbol.\nUsage: (doc <symbol>)"),
    ("dump-scope", dump_scope, "Renders the current scope chain as text.\nUsage: (dump-scope)"),
    ("inspect", inspect, "Pretty-prints its unevaluated arguments.\nUsage: (inspect expr...)"),
];

pub fn install(scope: &ScopeRef) {
    let mut scope = scope.borrow_mut();
    for (name, form, doc) in FORMS {
        scope.bind(*name, Value::macro_form(*name, *form), Some(doc.to_string()));
    }
}

pub fn do_form(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    eval_sequence(scope, args)
}

pub fn let_form(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    eval_in_child(scope, args)
}

pub fn label(scope: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
    label_in(scope, scope, name, args)
}

pub fn global(scope: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
    label_in(scope, &Scope::root(scope), name, args)
}

fn label_in(scope: &ScopeRef, target: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
    let [symbol, expr] = args else {
        return Err(macro_error(format!(
            "{} expects a symbol and a value, got {} arguments",
            form_name(name, "label"),
            args.len()
        )));
    };
    let symbol = symbol.as_symbol().ok_or_else(|| {
        macro_error(format!(
            "argument 1 must be a symbol, not {}",
            symbol.kind_name()
        ))
    })?;
    let value = expr.eval(scope)?;
    target.borrow_mut().bind(symbol, value.clone(), None);
    Ok(value)
}

pub fn cond(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    let mut branches = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Expr::List(items) => match items.as_slice() {
                [test, action] => branches.push((test, action)),
                _ => {
                    return Err(macro_error(
                        "each cond argument must be of the form (test action)",
                    ))
                }
            },
            other => {
                return Err(macro_error(format!(
                    "all cond arguments must be lists, not {}",
                    other.kind_name()
                )))
            }
        }
    }

    for (test, action) in branches {
        if test.eval(scope)?.is_truthy() {
            return action.eval(scope);
        }
    }
    Ok(Value::nil())
}

pub fn lambda(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    Ok(Value::new(ValueKind::Function(build_closure(scope, None, args)?)))
}

pub fn defn(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    if args.len() < 3 {
        return Err(macro_error(format!(
            "defn requires 3 or more arguments, got {}",
            args.len()
        )));
    }
    let name = args[0].as_symbol().ok_or_else(|| {
        macro_error(format!(
            "first argument must be a symbol, not {}",
            args[0].kind_name()
        ))
    })?;
    let closure = build_closure(scope, Some(name.to_string()), &args[1..])?;
    scope
        .borrow_mut()
        .bind(name, Value::new(ValueKind::Function(closure)), None);
    Ok(Value::string(name))
}

fn build_closure(scope: &ScopeRef, name: Option<String>, args: &[Expr]) -> Result<Closure> {
    let [params, body @ ..] = args else {
        return Err(macro_error("lambda requires a parameter vector and a body"));
    };
    if body.is_empty() {
        return Err(macro_error("at least two arguments required"));
    }
    let Expr::Vector(params) = params else {
        return Err(macro_error(format!(
            "first argument must be a vector of symbols, not {}",
            params.kind_name()
        )));
    };
    let params = params
        .iter()
        .map(|param| {
            param.as_symbol().map(str::to_string).ok_or_else(|| {
                macro_error(format!(
                    "parameter vector must contain symbols, not {}",
                    param.kind_name()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Closure {
        name,
        params,
        body: body.to_vec().into(),
        scope: Rc::clone(scope),
    })
}

pub fn thread_first(scope: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
    thread(true, scope, name, args)
}

pub fn thread_last(scope: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
    thread(false, scope, name, args)
}

fn thread(first: bool, scope: &ScopeRef, name: &str, args: &[Expr]) -> Result<Value> {
    let Some((initial, calls)) = args.split_first() else {
        return Err(macro_error(format!(
            "{} requires at least 1 argument",
            form_name(name, if first { "->" } else { "->>" })
        )));
    };

    let mut result = initial.eval(scope)?;
    for (idx, call) in calls.iter().enumerate() {
        let (head, rest) = match call {
            Expr::List(items) if !items.is_empty() => (&items[0], &items[1..]),
            other => {
                return Err(macro_error(format!(
                    "argument {} must be a function call, not {}",
                    idx + 2,
                    other.kind_name()
                )))
            }
        };
        let mut next = Vec::with_capacity(rest.len() + 2);
        next.push(head.clone());
        if first {
            next.push(Expr::Value(result));
            next.extend_from_slice(rest);
        } else {
            next.extend_from_slice(rest);
            next.push(Expr::Value(result));
        }
        result = Expr::List(next).eval(scope)?;
    }
    Ok(result)
}

pub fn quote(_scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    match args {
        [expr] => Ok(Value::expr(expr.clone())),
        _ => Err(macro_error(format!(
            "quote requires exactly 1 argument, got {}",
            args.len()
        ))),
    }
}

/// Unquotes its argument in the current scope. Values that are not
/// quoted expressions are returned unchanged.
pub fn unquote(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    let [arg] = args else {
        return Err(macro_error(format!(
            "eval requires exactly 1 argument, got {}",
            args.len()
        )));
    };
    arg.unquote_eval(scope)
}

pub fn doc(scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    let [arg] = args else {
        return Err(macro_error(format!(
            "exactly 1 argument required, got {}",
            args.len()
        )));
    };
    let symbol = arg.as_symbol().ok_or_else(|| {
        macro_error(format!(
            "argument must be a symbol, not {}",
            arg.kind_name()
        ))
    })?;
    let value = arg.eval(scope)?;

    let mut text = Scope::doc(scope, symbol);
    if text.trim().is_empty() {
        text = format!("No documentation available for '{symbol}'");
    }
    if let ValueKind::NativeFunction(native) = value.kind() {
        text = format!("{text}\n\nSignature: {}", native.signature());
    }
    Ok(Value::string(format!("{text}\n\nType: {}", value.type_name())))
}

pub fn dump_scope(scope: &ScopeRef, _name: &str, _args: &[Expr]) -> Result<Value> {
    Ok(Value::string(scope.borrow().to_string()))
}

pub fn inspect(_scope: &ScopeRef, _name: &str, args: &[Expr]) -> Result<Value> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{args:#?}")?;
    Ok(Value::nil())
}

fn form_name<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    if name.is_empty() {
        fallback
    } else {
        name
    }
}
