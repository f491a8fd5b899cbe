use std::io::Write;

use crate::{
    diagnostics::{call_error, Result},
    forms,
    lexer,
    scope::ScopeRef,
    value::{Arity, Value, ValueKind},
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn install(scope: &ScopeRef) {
    forms::install(scope);

    let entries = vec![
        ("true", Value::bool(true), "Represents logical true"),
        ("false", Value::bool(false), "Represents logical false"),
        ("nil", Value::nil(), "Represents the absence of a value; fails cond tests like false"),
        ("sprig-version", Value::string(VERSION), "Version of the interpreter"),
        (
            "type",
            Value::native("type", |value: Value| value.type_name()),
            "Returns the type name of a value.\nUsage: (type expr)",
        ),
        (
            "tokenize",
            Value::callback("tokenize", Arity::Exact(1), vec!["String"], tokenize),
            "Lexes source text into [kind text] pairs.\nUsage: (tokenize \"(+ 1 2)\")",
        ),
        (
            "+",
            Value::variadic("+", 0, |args| fold_numbers("+", args, 0.0, |a, b| a + b)),
            "Sums numbers.\nUsage: (+ n...)",
        ),
        (
            "*",
            Value::variadic("*", 0, |args| fold_numbers("*", args, 1.0, |a, b| a * b)),
            "Multiplies numbers.\nUsage: (* n...)",
        ),
        (
            "-",
            Value::variadic("-", 1, |args| reduce_numbers("-", args, |a| -a, |a, b| a - b)),
            "Subtracts the remaining numbers from the first, or negates a single number.\nUsage: (- n...)",
        ),
        (
            "/",
            Value::variadic("/", 1, |args| reduce_numbers("/", args, |a| 1.0 / a, |a, b| a / b)),
            "Divides the first number by the remaining ones.\nUsage: (/ n...)",
        ),
        ("add", Value::native("add", |a: f64, b: f64| a + b), "Usage: (add a b)"),
        ("sub", Value::native("sub", |a: f64, b: f64| a - b), "Usage: (sub a b)"),
        ("mul", Value::native("mul", |a: f64, b: f64| a * b), "Usage: (mul a b)"),
        ("div", Value::native("div", |a: f64, b: f64| a / b), "Usage: (div a b)"),
        ("mod", Value::native("mod", |a: f64, b: f64| a % b), "Usage: (mod a b)"),
        (
            "=",
            Value::variadic("=", 1, |args| {
                Ok(Value::bool(args.windows(2).all(|pair| pair[0] == pair[1])))
            }),
            "True when all arguments are equal.\nUsage: (= a b...)",
        ),
        ("<", compare("<", |a, b| a < b), "Usage: (< a b...)"),
        (">", compare(">", |a, b| a > b), "Usage: (> a b...)"),
        ("<=", compare("<=", |a, b| a <= b), "Usage: (<= a b...)"),
        (">=", compare(">=", |a, b| a >= b), "Usage: (>= a b...)"),
        (
            "not",
            Value::native("not", |value: Value| !value.is_truthy()),
            "Logical negation; only nil and false are false.\nUsage: (not expr)",
        ),
        (
            "str",
            Value::variadic("str", 0, |args| {
                Ok(Value::string(args.iter().map(|arg| arg.to_string()).collect::<String>()))
            }),
            "Concatenates the textual form of its arguments.\nUsage: (str a b...)",
        ),
        (
            "len",
            Value::native("len", length),
            "Length of a string or vector.\nUsage: (len x)",
        ),
        (
            "print",
            Value::variadic("print", 0, |args| write_values(args, false)),
            "Prints its arguments separated by spaces.\nUsage: (print a b...)",
        ),
        (
            "println",
            Value::variadic("println", 0, |args| write_values(args, true)),
            "Prints its arguments separated by spaces, then a newline.\nUsage: (println a b...)",
        ),
    ];

    let mut scope = scope.borrow_mut();
    for (name, value, doc) in entries {
        scope.bind(name, value, Some(doc.to_string()));
    }
}

fn tokenize(args: &[Value]) -> Result<Value> {
    let source = match args {
        [source] => source.as_str().ok_or_else(|| {
            call_error(format!(
                "tokenize expects a string, not {}",
                source.type_name()
            ))
        })?,
        _ => return Err(call_error("tokenize requires 1 argument")),
    };
    let tokens = lexer::tokenize(source)?
        .into_iter()
        .map(|token| {
            Value::vector(vec![
                Value::string(token.kind.name()),
                Value::string(token.lexeme),
            ])
        })
        .collect();
    Ok(Value::vector(tokens))
}

fn length(value: Value) -> Result<usize> {
    match value.kind() {
        ValueKind::String(s) => Ok(s.chars().count()),
        ValueKind::Vector(items) => Ok(items.len()),
        _ => Err(call_error(format!(
            "len expects a string or vector, not {}",
            value.type_name()
        ))),
    }
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        call_error(format!(
            "`{name}` expects numbers, found {} ({})",
            value,
            value.type_name()
        ))
    })
}

fn fold_numbers(name: &str, args: &[Value], init: f64, op: fn(f64, f64) -> f64) -> Result<Value> {
    let mut acc = init;
    for arg in args {
        acc = op(acc, expect_number(arg, name)?);
    }
    Ok(Value::number(acc))
}

fn reduce_numbers(
    name: &str,
    args: &[Value],
    single: fn(f64) -> f64,
    op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let Some((first, rest)) = args.split_first() else {
        return Err(call_error(format!("`{name}` requires at least 1 argument")));
    };
    let first = expect_number(first, name)?;
    if rest.is_empty() {
        return Ok(Value::number(single(first)));
    }
    let mut acc = first;
    for arg in rest {
        acc = op(acc, expect_number(arg, name)?);
    }
    Ok(Value::number(acc))
}

fn compare(name: &'static str, cmp: fn(f64, f64) -> bool) -> Value {
    Value::variadic(name, 1, move |args| {
        let numbers = args
            .iter()
            .map(|arg| expect_number(arg, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::bool(numbers.windows(2).all(|pair| cmp(pair[0], pair[1]))))
    })
}

fn write_values(args: &[Value], newline: bool) -> Result<Value> {
    let mut out = std::io::stdout().lock();
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            write!(out, " ")?;
        }
        write!(out, "{arg}")?;
    }
    if newline {
        writeln!(out)?;
    }
    out.flush()?;
    Ok(Value::nil())
}
