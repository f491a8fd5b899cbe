//! Dynamic invocation of closures and host functions.
//!
//! Host functions are plain Rust closures whose parameter types implement
//! [`FromValue`] and whose return type implements [`IntoValue`]. The
//! [`HostFn`] adapter records the declared parameter types so that arity
//! and conversion are checked in one place at call time.

use std::{
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use tracing::{trace, warn};

use crate::{
    ast::Expr,
    diagnostics::{call_error, Result, SprigError},
    runtime::eval_sequence,
    scope::Scope,
    value::{Closure, NativeFunction, Value, ValueKind},
};

/// Calls `callee` with already evaluated arguments.
///
/// A panic raised anywhere below this call is caught here and reported as
/// a call failure, so one misbehaving call never tears down the session.
pub fn invoke(callee: &Value, args: Vec<Value>) -> Result<Value> {
    trace!(callee = %callee, argc = args.len(), "invoking");
    match panic::catch_unwind(AssertUnwindSafe(|| dispatch(callee, args))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|msg| msg.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(callee = %callee, %reason, "call panicked");
            Err(call_error(format!("call to {callee} aborted: {reason}")))
        }
    }
}

fn dispatch(callee: &Value, args: Vec<Value>) -> Result<Value> {
    match callee.kind() {
        ValueKind::Function(closure) => call_closure(closure, args),
        ValueKind::NativeFunction(native) => call_native(native, &args),
        ValueKind::Macro(mac) => Err(call_error(format!(
            "macro `{}` cannot be applied to evaluated arguments",
            mac.name
        ))),
        _ => Err(call_error(format!(
            "value is not callable: {} ({})",
            callee,
            callee.type_name()
        ))),
    }
}

fn call_closure(closure: &Closure, args: Vec<Value>) -> Result<Value> {
    if args.len() != closure.params.len() {
        return Err(call_error(format!(
            "{} requires {} arguments, got {}",
            closure.name.as_deref().unwrap_or("lambda"),
            closure.params.len(),
            args.len()
        )));
    }
    let local = Scope::with_parent(Rc::clone(&closure.scope));
    {
        let mut local = local.borrow_mut();
        for (name, value) in closure.params.iter().zip(args) {
            local.bind(name.clone(), value, None);
        }
    }
    eval_sequence(&local, &closure.body)
}

fn call_native(native: &NativeFunction, args: &[Value]) -> Result<Value> {
    if !native.arity.accepts(args.len()) {
        return Err(call_error(format!(
            "`{}` requires {} arguments, got {}",
            native.name,
            native.arity,
            args.len()
        )));
    }
    (native.callback)(args).map_err(|err| match err {
        SprigError::Diagnostic(diag) => {
            SprigError::Diagnostic(diag.with_note(format!("in `{}`", native.name)))
        }
        other => other,
    })
}

/// Conversion from a language value to a host parameter type.
pub trait FromValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value_for_int {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_value(value: &Value) -> Option<Self> {
                    let number = value.as_number()?.trunc();
                    // `MAX as f64` rounds up to a power of two for 64-bit
                    // types, so the bound is exclusive of `MAX + 1`.
                    if number.is_finite()
                        && number >= <$ty>::MIN as f64
                        && number < <$ty>::MAX as f64 + 1.0
                    {
                        Some(number as $ty)
                    } else {
                        None
                    }
                }
            }
        )+
    };
}

impl_from_value_for_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_number()
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_number().map(|n| n as f32)
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "Value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for Expr {
    const TYPE_NAME: &'static str = "Expr";

    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Expr(expr) => Some(expr.clone()),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const TYPE_NAME: &'static str = "Vec";

    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Vector(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// Conversion from a host return value back into a language value.
pub trait IntoValue {
    fn into_value(self) -> Result<Value>;
}

macro_rules! impl_into_value_for_number {
    ($($ty:ty),+) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Result<Value> {
                    Ok(Value::number(self as f64))
                }
            }
        )+
    };
}

impl_into_value_for_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl IntoValue for () {
    fn into_value(self) -> Result<Value> {
        Ok(Value::nil())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Result<Value> {
        Ok(Value::bool(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Result<Value> {
        Ok(Value::string(self))
    }
}

impl IntoValue for &'static str {
    fn into_value(self) -> Result<Value> {
        Ok(Value::string(self))
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Result<Value> {
        Ok(self)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Result<Value> {
        self.into_iter()
            .map(IntoValue::into_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::vector)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Result<Value> {
        match self {
            Some(value) => value.into_value(),
            None => Ok(Value::nil()),
        }
    }
}

impl<T, E> IntoValue for std::result::Result<T, E>
where
    T: IntoValue,
    E: std::fmt::Display,
{
    fn into_value(self) -> Result<Value> {
        match self {
            Ok(value) => value.into_value(),
            Err(err) => Err(call_error(err.to_string())),
        }
    }
}

/// Adapter turning a typed Rust callable into an invokable value.
///
/// `Args` is the tuple of parameter types; it only serves to tell the
/// implementations for different arities apart.
pub trait HostFn<Args>: 'static {
    fn param_types() -> Vec<&'static str>;

    fn call(&self, args: &[Value]) -> Result<Value>;
}

fn convert<T: FromValue>(value: &Value, position: usize) -> Result<T> {
    T::from_value(value).ok_or_else(|| {
        call_error(format!(
            "argument {position}: cannot convert {} ({}) to {}",
            value,
            value.type_name(),
            T::TYPE_NAME
        ))
    })
}

impl<F, R> HostFn<()> for F
where
    F: Fn() -> R + 'static,
    R: IntoValue,
{
    fn param_types() -> Vec<&'static str> {
        Vec::new()
    }

    fn call(&self, args: &[Value]) -> Result<Value> {
        if !args.is_empty() {
            return Err(call_error(format!(
                "requires 0 arguments, got {}",
                args.len()
            )));
        }
        (self)().into_value()
    }
}

macro_rules! impl_host_fn_for_arity {
    ($arity:expr, $( $v:ident : $A:ident ),+) => {
        impl<F, R, $( $A ),+> HostFn<( $( $A, )+ )> for F
        where
            F: Fn( $( $A ),+ ) -> R + 'static,
            $( $A: FromValue, )+
            R: IntoValue,
        {
            fn param_types() -> Vec<&'static str> {
                vec![ $( <$A as FromValue>::TYPE_NAME ),+ ]
            }

            fn call(&self, args: &[Value]) -> Result<Value> {
                match args {
                    [ $( $v ),+ ] => {
                        let mut position = 0;
                        $(
                            position += 1;
                            let $v: $A = convert($v, position)?;
                        )+
                        let _ = position;
                        (self)( $( $v ),+ ).into_value()
                    }
                    _ => Err(call_error(format!(
                        "requires {} arguments, got {}",
                        $arity,
                        args.len()
                    ))),
                }
            }
        }
    };
}

impl_host_fn_for_arity!(1, a0: A1);
impl_host_fn_for_arity!(2, a0: A1, a1: A2);
impl_host_fn_for_arity!(3, a0: A1, a1: A2, a2: A3);
impl_host_fn_for_arity!(4, a0: A1, a1: A2, a2: A3, a3: A4);
impl_host_fn_for_arity!(5, a0: A1, a1: A2, a2: A3, a3: A4, a4: A5);
impl_host_fn_for_arity!(6, a0: A1, a1: A2, a2: A3, a3: A4, a4: A5, a5: A6);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    fn call(value: &Value, args: Vec<Value>) -> Result<Value> {
        invoke(value, args)
    }

    #[test]
    fn narrows_numbers_to_declared_width() {
        let add = Value::native("narrow-add", |a: i8, b: u16| a as i32 + b as i32);
        let result = call(&add, vec![Value::number(-3.0), Value::number(400.0)]).unwrap();
        assert_eq!(result, Value::number(397.0));
    }

    #[test]
    fn widens_to_f32_and_truncates_fractions() {
        let f = Value::native("f", |a: f32, b: i64| a as f64 + b as f64);
        let result = call(&f, vec![Value::number(0.5), Value::number(2.9)]).unwrap();
        assert_eq!(result, Value::number(2.5));
    }

    #[test]
    fn arity_mismatch_is_call_failure() {
        let add = Value::native("add", |a: f64, b: f64| a + b);
        let err = call(&add, vec![Value::number(1.0)]).unwrap_err();
        assert_eq!(err.kind(), Some(&DiagnosticKind::Call));
        assert!(err.to_string().contains("requires 2 arguments, got 1"));
    }

    #[test]
    fn out_of_range_number_has_no_conversion() {
        let f = Value::native("f", |a: u8| a);
        let err = call(&f, vec![Value::number(256.0)]).unwrap_err();
        assert_eq!(err.kind(), Some(&DiagnosticKind::Call));
        assert!(err.to_string().contains("cannot convert 256 (number) to u8"));
        assert!(call(&f, vec![Value::string("1")]).is_err());
    }

    #[test]
    fn wide_integers_reject_values_past_their_range() {
        let id = Value::native("id64", |a: u64| a.to_string());
        let err = call(&id, vec![Value::number(18446744073709551616.0)]).unwrap_err();
        assert_eq!(err.kind(), Some(&DiagnosticKind::Call));
        assert_eq!(
            call(&id, vec![Value::number(9007199254740992.0)]).unwrap(),
            Value::string("9007199254740992")
        );

        let signed = Value::native("signed", |a: i64| a);
        assert!(call(&signed, vec![Value::number(9223372036854775808.0)]).is_err());
        assert!(call(&signed, vec![Value::number(-9223372036854775808.0)]).is_ok());

        let byte = Value::native("byte", |a: u8| a);
        assert_eq!(call(&byte, vec![Value::number(255.9)]).unwrap(), Value::number(255.0));
        assert!(call(&byte, vec![Value::number(-1.0)]).is_err());
    }

    #[test]
    fn converts_strings_bools_and_sequences() {
        let f = Value::native("f", |s: String, flag: bool, items: Vec<f64>| {
            format!("{s}:{flag}:{}", items.iter().sum::<f64>())
        });
        let items = Value::vector(vec![Value::number(1.0), Value::number(2.0)]);
        let result = call(
            &f,
            vec![Value::string("sum"), Value::bool(true), items],
        )
        .unwrap();
        assert_eq!(result, Value::string("sum:true:3"));
    }

    #[test]
    fn host_errors_become_call_failures() {
        let f = Value::native("checked", |n: f64| {
            if n < 0.0 {
                Err("negative input")
            } else {
                Ok(n.sqrt())
            }
        });
        assert_eq!(call(&f, vec![Value::number(9.0)]).unwrap(), Value::number(3.0));
        let err = call(&f, vec![Value::number(-1.0)]).unwrap_err();
        assert_eq!(err.kind(), Some(&DiagnosticKind::Call));
    }

    #[test]
    fn panics_are_caught_at_the_boundary() {
        let f = Value::native("boom", || -> f64 { panic!("kaboom") });
        let err = call(&f, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), Some(&DiagnosticKind::Call));
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn non_callables_are_rejected() {
        let err = call(&Value::number(1.0), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("value is not callable"));
    }

    #[test]
    fn variadic_checks_minimum() {
        let f = Value::variadic("count", 1, |args| Ok(Value::number(args.len() as f64)));
        assert_eq!(
            call(&f, vec![Value::nil(), Value::nil()]).unwrap(),
            Value::number(2.0)
        );
        assert!(call(&f, Vec::new()).is_err());
    }
}
