use std::{cell::OnceCell, fmt};

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Result, SprigError},
    value::Value,
};

/// A symbolic expression produced by the parser.
#[derive(Debug, Clone)]
pub enum Expr {
    Symbol(String),
    Number(NumberExpr),
    /// Raw string literal, surrounding quotes included.
    String(String),
    List(Vec<Expr>),
    Vector(Vec<Expr>),
    Quote(Box<Expr>),
    /// Several top-level forms read from one source text.
    Module(Vec<Expr>),
    /// A value spliced into a call by the threading forms.
    Value(Value),
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn number(raw: impl Into<String>) -> Self {
        Expr::Number(NumberExpr::new(raw))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Symbol(_) => "symbol",
            Expr::Number(_) => "number",
            Expr::String(_) => "string",
            Expr::List(_) => "list",
            Expr::Vector(_) => "vector",
            Expr::Quote(_) => "quote",
            Expr::Module(_) => "module",
            Expr::Value(_) => "value",
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(name) => f.write_str(name),
            Expr::Number(number) => f.write_str(&number.raw),
            Expr::String(raw) => f.write_str(raw),
            Expr::List(items) => write_seq(f, "(", items, " ", ")"),
            Expr::Vector(items) => write_seq(f, "[", items, " ", "]"),
            Expr::Quote(inner) => write!(f, "'{inner}"),
            Expr::Module(forms) => write_seq(f, "", forms, "\n", ""),
            Expr::Value(value) => write!(f, "{value}"),
        }
    }
}

fn write_seq(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[Expr],
    separator: &str,
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

/// Number literal whose text is parsed on first evaluation and cached.
#[derive(Debug, Clone)]
pub struct NumberExpr {
    pub raw: String,
    parsed: OnceCell<f64>,
}

impl NumberExpr {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceCell::new(),
        }
    }

    pub fn value(&self) -> Result<f64> {
        if let Some(number) = self.parsed.get() {
            return Ok(*number);
        }
        let number = self.raw.parse::<f64>().map_err(|err| {
            SprigError::from(
                Diagnostic::new(
                    DiagnosticKind::Lexer,
                    format!("invalid number literal `{}`", self.raw),
                )
                .with_note(err.to_string()),
            )
        })?;
        Ok(*self.parsed.get_or_init(|| number))
    }

    pub fn is_cached(&self) -> bool {
        self.parsed.get().is_some()
    }
}

/// Strips the surrounding quotes of a string literal and resolves
/// the `\"` and `\n` escapes. Other backslash sequences are kept verbatim.
pub fn unquote_string(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some('"') => {
                    out.push('"');
                    chars.next();
                }
                Some('n') => {
                    out.push('\n');
                    chars.next();
                }
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_is_parsed_once() {
        let number = NumberExpr::new("-2.5");
        assert!(!number.is_cached());
        assert_eq!(number.value().unwrap(), -2.5);
        assert!(number.is_cached());
        assert_eq!(number.value().unwrap(), -2.5);
    }

    #[test]
    fn bad_number_fails_at_evaluation() {
        assert!(NumberExpr::new("1.2.3").value().is_err());
    }

    #[test]
    fn unquotes_supported_escapes() {
        assert_eq!(unquote_string(r#""a \"b\"\nc""#), "a \"b\"\nc");
        assert_eq!(unquote_string(r#""tab\t""#), "tab\\t");
    }

    #[test]
    fn renders_source_like_text() {
        let expr = Expr::List(vec![
            Expr::symbol("f"),
            Expr::Vector(vec![Expr::number("1"), Expr::String("\"s\"".into())]),
            Expr::Quote(Box::new(Expr::symbol("x"))),
        ]);
        assert_eq!(expr.to_string(), "(f [1 \"s\"] 'x)");
    }
}
