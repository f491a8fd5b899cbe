use std::fmt;

use thiserror::Error;

/// Represents a byte span within a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Unrecognized character run in the source text.
    Lexer,
    /// Unbalanced brackets or a token that cannot start an expression.
    Parser,
    /// Symbol not found anywhere in the scope chain.
    Resolution,
    /// Head not invokable, arity mismatch, failed argument conversion,
    /// host error or a panic caught at the invocation boundary.
    Call,
    /// Special form used with the wrong argument shape, count or type.
    Macro,
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub source: Option<String>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            source: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches the label of the source text the diagnostic came from.
    /// An already attached label is kept.
    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        if self.source.is_none() {
            self.source = Some(name.into());
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}: ")?;
        }
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        if !self.notes.is_empty() {
            writeln!(f)?;
            for note in &self.notes {
                writeln!(f, "  note: {note}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the sprig interpreter.
#[derive(Debug, Error)]
pub enum SprigError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SprigError {
    pub fn kind(&self) -> Option<&DiagnosticKind> {
        match self {
            SprigError::Diagnostic(diag) => Some(&diag.kind),
            SprigError::Io(_) => None,
        }
    }

    pub fn with_source(self, name: &str) -> Self {
        match self {
            SprigError::Diagnostic(diag) => SprigError::Diagnostic(diag.with_source(name)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SprigError>;

pub(crate) fn call_error(message: impl Into<String>) -> SprigError {
    SprigError::from(Diagnostic::new(DiagnosticKind::Call, message))
}

pub(crate) fn macro_error(message: impl Into<String>) -> SprigError {
    SprigError::from(Diagnostic::new(DiagnosticKind::Macro, message))
}
