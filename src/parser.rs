use tracing::debug;

use crate::{
    ast::Expr,
    diagnostics::{Diagnostic, DiagnosticKind, Result, SprigError},
    lexer::{self, Token, TokenKind},
};

/// Deepest bracket or quote nesting accepted in source text.
pub const MAX_PARSE_DEPTH: usize = 512;

/// Lexes and parses `source`. `name` labels any failure for reporting.
pub fn parse(name: &str, source: &str) -> Result<Expr> {
    let tokens = lexer::tokenize(source)
        .map_err(|diag| SprigError::from(diag.with_source(name)))?;
    debug!(source = name, tokens = tokens.len(), "lexed source");
    parse_tokens(tokens).map_err(|err| err.with_source(name))
}

/// Builds the root expression. A single top-level form is returned as
/// is; zero or several forms are collected into a module.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Expr> {
    let mut cursor = TokenCursor::new(tokens);
    let mut forms = Vec::new();
    while !cursor.is_empty() {
        if let Some(expr) = parse_expr(&mut cursor, 0)? {
            forms.push(expr);
        }
    }
    if forms.len() == 1 {
        Ok(forms.remove(0))
    } else {
        Ok(Expr::Module(forms))
    }
}

/// Peekable, poppable view over a token sequence.
pub struct TokenCursor {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenCursor {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    pub fn pop(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.tokens.len()
    }
}

/// Parses one expression. Trivia tokens yield `None`.
fn parse_expr(cursor: &mut TokenCursor, depth: usize) -> Result<Option<Expr>> {
    let token = cursor.pop().ok_or_else(unexpected_eof)?;
    if depth >= MAX_PARSE_DEPTH && !token.kind.is_trivia() {
        return Err(SprigError::from(
            Diagnostic::new(
                DiagnosticKind::Parser,
                format!("expression nested too deeply (max: {MAX_PARSE_DEPTH})"),
            )
            .with_span(token.span),
        ));
    }
    let expr = match token.kind {
        TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment => return Ok(None),
        TokenKind::OpenList => Expr::List(parse_seq(cursor, TokenKind::CloseList, depth + 1)?),
        TokenKind::OpenVector => Expr::Vector(parse_seq(cursor, TokenKind::CloseVector, depth + 1)?),
        TokenKind::Number => Expr::number(token.lexeme),
        TokenKind::String => Expr::String(token.lexeme),
        TokenKind::Symbol => Expr::Symbol(token.lexeme),
        TokenKind::Quote => loop {
            if let Some(inner) = parse_expr(cursor, depth + 1)? {
                break Expr::Quote(Box::new(inner));
            }
        },
        TokenKind::CloseList | TokenKind::CloseVector => {
            return Err(SprigError::from(
                Diagnostic::new(
                    DiagnosticKind::Parser,
                    format!("unexpected token `{}` ({})", token.lexeme, token.kind),
                )
                .with_span(token.span),
            ));
        }
    };
    Ok(Some(expr))
}

fn parse_seq(cursor: &mut TokenCursor, close: TokenKind, depth: usize) -> Result<Vec<Expr>> {
    let mut items = Vec::new();
    loop {
        let next = cursor.peek().ok_or_else(unexpected_eof)?;
        if next.kind == close {
            break;
        }
        if let Some(expr) = parse_expr(cursor, depth)? {
            items.push(expr);
        }
    }
    cursor.pop();
    Ok(items)
}

fn unexpected_eof() -> SprigError {
    SprigError::from(Diagnostic::new(
        DiagnosticKind::Parser,
        "unexpected end of input",
    ))
}
