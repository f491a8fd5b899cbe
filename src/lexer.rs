use std::fmt;

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenList,
    CloseList,
    OpenVector,
    CloseVector,
    Number,
    String,
    Symbol,
    Quote,
    Comment,
    Whitespace,
    Newline,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::OpenList => "open-list",
            TokenKind::CloseList => "close-list",
            TokenKind::OpenVector => "open-vector",
            TokenKind::CloseVector => "close-vector",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Symbol => "symbol",
            TokenKind::Quote => "quote",
            TokenKind::Comment => "comment",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Newline => "newline",
        }
    }

    /// Tokens the parser skips without producing an expression.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

/// Lexes `source` into tokens, whitespace and newlines included.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some((idx, ch)) = self.peeked.take() {
            Some((idx, ch))
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// Character following the peeked one, without consuming anything.
    fn peek_second(&mut self) -> Option<char> {
        self.peek();
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn bump_while<F>(&mut self, mut predicate: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some((_, ch)) = self.peek() {
            if predicate(ch) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, start: usize, kind: TokenKind) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            span: SourceSpan::new(start, self.current),
        }
    }

    fn string_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        while let Some((_, ch)) = self.bump() {
            match ch {
                '"' => return Ok(self.token(start, TokenKind::String)),
                '\\' => {
                    if self.bump().is_none() {
                        break;
                    }
                }
                _ => {}
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal")
                .with_span(SourceSpan::new(start, self.current)),
        )
    }

    fn number_literal(&mut self, start: usize) -> Result<Token, Diagnostic> {
        self.bump_while(|ch| !is_delimiter(ch));
        let token = self.token(start, TokenKind::Number);
        if token
            .lexeme
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '+' | '-'))
        {
            Ok(token)
        } else {
            Err(Diagnostic::new(
                DiagnosticKind::Lexer,
                format!("malformed number literal `{}`", token.lexeme),
            )
            .with_span(token.span))
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        while let Some((start, ch)) = self.peek() {
            let starts_number = ch.is_ascii_digit()
                || (matches!(ch, '+' | '-' | '.')
                    && self.peek_second().is_some_and(|next| next.is_ascii_digit()));
            self.bump();

            let token = match ch {
                '\n' => self.token(start, TokenKind::Newline),
                ch if ch.is_whitespace() => {
                    self.bump_while(|ch| ch.is_whitespace() && ch != '\n');
                    self.token(start, TokenKind::Whitespace)
                }
                ';' => {
                    self.bump_while(|ch| ch != '\n');
                    self.token(start, TokenKind::Comment)
                }
                '(' => self.token(start, TokenKind::OpenList),
                ')' => self.token(start, TokenKind::CloseList),
                '[' => self.token(start, TokenKind::OpenVector),
                ']' => self.token(start, TokenKind::CloseVector),
                '\'' => self.token(start, TokenKind::Quote),
                '"' => self.string_literal(start)?,
                _ if starts_number => self.number_literal(start)?,
                ch if ch.is_control() => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Lexer,
                        format!("unexpected character {ch:?}"),
                    )
                    .with_span(SourceSpan::new(start, self.current)));
                }
                _ => {
                    self.bump_while(|ch| !is_delimiter(ch));
                    self.token(start, TokenKind::Symbol)
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || ch.is_control() || matches!(ch, '(' | ')' | '[' | ']' | '"' | '\'' | ';')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("source should lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_call_with_vector_and_string() {
        use TokenKind::*;
        assert_eq!(
            kinds("(println [1 -2.5] \"hi\")"),
            vec![
                OpenList,
                Symbol,
                Whitespace,
                OpenVector,
                Number,
                Whitespace,
                Number,
                CloseVector,
                Whitespace,
                String,
                CloseList,
            ]
        );
    }

    #[test]
    fn string_literal_keeps_quotes_and_escapes() {
        let tokens = tokenize(r#""say \"hi\"\n""#).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].lexeme, r#""say \"hi\"\n""#);
    }

    #[test]
    fn signs_alone_are_symbols() {
        let tokens = tokenize("- -> ->> +1 .5").unwrap();
        let significant: Vec<_> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| (t.kind, t.lexeme.as_str()))
            .collect();
        assert_eq!(
            significant,
            vec![
                (TokenKind::Symbol, "-"),
                (TokenKind::Symbol, "->"),
                (TokenKind::Symbol, "->>"),
                (TokenKind::Number, "+1"),
                (TokenKind::Number, ".5"),
            ]
        );
    }

    #[test]
    fn newlines_and_comments_are_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("x ; note\n'y"),
            vec![Symbol, Whitespace, Comment, Newline, Quote, Symbol]
        );
    }

    #[test]
    fn brackets_are_not_balanced_by_the_lexer() {
        use TokenKind::*;
        assert_eq!(kinds(")]("), vec![CloseList, CloseVector, OpenList]);
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = tokenize("(print \"oops)").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Lexer);
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn rejects_malformed_number() {
        let err = tokenize("(+ 12ab 1)").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Lexer);
        assert_eq!(err.span, Some(SourceSpan::new(3, 7)));
    }

    #[test]
    fn relexing_is_deterministic() {
        let source = "(defn sq [x] (* x x))\n(sq 4) ; sixteen";
        assert_eq!(tokenize(source).unwrap(), tokenize(source).unwrap());
    }
}
