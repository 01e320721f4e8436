use crate::parser::ast::{Expr, ExprId, Name, NameKind, ParseError, Program};
use crate::parser::lexer::{
    Lexer,
    token::{Token, TokenKind},
};
use crate::parser::line_index::LineIndex;
use crate::parser::span::Span;
use std::rc::Rc;

mod definitions;
mod expr;
mod stmt;
mod types;

pub(crate) use expr::infix_binding_power;

/// Declaration-oriented PHP parser.
///
/// Top-level declarations (namespaces, imports, constants, functions and
/// class-likes with their member signatures) are parsed fully. Function
/// and method bodies are skipped by brace matching and any other statement
/// is kept only as an `Other` span.
pub struct Parser<'src> {
    pub(super) lexer: Lexer<'src>,
    pub(super) source: &'src [u8],
    pub(super) line_index: LineIndex,
    pub(super) current_token: Token,
    pub(super) next_token: Token,
    pub(super) prev_end: usize,
    pub(super) errors: Vec<ParseError>,
    pub(super) current_doc_comment: Option<Span>,
    pub(super) next_doc_comment: Option<Span>,
}

impl<'src> Parser<'src> {
    pub fn new(lexer: Lexer<'src>) -> Self {
        let source = lexer.input();
        let mut parser = Self {
            lexer,
            source,
            line_index: LineIndex::new(source),
            current_token: Token {
                kind: TokenKind::Eof,
                span: Span::default(),
            },
            next_token: Token {
                kind: TokenKind::Eof,
                span: Span::default(),
            },
            prev_end: 0,
            errors: Vec::new(),
            current_doc_comment: None,
            next_doc_comment: None,
        };
        parser.bump();
        parser.bump();
        parser
    }

    fn bump(&mut self) {
        if self.current_token.kind != TokenKind::Eof {
            self.prev_end = self.current_token.span.end;
        }
        self.current_token = self.next_token;
        self.current_doc_comment = self.next_doc_comment;
        self.next_doc_comment = None;
        let eof = self.source.len();
        loop {
            let token = self.lexer.next().unwrap_or(Token {
                kind: TokenKind::Eof,
                span: Span::new(eof, eof),
            });
            if token.kind == TokenKind::DocComment {
                self.next_doc_comment = Some(token.span);
            } else if token.kind != TokenKind::Comment {
                self.next_token = token;
                break;
            }
        }
    }

    pub(super) fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(ParseError {
            span,
            message: message.into(),
        });
    }

    pub(super) fn unexpected(&mut self, expected: &str) {
        let token = self.current_token;
        let message = if token.kind == TokenKind::Eof {
            format!("Syntax error, unexpected end of file, expecting {expected}")
        } else {
            format!(
                "Syntax error, unexpected '{}', expecting {expected}",
                token.span.text(self.source)
            )
        };
        self.error(token.span, message);
    }

    pub(super) fn expect(&mut self, kind: TokenKind, expected: &str) -> bool {
        if self.current_token.kind == kind {
            self.bump();
            true
        } else {
            self.unexpected(expected);
            false
        }
    }

    fn expect_semicolon(&mut self) {
        match self.current_token.kind {
            TokenKind::SemiColon => self.bump(),
            // Implicit semicolon at close tag or end of file.
            TokenKind::CloseTag | TokenKind::Eof => {}
            _ => {
                self.unexpected("';'");
                self.sync_to_statement_end();
            }
        }
    }

    pub(super) fn line(&self, offset: usize) -> usize {
        self.line_index.line(offset)
    }

    pub(super) fn text(&self, span: Span) -> String {
        span.text(self.source)
    }

    pub(super) fn current_text(&self) -> String {
        self.text(self.current_token.span)
    }

    pub(super) fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    /// Doc comment directly preceding the current token, if any.
    pub(super) fn take_doc_comment(&mut self) -> Option<Rc<str>> {
        self.current_doc_comment
            .take()
            .map(|span| Rc::from(span.text(self.source)))
    }

    pub(super) fn opaque(&self, start: usize) -> ExprId {
        let span = self.span_from(start);
        Rc::new(Expr::Opaque {
            text: Rc::from(self.text(span)),
            span,
        })
    }

    pub(super) fn parse_name(&mut self) -> Name {
        let start = self.current_token.span.start;
        let mut kind = NameKind::Unqualified;

        if self.current_token.kind == TokenKind::NsSeparator {
            kind = NameKind::FullyQualified;
            self.bump();
        } else if self.current_token.kind == TokenKind::Namespace
            && self.next_token.kind == TokenKind::NsSeparator
        {
            kind = NameKind::Relative;
            self.bump();
            self.bump();
        }

        let mut parts: Vec<String> = Vec::new();
        while self.current_token.kind.is_identifier_like() {
            parts.push(self.current_text());
            self.bump();
            if self.current_token.kind == TokenKind::NsSeparator {
                self.bump();
            } else {
                break;
            }
        }

        if parts.is_empty() {
            self.unexpected("identifier");
        } else if parts.len() > 1 && kind == NameKind::Unqualified {
            kind = NameKind::Qualified;
        }

        Name::new(parts.join("\\"), kind, self.span_from(start))
    }

    /// Identifier-like token as a plain string (member, constant or label name).
    pub(super) fn parse_identifier(&mut self, expected: &str) -> String {
        if self.current_token.kind.is_identifier_like() {
            let text = self.current_text();
            self.bump();
            text
        } else {
            self.unexpected(expected);
            String::new()
        }
    }

    /// Skip a balanced `(...)`, `[...]`, `{...}` or `#[...]` group starting
    /// at the current token.
    pub(super) fn skip_balanced(&mut self) {
        let start = self.current_token.span;
        let mut depth = 0usize;
        loop {
            match self.current_token.kind {
                TokenKind::OpenParen
                | TokenKind::OpenBracket
                | TokenKind::OpenBrace
                | TokenKind::Attribute => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                }
                TokenKind::Eof => {
                    self.error(start, "Unclosed delimiter");
                    return;
                }
                _ => {}
            }
            if depth == 0 {
                // Not positioned on an opening delimiter.
                self.bump();
                return;
            }
            self.bump();
        }
    }

    pub(super) fn skip_attributes(&mut self) {
        while self.current_token.kind == TokenKind::Attribute {
            self.skip_balanced();
        }
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while self.current_token.kind != TokenKind::Eof {
            let before = self.current_token.span.start;
            let before_kind = self.current_token.kind;
            if let Some(stmt) = self.parse_top_stmt() {
                statements.push(stmt);
            }
            if self.current_token.span.start == before
                && self.current_token.kind == before_kind
                && self.current_token.kind != TokenKind::Eof
            {
                self.unexpected("statement");
                self.bump();
            }
        }

        let statements = self.normalize_root(statements);
        let span = if let (Some(first), Some(last)) = (statements.first(), statements.last()) {
            Span::new(first.span().start, last.span().end)
        } else {
            Span::default()
        };

        Program {
            statements,
            errors: std::mem::take(&mut self.errors),
            span,
        }
    }

    /// Parse a standalone expression fragment (no open tag).
    pub fn parse_standalone_expr(&mut self) -> ExprId {
        let expr = self.parse_expr(0);
        if self.current_token.kind == TokenKind::SemiColon {
            self.bump();
        }
        if self.current_token.kind != TokenKind::Eof {
            self.unexpected("end of expression");
        }
        expr
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn sync_to_statement_end(&mut self) {
        while !matches!(
            self.current_token.kind,
            TokenKind::SemiColon | TokenKind::CloseBrace | TokenKind::CloseTag | TokenKind::Eof
        ) {
            self.bump();
        }
        if self.current_token.kind == TokenKind::SemiColon {
            self.bump();
        }
    }
}
