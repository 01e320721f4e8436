use super::Parser;
use crate::parser::ast::{
    ConstDecl, ConstItem, DeclareDecl, DeclareItem, FunctionDecl, Name, NameKind,
    NamespaceDecl, Stmt, UseDecl, UseItem, UseKind,
};
use crate::parser::lexer::token::TokenKind;
use crate::parser::span::Span;
use std::rc::Rc;

impl<'src> Parser<'src> {
    pub(super) fn parse_top_stmt(&mut self) -> Option<Stmt> {
        if self.current_token.kind == TokenKind::Namespace
            && self.next_token.kind != TokenKind::NsSeparator
        {
            return Some(self.parse_namespace());
        }
        self.parse_stmt()
    }

    /// Parse one statement. Returns `None` for open and close tags.
    pub(super) fn parse_stmt(&mut self) -> Option<Stmt> {
        let doc_comment = self.take_doc_comment();

        let stmt = match self.current_token.kind {
            TokenKind::OpenTag | TokenKind::CloseTag => {
                self.bump();
                return None;
            }
            TokenKind::InlineHtml => {
                let span = self.current_token.span;
                self.bump();
                Stmt::InlineHtml { span }
            }
            TokenKind::Attribute => {
                self.skip_attributes();
                // A doc comment between the attributes and the declaration wins.
                let doc_comment = self.take_doc_comment().or(doc_comment);
                match self.current_token.kind {
                    TokenKind::Function => self.parse_function(doc_comment),
                    TokenKind::Abstract
                    | TokenKind::Final
                    | TokenKind::Readonly
                    | TokenKind::Class
                    | TokenKind::Interface
                    | TokenKind::Trait
                    | TokenKind::Enum => self.parse_class_like(doc_comment),
                    _ => self.parse_other(),
                }
            }
            TokenKind::Use => self.parse_use(),
            TokenKind::Const => self.parse_const_stmt(doc_comment),
            TokenKind::Declare => self.parse_declare(),
            TokenKind::Function
                if self.next_token.kind.is_identifier_like()
                    || self.next_token.kind == TokenKind::Ampersand =>
            {
                self.parse_function(doc_comment)
            }
            TokenKind::Abstract | TokenKind::Final | TokenKind::Class | TokenKind::Interface => {
                self.parse_class_like(doc_comment)
            }
            TokenKind::Readonly if self.next_token.kind != TokenKind::OpenParen => {
                self.parse_class_like(doc_comment)
            }
            TokenKind::Trait | TokenKind::Enum
                if self.next_token.kind.is_identifier_like() =>
            {
                self.parse_class_like(doc_comment)
            }
            TokenKind::Identifier
                if self.next_token.kind == TokenKind::OpenParen
                    && self.current_text().eq_ignore_ascii_case("define") =>
            {
                let start = self.current_token.span.start;
                let expr = self.parse_expr(0);
                self.expect_semicolon();
                Stmt::Expression {
                    expr,
                    span: self.span_from(start),
                }
            }
            TokenKind::CloseBrace => {
                self.unexpected("statement");
                let span = self.current_token.span;
                self.bump();
                Stmt::Other { span }
            }
            _ => self.parse_other(),
        };
        Some(stmt)
    }

    /// Skip a statement the reflection layer has no use for.
    fn parse_other(&mut self) -> Stmt {
        let start = self.current_token.span.start;
        let mut depth = 0usize;
        loop {
            match self.current_token.kind {
                TokenKind::Eof => break,
                TokenKind::CloseTag | TokenKind::SemiColon if depth == 0 => {
                    self.bump();
                    break;
                }
                TokenKind::OpenParen
                | TokenKind::OpenBracket
                | TokenKind::OpenBrace
                | TokenKind::Attribute => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket => {
                    depth = depth.saturating_sub(1);
                }
                TokenKind::CloseBrace => {
                    if depth == 0 {
                        // Belongs to the enclosing block.
                        break;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        break;
                    }
                }
                _ => {}
            }
            self.bump();
        }
        Stmt::Other {
            span: self.span_from(start),
        }
    }

    fn parse_namespace(&mut self) -> Stmt {
        let start = self.current_token.span.start;
        let doc_comment = self.take_doc_comment();
        self.bump(); // namespace

        let name = if self.current_token.kind.is_identifier_like() {
            let mut name = self.parse_name();
            name.resolved = Some(name.text.clone());
            Some(name)
        } else {
            None
        };

        let mut statements = Vec::new();
        let braced = self.current_token.kind == TokenKind::OpenBrace;
        if braced {
            self.bump();
            while !matches!(
                self.current_token.kind,
                TokenKind::CloseBrace | TokenKind::Eof
            ) {
                let before = self.current_token.span;
                if let Some(stmt) = self.parse_stmt() {
                    statements.push(stmt);
                }
                if self.current_token.span == before && self.current_token.kind != TokenKind::Eof {
                    self.bump();
                }
            }
            self.expect(TokenKind::CloseBrace, "'}'");
        } else {
            if name.is_none() {
                self.unexpected("namespace name");
            }
            self.expect_semicolon();
            while self.current_token.kind != TokenKind::Eof
                && !(self.current_token.kind == TokenKind::Namespace
                    && self.next_token.kind != TokenKind::NsSeparator)
            {
                let before = self.current_token.span;
                if let Some(stmt) = self.parse_stmt() {
                    statements.push(stmt);
                }
                if self.current_token.span == before && self.current_token.kind != TokenKind::Eof {
                    self.bump();
                }
            }
        }

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        Stmt::Namespace(Rc::new(NamespaceDecl {
            name,
            braced,
            statements,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    fn parse_use_kind(&mut self) -> Option<UseKind> {
        let kind = match self.current_token.kind {
            TokenKind::Function => UseKind::Function,
            TokenKind::Const => UseKind::Const,
            _ => return None,
        };
        self.bump();
        Some(kind)
    }

    fn parse_use(&mut self) -> Stmt {
        let start = self.current_token.span.start;
        self.bump(); // use

        let kind = self.parse_use_kind().unwrap_or(UseKind::Normal);
        let mut uses = Vec::new();

        loop {
            let item_start = self.current_token.span.start;
            let name = self.parse_name();

            if self.current_token.kind == TokenKind::OpenBrace {
                // Group use: `use A\{B, function c, D as E};`
                self.bump();
                while !matches!(
                    self.current_token.kind,
                    TokenKind::CloseBrace | TokenKind::Eof
                ) {
                    let inner_start = self.current_token.span.start;
                    let inner_kind = self.parse_use_kind().unwrap_or(kind);
                    let inner = self.parse_name();
                    let alias = self.parse_use_alias();
                    let full = format!("{}\\{}", name.text, inner.text);
                    uses.push(UseItem {
                        name: Self::use_name(full, inner.span),
                        alias,
                        kind: inner_kind,
                        span: self.span_from(inner_start),
                    });
                    if self.current_token.kind == TokenKind::Comma {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::CloseBrace, "'}'");
            } else {
                let alias = self.parse_use_alias();
                uses.push(UseItem {
                    name: Self::use_name(name.text, name.span),
                    alias,
                    kind,
                    span: self.span_from(item_start),
                });
            }

            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }

        self.expect_semicolon();
        Stmt::Use(Rc::new(UseDecl {
            uses,
            span: self.span_from(start),
        }))
    }

    fn use_name(text: String, span: Span) -> Name {
        let kind = if text.contains('\\') {
            NameKind::Qualified
        } else {
            NameKind::Unqualified
        };
        let mut name = Name::new(text, kind, span);
        name.resolved = Some(name.text.clone());
        name
    }

    fn parse_use_alias(&mut self) -> Option<String> {
        if self.current_token.kind == TokenKind::As {
            self.bump();
            Some(self.parse_identifier("alias"))
        } else {
            None
        }
    }

    fn parse_const_stmt(&mut self, doc_comment: Option<Rc<str>>) -> Stmt {
        let start = self.current_token.span.start;
        self.bump(); // const

        let mut consts = Vec::new();
        loop {
            let item_start = self.current_token.span.start;
            let name = self.parse_identifier("constant name");
            self.expect(TokenKind::Eq, "'='");
            let value = self.parse_expr(0);
            consts.push(ConstItem {
                name,
                value,
                span: self.span_from(item_start),
            });
            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect_semicolon();

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        Stmt::Const(Rc::new(ConstDecl {
            consts,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    fn parse_declare(&mut self) -> Stmt {
        let start = self.current_token.span.start;
        self.bump(); // declare
        self.expect(TokenKind::OpenParen, "'('");

        let mut declares = Vec::new();
        while self.current_token.kind.is_identifier_like() {
            let item_start = self.current_token.span.start;
            let key = self.parse_identifier("declare key");
            self.expect(TokenKind::Eq, "'='");
            let value = self.parse_expr(0);
            declares.push(DeclareItem {
                key,
                value,
                span: self.span_from(item_start),
            });
            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "')'");

        match self.current_token.kind {
            TokenKind::OpenBrace => self.skip_balanced(),
            _ => self.expect_semicolon(),
        }

        Stmt::Declare(Rc::new(DeclareDecl {
            declares,
            span: self.span_from(start),
        }))
    }

    fn parse_function(&mut self, doc_comment: Option<Rc<str>>) -> Stmt {
        let start = self.current_token.span.start;
        self.bump(); // function

        let by_ref = if self.current_token.kind == TokenKind::Ampersand {
            self.bump();
            true
        } else {
            false
        };
        let name = self.parse_identifier("function name");
        let params = self.parse_parameter_list();
        let return_type = self.parse_return_type();

        if self.current_token.kind == TokenKind::OpenBrace {
            self.skip_balanced();
        } else {
            self.unexpected("'{'");
            self.sync_to_statement_end();
        }

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        Stmt::Function(Rc::new(FunctionDecl {
            name,
            namespaced_name: None,
            by_ref,
            params,
            return_type,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    /// Files without a namespace declaration get one unnamed namespace
    /// wrapping every statement after the leading `declare`s.
    pub(super) fn normalize_root(&self, statements: Vec<Stmt>) -> Vec<Stmt> {
        if statements.iter().any(|s| matches!(s, Stmt::Namespace(_))) {
            return statements;
        }

        let mut result = Vec::new();
        let mut iter = statements.into_iter().peekable();
        while let Some(stmt) = iter.next_if(|s| matches!(s, Stmt::Declare(_))) {
            result.push(stmt);
        }

        let body: Vec<Stmt> = iter.collect();
        let span = match (body.first(), body.last()) {
            (Some(first), Some(last)) => Span::new(first.span().start, last.span().end),
            _ => Span::new(self.prev_end, self.prev_end),
        };
        let (start_line, end_line) = self.line_index.lines(span);
        result.push(Stmt::Namespace(Rc::new(NamespaceDecl {
            name: None,
            braced: false,
            statements: body,
            doc_comment: None,
            span,
            start_line,
            end_line,
        })));
        result
    }
}
