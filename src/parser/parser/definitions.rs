use super::Parser;
use crate::parser::ast::{
    ClassConst, ClassConstDecl, ClassKind, ClassLike, ClassMember, EnumCaseDecl, MethodDecl,
    Modifiers, Param, PropertyDecl, PropertyEntry, Stmt, TraitAdaptation, TraitUseDecl, Type,
};
use crate::parser::lexer::token::TokenKind;
use std::rc::Rc;

impl<'src> Parser<'src> {
    fn modifier_for(kind: TokenKind) -> Option<Modifiers> {
        match kind {
            TokenKind::Public => Some(Modifiers::PUBLIC),
            TokenKind::Protected => Some(Modifiers::PROTECTED),
            TokenKind::Private => Some(Modifiers::PRIVATE),
            TokenKind::Static => Some(Modifiers::STATIC),
            TokenKind::Abstract => Some(Modifiers::ABSTRACT),
            TokenKind::Final => Some(Modifiers::FINAL),
            TokenKind::Readonly => Some(Modifiers::READONLY),
            _ => None,
        }
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::NONE;
        while self.current_token.kind.is_member_modifier() {
            if let Some(m) = Self::modifier_for(self.current_token.kind) {
                if modifiers.contains(m) {
                    self.error(self.current_token.span, "Multiple identical modifiers");
                }
                modifiers.insert(m);
            }
            self.bump();
        }
        modifiers
    }

    pub(super) fn parse_class_like(&mut self, doc_comment: Option<Rc<str>>) -> Stmt {
        let start = self.current_token.span.start;

        let mut modifiers = Modifiers::NONE;
        while matches!(
            self.current_token.kind,
            TokenKind::Abstract | TokenKind::Final | TokenKind::Readonly
        ) {
            if let Some(m) = Self::modifier_for(self.current_token.kind) {
                modifiers.insert(m);
            }
            self.bump();
        }

        let kind = match self.current_token.kind {
            TokenKind::Class => ClassKind::Class,
            TokenKind::Interface => ClassKind::Interface,
            TokenKind::Trait => ClassKind::Trait,
            TokenKind::Enum => ClassKind::Enum,
            _ => {
                self.unexpected("'class'");
                return Stmt::Other {
                    span: self.span_from(start),
                };
            }
        };
        self.bump();

        let name = self.parse_identifier("class name");

        let backing_type = if kind == ClassKind::Enum && self.current_token.kind == TokenKind::Colon
        {
            self.bump();
            self.parse_type()
        } else {
            None
        };

        let mut parent = None;
        let mut interfaces = Vec::new();
        if self.current_token.kind == TokenKind::Extends {
            self.bump();
            if kind == ClassKind::Interface {
                interfaces = self.parse_name_list();
            } else {
                parent = Some(self.parse_name());
            }
        }
        if self.current_token.kind == TokenKind::Implements {
            self.bump();
            interfaces.extend(self.parse_name_list());
        }

        let members = self.parse_class_body(kind);

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        Stmt::ClassLike(Rc::new(ClassLike {
            kind,
            namespaced_name: name.clone(),
            name,
            modifiers,
            parent,
            interfaces,
            backing_type,
            members,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    fn parse_name_list(&mut self) -> Vec<crate::parser::ast::Name> {
        let mut names = vec![self.parse_name()];
        while self.current_token.kind == TokenKind::Comma {
            self.bump();
            names.push(self.parse_name());
        }
        names
    }

    fn parse_class_body(&mut self, kind: ClassKind) -> Vec<ClassMember> {
        let mut members = Vec::new();
        if !self.expect(TokenKind::OpenBrace, "'{'") {
            return members;
        }

        while !matches!(
            self.current_token.kind,
            TokenKind::CloseBrace | TokenKind::Eof
        ) {
            let before = self.current_token.span;
            if let Some(member) = self.parse_class_member(kind) {
                members.push(member);
            }
            if self.current_token.span == before {
                self.unexpected("class member");
                self.bump();
            }
        }
        self.expect(TokenKind::CloseBrace, "'}'");
        members
    }

    fn parse_class_member(&mut self, class_kind: ClassKind) -> Option<ClassMember> {
        let mut doc_comment = self.take_doc_comment();
        if self.current_token.kind == TokenKind::Attribute {
            self.skip_attributes();
            doc_comment = self.take_doc_comment().or(doc_comment);
        }
        let start = self.current_token.span.start;

        match self.current_token.kind {
            TokenKind::SemiColon => {
                self.bump();
                return None;
            }
            TokenKind::Use => return Some(self.parse_trait_use()),
            TokenKind::Case if class_kind == ClassKind::Enum => {
                return Some(self.parse_enum_case(doc_comment));
            }
            _ => {}
        }

        let modifiers = self.parse_modifiers();

        match self.current_token.kind {
            TokenKind::Const => Some(self.parse_class_const(start, modifiers, doc_comment)),
            TokenKind::Function => {
                Some(self.parse_method(start, modifiers, doc_comment, class_kind))
            }
            _ if modifiers != Modifiers::NONE => {
                Some(self.parse_property(start, modifiers, doc_comment))
            }
            _ => None,
        }
    }

    fn parse_class_const(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        doc_comment: Option<Rc<str>>,
    ) -> ClassMember {
        self.bump(); // const

        // Typed constant: `const int FOO = 1;`
        let ty = if (self.current_token.kind.is_identifier_like()
            && self.next_token.kind != TokenKind::Eq)
            || matches!(
                self.current_token.kind,
                TokenKind::Question | TokenKind::NsSeparator | TokenKind::OpenParen
            ) {
            self.parse_type()
        } else {
            None
        };

        let mut consts = Vec::new();
        loop {
            let item_start = self.current_token.span.start;
            let name = self.parse_identifier("constant name");
            self.expect(TokenKind::Eq, "'='");
            let value = self.parse_expr(0);
            consts.push(ClassConst {
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
        ClassMember::Const(Rc::new(ClassConstDecl {
            modifiers,
            ty,
            consts,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    fn parse_property(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        doc_comment: Option<Rc<str>>,
    ) -> ClassMember {
        let ty = if self.current_token.kind == TokenKind::Variable {
            None
        } else {
            self.parse_type()
        };

        let mut entries = Vec::new();
        loop {
            let entry_start = self.current_token.span.start;
            if self.current_token.kind != TokenKind::Variable {
                self.unexpected("property name");
                self.sync_to_statement_end();
                break;
            }
            let name = self.current_text()[1..].to_string();
            self.bump();
            let default = if self.current_token.kind == TokenKind::Eq {
                self.bump();
                Some(self.parse_expr(0))
            } else {
                None
            };
            entries.push(PropertyEntry {
                name,
                default,
                span: self.span_from(entry_start),
            });
            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }

        if self.current_token.kind == TokenKind::OpenBrace {
            // Property hooks.
            self.skip_balanced();
        } else {
            self.expect_semicolon();
        }

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        ClassMember::Property(Rc::new(PropertyDecl {
            modifiers,
            ty,
            entries,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    fn parse_method(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        doc_comment: Option<Rc<str>>,
        class_kind: ClassKind,
    ) -> ClassMember {
        self.bump(); // function

        let by_ref = if self.current_token.kind == TokenKind::Ampersand {
            self.bump();
            true
        } else {
            false
        };
        let name = self.parse_identifier("method name");
        let params = self.parse_parameter_list();
        let return_type = self.parse_return_type();

        let has_body = match self.current_token.kind {
            TokenKind::OpenBrace => {
                self.skip_balanced();
                true
            }
            _ => {
                self.expect_semicolon();
                false
            }
        };
        if has_body && class_kind == ClassKind::Interface {
            self.error(self.span_from(start), "Interface function cannot contain body");
        }

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        ClassMember::Method(Rc::new(MethodDecl {
            name,
            modifiers,
            by_ref,
            params,
            return_type,
            has_body,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    pub(super) fn parse_parameter_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if !self.expect(TokenKind::OpenParen, "'('") {
            return params;
        }

        while !matches!(
            self.current_token.kind,
            TokenKind::CloseParen | TokenKind::Eof
        ) {
            params.push(self.parse_param());
            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "')'");
        params
    }

    fn parse_param(&mut self) -> Param {
        self.skip_attributes();
        let start = self.current_token.span.start;
        let modifiers = self.parse_modifiers();

        let ty: Option<Type> = if matches!(
            self.current_token.kind,
            TokenKind::Variable | TokenKind::Ampersand | TokenKind::Ellipsis
        ) {
            None
        } else {
            self.parse_type()
        };

        let by_ref = if self.current_token.kind == TokenKind::Ampersand {
            self.bump();
            true
        } else {
            false
        };
        let variadic = if self.current_token.kind == TokenKind::Ellipsis {
            self.bump();
            true
        } else {
            false
        };

        let name = if self.current_token.kind == TokenKind::Variable {
            let name = self.current_text()[1..].to_string();
            self.bump();
            name
        } else {
            self.unexpected("parameter name");
            String::new()
        };

        let default = if self.current_token.kind == TokenKind::Eq {
            self.bump();
            Some(self.parse_expr(0))
        } else {
            None
        };

        if self.current_token.kind == TokenKind::OpenBrace {
            // Hooks on a promoted property.
            self.skip_balanced();
        }

        Param {
            name,
            ty,
            default,
            by_ref,
            variadic,
            modifiers,
            span: self.span_from(start),
            start_line: self.line(start),
        }
    }

    fn parse_enum_case(&mut self, doc_comment: Option<Rc<str>>) -> ClassMember {
        let start = self.current_token.span.start;
        self.bump(); // case
        let name = self.parse_identifier("case name");
        let value = if self.current_token.kind == TokenKind::Eq {
            self.bump();
            Some(self.parse_expr(0))
        } else {
            None
        };
        self.expect_semicolon();

        let span = self.span_from(start);
        let (start_line, end_line) = self.line_index.lines(span);
        ClassMember::Case(Rc::new(EnumCaseDecl {
            name,
            value,
            doc_comment,
            span,
            start_line,
            end_line,
        }))
    }

    fn parse_trait_use(&mut self) -> ClassMember {
        let start = self.current_token.span.start;
        self.bump(); // use
        let traits = self.parse_name_list();

        let mut adaptations = Vec::new();
        if self.current_token.kind == TokenKind::OpenBrace {
            self.bump();
            while !matches!(
                self.current_token.kind,
                TokenKind::CloseBrace | TokenKind::Eof
            ) {
                let before = self.current_token.span;
                if let Some(adaptation) = self.parse_trait_adaptation() {
                    adaptations.push(adaptation);
                }
                if self.current_token.span == before {
                    self.unexpected("trait adaptation");
                    self.bump();
                }
            }
            self.expect(TokenKind::CloseBrace, "'}'");
        } else {
            self.expect_semicolon();
        }

        ClassMember::TraitUse(Rc::new(TraitUseDecl {
            traits,
            adaptations,
            span: self.span_from(start),
        }))
    }

    fn parse_trait_adaptation(&mut self) -> Option<TraitAdaptation> {
        let start = self.current_token.span.start;
        if self.current_token.kind == TokenKind::SemiColon {
            self.bump();
            return None;
        }

        let first = self.parse_name();
        let (trait_name, method) = if self.current_token.kind == TokenKind::DoubleColon {
            self.bump();
            (Some(first), self.parse_identifier("method name"))
        } else {
            (None, first.text)
        };

        let adaptation = match self.current_token.kind {
            TokenKind::Insteadof => {
                self.bump();
                let insteadof = self.parse_name_list();
                let Some(trait_name) = trait_name else {
                    self.error(self.span_from(start), "insteadof requires a trait name");
                    self.expect_semicolon();
                    return None;
                };
                TraitAdaptation::Precedence {
                    trait_name,
                    method,
                    insteadof,
                    span: self.span_from(start),
                }
            }
            TokenKind::As => {
                self.bump();
                let visibility = match self.current_token.kind {
                    TokenKind::Public | TokenKind::Protected | TokenKind::Private => {
                        let m = Self::modifier_for(self.current_token.kind);
                        self.bump();
                        m
                    }
                    _ => None,
                };
                let alias = if self.current_token.kind.is_identifier_like() {
                    Some(self.parse_identifier("alias"))
                } else {
                    None
                };
                TraitAdaptation::Alias {
                    trait_name,
                    method,
                    alias,
                    visibility,
                    span: self.span_from(start),
                }
            }
            _ => {
                self.unexpected("'as' or 'insteadof'");
                self.sync_to_statement_end();
                return None;
            }
        };
        self.expect_semicolon();
        Some(adaptation)
    }
}
