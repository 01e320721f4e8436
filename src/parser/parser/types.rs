use super::Parser;
use crate::parser::ast::{NameKind, Type, is_builtin_type};
use crate::parser::lexer::token::TokenKind;

impl<'src> Parser<'src> {
    fn parse_type_atomic(&mut self) -> Option<Type> {
        if self.current_token.kind == TokenKind::Question {
            self.bump();
            let ty = self.parse_type_atomic()?;
            Some(Type::Nullable(Box::new(ty)))
        } else if self.current_token.kind == TokenKind::OpenParen {
            // DNF group: `(A&B)|null`
            self.bump();
            let ty = self.parse_type_intersection()?;
            self.expect(TokenKind::CloseParen, "')'");
            Some(ty)
        } else if matches!(
            self.current_token.kind,
            TokenKind::Namespace | TokenKind::NsSeparator
        ) || self.current_token.kind.is_identifier_like()
        {
            let name = self.parse_name();
            if name.kind == NameKind::Unqualified && is_builtin_type(&name.text) {
                Some(Type::Simple {
                    name: name.text.to_ascii_lowercase(),
                    span: name.span,
                })
            } else {
                Some(Type::Name(name))
            }
        } else {
            None
        }
    }

    /// `&` continues an intersection only when a type follows; otherwise it
    /// marks a by-reference parameter.
    fn at_intersection_ampersand(&self) -> bool {
        self.current_token.kind == TokenKind::Ampersand
            && (self.next_token.kind.is_identifier_like()
                || matches!(
                    self.next_token.kind,
                    TokenKind::NsSeparator | TokenKind::OpenParen
                ))
    }

    fn parse_type_intersection(&mut self) -> Option<Type> {
        let left = self.parse_type_atomic()?;
        if !self.at_intersection_ampersand() {
            return Some(left);
        }

        let mut types = vec![left];
        while self.at_intersection_ampersand() {
            self.bump();
            types.push(self.parse_type_atomic()?);
        }
        Some(Type::Intersection(types))
    }

    pub(super) fn parse_type(&mut self) -> Option<Type> {
        let left = self.parse_type_intersection()?;
        if self.current_token.kind != TokenKind::Pipe {
            return Some(left);
        }

        let mut types = vec![left];
        while self.current_token.kind == TokenKind::Pipe {
            self.bump();
            types.push(self.parse_type_intersection()?);
        }
        Some(Type::Union(types))
    }

    pub(super) fn parse_return_type(&mut self) -> Option<Type> {
        if self.current_token.kind != TokenKind::Colon {
            return None;
        }
        self.bump();
        let ty = self.parse_type();
        if ty.is_none() {
            self.unexpected("type");
        }
        ty
    }
}
