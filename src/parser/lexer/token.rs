use crate::parser::span::Span;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a [u8]) -> &'a [u8] {
        self.span.as_str(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy, Serialize)]
pub enum TokenKind {
    // Keywords
    Abstract,
    Array,
    As,
    Case,
    Class,
    Clone,
    Const,
    Declare,
    Enum,
    Extends,
    Final,
    Fn,
    Function,
    Implements,
    Include,
    InstanceOf,
    Insteadof,
    Interface,
    List,
    Match,
    Namespace,
    New,
    Print,
    Private,
    Protected,
    Public,
    Readonly,
    Require,
    Static,
    Throw,
    Trait,
    Use,
    Yield,
    /// Any other reserved word (`if`, `while`, `return`, ...). The
    /// reflection parser never needs to tell these apart.
    Keyword,

    // Magic constants
    Line,
    File,
    Dir,
    ClassC,
    TraitC,
    MethodC,
    FuncC,
    NsC,
    PropertyC,

    // Casts
    IntCast,
    FloatCast,
    StringCast,
    ArrayCast,
    ObjectCast,
    BoolCast,
    UnsetCast,

    // Identifiers & literals
    Identifier,
    LNumber,
    DNumber,
    /// Single-quoted, double-quoted, heredoc or nowdoc string. The parser
    /// decodes the raw text.
    StringLiteral,
    Backtick,
    Variable,
    InlineHtml,
    NsSeparator, // \

    // Comments
    Comment,
    DocComment,

    // Symbols
    Arrow,         // ->
    NullSafeArrow, // ?->
    DoubleArrow,   // =>
    DoubleColon,   // ::
    Ellipsis,      // ...

    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Dot,
    Pow, // **
    Inc,
    Dec,

    Eq,
    /// Compound assignment (`+=`, `.=`, `??=`, ...).
    AssignOp,

    EqEq,
    EqEqEq,
    Bang,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship, // <=>

    Ampersand,
    AmpersandAmpersand,
    Pipe,
    PipePipe,
    Caret,
    BitNot, // ~
    Sl,     // <<
    Sr,     // >>
    Coalesce,
    LogicalAnd,
    LogicalOr,
    LogicalXor,

    Question,
    Colon,
    SemiColon,
    Comma,
    At,
    Dollar,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Attribute, // #[

    OpenTag,
    OpenTagEcho,
    CloseTag,

    Error,
    Eof,
}

impl TokenKind {
    /// Reserved words that may still be used as member or constant names.
    pub fn is_semi_reserved(&self) -> bool {
        matches!(
            self,
            TokenKind::Abstract
                | TokenKind::Array
                | TokenKind::As
                | TokenKind::Case
                | TokenKind::Class
                | TokenKind::Clone
                | TokenKind::Const
                | TokenKind::Declare
                | TokenKind::Enum
                | TokenKind::Extends
                | TokenKind::Final
                | TokenKind::Fn
                | TokenKind::Function
                | TokenKind::Implements
                | TokenKind::Include
                | TokenKind::InstanceOf
                | TokenKind::Insteadof
                | TokenKind::Interface
                | TokenKind::List
                | TokenKind::Match
                | TokenKind::Namespace
                | TokenKind::New
                | TokenKind::Print
                | TokenKind::Private
                | TokenKind::Protected
                | TokenKind::Public
                | TokenKind::Readonly
                | TokenKind::Require
                | TokenKind::Static
                | TokenKind::Throw
                | TokenKind::Trait
                | TokenKind::Use
                | TokenKind::Yield
                | TokenKind::Keyword
                | TokenKind::LogicalAnd
                | TokenKind::LogicalOr
                | TokenKind::LogicalXor
                | TokenKind::Line
                | TokenKind::File
                | TokenKind::Dir
                | TokenKind::ClassC
                | TokenKind::TraitC
                | TokenKind::MethodC
                | TokenKind::FuncC
                | TokenKind::NsC
                | TokenKind::PropertyC
        )
    }

    pub fn is_identifier_like(&self) -> bool {
        *self == TokenKind::Identifier || self.is_semi_reserved()
    }

    pub fn is_member_modifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
        )
    }
}
