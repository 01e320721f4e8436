pub mod token;

use crate::parser::span::Span;
use memchr::{memchr, memchr2, memmem};
use token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexerState {
    Initial,
    Scripting,
    Halted,
}

fn keyword_lookup(text: &[u8]) -> TokenKind {
    let lower = text.to_ascii_lowercase();
    match lower.as_slice() {
        b"abstract" => TokenKind::Abstract,
        b"array" => TokenKind::Array,
        b"as" => TokenKind::As,
        b"case" => TokenKind::Case,
        b"class" => TokenKind::Class,
        b"clone" => TokenKind::Clone,
        b"const" => TokenKind::Const,
        b"declare" => TokenKind::Declare,
        b"enum" => TokenKind::Enum,
        b"extends" => TokenKind::Extends,
        b"final" => TokenKind::Final,
        b"fn" => TokenKind::Fn,
        b"function" => TokenKind::Function,
        b"implements" => TokenKind::Implements,
        b"include" | b"include_once" => TokenKind::Include,
        b"require" | b"require_once" => TokenKind::Require,
        b"instanceof" => TokenKind::InstanceOf,
        b"insteadof" => TokenKind::Insteadof,
        b"interface" => TokenKind::Interface,
        b"list" => TokenKind::List,
        b"match" => TokenKind::Match,
        b"namespace" => TokenKind::Namespace,
        b"new" => TokenKind::New,
        b"print" => TokenKind::Print,
        b"var" | b"public" => TokenKind::Public,
        b"protected" => TokenKind::Protected,
        b"private" => TokenKind::Private,
        b"readonly" => TokenKind::Readonly,
        b"static" => TokenKind::Static,
        b"throw" => TokenKind::Throw,
        b"trait" => TokenKind::Trait,
        b"use" => TokenKind::Use,
        b"yield" => TokenKind::Yield,
        b"and" => TokenKind::LogicalAnd,
        b"or" => TokenKind::LogicalOr,
        b"xor" => TokenKind::LogicalXor,
        b"__line__" => TokenKind::Line,
        b"__file__" => TokenKind::File,
        b"__dir__" => TokenKind::Dir,
        b"__class__" => TokenKind::ClassC,
        b"__trait__" => TokenKind::TraitC,
        b"__method__" => TokenKind::MethodC,
        b"__function__" => TokenKind::FuncC,
        b"__namespace__" => TokenKind::NsC,
        b"__property__" => TokenKind::PropertyC,
        b"if" | b"elseif" | b"else" | b"endif" | b"while" | b"endwhile" | b"do" | b"for"
        | b"endfor" | b"foreach" | b"endforeach" | b"switch" | b"endswitch" | b"default"
        | b"break" | b"continue" | b"goto" | b"return" | b"echo" | b"try" | b"catch"
        | b"finally" | b"global" | b"isset" | b"empty" | b"unset" | b"eval" | b"exit"
        | b"die" | b"enddeclare" | b"__halt_compiler" => TokenKind::Keyword,
        _ => TokenKind::Identifier,
    }
}

fn cast_lookup(text: &[u8]) -> Option<TokenKind> {
    let lower = text.to_ascii_lowercase();
    match lower.as_slice() {
        b"int" | b"integer" => Some(TokenKind::IntCast),
        b"bool" | b"boolean" => Some(TokenKind::BoolCast),
        b"float" | b"double" | b"real" => Some(TokenKind::FloatCast),
        b"string" | b"binary" => Some(TokenKind::StringCast),
        b"array" => Some(TokenKind::ArrayCast),
        b"object" => Some(TokenKind::ObjectCast),
        b"unset" => Some(TokenKind::UnsetCast),
        _ => None,
    }
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

pub(crate) fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Tokenizer for PHP source.
///
/// Produces the token stream the declaration parser consumes. String
/// literals are emitted whole (including heredocs); interpolation is not
/// tokenized because interpolated strings are never constant-foldable.
#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    input: &'src [u8],
    cursor: usize,
    state: LexerState,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src [u8]) -> Self {
        let mut cursor = 0;
        if input.starts_with(b"#!") {
            cursor = memchr(b'\n', input).map_or(input.len(), |pos| pos + 1);
        }

        Self {
            input,
            cursor,
            state: LexerState::Initial,
        }
    }

    /// Lexer positioned inside PHP code, for fragments without an open tag.
    pub fn new_scripting(input: &'src [u8]) -> Self {
        Self {
            input,
            cursor: 0,
            state: LexerState::Scripting,
        }
    }

    pub fn input(&self) -> &'src [u8] {
        self.input
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.input.get(self.cursor + offset).copied()
    }

    fn starts_with(&self, pat: &[u8]) -> bool {
        self.input[self.cursor..].starts_with(pat)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(start, self.cursor),
        }
    }

    fn lex_initial(&mut self) -> Option<Token> {
        if self.cursor >= self.input.len() {
            return None;
        }
        let start = self.cursor;
        let rest = &self.input[start..];

        let mut search = 0;
        let tag_at = loop {
            match memmem::find(&rest[search..], b"<?") {
                Some(pos) => {
                    let at = search + pos;
                    let after = &rest[at + 2..];
                    if after.starts_with(b"=") {
                        break Some(at);
                    }
                    if after.len() >= 3
                        && after[..3].eq_ignore_ascii_case(b"php")
                        && after.get(3).is_none_or(|b| b.is_ascii_whitespace())
                    {
                        break Some(at);
                    }
                    search = at + 2;
                }
                None => break None,
            }
        };

        match tag_at {
            Some(0) => {
                if rest[2..].starts_with(b"=") {
                    self.cursor += 3;
                    self.state = LexerState::Scripting;
                    return Some(self.token(TokenKind::OpenTagEcho, start));
                }
                self.cursor += 5;
                match self.peek(0) {
                    Some(b'\r') if self.peek(1) == Some(b'\n') => self.cursor += 2,
                    Some(b) if b.is_ascii_whitespace() => self.cursor += 1,
                    _ => {}
                }
                self.state = LexerState::Scripting;
                Some(self.token(TokenKind::OpenTag, start))
            }
            Some(at) => {
                self.cursor += at;
                Some(self.token(TokenKind::InlineHtml, start))
            }
            None => {
                self.cursor = self.input.len();
                Some(self.token(TokenKind::InlineHtml, start))
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek(0) {
            if b.is_ascii_whitespace() {
                self.cursor += 1;
            } else {
                break;
            }
        }
    }

    fn lex_line_comment(&mut self, start: usize) -> Token {
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            if b == b'?' && self.peek(1) == Some(b'>') {
                break;
            }
            self.cursor += 1;
        }
        self.token(TokenKind::Comment, start)
    }

    fn lex_block_comment(&mut self, start: usize) -> Token {
        let is_doc = self.starts_with(b"/**") && self.peek(3).is_some_and(|b| b.is_ascii_whitespace());
        self.cursor += 2;
        match memmem::find(&self.input[self.cursor..], b"*/") {
            Some(pos) => self.cursor += pos + 2,
            None => self.cursor = self.input.len(),
        }
        let kind = if is_doc {
            TokenKind::DocComment
        } else {
            TokenKind::Comment
        };
        self.token(kind, start)
    }

    fn lex_quoted(&mut self, start: usize, quote: u8) -> Token {
        self.cursor += 1;
        loop {
            match memchr2(quote, b'\\', &self.input[self.cursor..]) {
                Some(pos) => {
                    let at = self.cursor + pos;
                    if self.input[at] == b'\\' {
                        self.cursor = (at + 2).min(self.input.len());
                    } else {
                        self.cursor = at + 1;
                        break;
                    }
                }
                None => {
                    self.cursor = self.input.len();
                    return self.token(TokenKind::Error, start);
                }
            }
        }
        let kind = if quote == b'`' {
            TokenKind::Backtick
        } else {
            TokenKind::StringLiteral
        };
        self.token(kind, start)
    }

    /// Lex `<<<LABEL ... LABEL` (or the nowdoc `<<<'LABEL'` form) as a single token.
    fn lex_heredoc(&mut self, start: usize) -> Token {
        self.cursor += 3;
        while matches!(self.peek(0), Some(b' ') | Some(b'\t')) {
            self.cursor += 1;
        }
        let quote = match self.peek(0) {
            Some(q @ (b'\'' | b'"')) => {
                self.cursor += 1;
                Some(q)
            }
            _ => None,
        };
        let label_start = self.cursor;
        while self.peek(0).is_some_and(is_ident_char) {
            self.cursor += 1;
        }
        let label = &self.input[label_start..self.cursor];
        if label.is_empty() {
            return self.token(TokenKind::Error, start);
        }
        if let Some(q) = quote {
            if self.peek(0) != Some(q) {
                return self.token(TokenKind::Error, start);
            }
            self.cursor += 1;
        }
        match memchr(b'\n', &self.input[self.cursor..]) {
            Some(pos) => self.cursor += pos + 1,
            None => {
                self.cursor = self.input.len();
                return self.token(TokenKind::Error, start);
            }
        }

        loop {
            let line_start = self.cursor;
            let mut i = line_start;
            while matches!(self.input.get(i), Some(b' ') | Some(b'\t')) {
                i += 1;
            }
            if self.input[i..].starts_with(label)
                && !self.input.get(i + label.len()).is_some_and(|&b| is_ident_char(b))
            {
                self.cursor = i + label.len();
                return self.token(TokenKind::StringLiteral, start);
            }
            match memchr(b'\n', &self.input[line_start..]) {
                Some(pos) => self.cursor = line_start + pos + 1,
                None => {
                    self.cursor = self.input.len();
                    return self.token(TokenKind::Error, start);
                }
            }
        }
    }

    fn lex_number(&mut self, start: usize) -> Token {
        if self.peek(0) == Some(b'0') {
            let radix_digits: Option<fn(u8) -> bool> = match self.peek(1) {
                Some(b'x' | b'X') => Some(|b: u8| b.is_ascii_hexdigit()),
                Some(b'b' | b'B') => Some(|b: u8| b == b'0' || b == b'1'),
                Some(b'o' | b'O') => Some(|b: u8| (b'0'..=b'7').contains(&b)),
                _ => None,
            };
            if let Some(is_digit) = radix_digits
                && self.peek(2).is_some_and(is_digit)
            {
                self.cursor += 2;
                while self.peek(0).is_some_and(|b| is_digit(b) || b == b'_') {
                    self.cursor += 1;
                }
                return self.token(TokenKind::LNumber, start);
            }
        }

        let mut is_float = false;
        while self.peek(0).is_some_and(|b| b.is_ascii_digit() || b == b'_') {
            self.cursor += 1;
        }
        if self.peek(0) == Some(b'.') && self.peek(1) != Some(b'.') {
            // "1." is a float, but "1..." is "1" followed by an ellipsis.
            is_float = true;
            self.cursor += 1;
            while self.peek(0).is_some_and(|b| b.is_ascii_digit() || b == b'_') {
                self.cursor += 1;
            }
        }
        if matches!(self.peek(0), Some(b'e' | b'E')) {
            let digits_at = if matches!(self.peek(1), Some(b'+' | b'-')) {
                2
            } else {
                1
            };
            if self.peek(digits_at).is_some_and(|b| b.is_ascii_digit()) {
                is_float = true;
                self.cursor += digits_at;
                while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
                    self.cursor += 1;
                }
            }
        }
        let kind = if is_float {
            TokenKind::DNumber
        } else {
            TokenKind::LNumber
        };
        self.token(kind, start)
    }

    fn try_lex_cast(&mut self, start: usize) -> Option<Token> {
        let mut i = self.cursor + 1;
        while matches!(self.input.get(i), Some(b' ') | Some(b'\t')) {
            i += 1;
        }
        let word_start = i;
        while self.input.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
            i += 1;
        }
        let kind = cast_lookup(&self.input[word_start..i])?;
        while matches!(self.input.get(i), Some(b' ') | Some(b'\t')) {
            i += 1;
        }
        if self.input.get(i) != Some(&b')') {
            return None;
        }
        self.cursor = i + 1;
        Some(self.token(kind, start))
    }

    fn lex_operator(&mut self, start: usize) -> Token {
        const THREE: &[(&[u8], TokenKind)] = &[
            (b"===", TokenKind::EqEqEq),
            (b"!==", TokenKind::BangEqEq),
            (b"<=>", TokenKind::Spaceship),
            (b"**=", TokenKind::AssignOp),
            (b"...", TokenKind::Ellipsis),
            (b"<<=", TokenKind::AssignOp),
            (b">>=", TokenKind::AssignOp),
            (b"??=", TokenKind::AssignOp),
            (b"?->", TokenKind::NullSafeArrow),
        ];
        const TWO: &[(&[u8], TokenKind)] = &[
            (b"==", TokenKind::EqEq),
            (b"!=", TokenKind::BangEq),
            (b"<>", TokenKind::BangEq),
            (b"<=", TokenKind::LtEq),
            (b">=", TokenKind::GtEq),
            (b"&&", TokenKind::AmpersandAmpersand),
            (b"||", TokenKind::PipePipe),
            (b"++", TokenKind::Inc),
            (b"--", TokenKind::Dec),
            (b"+=", TokenKind::AssignOp),
            (b"-=", TokenKind::AssignOp),
            (b"*=", TokenKind::AssignOp),
            (b"/=", TokenKind::AssignOp),
            (b".=", TokenKind::AssignOp),
            (b"%=", TokenKind::AssignOp),
            (b"&=", TokenKind::AssignOp),
            (b"|=", TokenKind::AssignOp),
            (b"^=", TokenKind::AssignOp),
            (b"->", TokenKind::Arrow),
            (b"=>", TokenKind::DoubleArrow),
            (b"::", TokenKind::DoubleColon),
            (b"<<", TokenKind::Sl),
            (b">>", TokenKind::Sr),
            (b"??", TokenKind::Coalesce),
            (b"**", TokenKind::Pow),
            (b"#[", TokenKind::Attribute),
        ];

        for (pat, kind) in THREE.iter().chain(TWO.iter()) {
            if self.starts_with(pat) {
                self.cursor += pat.len();
                return self.token(*kind, start);
            }
        }

        let kind = match self.input[self.cursor] {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Asterisk,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'.' => TokenKind::Dot,
            b'=' => TokenKind::Eq,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'!' => TokenKind::Bang,
            b'&' => TokenKind::Ampersand,
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::BitNot,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b';' => TokenKind::SemiColon,
            b',' => TokenKind::Comma,
            b'@' => TokenKind::At,
            b'$' => TokenKind::Dollar,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            b'{' => TokenKind::OpenBrace,
            b'}' => TokenKind::CloseBrace,
            b'\\' => TokenKind::NsSeparator,
            _ => TokenKind::Error,
        };
        self.cursor += 1;
        self.token(kind, start)
    }

    fn lex_scripting(&mut self) -> Option<Token> {
        self.skip_whitespace();
        let start = self.cursor;
        let b = self.peek(0)?;

        let token = match b {
            b'?' if self.peek(1) == Some(b'>') => {
                self.cursor += 2;
                if self.peek(0) == Some(b'\n') {
                    self.cursor += 1;
                } else if self.starts_with(b"\r\n") {
                    self.cursor += 2;
                }
                self.state = LexerState::Initial;
                self.token(TokenKind::CloseTag, start)
            }
            b'#' if self.peek(1) != Some(b'[') => self.lex_line_comment(start),
            b'/' if self.peek(1) == Some(b'/') => self.lex_line_comment(start),
            b'/' if self.peek(1) == Some(b'*') => self.lex_block_comment(start),
            b'\'' | b'"' | b'`' => self.lex_quoted(start, b),
            b'b' | b'B' if matches!(self.peek(1), Some(b'\'' | b'"')) => {
                self.cursor += 1;
                let quote = self.input[self.cursor];
                let mut token = self.lex_quoted(self.cursor, quote);
                token.span.start = start;
                token
            }
            b'<' if self.starts_with(b"<<<") => self.lex_heredoc(start),
            b'$' if self.peek(1).is_some_and(is_ident_start) => {
                self.cursor += 1;
                while self.peek(0).is_some_and(is_ident_char) {
                    self.cursor += 1;
                }
                self.token(TokenKind::Variable, start)
            }
            b'0'..=b'9' => self.lex_number(start),
            b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => self.lex_number(start),
            b'(' => match self.try_lex_cast(start) {
                Some(token) => token,
                None => self.lex_operator(start),
            },
            b if is_ident_start(b) => {
                while self.peek(0).is_some_and(is_ident_char) {
                    self.cursor += 1;
                }
                let text = &self.input[start..self.cursor];
                let kind = keyword_lookup(text);
                if kind == TokenKind::Keyword && text.eq_ignore_ascii_case(b"__halt_compiler") {
                    self.state = LexerState::Halted;
                }
                self.token(kind, start)
            }
            _ => self.lex_operator(start),
        };
        Some(token)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.state {
            LexerState::Initial => self.lex_initial(),
            LexerState::Scripting => self.lex_scripting(),
            LexerState::Halted => None,
        }
    }
}
