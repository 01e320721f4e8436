use super::Parser;
use crate::parser::ast::{
    Arg, ArrayItem, BinaryOp, CastKind, Expr, ExprId, MagicConstKind, UnaryOp,
};
use crate::parser::lexer::{is_ident_char, is_ident_start, token::TokenKind};
use crate::parser::span::Span;
use std::rc::Rc;

const TERNARY_BP: u8 = 40;
const ASSIGN_BP: u8 = 35;
const INSTANCEOF_BP: u8 = 170;
const NOT_BP: u8 = 160;
const UNARY_BP: u8 = 180;

/// (left, right) binding power of a binary operator. Right-associative
/// operators bind tighter on the left.
pub(crate) fn infix_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::LogicalOr => (10, 11),
        BinaryOp::LogicalXor => (20, 21),
        BinaryOp::LogicalAnd => (30, 31),
        BinaryOp::Coalesce => (51, 50),
        BinaryOp::Or => (60, 61),
        BinaryOp::And => (70, 71),
        BinaryOp::BitOr => (80, 81),
        BinaryOp::BitXor => (90, 91),
        BinaryOp::BitAnd => (100, 101),
        BinaryOp::EqEq
        | BinaryOp::NotEq
        | BinaryOp::EqEqEq
        | BinaryOp::NotEqEq
        | BinaryOp::Spaceship => (110, 111),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => (120, 121),
        BinaryOp::Concat => (125, 126),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => (130, 131),
        BinaryOp::Plus | BinaryOp::Minus => (140, 141),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => (150, 151),
        BinaryOp::Instanceof => (INSTANCEOF_BP, INSTANCEOF_BP + 1),
        BinaryOp::Pow => (191, 190),
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::LogicalOr => BinaryOp::LogicalOr,
        TokenKind::LogicalXor => BinaryOp::LogicalXor,
        TokenKind::LogicalAnd => BinaryOp::LogicalAnd,
        TokenKind::Coalesce => BinaryOp::Coalesce,
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::AmpersandAmpersand => BinaryOp::And,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::EqEq => BinaryOp::EqEq,
        TokenKind::BangEq => BinaryOp::NotEq,
        TokenKind::EqEqEq => BinaryOp::EqEqEq,
        TokenKind::BangEqEq => BinaryOp::NotEqEq,
        TokenKind::Spaceship => BinaryOp::Spaceship,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::Dot => BinaryOp::Concat,
        TokenKind::Sl => BinaryOp::ShiftLeft,
        TokenKind::Sr => BinaryOp::ShiftRight,
        TokenKind::Plus => BinaryOp::Plus,
        TokenKind::Minus => BinaryOp::Minus,
        TokenKind::Asterisk => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::InstanceOf => BinaryOp::Instanceof,
        TokenKind::Pow => BinaryOp::Pow,
        _ => return None,
    };
    Some(op)
}

impl<'src> Parser<'src> {
    pub(super) fn parse_expr(&mut self, min_bp: u8) -> ExprId {
        let start = self.current_token.span.start;
        let mut left = self.parse_unary();

        loop {
            let kind = self.current_token.kind;

            if kind == TokenKind::Question {
                if TERNARY_BP < min_bp {
                    break;
                }
                self.bump();
                let if_true = if self.current_token.kind == TokenKind::Colon {
                    None
                } else {
                    Some(self.parse_expr(0))
                };
                self.expect(TokenKind::Colon, "':'");
                let if_false = self.parse_expr(TERNARY_BP + 1);
                left = Rc::new(Expr::Ternary {
                    condition: left,
                    if_true,
                    if_false,
                    span: self.span_from(start),
                });
                continue;
            }

            if matches!(kind, TokenKind::Eq | TokenKind::AssignOp) {
                if ASSIGN_BP < min_bp {
                    break;
                }
                self.bump();
                if self.current_token.kind == TokenKind::Ampersand {
                    self.bump();
                }
                self.parse_expr(ASSIGN_BP);
                left = self.opaque(start);
                continue;
            }

            let Some(op) = binary_op(kind) else {
                break;
            };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.bump();

            let right = if op == BinaryOp::Instanceof {
                self.parse_class_operand()
            } else {
                self.parse_expr(r_bp)
            };
            left = Rc::new(Expr::Binary {
                left,
                op,
                right,
                span: self.span_from(start),
            });
        }

        left
    }

    /// Class reference after `new` or `instanceof`.
    fn parse_class_operand(&mut self) -> ExprId {
        let start = self.current_token.span.start;
        match self.current_token.kind {
            TokenKind::NsSeparator | TokenKind::Namespace => {
                let name = self.parse_name();
                Rc::new(Expr::ClassName {
                    span: name.span,
                    name,
                })
            }
            kind if kind.is_identifier_like() => {
                let name = self.parse_name();
                Rc::new(Expr::ClassName {
                    span: name.span,
                    name,
                })
            }
            TokenKind::Variable => {
                let name = self.current_text()[1..].to_string();
                self.bump();
                self.parse_postfix(
                    start,
                    Rc::new(Expr::Variable {
                        name,
                        span: self.span_from(start),
                    }),
                )
            }
            TokenKind::OpenParen => {
                self.bump();
                let expr = self.parse_expr(0);
                self.expect(TokenKind::CloseParen, "')'");
                expr
            }
            _ => {
                self.unexpected("class name");
                Rc::new(Expr::Error {
                    span: self.current_token.span,
                })
            }
        }
    }

    fn parse_unary(&mut self) -> ExprId {
        let start = self.current_token.span.start;
        let kind = self.current_token.kind;

        let unary = |op: UnaryOp| Some((op, UNARY_BP));
        let prefix = match kind {
            TokenKind::Bang => Some((UnaryOp::Not, NOT_BP)),
            TokenKind::Minus => unary(UnaryOp::Minus),
            TokenKind::Plus => unary(UnaryOp::Plus),
            TokenKind::BitNot => unary(UnaryOp::BitNot),
            TokenKind::At => unary(UnaryOp::ErrorSuppress),
            _ => None,
        };
        if let Some((op, bp)) = prefix {
            self.bump();
            let expr = self.parse_expr(bp);
            return Rc::new(Expr::Unary {
                op,
                expr,
                span: self.span_from(start),
            });
        }

        let cast = match kind {
            TokenKind::IntCast => Some(CastKind::Int),
            TokenKind::FloatCast => Some(CastKind::Float),
            TokenKind::StringCast => Some(CastKind::String),
            TokenKind::BoolCast => Some(CastKind::Bool),
            TokenKind::ArrayCast => Some(CastKind::Array),
            TokenKind::ObjectCast => Some(CastKind::Object),
            TokenKind::UnsetCast => Some(CastKind::Unset),
            _ => None,
        };
        if let Some(kind) = cast {
            self.bump();
            let expr = self.parse_expr(UNARY_BP);
            return Rc::new(Expr::Cast {
                kind,
                expr,
                span: self.span_from(start),
            });
        }

        match kind {
            TokenKind::Inc | TokenKind::Dec | TokenKind::Ampersand => {
                self.bump();
                self.parse_expr(UNARY_BP);
                self.opaque(start)
            }
            TokenKind::Clone
            | TokenKind::Print
            | TokenKind::Include
            | TokenKind::Require
            | TokenKind::Throw => {
                self.bump();
                self.parse_expr(ASSIGN_BP);
                self.opaque(start)
            }
            TokenKind::Yield => {
                self.bump();
                if !matches!(
                    self.current_token.kind,
                    TokenKind::SemiColon
                        | TokenKind::CloseParen
                        | TokenKind::CloseBracket
                        | TokenKind::Comma
                        | TokenKind::Eof
                ) {
                    if self.current_token.kind == TokenKind::Identifier
                        && self.current_text().eq_ignore_ascii_case("from")
                    {
                        self.bump();
                    }
                    self.parse_expr(ASSIGN_BP);
                }
                self.opaque(start)
            }
            _ => {
                let primary = self.parse_primary();
                self.parse_postfix(start, primary)
            }
        }
    }

    fn parse_postfix(&mut self, start: usize, mut expr: ExprId) -> ExprId {
        loop {
            match self.current_token.kind {
                TokenKind::DoubleColon => {
                    self.bump();
                    match self.current_token.kind {
                        TokenKind::Variable => {
                            // Static property or static call through a variable name.
                            self.bump();
                            if self.current_token.kind == TokenKind::OpenParen {
                                self.skip_balanced();
                            }
                            expr = self.opaque(start);
                        }
                        TokenKind::OpenBrace | TokenKind::Dollar => {
                            if self.current_token.kind == TokenKind::Dollar {
                                self.bump();
                            }
                            self.skip_balanced();
                            if self.current_token.kind == TokenKind::OpenParen {
                                self.skip_balanced();
                            }
                            expr = self.opaque(start);
                        }
                        kind if kind.is_identifier_like() => {
                            let constant = self.current_text();
                            self.bump();
                            if self.current_token.kind == TokenKind::OpenParen {
                                self.skip_balanced();
                                expr = self.opaque(start);
                            } else {
                                expr = Rc::new(Expr::ClassConstFetch {
                                    class: expr,
                                    constant,
                                    span: self.span_from(start),
                                });
                            }
                        }
                        _ => {
                            self.unexpected("identifier");
                            return Rc::new(Expr::Error {
                                span: self.span_from(start),
                            });
                        }
                    }
                }
                TokenKind::Arrow | TokenKind::NullSafeArrow => {
                    self.bump();
                    match self.current_token.kind {
                        TokenKind::OpenBrace => self.skip_balanced(),
                        TokenKind::Variable => self.bump(),
                        kind if kind.is_identifier_like() => self.bump(),
                        _ => self.unexpected("property name"),
                    }
                    if self.current_token.kind == TokenKind::OpenParen {
                        self.skip_balanced();
                    }
                    expr = self.opaque(start);
                }
                TokenKind::OpenBracket => {
                    self.bump();
                    let dim = if self.current_token.kind == TokenKind::CloseBracket {
                        None
                    } else {
                        Some(self.parse_expr(0))
                    };
                    self.expect(TokenKind::CloseBracket, "']'");
                    expr = Rc::new(Expr::ArrayDimFetch {
                        array: expr,
                        dim,
                        span: self.span_from(start),
                    });
                }
                TokenKind::OpenParen => {
                    self.skip_balanced();
                    expr = self.opaque(start);
                }
                TokenKind::Inc | TokenKind::Dec => {
                    self.bump();
                    expr = self.opaque(start);
                }
                _ => return expr,
            }
        }
    }

    fn parse_primary(&mut self) -> ExprId {
        let token = self.current_token;
        let start = token.span.start;

        match token.kind {
            TokenKind::LNumber => {
                self.bump();
                Rc::new(parse_integer_literal(token.span.as_str(self.source), token.span))
            }
            TokenKind::DNumber => {
                self.bump();
                let text: String = token
                    .span
                    .text(self.source)
                    .chars()
                    .filter(|c| *c != '_')
                    .collect();
                match text.parse::<f64>() {
                    Ok(value) => Rc::new(Expr::Float {
                        value,
                        span: token.span,
                    }),
                    Err(_) => {
                        self.error(token.span, "Invalid numeric literal");
                        Rc::new(Expr::Error { span: token.span })
                    }
                }
            }
            TokenKind::StringLiteral => {
                self.bump();
                let raw = token.span.as_str(self.source);
                match decode_string_literal(raw) {
                    Some(bytes) => Rc::new(Expr::String {
                        value: Rc::from(String::from_utf8_lossy(&bytes).as_ref()),
                        span: token.span,
                    }),
                    None => self.opaque(start),
                }
            }
            TokenKind::Backtick => {
                self.bump();
                self.opaque(start)
            }
            TokenKind::Variable => {
                self.bump();
                Rc::new(Expr::Variable {
                    name: token.span.text(self.source)[1..].to_string(),
                    span: token.span,
                })
            }
            TokenKind::Dollar => {
                // `$$name`, `${expr}`
                self.bump();
                match self.current_token.kind {
                    TokenKind::OpenBrace => self.skip_balanced(),
                    _ => {
                        self.parse_primary();
                    }
                }
                self.opaque(start)
            }
            TokenKind::Line
            | TokenKind::File
            | TokenKind::Dir
            | TokenKind::ClassC
            | TokenKind::TraitC
            | TokenKind::MethodC
            | TokenKind::FuncC
            | TokenKind::NsC
            | TokenKind::PropertyC => {
                self.bump();
                let kind = match token.kind {
                    TokenKind::Line => MagicConstKind::Line,
                    TokenKind::File => MagicConstKind::File,
                    TokenKind::Dir => MagicConstKind::Dir,
                    TokenKind::ClassC => MagicConstKind::Class,
                    TokenKind::TraitC => MagicConstKind::Trait,
                    TokenKind::MethodC => MagicConstKind::Method,
                    TokenKind::FuncC => MagicConstKind::Function,
                    TokenKind::NsC => MagicConstKind::Namespace,
                    _ => MagicConstKind::Property,
                };
                Rc::new(Expr::MagicConst {
                    kind,
                    line: self.line(start),
                    span: token.span,
                })
            }
            TokenKind::OpenParen => {
                self.bump();
                let expr = self.parse_expr(0);
                self.expect(TokenKind::CloseParen, "')'");
                expr
            }
            TokenKind::OpenBracket => self.parse_array(TokenKind::CloseBracket, true),
            TokenKind::Array if self.next_token.kind == TokenKind::OpenParen => {
                self.bump();
                self.parse_array(TokenKind::CloseParen, false)
            }
            TokenKind::List if self.next_token.kind == TokenKind::OpenParen => {
                self.bump();
                self.skip_balanced();
                self.opaque(start)
            }
            TokenKind::New => self.parse_new(),
            TokenKind::Match => {
                self.bump();
                self.skip_balanced(); // subject
                self.skip_balanced(); // arms
                self.opaque(start)
            }
            TokenKind::Function | TokenKind::Fn => self.parse_closure(start),
            TokenKind::Static
                if matches!(self.next_token.kind, TokenKind::Function | TokenKind::Fn) =>
            {
                self.bump();
                self.parse_closure(start)
            }
            TokenKind::NsSeparator | TokenKind::Namespace => self.parse_name_expr(),
            kind if kind.is_identifier_like() => self.parse_name_expr(),
            _ => {
                self.unexpected("expression");
                if !matches!(
                    token.kind,
                    TokenKind::SemiColon
                        | TokenKind::Comma
                        | TokenKind::CloseParen
                        | TokenKind::CloseBracket
                        | TokenKind::CloseBrace
                        | TokenKind::CloseTag
                        | TokenKind::Eof
                ) {
                    self.bump();
                }
                Rc::new(Expr::Error { span: token.span })
            }
        }
    }

    /// Name in expression position: constant fetch, function call, or the
    /// class operand of `::`.
    fn parse_name_expr(&mut self) -> ExprId {
        let name = self.parse_name();
        let span = name.span;
        match self.current_token.kind {
            TokenKind::DoubleColon => Rc::new(Expr::ClassName { name, span }),
            TokenKind::OpenParen => {
                let args = self.parse_args();
                Rc::new(Expr::Call {
                    name,
                    args,
                    span: self.span_from(span.start),
                })
            }
            _ => Rc::new(Expr::ConstFetch { name, span }),
        }
    }

    fn parse_args(&mut self) -> Vec<Arg> {
        let mut args = Vec::new();
        self.bump(); // (

        while !matches!(
            self.current_token.kind,
            TokenKind::CloseParen | TokenKind::Eof
        ) {
            let start = self.current_token.span.start;

            // First-class callable syntax: `foo(...)`
            if self.current_token.kind == TokenKind::Ellipsis
                && self.next_token.kind == TokenKind::CloseParen
            {
                self.bump();
                break;
            }

            let name = if self.current_token.kind.is_identifier_like()
                && self.next_token.kind == TokenKind::Colon
            {
                let name = self.current_text();
                self.bump();
                self.bump();
                Some(name)
            } else {
                None
            };
            let unpack = if self.current_token.kind == TokenKind::Ellipsis {
                self.bump();
                true
            } else {
                false
            };

            let value = self.parse_expr(0);
            args.push(Arg {
                name,
                value,
                unpack,
                span: self.span_from(start),
            });

            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "')'");
        args
    }

    fn parse_array(&mut self, close: TokenKind, short: bool) -> ExprId {
        let start = self.current_token.span.start;
        self.bump(); // [ or (

        let mut items = Vec::new();
        while self.current_token.kind != close && self.current_token.kind != TokenKind::Eof {
            let item_start = self.current_token.span.start;

            if self.current_token.kind == TokenKind::Comma {
                // Skipped slot in list() destructuring.
                self.bump();
                continue;
            }

            let unpack = if self.current_token.kind == TokenKind::Ellipsis {
                self.bump();
                true
            } else {
                false
            };

            let mut by_ref = false;
            if self.current_token.kind == TokenKind::Ampersand {
                self.bump();
                by_ref = true;
            }
            let mut key = None;
            let mut value = self.parse_expr(0);
            if !unpack && !by_ref && self.current_token.kind == TokenKind::DoubleArrow {
                self.bump();
                key = Some(value);
                if self.current_token.kind == TokenKind::Ampersand {
                    self.bump();
                    by_ref = true;
                }
                value = self.parse_expr(0);
            }

            items.push(ArrayItem {
                key,
                value,
                by_ref,
                unpack,
                span: self.span_from(item_start),
            });

            if self.current_token.kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }

        let closer = if close == TokenKind::CloseBracket {
            "']'"
        } else {
            "')'"
        };
        self.expect(close, closer);

        Rc::new(Expr::Array {
            items,
            short,
            span: self.span_from(start),
        })
    }

    fn parse_new(&mut self) -> ExprId {
        let start = self.current_token.span.start;
        self.bump(); // new

        if self.current_token.kind == TokenKind::Class {
            // Anonymous class.
            while !matches!(
                self.current_token.kind,
                TokenKind::OpenBrace | TokenKind::Eof
            ) {
                if self.current_token.kind == TokenKind::OpenParen {
                    self.skip_balanced();
                } else {
                    self.bump();
                }
            }
            self.skip_balanced();
            return self.opaque(start);
        }

        let class = self.parse_class_operand();
        let args = if self.current_token.kind == TokenKind::OpenParen {
            self.parse_args()
        } else {
            Vec::new()
        };
        Rc::new(Expr::New {
            class,
            args,
            span: self.span_from(start),
        })
    }

    fn parse_closure(&mut self, start: usize) -> ExprId {
        let is_arrow = self.current_token.kind == TokenKind::Fn;
        self.bump(); // function / fn
        if self.current_token.kind == TokenKind::Ampersand {
            self.bump();
        }
        self.parse_parameter_list();
        if self.current_token.kind == TokenKind::Use {
            self.bump();
            self.skip_balanced();
        }
        self.parse_return_type();

        if is_arrow {
            self.expect(TokenKind::DoubleArrow, "'=>'");
            self.parse_expr(ASSIGN_BP);
        } else if self.current_token.kind == TokenKind::OpenBrace {
            self.skip_balanced();
        } else {
            self.unexpected("'{'");
        }
        self.opaque(start)
    }
}

/// Integer literal text to an `Integer`, or a `Float` when it overflows.
pub(crate) fn parse_integer_literal(raw: &[u8], span: Span) -> Expr {
    let text: Vec<u8> = raw.iter().copied().filter(|b| *b != b'_').collect();

    let (digits, radix) = match text.as_slice() {
        [b'0', b'x' | b'X', rest @ ..] => (rest, 16),
        [b'0', b'b' | b'B', rest @ ..] => (rest, 2),
        [b'0', b'o' | b'O', rest @ ..] => (rest, 8),
        [b'0', rest @ ..] if !rest.is_empty() => (rest, 8),
        _ => (text.as_slice(), 10),
    };

    let digits = std::str::from_utf8(digits).unwrap_or_default();
    match i64::from_str_radix(digits, radix) {
        Ok(value) => Expr::Integer { value, span },
        Err(_) => {
            let value = digits.chars().fold(0f64, |acc, c| {
                acc * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64
            });
            Expr::Float { value, span }
        }
    }
}

/// Decode a string literal token. Returns `None` when the string
/// interpolates variables and therefore has no constant value.
pub(crate) fn decode_string_literal(raw: &[u8]) -> Option<Vec<u8>> {
    let raw = match raw {
        [b'b' | b'B', rest @ ..] if matches!(rest.first(), Some(b'\'' | b'"')) => rest,
        _ => raw,
    };

    match raw.first() {
        Some(b'\'') => Some(unescape_single(&raw[1..raw.len().saturating_sub(1).max(1)])),
        Some(b'"') => {
            let body = &raw[1..raw.len().saturating_sub(1).max(1)];
            if has_interpolation(body) {
                None
            } else {
                Some(unescape_double(body, Some(b'"')))
            }
        }
        Some(b'<') => decode_heredoc(raw),
        _ => Some(raw.to_vec()),
    }
}

fn unescape_single(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'\\' && matches!(body.get(i + 1), Some(b'\'' | b'\\')) {
            out.push(body[i + 1]);
            i += 2;
        } else {
            out.push(body[i]);
            i += 1;
        }
    }
    out
}

fn has_interpolation(body: &[u8]) -> bool {
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b'$' if body.get(i + 1).is_some_and(|&b| is_ident_start(b) || b == b'{') => {
                return true;
            }
            b'{' if body.get(i + 1) == Some(&b'$') => return true,
            _ => i += 1,
        }
    }
    false
}

fn unescape_double(body: &[u8], quote: Option<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b != b'\\' || i + 1 >= body.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = body[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'v' => out.push(0x0b),
            b'e' => out.push(0x1b),
            b'f' => out.push(0x0c),
            b'\\' => out.push(b'\\'),
            b'$' => out.push(b'$'),
            q if Some(q) == quote => out.push(q),
            b'x' if body.get(i).is_some_and(|b| b.is_ascii_hexdigit()) => {
                let mut value = 0u32;
                let mut len = 0;
                while len < 2 && body.get(i).is_some_and(|b| b.is_ascii_hexdigit()) {
                    value = value * 16 + (body[i] as char).to_digit(16).unwrap_or(0);
                    i += 1;
                    len += 1;
                }
                out.push(value as u8);
            }
            b'u' if body.get(i) == Some(&b'{') => {
                let close = body[i..].iter().position(|&b| b == b'}');
                let decoded = close.and_then(|pos| {
                    let hex = std::str::from_utf8(&body[i + 1..i + pos]).ok()?;
                    char::from_u32(u32::from_str_radix(hex, 16).ok()?).map(|c| (c, pos))
                });
                match decoded {
                    Some((c, pos)) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        i += pos + 1;
                    }
                    None => out.extend_from_slice(b"\\u"),
                }
            }
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                let mut len = 1;
                while len < 3 && body.get(i).is_some_and(|b| (b'0'..=b'7').contains(b)) {
                    value = value * 8 + (body[i] - b'0') as u32;
                    i += 1;
                    len += 1;
                }
                out.push((value & 0xff) as u8);
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    out
}

fn decode_heredoc(raw: &[u8]) -> Option<Vec<u8>> {
    let header_end = memchr::memchr(b'\n', raw)?;
    let header = &raw[3..header_end];
    let header: Vec<u8> = header
        .iter()
        .copied()
        .filter(|b| !matches!(b, b' ' | b'\t' | b'\r'))
        .collect();
    let nowdoc = header.first() == Some(&b'\'');
    let label: Vec<u8> = header
        .iter()
        .copied()
        .filter(|&b| is_ident_char(b))
        .collect();

    let rest = &raw[header_end + 1..];
    let closing_at = rest.len().checked_sub(label.len())?;
    let before_label = &rest[..closing_at];

    // Indentation of the closing marker is stripped from every line.
    let line_start = before_label
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    let indent = before_label.len() - line_start;
    let body = if line_start == 0 {
        &before_label[..0]
    } else {
        let mut end = line_start - 1;
        if end > 0 && before_label[end - 1] == b'\r' {
            end -= 1;
        }
        &before_label[..end]
    };

    let mut dedented = Vec::with_capacity(body.len());
    for (idx, line) in body.split(|&b| b == b'\n').enumerate() {
        if idx > 0 {
            dedented.push(b'\n');
        }
        let strip = line
            .iter()
            .take(indent)
            .take_while(|b| matches!(b, b' ' | b'\t'))
            .count();
        dedented.extend_from_slice(&line[strip..]);
    }

    if nowdoc {
        Some(dedented)
    } else if has_interpolation(&dedented) {
        None
    } else {
        Some(unescape_double(&dedented, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_literals() {
        let span = Span::default();
        assert!(matches!(parse_integer_literal(b"0x1F", span), Expr::Integer { value: 31, .. }));
        assert!(matches!(parse_integer_literal(b"0755", span), Expr::Integer { value: 493, .. }));
        assert!(matches!(parse_integer_literal(b"0b101", span), Expr::Integer { value: 5, .. }));
        assert!(matches!(
            parse_integer_literal(b"1_000_000", span),
            Expr::Integer { value: 1_000_000, .. }
        ));
        assert!(matches!(
            parse_integer_literal(b"9223372036854775808", span),
            Expr::Float { .. }
        ));
    }

    #[test]
    fn test_string_decoding() {
        assert_eq!(decode_string_literal(br"'it\'s \n'").unwrap(), b"it's \\n");
        assert_eq!(decode_string_literal(br#""a\tb\x41\101""#).unwrap(), b"a\tbAA");
        assert_eq!(decode_string_literal(br#""\u{1F600}""#).unwrap(), "\u{1F600}".as_bytes());
        assert!(decode_string_literal(br#""hello $name""#).is_none());
        assert_eq!(decode_string_literal(br#""cost: $5""#).unwrap(), b"cost: $5");
    }

    #[test]
    fn test_heredoc_decoding() {
        let heredoc = b"<<<EOT\n    first\n      second\n    EOT";
        assert_eq!(decode_string_literal(heredoc).unwrap(), b"first\n  second");
        let nowdoc = b"<<<'EOT'\nraw $value\\n\nEOT";
        assert_eq!(decode_string_literal(nowdoc).unwrap(), b"raw $value\\n");
    }
}
