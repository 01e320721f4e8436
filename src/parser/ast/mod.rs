use crate::parser::span::{LineInfo, Span};
use serde::Serialize;
use std::rc::Rc;

pub mod names;
pub mod printer;

pub type ExprId = Rc<Expr>;

#[derive(Debug, Clone, Serialize)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl ParseError {
    pub fn to_human_readable(&self, source: &[u8]) -> String {
        self.to_human_readable_with_path(source, None)
    }

    pub fn to_human_readable_with_path(&self, source: &[u8], path: Option<&str>) -> String {
        let Some(LineInfo {
            line,
            column,
            line_text,
        }) = self.span.line_info(source)
        else {
            return format!("error: {}", self.message);
        };

        let line_str = String::from_utf8_lossy(line_text);
        let gutter_width = line.to_string().len();
        let padding = std::cmp::min(line_text.len(), column.saturating_sub(1));
        let highlight_len = std::cmp::max(
            1,
            std::cmp::min(self.span.len(), line_text.len().saturating_sub(padding)),
        );

        let mut marker = String::new();
        marker.push_str(&" ".repeat(padding));
        marker.push_str(&"^".repeat(highlight_len));

        let location = match path {
            Some(path) => format!("{path}:{line}:{column}"),
            None => format!("line {line}, column {column}"),
        };

        format!(
            "error: {}\n --> {}\n{gutter}|\n{line_no:>width$} | {line_src}\n{gutter}| {marker}",
            self.message,
            location,
            gutter = " ".repeat(gutter_width + 1),
            line_no = line,
            width = gutter_width,
            line_src = line_str,
            marker = marker,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
    pub span: Span,
}

/// Top-level statement. Only declarations carry structure; everything the
/// reflection layer never looks at is kept as `Other`.
#[derive(Debug, Clone, Serialize)]
pub enum Stmt {
    Namespace(Rc<NamespaceDecl>),
    Use(Rc<UseDecl>),
    Const(Rc<ConstDecl>),
    Function(Rc<FunctionDecl>),
    ClassLike(Rc<ClassLike>),
    Declare(Rc<DeclareDecl>),
    Expression { expr: ExprId, span: Span },
    InlineHtml { span: Span },
    Other { span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Namespace(ns) => ns.span,
            Stmt::Use(u) => u.span,
            Stmt::Const(c) => c.span,
            Stmt::Function(f) => f.span,
            Stmt::ClassLike(c) => c.span,
            Stmt::Declare(d) => d.span,
            Stmt::Expression { span, .. } | Stmt::InlineHtml { span } | Stmt::Other { span } => {
                *span
            }
        }
    }

    /// Name and value expression of a `define('NAME', value)` statement.
    pub fn as_define(&self) -> Option<(&str, &ExprId)> {
        let Stmt::Expression { expr, .. } = self else {
            return None;
        };
        let Expr::Call { name, args, .. } = expr.as_ref() else {
            return None;
        };
        if !name.last_segment().eq_ignore_ascii_case("define") || args.len() < 2 {
            return None;
        }
        match args[0].value.as_ref() {
            Expr::String { value, .. } => Some((value, &args[1].value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceDecl {
    /// `None` for the global namespace (braced `namespace { }` or a file
    /// without any namespace declaration).
    pub name: Option<Name>,
    pub braced: bool,
    pub statements: Vec<Stmt>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

impl NamespaceDecl {
    pub fn name_str(&self) -> &str {
        self.name.as_ref().map_or("", |n| n.text.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UseDecl {
    pub uses: Vec<UseItem>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct UseItem {
    /// Fully expanded imported name (group-use prefixes already joined).
    pub name: Name,
    pub alias: Option<String>,
    pub kind: UseKind,
    pub span: Span,
}

impl UseItem {
    /// The name this import is visible under.
    pub fn alias_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.name.last_segment())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UseKind {
    Normal,
    Function,
    Const,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstDecl {
    pub consts: Vec<ConstItem>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstItem {
    pub name: String,
    pub value: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclareDecl {
    pub declares: Vec<DeclareItem>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclareItem {
    pub key: String,
    pub value: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Filled by name resolution.
    pub namespaced_name: Option<String>,
    pub by_ref: bool,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Option<Type>,
    pub default: Option<ExprId>,
    pub by_ref: bool,
    pub variadic: bool,
    /// Constructor promotion modifiers, empty for ordinary parameters.
    pub modifiers: Modifiers,
    pub span: Span,
    pub start_line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl ClassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Trait => "trait",
            ClassKind::Enum => "enum",
        }
    }
}

/// Member and class modifiers. Bit values match the reflection
/// `IS_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct Modifiers(u16);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const PUBLIC: Modifiers = Modifiers(1);
    pub const PROTECTED: Modifiers = Modifiers(2);
    pub const PRIVATE: Modifiers = Modifiers(4);
    pub const STATIC: Modifiers = Modifiers(16);
    pub const FINAL: Modifiers = Modifiers(32);
    pub const ABSTRACT: Modifiers = Modifiers(64);
    pub const READONLY: Modifiers = Modifiers(128);

    const VISIBILITY: u16 = 1 | 2 | 4;

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn with(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    pub fn has_visibility(self) -> bool {
        self.0 & Self::VISIBILITY != 0
    }

    /// Replace the visibility bits, keeping everything else.
    pub fn with_visibility(self, visibility: Modifiers) -> Modifiers {
        Modifiers((self.0 & !Self::VISIBILITY) | (visibility.0 & Self::VISIBILITY))
    }

    /// Members without an explicit visibility are public.
    pub fn visibility(self) -> Modifiers {
        if self.contains(Self::PRIVATE) {
            Self::PRIVATE
        } else if self.contains(Self::PROTECTED) {
            Self::PROTECTED
        } else {
            Self::PUBLIC
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassLike {
    pub kind: ClassKind,
    pub name: String,
    /// Fully-qualified name without leading backslash. Filled by name
    /// resolution; equals `name` before that.
    pub namespaced_name: String,
    pub modifiers: Modifiers,
    pub parent: Option<Name>,
    /// `implements` for classes and enums, `extends` for interfaces.
    pub interfaces: Vec<Name>,
    pub backing_type: Option<Type>,
    pub members: Vec<ClassMember>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

impl ClassLike {
    pub fn namespace_name(&self) -> &str {
        match self.namespaced_name.rfind('\\') {
            Some(pos) => &self.namespaced_name[..pos],
            None => "",
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = &Rc<MethodDecl>> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = &Rc<PropertyDecl>> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Property(prop) => Some(prop),
            _ => None,
        })
    }

    pub fn constants(&self) -> impl Iterator<Item = &Rc<ClassConstDecl>> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Const(c) => Some(c),
            _ => None,
        })
    }

    pub fn trait_uses(&self) -> impl Iterator<Item = &Rc<TraitUseDecl>> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::TraitUse(t) => Some(t),
            _ => None,
        })
    }

    pub fn cases(&self) -> impl Iterator<Item = &Rc<EnumCaseDecl>> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Case(c) => Some(c),
            _ => None,
        })
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<MethodDecl>> {
        self.methods().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn find_property(&self, name: &str) -> Option<(&Rc<PropertyDecl>, &PropertyEntry)> {
        self.properties().find_map(|decl| {
            decl.entries
                .iter()
                .find(|entry| entry.name == name)
                .map(|entry| (decl, entry))
        })
    }

    pub fn find_constant(&self, name: &str) -> Option<(&Rc<ClassConstDecl>, &ClassConst)> {
        self.constants().find_map(|decl| {
            decl.consts
                .iter()
                .find(|c| c.name == name)
                .map(|c| (decl, c))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum ClassMember {
    Const(Rc<ClassConstDecl>),
    Property(Rc<PropertyDecl>),
    Method(Rc<MethodDecl>),
    TraitUse(Rc<TraitUseDecl>),
    Case(Rc<EnumCaseDecl>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassConstDecl {
    pub modifiers: Modifiers,
    pub ty: Option<Type>,
    pub consts: Vec<ClassConst>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassConst {
    pub name: String,
    pub value: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyDecl {
    pub modifiers: Modifiers,
    pub ty: Option<Type>,
    pub entries: Vec<PropertyEntry>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyEntry {
    pub name: String,
    pub default: Option<ExprId>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub by_ref: bool,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    /// False for abstract and interface methods (`;` instead of a body).
    pub has_body: bool,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraitUseDecl {
    pub traits: Vec<Name>,
    pub adaptations: Vec<TraitAdaptation>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum TraitAdaptation {
    /// `A::foo insteadof B, C;`
    Precedence {
        trait_name: Name,
        method: String,
        insteadof: Vec<Name>,
        span: Span,
    },
    /// `foo as protected bar;`, `A::foo as baz;`
    Alias {
        trait_name: Option<Name>,
        method: String,
        alias: Option<String>,
        visibility: Option<Modifiers>,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumCaseDecl {
    pub name: String,
    pub value: Option<ExprId>,
    pub doc_comment: Option<Rc<str>>,
    pub span: Span,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NameKind {
    /// `Foo`
    Unqualified,
    /// `Foo\Bar`
    Qualified,
    /// `\Foo\Bar`
    FullyQualified,
    /// `namespace\Foo`
    Relative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Name {
    /// The name as written, without a leading `\` or `namespace\`.
    pub text: String,
    pub kind: NameKind,
    /// Fully-qualified form without leading backslash. Filled by name
    /// resolution. Stays `None` for `self`/`parent`/`static` and for
    /// unqualified constant and function names inside a namespace, whose
    /// meaning depends on the global fallback at lookup time.
    pub resolved: Option<String>,
    pub span: Span,
}

impl Name {
    pub fn new(text: impl Into<String>, kind: NameKind, span: Span) -> Self {
        Self {
            text: text.into(),
            kind,
            resolved: None,
            span,
        }
    }

    pub fn resolved_or_text(&self) -> &str {
        self.resolved.as_deref().unwrap_or(&self.text)
    }

    pub fn last_segment(&self) -> &str {
        match self.text.rfind('\\') {
            Some(pos) => &self.text[pos + 1..],
            None => &self.text,
        }
    }

    pub fn first_segment(&self) -> &str {
        match self.text.find('\\') {
            Some(pos) => &self.text[..pos],
            None => &self.text,
        }
    }

    pub fn is_fully_qualified(&self) -> bool {
        self.kind == NameKind::FullyQualified
    }

    /// `self`, `parent` or `static`.
    pub fn is_special(&self) -> bool {
        self.kind == NameKind::Unqualified && is_special_class_name(&self.text)
    }

    /// The name as it appeared in source.
    pub fn written(&self) -> String {
        match self.kind {
            NameKind::FullyQualified => format!("\\{}", self.text),
            NameKind::Relative => format!("namespace\\{}", self.text),
            _ => self.text.clone(),
        }
    }
}

pub fn is_special_class_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("self")
        || name.eq_ignore_ascii_case("parent")
        || name.eq_ignore_ascii_case("static")
}

#[derive(Debug, Clone, Serialize)]
pub enum Type {
    /// Builtin type keyword (`int`, `?`-less `mixed`, `self`, ...).
    Simple { name: String, span: Span },
    Name(Name),
    Nullable(Box<Type>),
    Union(Vec<Type>),
    Intersection(Vec<Type>),
}

pub const BUILTIN_TYPES: &[&str] = &[
    "array", "callable", "bool", "float", "int", "string", "iterable", "object", "mixed", "void",
    "null", "never", "false", "true", "self", "parent", "static",
];

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.iter().any(|t| t.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    Integer {
        value: i64,
        span: Span,
    },
    Float {
        value: f64,
        span: Span,
    },
    String {
        value: Rc<str>,
        span: Span,
    },
    MagicConst {
        kind: MagicConstKind,
        line: usize,
        span: Span,
    },
    /// Named constant, including `true`, `false` and `null`.
    ConstFetch {
        name: Name,
        span: Span,
    },
    /// A bare class reference in operand position (`Foo` in `Foo::BAR`).
    ClassName {
        name: Name,
        span: Span,
    },
    ClassConstFetch {
        class: ExprId,
        constant: String,
        span: Span,
    },
    Array {
        items: Vec<ArrayItem>,
        short: bool,
        span: Span,
    },
    ArrayDimFetch {
        array: ExprId,
        dim: Option<ExprId>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: ExprId,
        span: Span,
    },
    Binary {
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
        span: Span,
    },
    Ternary {
        condition: ExprId,
        if_true: Option<ExprId>,
        if_false: ExprId,
        span: Span,
    },
    Cast {
        kind: CastKind,
        expr: ExprId,
        span: Span,
    },
    Variable {
        name: String,
        span: Span,
    },
    /// Call of a named function (`define('X', 1)`).
    Call {
        name: Name,
        args: Vec<Arg>,
        span: Span,
    },
    New {
        class: ExprId,
        args: Vec<Arg>,
        span: Span,
    },
    /// Anything outside the constant-foldable subset: closures, `match`,
    /// method calls, interpolated strings, assignments. Kept as source text.
    Opaque {
        text: Rc<str>,
        span: Span,
    },
    Error {
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Integer { span, .. }
            | Expr::Float { span, .. }
            | Expr::String { span, .. }
            | Expr::MagicConst { span, .. }
            | Expr::ConstFetch { span, .. }
            | Expr::ClassName { span, .. }
            | Expr::ClassConstFetch { span, .. }
            | Expr::Array { span, .. }
            | Expr::ArrayDimFetch { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::Opaque { span, .. }
            | Expr::Error { span } => *span,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Arg {
    pub name: Option<String>,
    pub value: ExprId,
    pub unpack: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrayItem {
    pub key: Option<ExprId>,
    pub value: ExprId,
    pub by_ref: bool,
    pub unpack: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CastKind {
    Int,
    Bool,
    Float,
    String,
    Array,
    Object,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    ErrorSuppress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat, // .
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Coalesce,
    Spaceship,
    Pow,
    ShiftLeft,
    ShiftRight,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Instanceof,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => ".",
            BinaryOp::EqEq => "==",
            BinaryOp::EqEqEq => "===",
            BinaryOp::NotEq => "!=",
            BinaryOp::NotEqEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Coalesce => "??",
            BinaryOp::Spaceship => "<=>",
            BinaryOp::Pow => "**",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::LogicalAnd => "and",
            BinaryOp::LogicalOr => "or",
            BinaryOp::LogicalXor => "xor",
            BinaryOp::Instanceof => "instanceof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MagicConstKind {
    Dir,
    File,
    Line,
    Function,
    Class,
    Trait,
    Method,
    Namespace,
    Property,
}

impl MagicConstKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagicConstKind::Dir => "__DIR__",
            MagicConstKind::File => "__FILE__",
            MagicConstKind::Line => "__LINE__",
            MagicConstKind::Function => "__FUNCTION__",
            MagicConstKind::Class => "__CLASS__",
            MagicConstKind::Trait => "__TRAIT__",
            MagicConstKind::Method => "__METHOD__",
            MagicConstKind::Namespace => "__NAMESPACE__",
            MagicConstKind::Property => "__PROPERTY__",
        }
    }
}
