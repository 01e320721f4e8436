use super::*;
use crate::parser::parser::infix_binding_power;

/// Render an expression back to PHP source.
///
/// Class names print fully qualified with a leading backslash, constant
/// names print as written, strings print single-quoted and arrays use the
/// short syntax.
pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    Printer { out: &mut out }.expr(expr);
    out
}

pub fn print_type(ty: &Type) -> String {
    match ty {
        Type::Simple { name, .. } => name.clone(),
        Type::Name(name) => match &name.resolved {
            Some(resolved) => resolved.clone(),
            None => name.text.clone(),
        },
        Type::Nullable(inner) => format!("?{}", print_type(inner)),
        Type::Union(types) => types
            .iter()
            .map(|t| match t {
                Type::Intersection(_) => format!("({})", print_type(t)),
                _ => print_type(t),
            })
            .collect::<Vec<_>>()
            .join("|"),
        Type::Intersection(types) => types.iter().map(print_type).collect::<Vec<_>>().join("&"),
    }
}

const ATOM: u8 = u8::MAX;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => infix_binding_power(*op).0,
        Expr::Ternary { .. } => 40,
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => 160,
        Expr::Unary { .. } | Expr::Cast { .. } => 180,
        _ => ATOM,
    }
}

fn is_right_assoc(op: BinaryOp) -> bool {
    matches!(op, BinaryOp::Pow | BinaryOp::Coalesce)
}

struct Printer<'a> {
    out: &'a mut String,
}

impl Printer<'_> {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn operand(&mut self, expr: &Expr, needs_parens: bool) {
        if needs_parens {
            self.push("(");
            self.expr(expr);
            self.push(")");
        } else {
            self.expr(expr);
        }
    }

    fn class_name(&mut self, name: &Name) {
        if name.is_special() {
            self.push(&name.text);
        } else if let Some(resolved) = &name.resolved {
            self.push("\\");
            self.push(resolved);
        } else {
            self.push(&name.written());
        }
    }

    fn string(&mut self, value: &str) {
        self.push("'");
        for c in value.chars() {
            match c {
                '\'' => self.push("\\'"),
                '\\' => self.push("\\\\"),
                _ => self.out.push(c),
            }
        }
        self.push("'");
    }

    fn args(&mut self, args: &[Arg]) {
        self.push("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            if let Some(name) = &arg.name {
                self.push(name);
                self.push(": ");
            }
            if arg.unpack {
                self.push("...");
            }
            self.expr(&arg.value);
        }
        self.push(")");
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Integer { value, .. } => self.push(&value.to_string()),
            Expr::Float { value, .. } => {
                if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
                    self.push(&format!("{value:.1}"));
                } else {
                    self.push(&value.to_string());
                }
            }
            Expr::String { value, .. } => self.string(value),
            Expr::MagicConst { kind, .. } => self.push(kind.as_str()),
            Expr::ConstFetch { name, .. } => self.push(&name.written()),
            Expr::ClassName { name, .. } => self.class_name(name),
            Expr::ClassConstFetch {
                class, constant, ..
            } => {
                self.expr(class);
                self.push("::");
                self.push(constant);
            }
            Expr::Array { items, .. } => {
                self.push("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if item.unpack {
                        self.push("...");
                    }
                    if let Some(key) = &item.key {
                        self.expr(key);
                        self.push(" => ");
                    }
                    if item.by_ref {
                        self.push("&");
                    }
                    self.expr(&item.value);
                }
                self.push("]");
            }
            Expr::ArrayDimFetch { array, dim, .. } => {
                self.operand(array, precedence(array) != ATOM);
                self.push("[");
                if let Some(dim) = dim {
                    self.expr(dim);
                }
                self.push("]");
            }
            Expr::Unary { op, expr: inner, .. } => {
                self.push(match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::BitNot => "~",
                    UnaryOp::ErrorSuppress => "@",
                });
                self.operand(inner, precedence(inner) < precedence(expr));
            }
            Expr::Cast { kind, expr: inner, .. } => {
                self.push(match kind {
                    CastKind::Int => "(int) ",
                    CastKind::Bool => "(bool) ",
                    CastKind::Float => "(float) ",
                    CastKind::String => "(string) ",
                    CastKind::Array => "(array) ",
                    CastKind::Object => "(object) ",
                    CastKind::Unset => "(unset) ",
                });
                self.operand(inner, precedence(inner) < precedence(expr));
            }
            Expr::Binary {
                left, op, right, ..
            } => {
                let prec = precedence(expr);
                let right_assoc = is_right_assoc(*op);
                let left_prec = precedence(left);
                let right_prec = precedence(right);
                self.operand(left, left_prec < prec || (left_prec == prec && right_assoc));
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.operand(right, right_prec < prec || (right_prec == prec && !right_assoc));
            }
            Expr::Ternary {
                condition,
                if_true,
                if_false,
                ..
            } => {
                self.operand(condition, precedence(condition) <= precedence(expr));
                match if_true {
                    Some(if_true) => {
                        self.push(" ? ");
                        self.expr(if_true);
                        self.push(" : ");
                    }
                    None => self.push(" ?: "),
                }
                self.operand(if_false, precedence(if_false) <= precedence(expr));
            }
            Expr::Variable { name, .. } => {
                self.push("$");
                self.push(name);
            }
            Expr::Call { name, args, .. } => {
                self.push(&name.written());
                self.args(args);
            }
            Expr::New { class, args, .. } => {
                self.push("new ");
                self.expr(class);
                self.args(args);
            }
            Expr::Opaque { text, .. } => self.push(text),
            Expr::Error { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn roundtrip(source: &str) -> String {
        let expr = parse_expression(source).unwrap();
        print_expr(&expr)
    }

    #[test]
    fn test_prints_operators_with_minimal_parens() {
        assert_eq!(roundtrip("1 + 2 * 3"), "1 + 2 * 3");
        assert_eq!(roundtrip("(1 + 2) * 3"), "(1 + 2) * 3");
        assert_eq!(roundtrip("1 - (2 - 3)"), "1 - (2 - 3)");
        assert_eq!(roundtrip("2 ** 3 ** 2"), "2 ** 3 ** 2");
        assert_eq!(roundtrip("-(1 + 2)"), "-(1 + 2)");
    }

    #[test]
    fn test_prints_literals() {
        assert_eq!(roundtrip("array('a' => 1.0, \"it's\")"), "['a' => 1.0, 'it\\'s']");
        assert_eq!(roundtrip("FOO . \\Bar\\BAZ"), "FOO . \\Bar\\BAZ");
        assert_eq!(roundtrip("\\Foo\\Bar::class"), "\\Foo\\Bar::class");
        assert_eq!(roundtrip("self::A ?: null"), "self::A ?: null");
    }
}
