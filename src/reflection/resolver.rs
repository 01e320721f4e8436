use crate::core::operators::{self, ArithOp, BitwiseOp, OperatorError};
use crate::core::value::{ArrayData, ArrayKey, Val};
use crate::parser::ast::printer::print_expr;
use crate::parser::ast::{ArrayItem, BinaryOp, CastKind, Expr, MagicConstKind, Name, UnaryOp};
use crate::reflection::context::{EvaluationContext, Scope};
use crate::reflection::error::{ReflectionError, Result};
use crate::reflection::namespace::ReflectionFileNamespace;
use crate::reflection::reflector::ClassRef;
use std::cmp::Ordering;
use std::path::Path;

/// Result of evaluating an initializer expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionValue {
    pub value: Val,
    /// The whole expression is a bare constant fetch.
    pub is_constant: bool,
    pub constant_name: Option<String>,
}

/// Evaluate a constant, property default or other initializer.
pub fn evaluate(expr: &Expr, context: &EvaluationContext) -> Result<ExpressionValue> {
    let mut resolver = NodeExpressionResolver::new(context, false);
    resolver.process(expr)?;
    Ok(resolver.into_value())
}

/// Evaluate a parameter default. Top-level constant references come back
/// as their names.
pub fn evaluate_parameter_default(
    expr: &Expr,
    context: &EvaluationContext,
) -> Result<ExpressionValue> {
    let mut resolver = NodeExpressionResolver::new(context, true);
    resolver.process(expr)?;
    Ok(resolver.into_value())
}

/// Folds the constant-expression subset of PHP into values.
///
/// Expression kinds outside that subset (calls, `new`, variables, closures)
/// evaluate to `null`. Unresolvable class constants are errors.
pub struct NodeExpressionResolver<'a> {
    context: &'a EvaluationContext,
    is_parameter: bool,
    value: Val,
    is_constant: bool,
    constant_name: Option<String>,
    /// Depth of the node being resolved; 1 is the outermost node.
    node_level: usize,
}

impl<'a> NodeExpressionResolver<'a> {
    pub fn new(context: &'a EvaluationContext, is_parameter: bool) -> Self {
        Self {
            context,
            is_parameter,
            value: Val::Null,
            is_constant: false,
            constant_name: None,
            node_level: 0,
        }
    }

    pub fn process(&mut self, expr: &Expr) -> Result<()> {
        self.node_level = 0;
        self.is_constant = false;
        self.constant_name = None;
        self.value = self.resolve(expr)?;
        Ok(())
    }

    pub fn value(&self) -> &Val {
        &self.value
    }

    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    pub fn constant_name(&self) -> Option<&str> {
        self.constant_name.as_deref()
    }

    pub fn into_value(self) -> ExpressionValue {
        ExpressionValue {
            value: self.value,
            is_constant: self.is_constant,
            constant_name: self.constant_name,
        }
    }

    fn resolve(&mut self, expr: &Expr) -> Result<Val> {
        self.node_level += 1;
        let result = self.dispatch(expr);
        self.node_level -= 1;
        result
    }

    fn is_top_level(&self) -> bool {
        self.node_level == 1
    }

    fn mark_constant(&mut self, name: &str) {
        if self.is_top_level() {
            self.is_constant = true;
            self.constant_name = Some(name.to_string());
        }
    }

    fn dispatch(&mut self, expr: &Expr) -> Result<Val> {
        match expr {
            Expr::Integer { value, .. } => Ok(Val::Int(*value)),
            Expr::Float { value, .. } => Ok(Val::Float(*value)),
            Expr::String { value, .. } => Ok(Val::String(value.clone())),
            Expr::MagicConst { kind, line, .. } => Ok(self.magic_constant(*kind, *line)),
            Expr::ConstFetch { name, .. } => self.resolve_const_fetch(name),
            Expr::ClassConstFetch {
                class, constant, ..
            } => self.resolve_class_const_fetch(class, constant),
            Expr::Array { items, .. } => self.resolve_array(items),
            Expr::ArrayDimFetch { array, dim, .. } => {
                let container = self.resolve(array)?;
                let Some(dim) = dim else {
                    return Ok(Val::Null);
                };
                let dim = self.resolve(dim)?;
                Ok(operators::fetch_dim(&container, &dim).unwrap_or_default())
            }
            Expr::Unary { op, expr: operand, .. } => self.resolve_unary(expr, *op, operand),
            Expr::Binary {
                left, op, right, ..
            } => self.resolve_binary(expr, left, *op, right),
            Expr::Ternary {
                condition,
                if_true,
                if_false,
                ..
            } => {
                let condition = self.resolve(condition)?;
                match if_true {
                    Some(if_true) if condition.to_bool() => self.resolve(if_true),
                    None if condition.to_bool() => Ok(condition),
                    _ => self.resolve(if_false),
                }
            }
            Expr::Cast {
                kind, expr: operand, ..
            } => {
                let value = self.resolve(operand)?;
                Ok(match kind {
                    CastKind::Int => Val::Int(value.to_int()),
                    CastKind::Bool => Val::Bool(value.to_bool()),
                    CastKind::Float => Val::Float(value.to_float()),
                    CastKind::String => Val::String(value.to_php_string()),
                    CastKind::Array => Val::Array(value.to_array()),
                    CastKind::Object | CastKind::Unset => Val::Null,
                })
            }
            Expr::ClassName { .. }
            | Expr::Variable { .. }
            | Expr::Call { .. }
            | Expr::New { .. }
            | Expr::Opaque { .. }
            | Expr::Error { .. } => {
                tracing::trace!(expr = %print_expr(expr), "not a constant expression");
                Ok(Val::Null)
            }
        }
    }

    fn magic_constant(&self, kind: MagicConstKind, line: usize) -> Val {
        let context = self.context;
        let class_name = || context.class().map(|class| class.name().to_string());
        let text = match kind {
            MagicConstKind::Class => class_name().unwrap_or_default(),
            MagicConstKind::Trait => context
                .class()
                .filter(|class| class.is_trait())
                .map(|class| class.name().to_string())
                .unwrap_or_default(),
            MagicConstKind::Method => match (context.scope(), class_name(), context.function()) {
                (Scope::Method, Some(class), Some(method)) => format!("{class}::{method}"),
                _ => String::new(),
            },
            MagicConstKind::Function => match context.scope() {
                Scope::Method | Scope::Function => context.function().unwrap_or("").to_string(),
                _ => String::new(),
            },
            MagicConstKind::Namespace => context.namespace().to_string(),
            MagicConstKind::Dir => context
                .file_name()
                .and_then(Path::parent)
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
            MagicConstKind::File => context
                .file_name()
                .map(|file| file.display().to_string())
                .unwrap_or_default(),
            MagicConstKind::Line => return Val::Int(line as i64),
            MagicConstKind::Property => String::new(),
        };
        Val::string(text)
    }

    fn resolve_const_fetch(&mut self, name: &Name) -> Result<Val> {
        let text = name.text.as_str();
        if text.eq_ignore_ascii_case("true") {
            return Ok(Val::Bool(true));
        }
        if text.eq_ignore_ascii_case("false") {
            return Ok(Val::Bool(false));
        }
        if text.eq_ignore_ascii_case("null") {
            return Ok(Val::Null);
        }

        let (value, constant_name) = match self.lookup_constant(name)? {
            Some(found) => found,
            None => (Val::Null, text.to_string()),
        };
        if self.is_top_level() {
            self.mark_constant(&constant_name);
            if self.is_parameter {
                return Ok(Val::string(constant_name));
            }
        }
        Ok(value)
    }

    /// Value and qualified name of a named constant: the current namespace
    /// section first, then other sections of the same file, then the host.
    fn lookup_constant(&self, name: &Name) -> Result<Option<(Val, String)>> {
        let text = name.text.as_str();
        if !name.is_fully_qualified()
            && let Some(namespace) = self.context.file_namespace()
            && namespace.has_constant(text)
        {
            let value = namespace.constant(text)?.unwrap_or_default();
            return Ok(Some((value, qualify(namespace.name(), text))));
        }

        let full = name.resolved.as_deref().unwrap_or(text);
        let (namespace, short) = match full.rfind('\\') {
            Some(pos) => (&full[..pos], &full[pos + 1..]),
            None => ("", full),
        };
        if let Some(value) = self.section_constant(namespace, short)? {
            return Ok(Some((value, full.to_string())));
        }
        // unqualified names fall back to the global namespace
        if name.resolved.is_none()
            && !self.context.namespace().is_empty()
            && let Some(value) = self.section_constant("", text)?
        {
            return Ok(Some((value, text.to_string())));
        }

        let host = self.context.engine().host();
        for candidate in [full, text] {
            if let Some(value) = host.constant(candidate) {
                return Ok(Some((value.clone(), candidate.to_string())));
            }
        }
        Ok(None)
    }

    fn section_constant(&self, namespace: &str, short: &str) -> Result<Option<Val>> {
        let Some(source) = self.context.source() else {
            return Ok(None);
        };
        if namespace.eq_ignore_ascii_case(self.context.namespace())
            && self.context.file_namespace().is_some()
        {
            // already searched
            return Ok(None);
        }
        let Some(decl) = source.namespace(namespace) else {
            return Ok(None);
        };
        let section =
            ReflectionFileNamespace::from_decl(self.context.engine().clone(), source.clone(), decl.clone());
        if !section.has_constant(short) {
            return Ok(None);
        }
        section.constant(short)
    }

    fn resolve_class_const_fetch(&mut self, class: &Expr, constant: &str) -> Result<Val> {
        let special = match class {
            Expr::ClassName { name, .. } if name.is_special() => Some(name.text.as_str()),
            _ => None,
        };
        let is_class_name = constant.eq_ignore_ascii_case("class");
        if self.is_parameter
            && !is_class_name
            && let Some(token) = special
        {
            // resolved where the default is used
            let name = format!("{token}::{constant}");
            self.mark_constant(&name);
            return Ok(Val::string(name));
        }

        let top_level = self.is_top_level();
        let class = self.resolve_class_operand(class)?;
        if is_class_name {
            return Ok(Val::string(class.name()));
        }

        let name = format!("{}::{}", class.name(), constant);
        if top_level {
            self.is_constant = true;
            self.constant_name = Some(name.clone());
        }
        match class.constant(constant)? {
            Some(value) => Ok(value),
            None if class.has_enum_case(constant) => Ok(Val::Null),
            None => Err(ReflectionError::resolution(
                &name,
                format!("Undefined constant {name}"),
            )),
        }
    }

    fn resolve_class_operand(&mut self, class: &Expr) -> Result<ClassRef> {
        if let Expr::ClassName { name, .. } = class {
            return self.resolve_class_name(name);
        }
        match self.resolve(class)? {
            Val::String(name) if !name.is_empty() => self.lookup_class(&name),
            _ => Err(ReflectionError::resolution(
                print_expr(class),
                "Unable to resolve class constant",
            )),
        }
    }

    fn resolve_class_name(&self, name: &Name) -> Result<ClassRef> {
        if !name.is_special() {
            return self.lookup_class(name.resolved_or_text());
        }
        let token = name.text.to_ascii_lowercase();
        let class = self.context.class().cloned().ok_or_else(|| {
            ReflectionError::resolution(
                &name.text,
                format!("Cannot use \"{token}\" when no class scope is active"),
            )
        })?;
        if token != "parent" {
            return Ok(class);
        }
        class.parent_class()?.ok_or_else(|| {
            ReflectionError::resolution(
                &name.text,
                "Cannot use \"parent\" when current class scope has no parent",
            )
        })
    }

    fn lookup_class(&self, class_name: &str) -> Result<ClassRef> {
        let class_name = class_name.trim_start_matches('\\');
        if let Some(current) = self.context.class()
            && current.name().eq_ignore_ascii_case(class_name)
        {
            return Ok(current.clone());
        }
        self.context
            .engine()
            .reflect_class_near(class_name, self.context.source())
            .map_err(|err| match err {
                ReflectionError::NotFound { .. } => {
                    ReflectionError::resolution(class_name, err.to_string())
                }
                other => other,
            })
    }

    fn resolve_array(&mut self, items: &[ArrayItem]) -> Result<Val> {
        let mut array = ArrayData::with_capacity(items.len());
        for item in items {
            if item.unpack {
                match self.resolve(&item.value)? {
                    Val::Array(inner) => {
                        for (key, value) in inner.iter() {
                            match key {
                                ArrayKey::Int(_) => array.push(value.clone()),
                                ArrayKey::Str(_) => {
                                    array.insert(key.clone(), value.clone());
                                }
                            }
                        }
                    }
                    _ => {
                        return Err(ReflectionError::resolution(
                            print_expr(&item.value),
                            "Only arrays can be unpacked",
                        ));
                    }
                }
                continue;
            }
            let key = match &item.key {
                Some(key) => {
                    let value = self.resolve(key)?;
                    Some(ArrayKey::from_val(&value).ok_or_else(|| {
                        ReflectionError::resolution(print_expr(key), "Illegal offset type")
                    })?)
                }
                None => None,
            };
            let value = self.resolve(&item.value)?;
            match key {
                Some(key) => {
                    array.insert(key, value);
                }
                None => array.push(value),
            }
        }
        Ok(Val::array(array))
    }

    fn resolve_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr) -> Result<Val> {
        let value = self.resolve(operand)?;
        let result = match op {
            UnaryOp::Plus => operators::identity(&value),
            UnaryOp::Minus => operators::negate(&value),
            UnaryOp::BitNot => operators::bit_not(&value),
            UnaryOp::Not => return Ok(Val::Bool(!value.to_bool())),
            UnaryOp::ErrorSuppress => return Ok(value),
        };
        result.map_err(|err| operator_error(expr, err))
    }

    fn resolve_binary(
        &mut self,
        expr: &Expr,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
    ) -> Result<Val> {
        let arithmetic = match op {
            BinaryOp::Plus => Some(ArithOp::Add),
            BinaryOp::Minus => Some(ArithOp::Sub),
            BinaryOp::Mul => Some(ArithOp::Mul),
            BinaryOp::Div => Some(ArithOp::Div),
            BinaryOp::Mod => Some(ArithOp::Mod),
            BinaryOp::Pow => Some(ArithOp::Pow),
            _ => None,
        };
        if let Some(arith) = arithmetic {
            let (l, r) = self.operands(left, right)?;
            return operators::arithmetic(arith, &l, &r).map_err(|err| operator_error(expr, err));
        }

        let bitwise = match op {
            BinaryOp::BitAnd => Some(BitwiseOp::And),
            BinaryOp::BitOr => Some(BitwiseOp::Or),
            BinaryOp::BitXor => Some(BitwiseOp::Xor),
            BinaryOp::ShiftLeft => Some(BitwiseOp::ShiftLeft),
            BinaryOp::ShiftRight => Some(BitwiseOp::ShiftRight),
            _ => None,
        };
        if let Some(bitwise) = bitwise {
            let (l, r) = self.operands(left, right)?;
            return operators::bitwise(bitwise, &l, &r).map_err(|err| operator_error(expr, err));
        }

        match op {
            BinaryOp::And | BinaryOp::LogicalAnd => {
                if !self.resolve(left)?.to_bool() {
                    return Ok(Val::Bool(false));
                }
                Ok(Val::Bool(self.resolve(right)?.to_bool()))
            }
            BinaryOp::Or | BinaryOp::LogicalOr => {
                if self.resolve(left)?.to_bool() {
                    return Ok(Val::Bool(true));
                }
                Ok(Val::Bool(self.resolve(right)?.to_bool()))
            }
            BinaryOp::LogicalXor => {
                let (l, r) = self.operands(left, right)?;
                Ok(Val::Bool(l.to_bool() != r.to_bool()))
            }
            BinaryOp::Coalesce => {
                let l = self.resolve(left)?;
                if !l.is_null() {
                    return Ok(l);
                }
                self.resolve(right)
            }
            BinaryOp::Concat => {
                if self.is_parameter && self.context.class().is_some() {
                    return Ok(Val::string(print_expr(expr)));
                }
                let (l, r) = self.operands(left, right)?;
                Ok(operators::concat(&l, &r))
            }
            BinaryOp::EqEq | BinaryOp::NotEq => {
                let (l, r) = self.operands(left, right)?;
                let equal = operators::loose_equals(&l, &r);
                Ok(Val::Bool(if op == BinaryOp::EqEq { equal } else { !equal }))
            }
            BinaryOp::EqEqEq | BinaryOp::NotEqEq => {
                let (l, r) = self.operands(left, right)?;
                let same = operators::identical(&l, &r);
                Ok(Val::Bool(if op == BinaryOp::EqEqEq { same } else { !same }))
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let (l, r) = self.operands(left, right)?;
                let ordering = operators::compare(&l, &r);
                Ok(Val::Bool(match op {
                    BinaryOp::Lt => ordering == Some(Ordering::Less),
                    BinaryOp::LtEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    BinaryOp::Gt => ordering == Some(Ordering::Greater),
                    _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                }))
            }
            BinaryOp::Spaceship => {
                let (l, r) = self.operands(left, right)?;
                Ok(Val::Int(operators::spaceship(&l, &r)))
            }
            _ => {
                tracing::trace!(op = op.as_str(), "operator not folded");
                Ok(Val::Null)
            }
        }
    }

    fn operands(&mut self, left: &Expr, right: &Expr) -> Result<(Val, Val)> {
        let l = self.resolve(left)?;
        let r = self.resolve(right)?;
        Ok((l, r))
    }
}

fn operator_error(expr: &Expr, err: OperatorError) -> ReflectionError {
    ReflectionError::resolution(print_expr(expr), err.to_string())
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}\\{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use crate::reflection::engine::ReflectionEngine;

    fn eval(source: &str) -> ExpressionValue {
        let engine = ReflectionEngine::builder().with_core_builtins().build();
        let context = EvaluationContext::standalone(engine);
        let expr = parse_expression(source).unwrap();
        evaluate(&expr, &context).unwrap()
    }

    fn eval_err(source: &str) -> ReflectionError {
        let engine = ReflectionEngine::builder().build();
        let context = EvaluationContext::standalone(engine);
        let expr = parse_expression(source).unwrap();
        evaluate(&expr, &context).unwrap_err()
    }

    #[test]
    fn test_precedence() {
        let result = eval("1 + 2 * 3");
        assert_eq!(result.value, Val::Int(7));
        assert!(!result.is_constant);
        assert_eq!(eval("2 ** 3 ** 2").value, Val::Int(512));
        assert_eq!(eval("(1 + 2) * 3").value, Val::Int(9));
        assert_eq!(eval("-2 ** 2").value, Val::Int(-4));
    }

    #[test]
    fn test_division() {
        assert_eq!(eval("6 / 3").value, Val::Int(2));
        assert_eq!(eval("7 / 2").value, Val::Float(3.5));
        assert_eq!(eval("-7 % 3").value, Val::Int(-1));
        assert!(matches!(
            eval_err("1 / 0"),
            ReflectionError::Resolution { .. }
        ));
    }

    #[test]
    fn test_array_keys() {
        let result = eval("['x' => 1, 2, 'x' => 3]").value;
        let Val::Array(array) = result else {
            panic!("expected array");
        };
        let entries: Vec<_> = array.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert_eq!(
            entries,
            vec![("x".to_string(), Val::Int(3)), ("0".to_string(), Val::Int(2))]
        );
    }

    #[test]
    fn test_ternaries_and_short_circuit() {
        assert_eq!(eval("0 ?: 'fallback'").value, Val::string("fallback"));
        assert_eq!(eval("1 ? 'a' : 'b'").value, Val::string("a"));
        // right side would fail to resolve
        assert_eq!(eval("false && Missing::X").value, Val::Bool(false));
        assert_eq!(eval("true || Missing::X").value, Val::Bool(true));
        assert_eq!(eval("null ?? 'd'").value, Val::string("d"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("1 == '1'").value, Val::Bool(true));
        assert_eq!(eval("1 === '1'").value, Val::Bool(false));
        assert_eq!(eval("2 <=> 1").value, Val::Int(1));
        assert_eq!(eval("'abc' < 'abd'").value, Val::Bool(true));

        let cases = [
            ("1 <= 1", Val::Bool(true)),
            ("2 <= 1", Val::Bool(false)),
            ("2 >= 3", Val::Bool(false)),
            ("3 >= 3", Val::Bool(true)),
            ("1 != 2", Val::Bool(true)),
            ("1 != '1'", Val::Bool(false)),
            ("1 !== 1", Val::Bool(false)),
            ("'1' !== 1", Val::Bool(true)),
        ];
        for (source, expected) in cases {
            assert_eq!(eval(source).value, expected, "{source}");
        }
    }

    #[test]
    fn test_logical_and_bitwise_operators() {
        let cases = [
            ("5 xor 0", Val::Bool(true)),
            ("1 xor 1", Val::Bool(false)),
            ("6 & 3", Val::Int(2)),
            ("6 ^ 3", Val::Int(5)),
            ("6 | 3", Val::Int(7)),
            ("64 >> 2", Val::Int(16)),
            ("-16 >> 2", Val::Int(-4)),
            ("~5", Val::Int(-6)),
            ("~0", Val::Int(-1)),
        ];
        for (source, expected) in cases {
            assert_eq!(eval(source).value, expected, "{source}");
        }
    }

    #[test]
    fn test_constant_marking() {
        let result = eval("PHP_INT_SIZE");
        assert_eq!(result.value, Val::Int(8));
        assert!(result.is_constant);
        assert_eq!(result.constant_name.as_deref(), Some("PHP_INT_SIZE"));

        let nested = eval("PHP_INT_SIZE * 2");
        assert_eq!(nested.value, Val::Int(16));
        assert!(!nested.is_constant);

        let literal = eval("null");
        assert!(!literal.is_constant);
        assert_eq!(literal.value, Val::Null);
    }

    #[test]
    fn test_unknown_constant_is_null_but_named() {
        let result = eval("SOME_CONST");
        assert_eq!(result.value, Val::Null);
        assert!(result.is_constant);
        assert_eq!(result.constant_name.as_deref(), Some("SOME_CONST"));
    }

    #[test]
    fn test_missing_class_is_resolution_error() {
        let err = eval_err("Missing::X");
        assert!(matches!(err, ReflectionError::Resolution { .. }));
        let err = eval_err("self::X");
        assert!(matches!(err, ReflectionError::Resolution { .. }));
    }

    #[test]
    fn test_unsupported_nodes_degrade_to_null() {
        assert_eq!(eval("strlen('abc')").value, Val::Null);
        assert_eq!(eval("new Foo()").value, Val::Null);
        assert_eq!(eval("(int) '12abc'").value, Val::Int(12));
        assert_eq!(eval("'a' . 1").value, Val::string("a1"));
        assert_eq!(eval("['a', 'b'][1]").value, Val::string("b"));
    }
}
