use super::*;
use std::collections::HashMap;

/// Imports visible in one namespace section.
#[derive(Debug, Default, Clone)]
pub struct ImportTable {
    /// Lower-cased alias to fully-qualified class or namespace name.
    pub classes: HashMap<String, String>,
    /// Lower-cased alias to fully-qualified function name.
    pub functions: HashMap<String, String>,
    /// Case-sensitive alias to fully-qualified constant name.
    pub constants: HashMap<String, String>,
}

impl ImportTable {
    pub fn add(&mut self, item: &UseItem) {
        let target = item.name.resolved_or_text().to_string();
        let alias = item.alias_name().to_string();
        match item.kind {
            UseKind::Normal => self.classes.insert(alias.to_ascii_lowercase(), target),
            UseKind::Function => self.functions.insert(alias.to_ascii_lowercase(), target),
            UseKind::Const => self.constants.insert(alias, target),
        };
    }
}

/// Rewrites class, function and constant names to their fully-qualified
/// form using the enclosing namespace and its `use` imports.
#[derive(Debug, Default)]
pub struct NameResolver {
    namespace: String,
    imports: ImportTable,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn prefixed(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{}", self.namespace, name)
        }
    }

    /// Qualified names resolve their first segment through class imports.
    fn resolve_qualified(&self, name: &Name) -> String {
        let first = name.first_segment();
        match self.imports.classes.get(&first.to_ascii_lowercase()) {
            Some(target) => format!("{}{}", target, &name.text[first.len()..]),
            None => self.prefixed(&name.text),
        }
    }

    pub fn resolve_class_name(&self, name: &mut Name) {
        name.resolved = match name.kind {
            NameKind::FullyQualified => Some(name.text.clone()),
            NameKind::Relative => Some(self.prefixed(&name.text)),
            NameKind::Qualified => Some(self.resolve_qualified(name)),
            NameKind::Unqualified if is_special_class_name(&name.text) => None,
            NameKind::Unqualified => Some(
                self.imports
                    .classes
                    .get(&name.text.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_else(|| self.prefixed(&name.text)),
            ),
        };
    }

    pub fn resolve_function_name(&self, name: &mut Name) {
        name.resolved = match name.kind {
            NameKind::FullyQualified => Some(name.text.clone()),
            NameKind::Relative => Some(self.prefixed(&name.text)),
            NameKind::Qualified => Some(self.resolve_qualified(name)),
            NameKind::Unqualified => self
                .imports
                .functions
                .get(&name.text.to_ascii_lowercase())
                .cloned()
                .or_else(|| self.namespace.is_empty().then(|| name.text.clone())),
        };
    }

    pub fn resolve_constant_name(&self, name: &mut Name) {
        name.resolved = match name.kind {
            NameKind::FullyQualified => Some(name.text.clone()),
            NameKind::Relative => Some(self.prefixed(&name.text)),
            NameKind::Qualified => Some(self.resolve_qualified(name)),
            NameKind::Unqualified => self
                .imports
                .constants
                .get(&name.text)
                .cloned()
                .or_else(|| self.namespace.is_empty().then(|| name.text.clone())),
        };
    }

    pub fn resolve_statements(&mut self, statements: &mut [Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Namespace(ns) => {
                let ns = Rc::make_mut(ns);
                self.namespace = ns.name.as_ref().map(|n| n.text.clone()).unwrap_or_default();
                self.imports = ImportTable::default();
                self.resolve_statements(&mut ns.statements);
            }
            Stmt::Use(decl) => {
                for item in &decl.uses {
                    self.imports.add(item);
                }
            }
            Stmt::Const(decl) => {
                for item in &mut Rc::make_mut(decl).consts {
                    self.resolve_expr(&mut item.value);
                }
            }
            Stmt::Function(func) => {
                let func = Rc::make_mut(func);
                func.namespaced_name = Some(self.prefixed(&func.name));
                self.resolve_params(&mut func.params);
                if let Some(ty) = &mut func.return_type {
                    self.resolve_type(ty);
                }
            }
            Stmt::ClassLike(class) => self.resolve_class_like(Rc::make_mut(class)),
            Stmt::Declare(_) => {}
            Stmt::Expression { expr, .. } => self.resolve_expr(expr),
            Stmt::InlineHtml { .. } | Stmt::Other { .. } => {}
        }
    }

    fn resolve_class_like(&mut self, class: &mut ClassLike) {
        class.namespaced_name = self.prefixed(&class.name);
        if let Some(parent) = &mut class.parent {
            self.resolve_class_name(parent);
        }
        for iface in &mut class.interfaces {
            self.resolve_class_name(iface);
        }
        if let Some(ty) = &mut class.backing_type {
            self.resolve_type(ty);
        }

        for member in &mut class.members {
            match member {
                ClassMember::Const(decl) => {
                    let decl = Rc::make_mut(decl);
                    if let Some(ty) = &mut decl.ty {
                        self.resolve_type(ty);
                    }
                    for c in &mut decl.consts {
                        self.resolve_expr(&mut c.value);
                    }
                }
                ClassMember::Property(decl) => {
                    let decl = Rc::make_mut(decl);
                    if let Some(ty) = &mut decl.ty {
                        self.resolve_type(ty);
                    }
                    for entry in &mut decl.entries {
                        if let Some(default) = &mut entry.default {
                            self.resolve_expr(default);
                        }
                    }
                }
                ClassMember::Method(method) => {
                    let method = Rc::make_mut(method);
                    self.resolve_params(&mut method.params);
                    if let Some(ty) = &mut method.return_type {
                        self.resolve_type(ty);
                    }
                }
                ClassMember::TraitUse(decl) => {
                    let decl = Rc::make_mut(decl);
                    for name in &mut decl.traits {
                        self.resolve_class_name(name);
                    }
                    for adaptation in &mut decl.adaptations {
                        match adaptation {
                            TraitAdaptation::Precedence {
                                trait_name,
                                insteadof,
                                ..
                            } => {
                                self.resolve_class_name(trait_name);
                                for name in insteadof {
                                    self.resolve_class_name(name);
                                }
                            }
                            TraitAdaptation::Alias {
                                trait_name: Some(trait_name),
                                ..
                            } => self.resolve_class_name(trait_name),
                            TraitAdaptation::Alias { .. } => {}
                        }
                    }
                }
                ClassMember::Case(case) => {
                    if let Some(value) = &mut Rc::make_mut(case).value {
                        self.resolve_expr(value);
                    }
                }
            }
        }
    }

    fn resolve_params(&mut self, params: &mut [Param]) {
        for param in params {
            if let Some(ty) = &mut param.ty {
                self.resolve_type(ty);
            }
            if let Some(default) = &mut param.default {
                self.resolve_expr(default);
            }
        }
    }

    fn resolve_type(&self, ty: &mut Type) {
        match ty {
            Type::Simple { .. } => {}
            Type::Name(name) => self.resolve_class_name(name),
            Type::Nullable(inner) => self.resolve_type(inner),
            Type::Union(types) | Type::Intersection(types) => {
                for t in types {
                    self.resolve_type(t);
                }
            }
        }
    }

    pub fn resolve_expr(&self, expr: &mut ExprId) {
        match Rc::make_mut(expr) {
            Expr::ConstFetch { name, .. } => self.resolve_constant_name(name),
            Expr::ClassName { name, .. } => self.resolve_class_name(name),
            Expr::ClassConstFetch { class, .. } => self.resolve_expr(class),
            Expr::Array { items, .. } => {
                for item in items {
                    if let Some(key) = &mut item.key {
                        self.resolve_expr(key);
                    }
                    self.resolve_expr(&mut item.value);
                }
            }
            Expr::ArrayDimFetch { array, dim, .. } => {
                self.resolve_expr(array);
                if let Some(dim) = dim {
                    self.resolve_expr(dim);
                }
            }
            Expr::Unary { expr, .. } | Expr::Cast { expr, .. } => self.resolve_expr(expr),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Ternary {
                condition,
                if_true,
                if_false,
                ..
            } => {
                self.resolve_expr(condition);
                if let Some(if_true) = if_true {
                    self.resolve_expr(if_true);
                }
                self.resolve_expr(if_false);
            }
            Expr::Call { name, args, .. } => {
                self.resolve_function_name(name);
                for arg in args {
                    self.resolve_expr(&mut arg.value);
                }
            }
            Expr::New { class, args, .. } => {
                self.resolve_expr(class);
                for arg in args {
                    self.resolve_expr(&mut arg.value);
                }
            }
            Expr::Integer { .. }
            | Expr::Float { .. }
            | Expr::String { .. }
            | Expr::MagicConst { .. }
            | Expr::Variable { .. }
            | Expr::Opaque { .. }
            | Expr::Error { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn first_class(statements: &[Stmt]) -> Rc<ClassLike> {
        for stmt in statements {
            if let Stmt::Namespace(ns) = stmt {
                for inner in &ns.statements {
                    if let Stmt::ClassLike(class) = inner {
                        return class.clone();
                    }
                }
            }
        }
        panic!("no class found");
    }

    #[test]
    fn test_resolves_imports_and_namespace() {
        let source = br#"<?php
namespace App\Models;

use Vendor\Base\Model as BaseModel;
use Vendor\Contracts;

class User extends BaseModel implements Contracts\Arrayable, \JsonSerializable, Local {}
"#;
        let statements = parse_source(source).unwrap();
        let class = first_class(&statements);
        assert_eq!(class.namespaced_name, "App\\Models\\User");
        assert_eq!(
            class.parent.as_ref().unwrap().resolved.as_deref(),
            Some("Vendor\\Base\\Model")
        );
        let interfaces: Vec<_> = class
            .interfaces
            .iter()
            .map(|n| n.resolved.clone().unwrap())
            .collect();
        assert_eq!(
            interfaces,
            vec![
                "Vendor\\Contracts\\Arrayable",
                "JsonSerializable",
                "App\\Models\\Local"
            ]
        );
    }

    #[test]
    fn test_unqualified_constant_keeps_fallback() {
        let source = br#"<?php
namespace App;
use const Other\LIMIT;
class A { const X = FOO; const Y = LIMIT; const Z = self::X; }
"#;
        let statements = parse_source(source).unwrap();
        let class = first_class(&statements);
        let values: Vec<_> = class
            .constants()
            .flat_map(|d| d.consts.iter())
            .map(|c| c.value.clone())
            .collect();
        match values[0].as_ref() {
            Expr::ConstFetch { name, .. } => assert_eq!(name.resolved, None),
            other => panic!("unexpected {other:?}"),
        }
        match values[1].as_ref() {
            Expr::ConstFetch { name, .. } => {
                assert_eq!(name.resolved.as_deref(), Some("Other\\LIMIT"))
            }
            other => panic!("unexpected {other:?}"),
        }
        match values[2].as_ref() {
            Expr::ClassConstFetch { class, .. } => match class.as_ref() {
                Expr::ClassName { name, .. } => assert!(name.resolved.is_none()),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
