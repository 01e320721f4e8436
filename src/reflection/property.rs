use crate::core::value::Val;
use crate::parser::ast::printer::print_expr;
use crate::parser::ast::{ExprId, Modifiers, PropertyDecl, PropertyEntry};
use crate::reflection::cache::SourceFile;
use crate::reflection::context::{EvaluationContext, Scope};
use crate::reflection::error::Result;
use crate::reflection::reflector::{ClassRef, DeclaringClass};
use crate::reflection::resolver::evaluate;
use crate::reflection::types::ReflectionType;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

pub struct ReflectionProperty {
    name: String,
    owner: DeclaringClass,
    modifiers: Modifiers,
    decl: Rc<PropertyDecl>,
    default: Option<ExprId>,
    source: Rc<SourceFile>,
    namespace: String,
}

impl fmt::Debug for ReflectionProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionProperty")
            .field("name", &self.name)
            .field("class", &self.owner.name)
            .finish()
    }
}

impl ReflectionProperty {
    pub const IS_STATIC: u32 = 16;
    pub const IS_READONLY: u32 = 128;
    pub const IS_PUBLIC: u32 = 1;
    pub const IS_PROTECTED: u32 = 2;
    pub const IS_PRIVATE: u32 = 4;

    pub(crate) fn from_decl(
        owner: DeclaringClass,
        readonly_class: bool,
        decl: Rc<PropertyDecl>,
        entry: &PropertyEntry,
        source: Rc<SourceFile>,
        namespace: &str,
    ) -> Self {
        let mut modifiers = decl.modifiers;
        if !modifiers.has_visibility() {
            modifiers.insert(Modifiers::PUBLIC);
        }
        if readonly_class {
            modifiers.insert(Modifiers::READONLY);
        }
        Self {
            name: entry.name.clone(),
            owner,
            modifiers,
            default: entry.default.clone(),
            decl,
            source,
            namespace: namespace.to_string(),
        }
    }

    /// The same declaration owned by another class (trait import).
    pub(crate) fn rebound(&self, owner: DeclaringClass) -> Self {
        Self {
            name: self.name.clone(),
            owner,
            modifiers: self.modifiers,
            decl: self.decl.clone(),
            default: self.default.clone(),
            source: self.source.clone(),
            namespace: self.namespace.clone(),
        }
    }

    /// Name without the `$`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> &str {
        &self.owner.name
    }

    pub fn declaring_class(&self) -> Result<ClassRef> {
        self.owner.get()
    }

    pub fn modifiers(&self) -> u32 {
        self.modifiers.bits() as u32
    }

    pub fn is_public(&self) -> bool {
        self.modifiers.visibility() == Modifiers::PUBLIC
    }

    pub fn is_protected(&self) -> bool {
        self.modifiers.visibility() == Modifiers::PROTECTED
    }

    pub fn is_private(&self) -> bool {
        self.modifiers.visibility() == Modifiers::PRIVATE
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(Modifiers::STATIC)
    }

    pub fn is_readonly(&self) -> bool {
        self.modifiers.contains(Modifiers::READONLY)
    }

    /// Declared in the class body rather than added at runtime.
    pub fn is_default(&self) -> bool {
        true
    }

    pub fn is_promoted(&self) -> bool {
        false
    }

    pub fn has_type(&self) -> bool {
        self.decl.ty.is_some()
    }

    pub fn type_(&self) -> Option<ReflectionType> {
        self.decl
            .ty
            .as_ref()
            .map(|ty| ReflectionType::from_ast(ty, false))
    }

    /// Untyped properties implicitly default to `null`; typed ones without
    /// an initializer have no default.
    pub fn has_default_value(&self) -> bool {
        self.default.is_some() || self.decl.ty.is_none()
    }

    pub fn default_value_text(&self) -> Option<String> {
        self.default.as_deref().map(print_expr)
    }

    pub fn default_value(&self) -> Result<Val> {
        let Some(default) = &self.default else {
            return Ok(Val::Null);
        };
        let context = EvaluationContext::new(self.owner.engine.clone(), Scope::Property)
            .with_source(self.source.clone())
            .with_namespace(&self.namespace)
            .with_class(self.declaring_class()?);
        Ok(evaluate(default, &context)?.value)
    }

    pub fn doc_comment(&self) -> Option<&str> {
        self.decl.doc_comment.as_deref()
    }

    pub fn file_name(&self) -> &Path {
        self.source.path()
    }

    pub fn start_line(&self) -> usize {
        self.decl.start_line
    }
}
