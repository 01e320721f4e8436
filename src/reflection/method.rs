use crate::parser::ast::{MethodDecl, Modifiers};
use crate::reflection::cache::SourceFile;
use crate::reflection::context::{EvaluationContext, Scope};
use crate::reflection::error::Result;
use crate::reflection::host::NativeMethod;
use crate::reflection::parameter::ReflectionParameter;
use crate::reflection::reflector::{ClassRef, DeclaringClass};
use crate::reflection::types::ReflectionType;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

#[derive(Clone)]
enum MethodOrigin {
    Source {
        decl: Rc<MethodDecl>,
        source: Rc<SourceFile>,
        /// Namespace of the declaration, which differs from the class's
        /// for methods imported from a trait.
        namespace: String,
    },
    Native,
}

/// A method as seen from its declaring class.
pub struct ReflectionMethod {
    name: String,
    owner: DeclaringClass,
    modifiers: Modifiers,
    origin: MethodOrigin,
}

impl fmt::Debug for ReflectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionMethod")
            .field("name", &self.name)
            .field("class", &self.owner.name)
            .finish()
    }
}

impl ReflectionMethod {
    pub const IS_STATIC: u32 = 16;
    pub const IS_PUBLIC: u32 = 1;
    pub const IS_PROTECTED: u32 = 2;
    pub const IS_PRIVATE: u32 = 4;
    pub const IS_ABSTRACT: u32 = 64;
    pub const IS_FINAL: u32 = 32;

    pub(crate) fn from_decl(
        owner: DeclaringClass,
        in_interface: bool,
        decl: Rc<MethodDecl>,
        source: Rc<SourceFile>,
        namespace: &str,
    ) -> Self {
        let mut modifiers = decl.modifiers;
        if !modifiers.has_visibility() {
            modifiers.insert(Modifiers::PUBLIC);
        }
        if in_interface {
            modifiers.insert(Modifiers::ABSTRACT);
        }
        Self {
            name: decl.name.clone(),
            owner,
            modifiers,
            origin: MethodOrigin::Source {
                decl,
                source,
                namespace: namespace.to_string(),
            },
        }
    }

    pub(crate) fn native(owner: DeclaringClass, method: &NativeMethod) -> Self {
        let mut modifiers = method.modifiers;
        if !modifiers.has_visibility() {
            modifiers.insert(Modifiers::PUBLIC);
        }
        Self {
            name: method.name.clone(),
            owner,
            modifiers,
            origin: MethodOrigin::Native,
        }
    }

    /// The same declaration owned by another class (trait import).
    pub(crate) fn rebound(&self, owner: DeclaringClass) -> Self {
        Self {
            name: self.name.clone(),
            owner,
            modifiers: self.modifiers,
            origin: self.origin.clone(),
        }
    }

    /// Apply a trait `as` adaptation.
    pub(crate) fn adapted(mut self, alias: Option<&str>, visibility: Option<Modifiers>) -> Self {
        if let Some(alias) = alias {
            self.name = alias.to_string();
        }
        if let Some(visibility) = visibility {
            self.modifiers = self.modifiers.with_visibility(visibility);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// Name of the declaring class.
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

    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(Modifiers::ABSTRACT)
    }

    pub fn is_final(&self) -> bool {
        self.modifiers.contains(Modifiers::FINAL)
    }

    pub fn is_constructor(&self) -> bool {
        self.name.eq_ignore_ascii_case("__construct")
    }

    pub fn is_destructor(&self) -> bool {
        self.name.eq_ignore_ascii_case("__destruct")
    }

    pub fn is_user_defined(&self) -> bool {
        matches!(self.origin, MethodOrigin::Source { .. })
    }

    pub fn is_internal(&self) -> bool {
        !self.is_user_defined()
    }

    fn decl(&self) -> Option<&Rc<MethodDecl>> {
        match &self.origin {
            MethodOrigin::Source { decl, .. } => Some(decl),
            MethodOrigin::Native => None,
        }
    }

    /// Name as written in the declaration, before any trait alias.
    pub fn declared_name(&self) -> &str {
        self.decl().map_or(&self.name, |decl| &decl.name)
    }

    pub fn returns_reference(&self) -> bool {
        self.decl().is_some_and(|decl| decl.by_ref)
    }

    pub fn doc_comment(&self) -> Option<&str> {
        self.decl().and_then(|decl| decl.doc_comment.as_deref())
    }

    pub fn start_line(&self) -> Option<usize> {
        self.decl().map(|decl| decl.start_line)
    }

    pub fn end_line(&self) -> Option<usize> {
        self.decl().map(|decl| decl.end_line)
    }

    pub fn file_name(&self) -> Option<&Path> {
        match &self.origin {
            MethodOrigin::Source { source, .. } => Some(source.path()),
            MethodOrigin::Native => None,
        }
    }

    pub fn return_type(&self) -> Option<ReflectionType> {
        let ty = self.decl()?.return_type.as_ref()?;
        Some(ReflectionType::from_ast(ty, false))
    }

    pub fn has_return_type(&self) -> bool {
        self.decl().is_some_and(|decl| decl.return_type.is_some())
    }

    pub fn number_of_parameters(&self) -> usize {
        self.decl().map_or(0, |decl| decl.params.len())
    }

    pub fn number_of_required_parameters(&self) -> usize {
        self.decl()
            .map_or(0, |decl| ReflectionParameter::required_count(&decl.params))
    }

    /// Parameters, built fresh on every call.
    pub fn parameters(&self) -> Result<Vec<ReflectionParameter>> {
        let MethodOrigin::Source {
            decl,
            source,
            namespace,
        } = &self.origin
        else {
            return Ok(Vec::new());
        };
        let context = EvaluationContext::new(self.owner.engine.clone(), Scope::Method)
            .with_source(source.clone())
            .with_namespace(namespace)
            .with_class(self.declaring_class()?)
            .with_function(&self.name);
        Ok(ReflectionParameter::collect(
            &decl.params,
            &format!("{}::{}", self.owner.name, self.name),
            &context,
        ))
    }

    pub fn parameter(&self, name: &str) -> Result<Option<ReflectionParameter>> {
        Ok(self
            .parameters()?
            .into_iter()
            .find(|param| param.name() == name))
    }
}
