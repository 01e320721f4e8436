use crate::parser::ast::FunctionDecl;
use crate::reflection::cache::SourceFile;
use crate::reflection::context::{EvaluationContext, Scope};
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::parameter::ReflectionParameter;
use crate::reflection::types::ReflectionType;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// A top-level function declaration.
pub struct ReflectionFunction {
    engine: Rc<ReflectionEngine>,
    decl: Rc<FunctionDecl>,
    source: Rc<SourceFile>,
    namespace: String,
}

impl fmt::Debug for ReflectionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionFunction")
            .field("name", &self.name())
            .finish()
    }
}

impl ReflectionFunction {
    pub fn from_decl(
        engine: Rc<ReflectionEngine>,
        decl: Rc<FunctionDecl>,
        source: Rc<SourceFile>,
        namespace: &str,
    ) -> Self {
        Self {
            engine,
            decl,
            source,
            namespace: namespace.to_string(),
        }
    }

    /// Fully-qualified name.
    pub fn name(&self) -> &str {
        self.decl.namespaced_name.as_deref().unwrap_or(&self.decl.name)
    }

    pub fn short_name(&self) -> &str {
        &self.decl.name
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    pub fn in_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    pub fn file_name(&self) -> &Path {
        self.source.path()
    }

    pub fn doc_comment(&self) -> Option<&str> {
        self.decl.doc_comment.as_deref()
    }

    pub fn start_line(&self) -> usize {
        self.decl.start_line
    }

    pub fn end_line(&self) -> usize {
        self.decl.end_line
    }

    pub fn returns_reference(&self) -> bool {
        self.decl.by_ref
    }

    pub fn is_user_defined(&self) -> bool {
        true
    }

    pub fn return_type(&self) -> Option<ReflectionType> {
        self.decl
            .return_type
            .as_ref()
            .map(|ty| ReflectionType::from_ast(ty, false))
    }

    pub fn number_of_parameters(&self) -> usize {
        self.decl.params.len()
    }

    pub fn number_of_required_parameters(&self) -> usize {
        ReflectionParameter::required_count(&self.decl.params)
    }

    pub fn parameters(&self) -> Vec<ReflectionParameter> {
        let context = EvaluationContext::new(self.engine.clone(), Scope::Function)
            .with_source(self.source.clone())
            .with_namespace(&self.namespace)
            .with_function(self.name());
        ReflectionParameter::collect(&self.decl.params, self.name(), &context)
    }
}
