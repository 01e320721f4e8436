use crate::reflection::cache::SourceFile;
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::namespace::ReflectionFileNamespace;
use crate::reflection::reflector::ClassRef;
use std::cell::OnceCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// Kind of entity an expression is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Class,
    Method,
    Property,
    ClassConstant,
    Function,
    Namespace,
    Standalone,
}

impl Scope {
    /// Scopes that live inside a class body.
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            Scope::Class | Scope::Method | Scope::Property | Scope::ClassConstant
        )
    }
}

/// Where an expression sits: file, namespace, class and function it was
/// declared in.
#[derive(Clone)]
pub struct EvaluationContext {
    engine: Rc<ReflectionEngine>,
    scope: Scope,
    source: Option<Rc<SourceFile>>,
    namespace: String,
    class: Option<ClassRef>,
    function: Option<String>,
    file_namespace: OnceCell<Option<Rc<ReflectionFileNamespace>>>,
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("scope", &self.scope)
            .field("file", &self.file_name())
            .field("namespace", &self.namespace)
            .field("class", &self.class.as_ref().map(|c| c.name().to_string()))
            .field("function", &self.function)
            .finish()
    }
}

impl EvaluationContext {
    pub fn new(engine: Rc<ReflectionEngine>, scope: Scope) -> Self {
        Self {
            engine,
            scope,
            source: None,
            namespace: String::new(),
            class: None,
            function: None,
            file_namespace: OnceCell::new(),
        }
    }

    /// Context of an expression not tied to any declaration.
    pub fn standalone(engine: Rc<ReflectionEngine>) -> Self {
        Self::new(engine, Scope::Standalone)
    }

    pub fn with_source(mut self, source: Rc<SourceFile>) -> Self {
        self.source = Some(source);
        self.file_namespace = OnceCell::new();
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.trim_matches('\\').to_string();
        self.file_namespace = OnceCell::new();
        self
    }

    /// Reuse an existing namespace model so its memoized constants are
    /// shared with this evaluation.
    pub fn with_file_namespace(mut self, namespace: Rc<ReflectionFileNamespace>) -> Self {
        self.namespace = namespace.name().to_string();
        self.file_namespace = OnceCell::from(Some(namespace));
        self
    }

    pub fn with_class(mut self, class: ClassRef) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_function(mut self, function: &str) -> Self {
        self.function = Some(function.to_string());
        self
    }

    pub fn engine(&self) -> &Rc<ReflectionEngine> {
        &self.engine
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn source(&self) -> Option<&Rc<SourceFile>> {
        self.source.as_ref()
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.source.as_deref().map(SourceFile::path)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class(&self) -> Option<&ClassRef> {
        self.class.as_ref()
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Namespace section of the current file, built on first use.
    pub fn file_namespace(&self) -> Option<Rc<ReflectionFileNamespace>> {
        self.file_namespace
            .get_or_init(|| {
                let source = self.source.as_ref()?;
                let decl = source.namespace(&self.namespace)?;
                Some(ReflectionFileNamespace::from_decl(
                    self.engine.clone(),
                    source.clone(),
                    decl.clone(),
                ))
            })
            .clone()
    }
}
