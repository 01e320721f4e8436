use crate::parser::ast::{ClassConst, ClassConstDecl, ClassLike, ExprId, MethodDecl, NamespaceDecl};
use crate::parser::ast::{PropertyDecl, PropertyEntry};
use crate::parser::{parse_expression, parse_source, parse_source_lenient};
use crate::reflection::cache::{SourceCache, SourceFile};
use crate::reflection::class::ReflectionClass;
use crate::reflection::error::{EntityKind, ReflectionError, Result};
use crate::reflection::host::HostEnvironment;
use crate::reflection::locator::Locator;
use crate::reflection::native::NativeReflectionClass;
use crate::reflection::reflector::ClassRef;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Engine-wide settings, fixed once the engine is built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `None` keeps every parsed file; `Some(0)` caches nothing.
    pub max_cached_files: Option<usize>,
    /// Reject files with syntax errors instead of reflecting what was
    /// recovered.
    pub strict_parsing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cached_files: None,
            strict_parsing: true,
        }
    }
}

/// Builder for a [`ReflectionEngine`].
///
/// ```ignore
/// let engine = ReflectionEngine::builder()
///     .with_locator(ClassMapLocator::scan(&["src"])?)
///     .with_core_builtins()
///     .build();
/// ```
pub struct EngineBuilder {
    locator: Option<Box<dyn Locator>>,
    host: HostEnvironment,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            locator: None,
            host: HostEnvironment::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_locator<L: Locator + 'static>(mut self, locator: L) -> Self {
        self.locator = Some(Box::new(locator));
        self
    }

    pub fn with_host(mut self, host: HostEnvironment) -> Self {
        self.host = host;
        self
    }

    /// Know the core interfaces, exceptions and constants without parsing.
    pub fn with_core_builtins(mut self) -> Self {
        self.host = HostEnvironment::with_core_builtins();
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Rc<ReflectionEngine> {
        tracing::debug!(
            max_cached_files = ?self.config.max_cached_files,
            strict = self.config.strict_parsing,
            native_classes = self.host.class_count(),
            "reflection engine built"
        );
        Rc::new(ReflectionEngine {
            cache: RefCell::new(SourceCache::new(self.config.max_cached_files)),
            config: self.config,
            locator: self.locator,
            host: self.host,
            resolving: RefCell::new(Vec::new()),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Locates, parses and caches source files, and hands out the syntax
/// fragments the reflection entities are built on.
pub struct ReflectionEngine {
    config: EngineConfig,
    locator: Option<Box<dyn Locator>>,
    host: HostEnvironment,
    cache: RefCell<SourceCache>,
    /// Keys of the entities being resolved on the current call chain.
    resolving: RefCell<Vec<String>>,
}

impl fmt::Debug for ReflectionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionEngine")
            .field("config", &self.config)
            .field("has_locator", &self.locator.is_some())
            .field("cached_files", &self.cached_file_count())
            .finish()
    }
}

impl ReflectionEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &HostEnvironment {
        &self.host
    }

    pub fn class_exists_natively(&self, name: &str) -> bool {
        self.host.has_class(name)
    }

    /// Parsed statements of `path`. A cached tree is returned unless
    /// `inline` content is given; inline content is parsed fresh and never
    /// enters the cache.
    pub fn parse_file(&self, path: &Path, inline: Option<&str>) -> Result<Rc<SourceFile>> {
        let key = SourceCache::canonicalize(path);
        if inline.is_none()
            && let Some(file) = self.cache.borrow().get(&key)
        {
            tracing::trace!(path = %key.display(), "source cache hit");
            return Ok(file);
        }

        let source: Rc<[u8]> = match inline {
            Some(content) => Rc::from(content.as_bytes()),
            None => {
                tracing::debug!(path = %key.display(), "source cache miss");
                let bytes = std::fs::read(&key).map_err(|source| ReflectionError::Io {
                    path: key.clone(),
                    source,
                })?;
                Rc::from(bytes)
            }
        };

        let statements = if self.config.strict_parsing {
            parse_source(&source).map_err(|failure| ReflectionError::Parse {
                path: key.clone(),
                line: failure.line,
                message: failure.message,
            })?
        } else {
            let (statements, errors) = parse_source_lenient(&source);
            if let Some(first) = errors.first() {
                tracing::warn!(
                    path = %key.display(),
                    errors = errors.len(),
                    first = %first.message,
                    "reflecting partially parsed file"
                );
            }
            statements
        };
        tracing::debug!(path = %key.display(), statements = statements.len(), "parsed file");

        let file = Rc::new(SourceFile::new(key.clone(), source, statements));
        if inline.is_none() {
            self.cache.borrow_mut().insert(key, file.clone());
        }
        Ok(file)
    }

    /// File declaring `class_name`: a native class that knows its file
    /// first, then the locator.
    pub fn locate_class_file(&self, class_name: &str) -> Result<PathBuf> {
        let class_name = class_name.trim_start_matches('\\');
        if let Some(native) = self.host.class(class_name)
            && let Some(path) = &native.file_name
        {
            return Ok(path.clone());
        }
        self.locator
            .as_ref()
            .and_then(|locator| locator.locate_class(class_name))
            .ok_or_else(|| ReflectionError::not_found(EntityKind::Class, class_name))
    }

    pub fn parse_file_namespace(&self, path: &Path, namespace: &str) -> Result<Rc<NamespaceDecl>> {
        let file = self.parse_file(path, None)?;
        file.namespace(namespace).cloned().ok_or_else(|| {
            ReflectionError::not_found_in(
                EntityKind::Namespace,
                namespace,
                path.display().to_string(),
            )
        })
    }

    pub fn parse_class(&self, class_name: &str) -> Result<(Rc<ClassLike>, PathBuf)> {
        let (node, file) = self.load_class(class_name)?;
        Ok((node, file.path().to_path_buf()))
    }

    pub(crate) fn load_class(&self, class_name: &str) -> Result<(Rc<ClassLike>, Rc<SourceFile>)> {
        let class_name = class_name.trim_start_matches('\\');
        let path = self.locate_class_file(class_name)?;
        let file = self.parse_file(&path, None)?;
        match file.find_class(class_name) {
            Some(node) => Ok((node.clone(), file.clone())),
            None => Err(ReflectionError::not_found_in(
                EntityKind::Class,
                class_name,
                path.display().to_string(),
            )),
        }
    }

    /// Method declared directly in the class body; inherited methods are
    /// not searched.
    pub fn parse_class_method(&self, class_name: &str, method: &str) -> Result<Rc<MethodDecl>> {
        let (node, _) = self.parse_class(class_name)?;
        node.find_method(method).cloned().ok_or_else(|| {
            ReflectionError::not_found_in(EntityKind::Method, method, node.namespaced_name.clone())
        })
    }

    pub fn parse_class_property(
        &self,
        class_name: &str,
        property: &str,
    ) -> Result<(Rc<PropertyDecl>, PropertyEntry)> {
        let (node, _) = self.parse_class(class_name)?;
        match node.find_property(property) {
            Some((decl, entry)) => Ok((decl.clone(), entry.clone())),
            None => Err(ReflectionError::not_found_in(
                EntityKind::Property,
                property,
                node.namespaced_name.clone(),
            )),
        }
    }

    pub fn parse_class_constant(
        &self,
        class_name: &str,
        constant: &str,
    ) -> Result<(Rc<ClassConstDecl>, ClassConst)> {
        let (node, _) = self.parse_class(class_name)?;
        match node.find_constant(constant) {
            Some((decl, item)) => Ok((decl.clone(), item.clone())),
            None => Err(ReflectionError::not_found_in(
                EntityKind::ClassConstant,
                constant,
                node.namespaced_name.clone(),
            )),
        }
    }

    /// Parse a default value rendered as PHP source (`['a' => self::X]`).
    pub fn parse_default_value(&self, text: &str) -> Result<ExprId> {
        parse_expression(text).map_err(|failure| {
            ReflectionError::resolution(text, format!("{} in default value", failure.message))
        })
    }

    pub fn set_maximum_cached_files(&self, max: usize) {
        self.cache.borrow_mut().set_capacity(Some(max));
    }

    pub fn cached_file_count(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.cache.borrow().contains(&SourceCache::canonicalize(path))
    }

    /// Mark `key` as being resolved. Returns `None` when it already is,
    /// which means the caller is about to recurse into itself.
    pub fn enter(&self, key: impl Into<String>) -> Option<ResolutionGuard<'_>> {
        let key = key.into();
        let mut stack = self.resolving.borrow_mut();
        if stack.iter().any(|active| *active == key) {
            tracing::debug!(%key, "cyclic resolution detected");
            return None;
        }
        stack.push(key);
        Some(ResolutionGuard {
            stack: &self.resolving,
        })
    }

    /// Reflection of `class_name`: a native class when the host knows it
    /// without a file, otherwise the parsed declaration.
    pub fn reflect_class(self: &Rc<Self>, class_name: &str) -> Result<ClassRef> {
        self.reflect_class_near(class_name, None)
    }

    /// Like [`reflect_class`](Self::reflect_class), but look in `near`
    /// before asking the locator, so classes next to their users resolve
    /// without a locator entry.
    pub fn reflect_class_near(
        self: &Rc<Self>,
        class_name: &str,
        near: Option<&Rc<SourceFile>>,
    ) -> Result<ClassRef> {
        let class_name = class_name.trim_start_matches('\\');
        if let Some(native) = self.host.class(class_name)
            && native.file_name.is_none()
        {
            tracing::trace!(class = class_name, "using native class");
            return Ok(NativeReflectionClass::new(self.clone(), native));
        }
        if let Some(file) = near
            && let Some(node) = file.find_class(class_name)
        {
            return Ok(ReflectionClass::from_node(self.clone(), node.clone(), file.clone()));
        }
        let (node, file) = self.load_class(class_name)?;
        Ok(ReflectionClass::from_node(self.clone(), node, file))
    }

    /// Parsed reflection of `class_name`, never a native one.
    pub fn reflect_source_class(self: &Rc<Self>, class_name: &str) -> Result<Rc<ReflectionClass>> {
        let (node, file) = self.load_class(class_name)?;
        Ok(ReflectionClass::from_node(self.clone(), node, file))
    }
}

/// Pops its key from the resolution stack when dropped.
pub struct ResolutionGuard<'a> {
    stack: &'a RefCell<Vec<String>>,
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_detects_reentry() {
        let engine = ReflectionEngine::builder().build();
        let outer = engine.enter("A::X");
        assert!(outer.is_some());
        assert!(engine.enter("A::X").is_none());
        assert!(engine.enter("A::Y").is_some());
        drop(outer);
        assert!(engine.enter("A::X").is_some());
    }

    #[test]
    fn test_inline_content_is_not_cached() {
        let engine = ReflectionEngine::builder().build();
        let file = engine
            .parse_file(Path::new("/nonexistent/inline.php"), Some("<?php class A {}"))
            .unwrap();
        assert!(file.find_class("A").is_some());
        assert_eq!(engine.cached_file_count(), 0);
    }

    #[test]
    fn test_missing_class_is_not_found() {
        let engine = ReflectionEngine::builder().build();
        let err = engine.parse_class("App\\Missing").unwrap_err();
        assert!(err.is_not_found());
    }
}
