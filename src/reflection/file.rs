use crate::core::value::Val;
use crate::parser::ast::{Expr, Stmt};
use crate::reflection::cache::SourceFile;
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::error::Result;
use crate::reflection::namespace::ReflectionFileNamespace;
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::path::Path;
use std::rc::Rc;

/// A parsed PHP file and its namespace sections.
#[derive(Debug)]
pub struct ReflectionFile {
    engine: Rc<ReflectionEngine>,
    source: Rc<SourceFile>,
    namespaces: OnceCell<Rc<IndexMap<String, Rc<ReflectionFileNamespace>>>>,
}

impl ReflectionFile {
    pub fn new(engine: Rc<ReflectionEngine>, path: impl AsRef<Path>) -> Result<Self> {
        let source = engine.parse_file(path.as_ref(), None)?;
        Ok(Self::from_source(engine, source))
    }

    /// Reflect `content` as if it were stored at `path`. Nothing is read
    /// from disk and the cache is left untouched.
    pub fn with_content(
        engine: Rc<ReflectionEngine>,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<Self> {
        let source = engine.parse_file(path.as_ref(), Some(content))?;
        Ok(Self::from_source(engine, source))
    }

    pub fn from_source(engine: Rc<ReflectionEngine>, source: Rc<SourceFile>) -> Self {
        Self {
            engine,
            source,
            namespaces: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &Path {
        self.source.path()
    }

    pub fn source(&self) -> &Rc<SourceFile> {
        &self.source
    }

    /// Namespace sections keyed by name; the global section is `""`.
    /// Repeated sections with the same name keep the first.
    pub fn file_namespaces(&self) -> Rc<IndexMap<String, Rc<ReflectionFileNamespace>>> {
        self.namespaces
            .get_or_init(|| {
                let mut namespaces = IndexMap::new();
                for decl in self.source.namespaces() {
                    namespaces
                        .entry(decl.name_str().to_string())
                        .or_insert_with(|| {
                            ReflectionFileNamespace::from_decl(
                                self.engine.clone(),
                                self.source.clone(),
                                decl.clone(),
                            )
                        });
                }
                Rc::new(namespaces)
            })
            .clone()
    }

    pub fn file_namespace(&self, name: &str) -> Option<Rc<ReflectionFileNamespace>> {
        let name = name.trim_matches('\\');
        self.file_namespaces()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, namespace)| namespace.clone())
    }

    pub fn has_file_namespace(&self, name: &str) -> bool {
        self.file_namespace(name).is_some()
    }

    /// Whether the file opens with `declare(strict_types=1)`.
    pub fn is_strict_mode(&self) -> bool {
        let Some(Stmt::Declare(decl)) = self.source.statements().first() else {
            return false;
        };
        decl.declares.iter().any(|item| {
            item.key.eq_ignore_ascii_case("strict_types")
                && matches!(item.value.as_ref(), Expr::Integer { value: 1, .. })
        })
    }

    /// Value of a `declare` directive at the top of the file.
    pub fn declare(&self, key: &str) -> Option<Val> {
        self.source
            .statements()
            .iter()
            .take_while(|stmt| matches!(stmt, Stmt::Declare(_)))
            .filter_map(|stmt| match stmt {
                Stmt::Declare(decl) => Some(decl),
                _ => None,
            })
            .flat_map(|decl| decl.declares.iter())
            .find(|item| item.key.eq_ignore_ascii_case(key))
            .map(|item| match item.value.as_ref() {
                Expr::Integer { value, .. } => Val::Int(*value),
                Expr::String { value, .. } => Val::String(value.clone()),
                _ => Val::Null,
            })
    }
}
