use crate::core::value::Val;
use crate::parser::ast::{ExprId, NamespaceDecl, Stmt, UseKind};
use crate::reflection::cache::SourceFile;
use crate::reflection::class::ReflectionClass;
use crate::reflection::context::{EvaluationContext, Scope};
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::error::{EntityKind, ReflectionError, Result};
use crate::reflection::function::ReflectionFunction;
use crate::reflection::resolver::evaluate;
use indexmap::IndexMap;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};

/// One namespace section of a parsed file.
pub struct ReflectionFileNamespace {
    engine: Rc<ReflectionEngine>,
    me: Weak<Self>,
    source: Rc<SourceFile>,
    decl: Rc<NamespaceDecl>,
    classes: OnceCell<Rc<IndexMap<String, Rc<ReflectionClass>>>>,
    functions: OnceCell<Rc<IndexMap<String, Rc<ReflectionFunction>>>>,
    constants: OnceCell<Rc<IndexMap<String, Val>>>,
    constant_values: RefCell<IndexMap<String, Val>>,
    aliases: OnceCell<Rc<IndexMap<String, String>>>,
}

impl fmt::Debug for ReflectionFileNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionFileNamespace")
            .field("name", &self.name())
            .field("file", &self.source.path())
            .finish()
    }
}

impl ReflectionFileNamespace {
    /// Section `namespace` of the file at `path`.
    pub fn new(engine: Rc<ReflectionEngine>, path: &Path, namespace: &str) -> Result<Rc<Self>> {
        let source = engine.parse_file(path, None)?;
        let decl = source.namespace(namespace).cloned().ok_or_else(|| {
            ReflectionError::not_found_in(
                EntityKind::Namespace,
                namespace,
                path.display().to_string(),
            )
        })?;
        Ok(Self::from_decl(engine, source, decl))
    }

    pub fn from_decl(
        engine: Rc<ReflectionEngine>,
        source: Rc<SourceFile>,
        decl: Rc<NamespaceDecl>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            engine,
            me: me.clone(),
            source,
            decl,
            classes: OnceCell::new(),
            functions: OnceCell::new(),
            constants: OnceCell::new(),
            constant_values: RefCell::new(IndexMap::new()),
            aliases: OnceCell::new(),
        })
    }

    /// Namespace name without leading backslash, `""` for the global one.
    pub fn name(&self) -> &str {
        self.decl.name_str()
    }

    pub fn file_name(&self) -> &Path {
        self.source.path()
    }

    pub fn source(&self) -> &Rc<SourceFile> {
        &self.source
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

    /// Byte offset just past the last token of the section.
    pub fn last_token_position(&self) -> usize {
        self.decl.span.end
    }

    /// Classes declared in this section, keyed by fully-qualified name.
    pub fn classes(&self) -> Rc<IndexMap<String, Rc<ReflectionClass>>> {
        self.classes
            .get_or_init(|| {
                let classes = self
                    .decl
                    .statements
                    .iter()
                    .filter_map(|stmt| match stmt {
                        Stmt::ClassLike(node) => Some((
                            node.namespaced_name.clone(),
                            ReflectionClass::from_node(
                                self.engine.clone(),
                                node.clone(),
                                self.source.clone(),
                            ),
                        )),
                        _ => None,
                    })
                    .collect();
                Rc::new(classes)
            })
            .clone()
    }

    /// Class by short or fully-qualified name, case-insensitive.
    pub fn class(&self, name: &str) -> Option<Rc<ReflectionClass>> {
        let name = name.trim_start_matches('\\');
        self.classes()
            .iter()
            .find(|(fqcn, class)| {
                fqcn.eq_ignore_ascii_case(name) || class.node().name.eq_ignore_ascii_case(name)
            })
            .map(|(_, class)| class.clone())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    pub fn functions(&self) -> Rc<IndexMap<String, Rc<ReflectionFunction>>> {
        self.functions
            .get_or_init(|| {
                let functions = self
                    .decl
                    .statements
                    .iter()
                    .filter_map(|stmt| match stmt {
                        Stmt::Function(decl) => {
                            let function = ReflectionFunction::from_decl(
                                self.engine.clone(),
                                decl.clone(),
                                self.source.clone(),
                                self.name(),
                            );
                            Some((function.name().to_string(), Rc::new(function)))
                        }
                        _ => None,
                    })
                    .collect();
                Rc::new(functions)
            })
            .clone()
    }

    pub fn function(&self, name: &str) -> Option<Rc<ReflectionFunction>> {
        let name = name.trim_start_matches('\\');
        self.functions()
            .values()
            .find(|function| {
                function.name().eq_ignore_ascii_case(name)
                    || function.short_name().eq_ignore_ascii_case(name)
            })
            .cloned()
    }

    /// `const` declarations and `define()` calls, in source order.
    fn constant_declarations(&self) -> impl Iterator<Item = (&str, &ExprId)> {
        self.decl.statements.iter().flat_map(|stmt| {
            let items: Vec<(&str, &ExprId)> = match stmt {
                Stmt::Const(decl) => decl
                    .consts
                    .iter()
                    .map(|item| (item.name.as_str(), &item.value))
                    .collect(),
                _ => stmt.as_define().into_iter().collect(),
            };
            items
        })
    }

    pub fn has_constant(&self, name: &str) -> bool {
        self.constant_declarations()
            .any(|(declared, _)| declared == name)
    }

    /// Value of a constant declared in this section, `None` when it is not
    /// declared here.
    pub fn constant(&self, name: &str) -> Result<Option<Val>> {
        if let Some(value) = self.constant_values.borrow().get(name) {
            return Ok(Some(value.clone()));
        }
        let Some((_, expr)) = self
            .constant_declarations()
            .find(|(declared, _)| *declared == name)
        else {
            return Ok(None);
        };

        let key = format!("{}|{}", self.source.path().display(), qualified(self.name(), name));
        let Some(_guard) = self.engine.enter(key) else {
            return Err(ReflectionError::resolution(
                qualified(self.name(), name),
                "Cannot declare self-referencing constant",
            ));
        };
        let value = evaluate(expr, &self.context())?.value;
        self.constant_values
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(Some(value))
    }

    /// Every constant of the section with its value.
    pub fn constants(&self) -> Result<Rc<IndexMap<String, Val>>> {
        if let Some(constants) = self.constants.get() {
            return Ok(constants.clone());
        }
        let mut constants = IndexMap::new();
        for (name, _) in self.constant_declarations() {
            if constants.contains_key(name) {
                continue;
            }
            let value = self.constant(name)?.unwrap_or_default();
            constants.insert(name.to_string(), value);
        }
        let constants = Rc::new(constants);
        Ok(self.constants.get_or_init(|| constants).clone())
    }

    /// Class imports (`use A\B as C;`), alias to fully-qualified name.
    pub fn namespace_aliases(&self) -> Rc<IndexMap<String, String>> {
        self.aliases
            .get_or_init(|| {
                let aliases = self
                    .decl
                    .statements
                    .iter()
                    .filter_map(|stmt| match stmt {
                        Stmt::Use(decl) => Some(decl),
                        _ => None,
                    })
                    .flat_map(|decl| decl.uses.iter())
                    .filter(|item| item.kind == UseKind::Normal)
                    .map(|item| (item.alias_name().to_string(), item.name.text.clone()))
                    .collect();
                Rc::new(aliases)
            })
            .clone()
    }

    fn context(&self) -> EvaluationContext {
        let context = EvaluationContext::new(self.engine.clone(), Scope::Namespace)
            .with_source(self.source.clone());
        match self.me.upgrade() {
            Some(me) => context.with_file_namespace(me),
            None => context.with_namespace(self.name()),
        }
    }
}

fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}\\{name}")
    }
}
