use crate::core::value::Val;
use crate::parser::ast::{ClassKind, ClassLike, ExprId, Modifiers, TraitAdaptation};
use crate::reflection::cache::SourceFile;
use crate::reflection::class_constant::ReflectionClassConstant;
use crate::reflection::context::{EvaluationContext, Scope};
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::error::{ReflectionError, Result};
use crate::reflection::method::ReflectionMethod;
use crate::reflection::property::ReflectionProperty;
use crate::reflection::reflector::{ClassRef, ClassReflector, DeclaringClass};
use crate::reflection::resolver::evaluate;
use crate::reflection::types::ReflectionType;
use indexmap::IndexMap;
use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};

/// A class, interface, trait or enum reflected from its parsed
/// declaration.
///
/// Derived data (constants, members, parent, interfaces) is computed on
/// first access and kept for the lifetime of the instance. Walks over the
/// hierarchy are keyed on the class name in the engine's resolution stack,
/// so a cyclic hierarchy yields empty results instead of recursing.
pub struct ReflectionClass {
    engine: Rc<ReflectionEngine>,
    me: Weak<ReflectionClass>,
    node: Rc<ClassLike>,
    source: Rc<SourceFile>,
    constant_values: RefCell<IndexMap<String, Val>>,
    constants: OnceCell<Rc<IndexMap<String, Val>>>,
    methods: OnceCell<Rc<[Rc<ReflectionMethod>]>>,
    properties: OnceCell<Rc<[Rc<ReflectionProperty>]>>,
    parent: OnceCell<Option<ClassRef>>,
    interfaces: OnceCell<Rc<IndexMap<String, ClassRef>>>,
    direct_interfaces: OnceCell<Rc<IndexMap<String, ClassRef>>>,
    traits: OnceCell<Rc<IndexMap<String, ClassRef>>>,
}

impl fmt::Debug for ReflectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionClass")
            .field("name", &self.node.namespaced_name)
            .finish()
    }
}

impl ReflectionClass {
    pub const IS_IMPLICIT_ABSTRACT: u32 = 16;
    pub const IS_EXPLICIT_ABSTRACT: u32 = 64;
    pub const IS_FINAL: u32 = 32;
    pub const IS_READONLY: u32 = 65536;

    /// Locate and parse `class_name`.
    pub fn new(engine: Rc<ReflectionEngine>, class_name: &str) -> Result<Rc<Self>> {
        engine.reflect_source_class(class_name)
    }

    /// Reflect an already parsed declaration.
    pub fn from_node(
        engine: Rc<ReflectionEngine>,
        node: Rc<ClassLike>,
        source: Rc<SourceFile>,
    ) -> Rc<Self> {
        tracing::trace!(class = %node.namespaced_name, "reflecting class");
        Rc::new_cyclic(|me| Self {
            engine,
            me: me.clone(),
            node,
            source,
            constant_values: RefCell::new(IndexMap::new()),
            constants: OnceCell::new(),
            methods: OnceCell::new(),
            properties: OnceCell::new(),
            parent: OnceCell::new(),
            interfaces: OnceCell::new(),
            direct_interfaces: OnceCell::new(),
            traits: OnceCell::new(),
        })
    }

    pub fn node(&self) -> &Rc<ClassLike> {
        &self.node
    }

    pub fn source(&self) -> &Rc<SourceFile> {
        &self.source
    }

    pub fn engine(&self) -> &Rc<ReflectionEngine> {
        &self.engine
    }

    fn this(&self) -> Option<ClassRef> {
        self.me.upgrade().map(|me| me as ClassRef)
    }

    fn owner(&self) -> DeclaringClass {
        let class: Weak<dyn ClassReflector> = self.me.clone();
        DeclaringClass {
            engine: self.engine.clone(),
            class,
            name: self.node.namespaced_name.clone(),
        }
    }

    fn context(&self, scope: Scope) -> EvaluationContext {
        let context = EvaluationContext::new(self.engine.clone(), scope)
            .with_source(self.source.clone())
            .with_namespace(self.node.namespace_name());
        match self.this() {
            Some(this) => context.with_class(this),
            None => context,
        }
    }

    /// Resolution-stack key for a walk over this class.
    fn walk_key(&self, walk: &str) -> String {
        format!("{walk}:{}", self.node.namespaced_name.to_ascii_lowercase())
    }

    pub fn start_line(&self) -> usize {
        self.node.start_line
    }

    pub fn end_line(&self) -> usize {
        self.node.end_line
    }

    pub fn doc_comment(&self) -> Option<&str> {
        self.node.doc_comment.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        false
    }

    pub fn is_readonly(&self) -> bool {
        self.node.modifiers.contains(Modifiers::READONLY)
    }

    fn declares_abstract_method(&self) -> bool {
        self.node
            .methods()
            .any(|method| method.modifiers.contains(Modifiers::ABSTRACT))
    }

    pub fn modifiers(&self) -> u32 {
        let mut bits = 0;
        if self.node.modifiers.contains(Modifiers::ABSTRACT) {
            bits |= Self::IS_EXPLICIT_ABSTRACT;
        }
        if self.declares_abstract_method()
            || (self.is_interface() && self.node.methods().next().is_some())
        {
            bits |= Self::IS_IMPLICIT_ABSTRACT;
        }
        if self.is_final() {
            bits |= Self::IS_FINAL;
        }
        if self.is_readonly() {
            bits |= Self::IS_READONLY;
        }
        bits
    }

    pub fn is_instantiable(&self) -> Result<bool> {
        if !matches!(self.node.kind, ClassKind::Class) || self.is_abstract()? {
            return Ok(false);
        }
        Ok(self.constructor()?.is_none_or(|ctor| ctor.is_public()))
    }

    pub fn is_cloneable(&self) -> Result<bool> {
        if !matches!(self.node.kind, ClassKind::Class) || self.is_abstract()? {
            return Ok(false);
        }
        Ok(self
            .method("__clone")?
            .is_none_or(|clone| clone.is_public()))
    }

    pub fn is_iterable(&self) -> Result<bool> {
        if !matches!(self.node.kind, ClassKind::Class) || self.is_abstract()? {
            return Ok(false);
        }
        self.implements_interface("Traversable")
    }

    pub fn constructor(&self) -> Result<Option<Rc<ReflectionMethod>>> {
        self.method("__construct")
    }

    /// Names of the traits used directly, as resolved.
    pub fn trait_names(&self) -> Vec<String> {
        self.node
            .trait_uses()
            .flat_map(|use_decl| use_decl.traits.iter())
            .map(|name| name.resolved_or_text().to_string())
            .collect()
    }

    /// Traits used directly. Traits that cannot be located are skipped.
    pub fn traits(&self) -> Rc<IndexMap<String, ClassRef>> {
        self.traits
            .get_or_init(|| Rc::new(self.reflect_names(self.trait_names(), "trait")))
            .clone()
    }

    fn reflect_names(&self, names: Vec<String>, what: &str) -> IndexMap<String, ClassRef> {
        let mut classes = IndexMap::new();
        for name in names {
            match self.engine.reflect_class_near(&name, Some(&self.source)) {
                Ok(class) => {
                    classes.insert(class.name().to_string(), class);
                }
                Err(err) => tracing::warn!(
                    class = %self.node.namespaced_name,
                    name = %name,
                    kind = what,
                    error = %err,
                    "skipping unresolvable {what}"
                ),
            }
        }
        classes
    }

    /// Interfaces named in this declaration, plus the implicit enum ones.
    pub fn direct_interfaces(&self) -> Rc<IndexMap<String, ClassRef>> {
        self.direct_interfaces
            .get_or_init(|| {
                let mut names: Vec<String> = self
                    .node
                    .interfaces
                    .iter()
                    .map(|name| name.resolved_or_text().to_string())
                    .collect();
                if self.node.kind == ClassKind::Enum {
                    let mut implicit = vec!["UnitEnum"];
                    if self.node.backing_type.is_some() {
                        implicit.push("BackedEnum");
                    }
                    names.extend(
                        implicit
                            .into_iter()
                            .filter(|name| self.engine.host().has_class(name))
                            .map(str::to_string),
                    );
                }
                let mut interfaces = self.reflect_names(names, "interface");
                interfaces.retain(|_, class| class.is_interface());
                Rc::new(interfaces)
            })
            .clone()
    }

    /// Constant declared in this class body, evaluated once.
    fn direct_constant(&self, name: &str, value: &ExprId) -> Result<Val> {
        if let Some(value) = self.constant_values.borrow().get(name) {
            return Ok(value.clone());
        }
        let key = format!("{}::{}", self.node.namespaced_name, name);
        let Some(_guard) = self.engine.enter(key.clone()) else {
            return Err(ReflectionError::resolution(
                &key,
                "Cannot declare self-referencing constant",
            ));
        };
        let result = evaluate(value, &self.context(Scope::Class))?.value;
        self.constant_values
            .borrow_mut()
            .insert(name.to_string(), result.clone());
        Ok(result)
    }

    /// Descriptors of every constant: own, then from traits, the parent and
    /// interfaces.
    pub fn reflection_constants(&self) -> Result<Vec<Rc<ReflectionClassConstant>>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for decl in self.node.constants() {
            for item in &decl.consts {
                if seen.insert(item.name.clone()) {
                    result.push(Rc::new(ReflectionClassConstant::from_decl(
                        self.owner(),
                        decl.clone(),
                        item,
                    )));
                }
            }
        }
        let Some(_guard) = self.engine.enter(self.walk_key("constant-descriptors")) else {
            return Ok(result);
        };
        let mut inherited: Vec<ClassRef> = self.traits().values().cloned().collect();
        inherited.extend(self.parent_class()?);
        inherited.extend(self.direct_interfaces().values().cloned());
        for class in inherited {
            let Some(class) = class.as_source() else {
                continue;
            };
            for constant in class.reflection_constants()? {
                if seen.insert(constant.name().to_string()) {
                    result.push(constant);
                }
            }
        }
        Ok(result)
    }

    pub fn reflection_constant(&self, name: &str) -> Result<Option<Rc<ReflectionClassConstant>>> {
        Ok(self
            .reflection_constants()?
            .into_iter()
            .find(|constant| constant.name() == name))
    }

    /// Names of the enum cases.
    pub fn cases(&self) -> Vec<String> {
        self.node.cases().map(|case| case.name.clone()).collect()
    }

    /// Backing value of an enum case; `None` for pure enums and unknown
    /// cases.
    pub fn case_value(&self, name: &str) -> Result<Option<Val>> {
        let Some(case) = self.node.cases().find(|case| case.name == name) else {
            return Ok(None);
        };
        match &case.value {
            Some(value) => Ok(Some(evaluate(value, &self.context(Scope::ClassConstant))?.value)),
            None => Ok(None),
        }
    }

    pub fn backing_type(&self) -> Option<ReflectionType> {
        self.node
            .backing_type
            .as_ref()
            .map(|ty| ReflectionType::from_ast(ty, false))
    }

    fn trait_methods(&self) -> Result<Vec<Rc<ReflectionMethod>>> {
        let mut result = Vec::new();
        let traits = self.traits();
        for use_decl in self.node.trait_uses() {
            let mut excluded = HashSet::new();
            for adaptation in &use_decl.adaptations {
                if let TraitAdaptation::Precedence {
                    method, insteadof, ..
                } = adaptation
                {
                    for loser in insteadof {
                        excluded.insert((
                            loser.resolved_or_text().to_ascii_lowercase(),
                            method.to_ascii_lowercase(),
                        ));
                    }
                }
            }

            for trait_name in &use_decl.traits {
                let trait_name = trait_name.resolved_or_text();
                let Some(trait_class) = traits
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(trait_name))
                    .map(|(_, class)| class.clone())
                else {
                    continue;
                };
                let trait_key = trait_class.name().to_ascii_lowercase();
                for method in trait_class.methods()?.iter() {
                    let method_key = method.name().to_ascii_lowercase();
                    let aliases = use_decl.adaptations.iter().filter_map(|adaptation| {
                        match adaptation {
                            TraitAdaptation::Alias {
                                trait_name,
                                method: aliased,
                                alias,
                                visibility,
                                ..
                            } if aliased.eq_ignore_ascii_case(&method_key)
                                && trait_name.as_ref().is_none_or(|t| {
                                    t.resolved_or_text().eq_ignore_ascii_case(&trait_key)
                                }) =>
                            {
                                Some((alias.as_deref(), *visibility))
                            }
                            _ => None,
                        }
                    });

                    let mut visibility = None;
                    for (alias, alias_visibility) in aliases {
                        match alias {
                            Some(alias) => result.push(Rc::new(
                                method
                                    .rebound(self.owner())
                                    .adapted(Some(alias), alias_visibility),
                            )),
                            None => visibility = alias_visibility,
                        }
                    }
                    if !excluded.contains(&(trait_key.clone(), method_key)) {
                        result.push(Rc::new(method.rebound(self.owner()).adapted(None, visibility)));
                    }
                }
            }
        }
        Ok(result)
    }

    /// Properties declared directly, including those imported from traits.
    fn own_properties(&self) -> Result<Vec<Rc<ReflectionProperty>>> {
        let mut result = Vec::new();
        for decl in self.node.properties() {
            for entry in &decl.entries {
                result.push(Rc::new(ReflectionProperty::from_decl(
                    self.owner(),
                    self.is_readonly(),
                    decl.clone(),
                    entry,
                    self.source.clone(),
                    self.node.namespace_name(),
                )));
            }
        }
        for trait_class in self.traits().values() {
            for property in trait_class.properties()?.iter() {
                result.push(Rc::new(property.rebound(self.owner())));
            }
        }
        Ok(result)
    }

    /// Non-static property defaults by name.
    pub fn default_properties(&self) -> Result<IndexMap<String, Val>> {
        self.property_values(false)
    }

    pub fn static_properties(&self) -> Result<IndexMap<String, Val>> {
        self.property_values(true)
    }

    fn property_values(&self, statics: bool) -> Result<IndexMap<String, Val>> {
        let mut values = IndexMap::new();
        for property in self.properties()?.iter() {
            if property.is_static() == statics && property.has_default_value() {
                values.insert(property.name().to_string(), property.default_value()?);
            }
        }
        Ok(values)
    }
}

impl ClassReflector for ReflectionClass {
    fn name(&self) -> &str {
        &self.node.namespaced_name
    }

    fn file_name(&self) -> Option<&Path> {
        Some(self.source.path())
    }

    fn kind(&self) -> ClassKind {
        self.node.kind
    }

    fn is_final(&self) -> bool {
        self.node.modifiers.contains(Modifiers::FINAL) || self.node.kind == ClassKind::Enum
    }

    fn is_abstract(&self) -> Result<bool> {
        if self.node.modifiers.contains(Modifiers::ABSTRACT) || self.declares_abstract_method() {
            return Ok(true);
        }
        if !self.is_interface() {
            return Ok(false);
        }
        if self.node.methods().next().is_some() {
            return Ok(true);
        }
        Ok(!self.methods()?.is_empty())
    }

    fn is_user_defined(&self) -> bool {
        true
    }

    fn parent_class(&self) -> Result<Option<ClassRef>> {
        if let Some(parent) = self.parent.get() {
            return Ok(parent.clone());
        }
        let parent = match &self.node.parent {
            Some(name) => Some(
                self.engine
                    .reflect_class_near(name.resolved_or_text(), Some(&self.source))?,
            ),
            None => None,
        };
        Ok(self.parent.get_or_init(|| parent).clone())
    }

    fn parent_class_name(&self) -> Option<String> {
        self.node
            .parent
            .as_ref()
            .map(|name| name.resolved_or_text().to_string())
    }

    fn interfaces(&self) -> Result<Rc<IndexMap<String, ClassRef>>> {
        if let Some(interfaces) = self.interfaces.get() {
            return Ok(interfaces.clone());
        }
        let Some(_guard) = self.engine.enter(self.walk_key("interfaces")) else {
            return Ok(Rc::new(IndexMap::new()));
        };
        let mut result = IndexMap::new();
        if let Some(parent) = self.parent_class()? {
            for (name, class) in parent.interfaces()?.iter() {
                result.entry(name.clone()).or_insert_with(|| class.clone());
            }
        }
        for (name, interface) in self.direct_interfaces().iter() {
            result
                .entry(name.clone())
                .or_insert_with(|| interface.clone());
            for (name, class) in interface.interfaces()?.iter() {
                result.entry(name.clone()).or_insert_with(|| class.clone());
            }
        }
        let result = Rc::new(result);
        Ok(self.interfaces.get_or_init(|| result).clone())
    }

    fn constants(&self) -> Result<Rc<IndexMap<String, Val>>> {
        if let Some(constants) = self.constants.get() {
            return Ok(constants.clone());
        }
        let mut result = IndexMap::new();
        for decl in self.node.constants() {
            for item in &decl.consts {
                let value = self.direct_constant(&item.name, &item.value)?;
                result.insert(item.name.clone(), value);
            }
        }

        let Some(_guard) = self.engine.enter(self.walk_key("constants")) else {
            return Ok(Rc::new(result));
        };
        let mut inherited: Vec<ClassRef> = self.traits().values().cloned().collect();
        inherited.extend(self.parent_class()?);
        inherited.extend(self.direct_interfaces().values().cloned());
        for class in inherited {
            for (name, value) in class.constants()?.iter() {
                result
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        let result = Rc::new(result);
        Ok(self.constants.get_or_init(|| result).clone())
    }

    fn constant(&self, name: &str) -> Result<Option<Val>> {
        if let Some(constants) = self.constants.get() {
            return Ok(constants.get(name).cloned());
        }
        if let Some((_, item)) = self.node.find_constant(name) {
            return self.direct_constant(name, &item.value).map(Some);
        }

        let Some(_guard) = self.engine.enter(self.walk_key(&format!("constant {name}"))) else {
            return Ok(None);
        };
        for class in self.traits().values() {
            if let Some(value) = class.constant(name)? {
                return Ok(Some(value));
            }
        }
        if let Some(parent) = self.parent_class()?
            && let Some(value) = parent.constant(name)?
        {
            return Ok(Some(value));
        }
        for interface in self.direct_interfaces().values() {
            if let Some(value) = interface.constant(name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn has_enum_case(&self, name: &str) -> bool {
        self.node.cases().any(|case| case.name == name)
    }

    fn methods(&self) -> Result<Rc<[Rc<ReflectionMethod>]>> {
        if let Some(methods) = self.methods.get() {
            return Ok(methods.clone());
        }
        let Some(_guard) = self.engine.enter(self.walk_key("methods")) else {
            return Ok(Rc::from(Vec::new()));
        };

        let in_interface = self.is_interface();
        let mut candidates: Vec<Rc<ReflectionMethod>> = self
            .node
            .methods()
            .map(|decl| {
                Rc::new(ReflectionMethod::from_decl(
                    self.owner(),
                    in_interface,
                    decl.clone(),
                    self.source.clone(),
                    self.node.namespace_name(),
                ))
            })
            .collect();
        candidates.extend(self.trait_methods()?);
        if let Some(parent) = self.parent_class()? {
            candidates.extend(parent.methods()?.iter().cloned());
        }
        for interface in self.direct_interfaces().values() {
            candidates.extend(interface.methods()?.iter().cloned());
        }

        let mut seen = HashSet::new();
        let methods: Rc<[Rc<ReflectionMethod>]> = candidates
            .into_iter()
            .filter(|method| seen.insert(method.name().to_ascii_lowercase()))
            .collect();
        Ok(self.methods.get_or_init(|| methods).clone())
    }

    fn properties(&self) -> Result<Rc<[Rc<ReflectionProperty>]>> {
        if let Some(properties) = self.properties.get() {
            return Ok(properties.clone());
        }
        let Some(_guard) = self.engine.enter(self.walk_key("properties")) else {
            return Ok(Rc::from(Vec::new()));
        };

        let mut candidates = self.own_properties()?;
        if let Some(parent) = self.parent_class()? {
            // private members of ancestors are not visible here
            candidates.extend(
                parent
                    .properties()?
                    .iter()
                    .filter(|property| !property.is_private())
                    .cloned(),
            );
        }

        let mut seen = HashSet::new();
        let properties: Rc<[Rc<ReflectionProperty>]> = candidates
            .into_iter()
            .filter(|property| seen.insert(property.name().to_string()))
            .collect();
        Ok(self.properties.get_or_init(|| properties).clone())
    }

    fn is_subclass_of(&self, class_name: &str) -> Result<bool> {
        let class_name = class_name.trim_start_matches('\\');
        let Some(parent) = self.parent_class()? else {
            return Ok(false);
        };
        if parent.name().eq_ignore_ascii_case(class_name) {
            return Ok(true);
        }
        let Some(_guard) = self.engine.enter(self.walk_key("subclass")) else {
            return Ok(false);
        };
        parent.is_subclass_of(class_name)
    }

    fn as_source(&self) -> Option<&ReflectionClass> {
        Some(self)
    }
}
