use crate::core::value::Val;
use crate::parser::ast::ClassKind;
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::error::Result;
use crate::reflection::host::NativeClass;
use crate::reflection::method::ReflectionMethod;
use crate::reflection::property::ReflectionProperty;
use crate::reflection::reflector::{ClassRef, ClassReflector, DeclaringClass};
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};

/// A class answered from the host registry instead of a parsed file.
pub struct NativeReflectionClass {
    engine: Rc<ReflectionEngine>,
    me: Weak<NativeReflectionClass>,
    class: Rc<NativeClass>,
    parent: OnceCell<Option<ClassRef>>,
    interfaces: OnceCell<Rc<IndexMap<String, ClassRef>>>,
    methods: OnceCell<Rc<[Rc<ReflectionMethod>]>>,
}

impl fmt::Debug for NativeReflectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeReflectionClass")
            .field("name", &self.class.name)
            .finish()
    }
}

impl NativeReflectionClass {
    pub fn new(engine: Rc<ReflectionEngine>, class: Rc<NativeClass>) -> ClassRef {
        Rc::new_cyclic(|me| Self {
            engine,
            me: me.clone(),
            class,
            parent: OnceCell::new(),
            interfaces: OnceCell::new(),
            methods: OnceCell::new(),
        })
    }

    pub fn native(&self) -> &NativeClass {
        &self.class
    }

    fn walk_key(&self, walk: &str) -> String {
        format!("native {walk}:{}", self.class.name.to_ascii_lowercase())
    }

    fn owner(&self) -> DeclaringClass {
        let class: Weak<dyn ClassReflector> = self.me.clone();
        DeclaringClass {
            engine: self.engine.clone(),
            class,
            name: self.class.name.clone(),
        }
    }

    /// Interfaces listed on the native class itself.
    fn direct_interfaces(&self) -> Vec<ClassRef> {
        self.class
            .interfaces
            .iter()
            .filter_map(|name| match self.engine.reflect_class(name) {
                Ok(class) => Some(class),
                Err(err) => {
                    tracing::warn!(class = %self.class.name, interface = %name, error = %err, "skipping unresolvable interface");
                    None
                }
            })
            .collect()
    }
}

impl ClassReflector for NativeReflectionClass {
    fn name(&self) -> &str {
        &self.class.name
    }

    fn file_name(&self) -> Option<&Path> {
        self.class.file_name.as_deref()
    }

    fn kind(&self) -> ClassKind {
        self.class.kind
    }

    fn is_final(&self) -> bool {
        self.class.is_final
    }

    fn is_abstract(&self) -> Result<bool> {
        Ok(self.class.is_abstract
            || (self.class.kind == ClassKind::Interface && !self.methods()?.is_empty()))
    }

    fn is_user_defined(&self) -> bool {
        self.class.file_name.is_some()
    }

    fn parent_class(&self) -> Result<Option<ClassRef>> {
        if let Some(parent) = self.parent.get() {
            return Ok(parent.clone());
        }
        let parent = match &self.class.parent {
            Some(name) => Some(self.engine.reflect_class(name)?),
            None => None,
        };
        Ok(self.parent.get_or_init(|| parent).clone())
    }

    fn parent_class_name(&self) -> Option<String> {
        self.class.parent.clone()
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
        for interface in self.direct_interfaces() {
            for (name, class) in interface.interfaces()?.iter() {
                result.entry(name.clone()).or_insert_with(|| class.clone());
            }
            result
                .entry(interface.name().to_string())
                .or_insert(interface);
        }
        let result = Rc::new(result);
        Ok(self.interfaces.get_or_init(|| result).clone())
    }

    fn constants(&self) -> Result<Rc<IndexMap<String, Val>>> {
        let mut result = self.class.constants.clone();
        let Some(_guard) = self.engine.enter(self.walk_key("constants")) else {
            return Ok(Rc::new(result));
        };
        if let Some(parent) = self.parent_class()? {
            for (name, value) in parent.constants()?.iter() {
                result.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        for interface in self.direct_interfaces() {
            for (name, value) in interface.constants()?.iter() {
                result.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        Ok(Rc::new(result))
    }

    fn constant(&self, name: &str) -> Result<Option<Val>> {
        if let Some(value) = self.class.constants.get(name) {
            return Ok(Some(value.clone()));
        }
        Ok(self.constants()?.get(name).cloned())
    }

    fn methods(&self) -> Result<Rc<[Rc<ReflectionMethod>]>> {
        if let Some(methods) = self.methods.get() {
            return Ok(methods.clone());
        }
        let Some(_guard) = self.engine.enter(self.walk_key("methods")) else {
            return Ok(Rc::from(Vec::new()));
        };
        let mut candidates: Vec<Rc<ReflectionMethod>> = self
            .class
            .methods
            .iter()
            .map(|method| Rc::new(ReflectionMethod::native(self.owner(), method)))
            .collect();
        if let Some(parent) = self.parent_class()? {
            candidates.extend(parent.methods()?.iter().cloned());
        }
        for interface in self.direct_interfaces() {
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
        Ok(Rc::from(Vec::new()))
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::host::HostEnvironment;

    fn engine() -> Rc<ReflectionEngine> {
        ReflectionEngine::builder()
            .with_host(HostEnvironment::with_core_builtins())
            .build()
    }

    #[test]
    fn test_native_interface_hierarchy() {
        let engine = engine();
        let iterator = engine.reflect_class("Iterator").unwrap();
        assert!(iterator.is_interface());
        assert!(iterator.is_internal());
        assert!(iterator.implements_interface("Traversable").unwrap());
        assert!(iterator.has_method("current").unwrap());
        assert!(iterator.is_abstract().unwrap());
    }

    #[test]
    fn test_native_parent_methods_are_inherited() {
        let mut host = HostEnvironment::new();
        host.register_class(NativeClass::class("Base").method("run"));
        host.register_class(NativeClass::class("Child").extends("Base").method("stop"));
        let engine = ReflectionEngine::builder().with_host(host).build();

        let child = engine.reflect_class("child").unwrap();
        let names: Vec<_> = child
            .methods()
            .unwrap()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, ["stop", "run"]);
        assert!(child.is_subclass_of("Base").unwrap());
        assert_eq!(
            child.method("RUN").unwrap().unwrap().class(),
            "Base"
        );
    }
}
