use crate::core::value::Val;
use crate::parser::ast::ClassKind;
use crate::reflection::class::ReflectionClass;
use crate::reflection::engine::ReflectionEngine;
use crate::reflection::error::Result;
use crate::reflection::method::ReflectionMethod;
use crate::reflection::property::ReflectionProperty;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};

pub type ClassRef = Rc<dyn ClassReflector>;

/// Capabilities shared by parsed classes and classes the host
/// environment already knows.
pub trait ClassReflector: fmt::Debug {
    /// Fully-qualified name without leading backslash.
    fn name(&self) -> &str;

    fn short_name(&self) -> &str {
        let name = self.name();
        match name.rfind('\\') {
            Some(pos) => &name[pos + 1..],
            None => name,
        }
    }

    fn namespace_name(&self) -> &str {
        let name = self.name();
        match name.rfind('\\') {
            Some(pos) => &name[..pos],
            None => "",
        }
    }

    fn in_namespace(&self) -> bool {
        !self.namespace_name().is_empty()
    }

    fn file_name(&self) -> Option<&Path>;

    fn kind(&self) -> ClassKind;

    fn is_interface(&self) -> bool {
        self.kind() == ClassKind::Interface
    }

    fn is_trait(&self) -> bool {
        self.kind() == ClassKind::Trait
    }

    fn is_enum(&self) -> bool {
        self.kind() == ClassKind::Enum
    }

    fn is_final(&self) -> bool;

    fn is_abstract(&self) -> Result<bool>;

    fn is_user_defined(&self) -> bool;

    fn is_internal(&self) -> bool {
        !self.is_user_defined()
    }

    fn parent_class(&self) -> Result<Option<ClassRef>>;

    fn parent_class_name(&self) -> Option<String>;

    /// All implemented interfaces, keyed by name.
    fn interfaces(&self) -> Result<Rc<IndexMap<String, ClassRef>>>;

    fn interface_names(&self) -> Result<Vec<String>> {
        Ok(self.interfaces()?.keys().cloned().collect())
    }

    fn implements_interface(&self, name: &str) -> Result<bool> {
        let name = name.trim_start_matches('\\');
        Ok(self
            .interfaces()?
            .keys()
            .any(|iface| iface.eq_ignore_ascii_case(name)))
    }

    fn constants(&self) -> Result<Rc<IndexMap<String, Val>>>;

    fn constant(&self, name: &str) -> Result<Option<Val>>;

    fn has_constant(&self, name: &str) -> Result<bool> {
        Ok(self.constant(name)?.is_some())
    }

    fn has_enum_case(&self, _name: &str) -> bool {
        false
    }

    fn methods(&self) -> Result<Rc<[Rc<ReflectionMethod>]>>;

    /// First method with that name (case-insensitive), most derived first.
    fn method(&self, name: &str) -> Result<Option<Rc<ReflectionMethod>>> {
        Ok(self
            .methods()?
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .cloned())
    }

    fn has_method(&self, name: &str) -> Result<bool> {
        Ok(self.method(name)?.is_some())
    }

    fn properties(&self) -> Result<Rc<[Rc<ReflectionProperty>]>>;

    fn property(&self, name: &str) -> Result<Option<Rc<ReflectionProperty>>> {
        Ok(self
            .properties()?
            .iter()
            .find(|p| p.name() == name)
            .cloned())
    }

    fn has_property(&self, name: &str) -> Result<bool> {
        Ok(self.property(name)?.is_some())
    }

    fn is_subclass_of(&self, class_name: &str) -> Result<bool>;

    fn as_source(&self) -> Option<&ReflectionClass> {
        None
    }
}

/// Back-reference from a member to the class that declares it.
#[derive(Clone)]
pub(crate) struct DeclaringClass {
    pub(crate) engine: Rc<ReflectionEngine>,
    pub(crate) class: Weak<dyn ClassReflector>,
    pub(crate) name: String,
}

impl DeclaringClass {
    /// The class, reflected again when the instance that handed out the
    /// member has been dropped.
    pub(crate) fn get(&self) -> Result<ClassRef> {
        match self.class.upgrade() {
            Some(class) => Ok(class),
            None => self.engine.reflect_class(&self.name),
        }
    }
}
