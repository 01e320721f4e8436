use crate::core::value::Val;
use crate::parser::ast::printer::print_expr;
use crate::parser::ast::{ClassConst, ClassConstDecl, ExprId, Modifiers};
use crate::reflection::error::{EntityKind, ReflectionError, Result};
use crate::reflection::reflector::{ClassRef, DeclaringClass};
use crate::reflection::types::ReflectionType;
use std::fmt;
use std::rc::Rc;

/// A class constant declaration. The value is evaluated on request.
pub struct ReflectionClassConstant {
    name: String,
    owner: DeclaringClass,
    modifiers: Modifiers,
    decl: Rc<ClassConstDecl>,
    value: ExprId,
}

impl fmt::Debug for ReflectionClassConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionClassConstant")
            .field("name", &self.name)
            .field("class", &self.owner.name)
            .finish()
    }
}

impl ReflectionClassConstant {
    pub const IS_PUBLIC: u32 = 1;
    pub const IS_PROTECTED: u32 = 2;
    pub const IS_PRIVATE: u32 = 4;
    pub const IS_FINAL: u32 = 32;

    pub(crate) fn from_decl(owner: DeclaringClass, decl: Rc<ClassConstDecl>, item: &ClassConst) -> Self {
        let mut modifiers = decl.modifiers;
        if !modifiers.has_visibility() {
            modifiers.insert(Modifiers::PUBLIC);
        }
        Self {
            name: item.name.clone(),
            owner,
            modifiers,
            value: item.value.clone(),
            decl,
        }
    }

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

    pub fn is_final(&self) -> bool {
        self.modifiers.contains(Modifiers::FINAL)
    }

    pub fn type_(&self) -> Option<ReflectionType> {
        self.decl
            .ty
            .as_ref()
            .map(|ty| ReflectionType::from_ast(ty, false))
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

    /// Initializer as written.
    pub fn value_text(&self) -> String {
        print_expr(&self.value)
    }

    /// Evaluated through the declaring class, sharing its memoized values.
    pub fn value(&self) -> Result<Val> {
        self.declaring_class()?.constant(&self.name)?.ok_or_else(|| {
            ReflectionError::not_found_in(EntityKind::ClassConstant, &self.name, &self.owner.name)
        })
    }
}
