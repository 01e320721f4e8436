use crate::core::value::Val;
use crate::reflection::error::Result;
use crate::reflection::method::ReflectionMethod;
use crate::reflection::parameter::ReflectionParameter;
use crate::reflection::property::ReflectionProperty;
use crate::reflection::reflector::ClassReflector;
use crate::reflection::types::ReflectionType;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::{self, Write};
use std::path::PathBuf;

/// Flattened, serializable view of a reflected class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub name: String,
    pub kind: &'static str,
    pub file: Option<PathBuf>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub is_abstract: bool,
    pub is_final: bool,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub traits: Vec<String>,
    pub constants: IndexMap<String, Val>,
    pub properties: Vec<PropertySummary>,
    pub methods: Vec<MethodSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySummary {
    pub name: String,
    pub class: String,
    pub visibility: &'static str,
    pub is_static: bool,
    pub is_readonly: bool,
    #[serde(rename = "type")]
    pub ty: Option<ReflectionType>,
    pub default: Option<Val>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodSummary {
    pub name: String,
    pub class: String,
    pub visibility: &'static str,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub returns_reference: bool,
    pub return_type: Option<ReflectionType>,
    pub parameters: Vec<ParameterSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<ReflectionType>,
    pub by_reference: bool,
    pub variadic: bool,
    /// Default as written in the declaration.
    pub default: Option<String>,
}

fn visibility(public: bool, protected: bool) -> &'static str {
    if public {
        "public"
    } else if protected {
        "protected"
    } else {
        "private"
    }
}

impl ClassSummary {
    pub fn from_class(class: &dyn ClassReflector) -> Result<Self> {
        let source = class.as_source();
        let properties = class
            .properties()?
            .iter()
            .map(|property| PropertySummary::from_property(property))
            .collect::<Result<Vec<_>>>()?;
        let methods = class
            .methods()?
            .iter()
            .map(|method| MethodSummary::from_method(method))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: class.name().to_string(),
            kind: class.kind().as_str(),
            file: class.file_name().map(PathBuf::from),
            start_line: source.map(|class| class.start_line()),
            end_line: source.map(|class| class.end_line()),
            is_abstract: class.is_abstract()?,
            is_final: class.is_final(),
            parent: class.parent_class_name(),
            interfaces: class.interface_names()?,
            traits: source.map(|class| class.trait_names()).unwrap_or_default(),
            constants: class.constants()?.as_ref().clone(),
            properties,
            methods,
        })
    }
}

impl PropertySummary {
    fn from_property(property: &ReflectionProperty) -> Result<Self> {
        let default = if property.has_default_value() {
            Some(property.default_value()?)
        } else {
            None
        };
        Ok(Self {
            name: property.name().to_string(),
            class: property.class().to_string(),
            visibility: visibility(property.is_public(), property.is_protected()),
            is_static: property.is_static(),
            is_readonly: property.is_readonly(),
            ty: property.type_(),
            default,
        })
    }
}

impl MethodSummary {
    fn from_method(method: &ReflectionMethod) -> Result<Self> {
        let parameters = method
            .parameters()?
            .iter()
            .map(ParameterSummary::from_parameter)
            .collect();
        Ok(Self {
            name: method.name().to_string(),
            class: method.class().to_string(),
            visibility: visibility(method.is_public(), method.is_protected()),
            is_static: method.is_static(),
            is_abstract: method.is_abstract(),
            is_final: method.is_final(),
            returns_reference: method.returns_reference(),
            return_type: method.return_type(),
            parameters,
        })
    }
}

impl ParameterSummary {
    fn from_parameter(param: &ReflectionParameter) -> Self {
        Self {
            name: param.name().to_string(),
            ty: param.type_(),
            by_reference: param.is_passed_by_reference(),
            variadic: param.is_variadic(),
            default: param.default_value_text(),
        }
    }
}

impl fmt::Display for ParameterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ty) = &self.ty {
            write!(f, "{ty} ")?;
        }
        if self.by_reference {
            f.write_str("&")?;
        }
        if self.variadic {
            f.write_str("...")?;
        }
        write!(f, "${}", self.name)?;
        if let Some(default) = &self.default {
            write!(f, " = {default}")?;
        }
        Ok(())
    }
}

/// Declaration-style rendering, one member per line.
impl fmt::Display for ClassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header = String::new();
        if self.is_abstract && self.kind == "class" {
            header.push_str("abstract ");
        }
        if self.is_final && self.kind == "class" {
            header.push_str("final ");
        }
        write!(header, "{} {}", self.kind, self.name)?;
        if let Some(parent) = &self.parent {
            write!(header, " extends {parent}")?;
        }
        if !self.interfaces.is_empty() {
            let keyword = if self.kind == "interface" {
                "extends"
            } else {
                "implements"
            };
            write!(header, " {keyword} {}", self.interfaces.join(", "))?;
        }
        writeln!(f, "{header}")?;
        if let Some(file) = &self.file {
            match self.start_line {
                Some(line) => writeln!(f, "  // {}:{line}", file.display())?,
                None => writeln!(f, "  // {}", file.display())?,
            }
        }
        for name in &self.traits {
            writeln!(f, "  use {name};")?;
        }
        for (name, value) in &self.constants {
            writeln!(f, "  const {name} = {value};")?;
        }
        for property in &self.properties {
            let mut line = format!("  {}", property.visibility);
            if property.is_static {
                line.push_str(" static");
            }
            if property.is_readonly {
                line.push_str(" readonly");
            }
            if let Some(ty) = &property.ty {
                write!(line, " {ty}")?;
            }
            write!(line, " ${}", property.name)?;
            if let Some(default) = &property.default {
                write!(line, " = {default}")?;
            }
            writeln!(f, "{line};")?;
        }
        for method in &self.methods {
            let mut line = String::from("  ");
            if method.is_abstract {
                line.push_str("abstract ");
            }
            if method.is_final {
                line.push_str("final ");
            }
            line.push_str(method.visibility);
            if method.is_static {
                line.push_str(" static");
            }
            line.push_str(" function ");
            if method.returns_reference {
                line.push('&');
            }
            let params: Vec<String> = method.parameters.iter().map(ToString::to_string).collect();
            write!(line, "{}({})", method.name, params.join(", "))?;
            if let Some(ty) = &method.return_type {
                write!(line, ": {ty}")?;
            }
            if method.class != self.name {
                write!(line, " // from {}", method.class)?;
            }
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
