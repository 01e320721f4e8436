use crate::parser::ast::{Type, is_builtin_type};
use serde::{Serialize, Serializer};
use std::fmt;

/// Declared type of a parameter, property or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionType {
    Named {
        name: String,
        allows_null: bool,
        builtin: bool,
    },
    Union(Vec<ReflectionType>),
    Intersection(Vec<ReflectionType>),
}

impl ReflectionType {
    /// `implicit_null` is set for `Foo $x = null`, which PHP reads as
    /// `?Foo`.
    pub fn from_ast(ty: &Type, implicit_null: bool) -> Self {
        let mut reflected = Self::convert(ty);
        if implicit_null
            && let ReflectionType::Named {
                name, allows_null, ..
            } = &mut reflected
            && !name.eq_ignore_ascii_case("mixed")
        {
            *allows_null = true;
        }
        reflected
    }

    fn convert(ty: &Type) -> Self {
        match ty {
            Type::Simple { name, .. } => {
                let allows_null = name.eq_ignore_ascii_case("null") || name.eq_ignore_ascii_case("mixed");
                ReflectionType::Named {
                    name: name.to_ascii_lowercase(),
                    allows_null,
                    builtin: is_builtin_type(name)
                        && !name.eq_ignore_ascii_case("self")
                        && !name.eq_ignore_ascii_case("parent")
                        && !name.eq_ignore_ascii_case("static"),
                }
            }
            Type::Name(name) => ReflectionType::Named {
                name: name.resolved_or_text().to_string(),
                allows_null: false,
                builtin: false,
            },
            Type::Nullable(inner) => match Self::convert(inner) {
                ReflectionType::Named { name, builtin, .. } => ReflectionType::Named {
                    name,
                    allows_null: true,
                    builtin,
                },
                other => other,
            },
            Type::Union(types) => ReflectionType::Union(types.iter().map(Self::convert).collect()),
            Type::Intersection(types) => {
                ReflectionType::Intersection(types.iter().map(Self::convert).collect())
            }
        }
    }

    pub fn allows_null(&self) -> bool {
        match self {
            ReflectionType::Named { allows_null, .. } => *allows_null,
            ReflectionType::Union(types) => types.iter().any(ReflectionType::allows_null),
            ReflectionType::Intersection(_) => false,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, ReflectionType::Named { builtin: true, .. })
    }

    /// Member types of a union or intersection, or the type itself.
    pub fn types(&self) -> &[ReflectionType] {
        match self {
            ReflectionType::Union(types) | ReflectionType::Intersection(types) => types,
            named => std::slice::from_ref(named),
        }
    }
}

impl fmt::Display for ReflectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflectionType::Named {
                name, allows_null, ..
            } => {
                if *allows_null && name != "mixed" && name != "null" {
                    f.write_str("?")?;
                }
                f.write_str(name)
            }
            ReflectionType::Union(types) => {
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    match ty {
                        ReflectionType::Intersection(_) => write!(f, "({ty})")?,
                        _ => write!(f, "{ty}")?,
                    }
                }
                Ok(())
            }
            ReflectionType::Intersection(types) => {
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str("&")?;
                    }
                    write!(f, "{ty}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for ReflectionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{Name, NameKind};
    use crate::parser::span::Span;

    fn simple(name: &str) -> Type {
        Type::Simple {
            name: name.to_string(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_display() {
        let nullable = Type::Nullable(Box::new(simple("int")));
        assert_eq!(ReflectionType::from_ast(&nullable, false).to_string(), "?int");

        let mut name = Name::new("Foo", NameKind::Unqualified, Span::default());
        name.resolved = Some("App\\Foo".to_string());
        let union = Type::Union(vec![Type::Name(name), simple("null")]);
        let reflected = ReflectionType::from_ast(&union, false);
        assert_eq!(reflected.to_string(), "App\\Foo|null");
        assert!(reflected.allows_null());
    }

    #[test]
    fn test_implicit_null_default() {
        let reflected = ReflectionType::from_ast(&simple("string"), true);
        assert_eq!(reflected.to_string(), "?string");
        assert!(reflected.is_builtin());
    }
}
