use std::fmt;
use std::path::PathBuf;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Class,
    Method,
    Property,
    ClassConstant,
    Constant,
    Function,
    Namespace,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Class => "Class",
            EntityKind::Method => "Method",
            EntityKind::Property => "Property",
            EntityKind::ClassConstant => "Class constant",
            EntityKind::Constant => "Constant",
            EntityKind::Function => "Function",
            EntityKind::Namespace => "Namespace",
        }
    }
}

#[derive(Debug)]
pub enum ReflectionError {
    /// Requested entity is absent from the located source.
    NotFound {
        kind: EntityKind,
        name: String,
        location: Option<String>,
    },
    /// An expression could not be reduced to a value.
    Resolution { name: String, reason: String },
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ReflectionError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        ReflectionError::NotFound {
            kind,
            name: name.into(),
            location: None,
        }
    }

    pub fn not_found_in(
        kind: EntityKind,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        ReflectionError::NotFound {
            kind,
            name: name.into(),
            location: Some(location.into()),
        }
    }

    pub fn resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ReflectionError::Resolution {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReflectionError::NotFound { .. })
    }
}

impl fmt::Display for ReflectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflectionError::NotFound {
                kind,
                name,
                location: Some(location),
            } => write!(f, "{} {} was not found in {}", kind.as_str(), name, location),
            ReflectionError::NotFound { kind, name, .. } => {
                write!(f, "{} {} was not found", kind.as_str(), name)
            }
            ReflectionError::Resolution { name, reason } => {
                write!(f, "Unable to resolve {}: {}", name, reason)
            }
            ReflectionError::Parse {
                path,
                line,
                message,
            } => write!(f, "{} in {} on line {}", message, path.display(), line),
            ReflectionError::Io { path, source } => {
                write!(f, "Unable to read {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ReflectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReflectionError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReflectionError>;
