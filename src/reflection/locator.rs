use crate::parser::ast::Stmt;
use crate::parser::parse_source_lenient;
use crate::reflection::error::{ReflectionError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Maps a fully-qualified class name to the file that declares it.
pub trait Locator {
    fn locate_class(&self, class_name: &str) -> Option<PathBuf>;
}

impl<F> Locator for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn locate_class(&self, class_name: &str) -> Option<PathBuf> {
        self(class_name)
    }
}

/// Explicit class name to path map. Keys are case-insensitive.
#[derive(Debug, Default, Clone)]
pub struct ClassMapLocator {
    classes: HashMap<String, PathBuf>,
}

impl ClassMapLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class_name: &str, path: impl Into<PathBuf>) {
        self.classes.insert(normalize(class_name), path.into());
    }

    pub fn with(mut self, class_name: &str, path: impl Into<PathBuf>) -> Self {
        self.insert(class_name, path);
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Index every class-like declared in the `*.php` files below `dirs`.
    pub fn scan<P: AsRef<Path>>(dirs: &[P]) -> Result<Self> {
        let mut locator = Self::new();
        for dir in dirs {
            for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping unreadable directory entry");
                        continue;
                    }
                };
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|ext| ext.to_str()) != Some("php")
                {
                    continue;
                }
                locator.index_file(path)?;
            }
        }
        tracing::debug!(classes = locator.len(), "class map built");
        Ok(locator)
    }

    fn index_file(&mut self, path: &Path) -> Result<()> {
        let source = std::fs::read(path).map_err(|source| ReflectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (statements, errors) = parse_source_lenient(&source);
        if !errors.is_empty() {
            tracing::debug!(path = %path.display(), errors = errors.len(), "indexing file with parse errors");
        }
        for stmt in &statements {
            if let Stmt::Namespace(ns) = stmt {
                for inner in &ns.statements {
                    if let Stmt::ClassLike(class) = inner {
                        self.insert(&class.namespaced_name, path);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Locator for ClassMapLocator {
    fn locate_class(&self, class_name: &str) -> Option<PathBuf> {
        self.classes.get(&normalize(class_name)).cloned()
    }
}

fn normalize(class_name: &str) -> String {
    class_name.trim_start_matches('\\').to_ascii_lowercase()
}

/// PSR-4 autoloading layout: namespace prefix to base directories.
#[derive(Debug, Default, Clone)]
pub struct Psr4Locator {
    prefixes: Vec<(String, Vec<PathBuf>)>,
}

impl Psr4Locator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dir` for classes under `prefix` (e.g. `App\`).
    pub fn add(&mut self, prefix: &str, dir: impl Into<PathBuf>) {
        let prefix = prefix.trim_matches('\\');
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}\\")
        };
        match self.prefixes.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, dirs)) => dirs.push(dir.into()),
            None => self.prefixes.push((prefix, vec![dir.into()])),
        }
        // longest prefix first
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    pub fn with(mut self, prefix: &str, dir: impl Into<PathBuf>) -> Self {
        self.add(prefix, dir);
        self
    }
}

impl Locator for Psr4Locator {
    fn locate_class(&self, class_name: &str) -> Option<PathBuf> {
        let class_name = class_name.trim_start_matches('\\');
        for (prefix, dirs) in &self.prefixes {
            let Some(relative) = class_name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let relative: PathBuf = relative.split('\\').collect();
            for dir in dirs {
                let candidate = dir.join(&relative).with_extension("php");
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Tries each locator in turn.
#[derive(Default)]
pub struct ChainLocator {
    locators: Vec<Box<dyn Locator>>,
}

impl ChainLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<L: Locator + 'static>(&mut self, locator: L) {
        self.locators.push(Box::new(locator));
    }

    pub fn with<L: Locator + 'static>(mut self, locator: L) -> Self {
        self.push(locator);
        self
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

impl Locator for ChainLocator {
    fn locate_class(&self, class_name: &str) -> Option<PathBuf> {
        self.locators
            .iter()
            .find_map(|locator| locator.locate_class(class_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_map_is_case_insensitive() {
        let locator = ClassMapLocator::new().with("App\\User", "/src/User.php");
        assert_eq!(
            locator.locate_class("\\app\\user"),
            Some(PathBuf::from("/src/User.php"))
        );
        assert_eq!(locator.locate_class("App\\Other"), None);
    }

    #[test]
    fn test_chain_and_closure() {
        let chain = ChainLocator::new()
            .with(ClassMapLocator::new())
            .with(|name: &str| (name == "Foo").then(|| PathBuf::from("foo.php")));
        assert_eq!(chain.locate_class("Foo"), Some(PathBuf::from("foo.php")));
        assert_eq!(chain.locate_class("Bar"), None);
    }
}
