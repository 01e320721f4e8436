use crate::parser::ast::{ClassLike, NamespaceDecl, Stmt};
use crate::parser::line_index::LineIndex;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One parsed file: its source text and name-resolved statements.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    source: Rc<[u8]>,
    line_index: LineIndex,
    statements: Vec<Stmt>,
}

impl SourceFile {
    pub fn new(path: PathBuf, source: Rc<[u8]>, statements: Vec<Stmt>) -> Self {
        let line_index = LineIndex::new(&source);
        Self {
            path,
            source,
            line_index,
            statements,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Rc<NamespaceDecl>> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Stmt::Namespace(ns) => Some(ns),
            _ => None,
        })
    }

    /// First namespace section with the given name (`""` is global).
    pub fn namespace(&self, name: &str) -> Option<&Rc<NamespaceDecl>> {
        let name = name.trim_matches('\\');
        self.namespaces()
            .find(|ns| ns.name_str().eq_ignore_ascii_case(name))
    }

    pub fn find_class(&self, class_name: &str) -> Option<&Rc<ClassLike>> {
        let class_name = class_name.trim_start_matches('\\');
        let (namespace, short) = match class_name.rfind('\\') {
            Some(pos) => (&class_name[..pos], &class_name[pos + 1..]),
            None => ("", class_name),
        };
        self.namespaces()
            .filter(|ns| ns.name_str().eq_ignore_ascii_case(namespace))
            .flat_map(|ns| ns.statements.iter())
            .find_map(|stmt| match stmt {
                Stmt::ClassLike(class) if class.name.eq_ignore_ascii_case(short) => Some(class),
                _ => None,
            })
    }
}

/// Parsed files keyed by canonical path, evicted oldest-first.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: IndexMap<PathBuf, Rc<SourceFile>>,
    /// `None` is unbounded, `Some(0)` caches nothing.
    capacity: Option<usize>,
}

impl SourceCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
        }
    }

    /// `std::fs::canonicalize`, or the path unchanged when it does not
    /// exist (inline content).
    pub fn canonicalize(path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    pub fn get(&self, path: &Path) -> Option<Rc<SourceFile>> {
        self.entries.get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: PathBuf, file: Rc<SourceFile>) {
        if self.capacity == Some(0) {
            return;
        }
        self.entries.shift_remove(&path);
        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity {
                if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                    tracing::debug!(path = %evicted.display(), "evicted cached file");
                }
            }
        }
        self.entries.insert(path, file);
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Change the capacity, dropping the oldest entries when over it.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
        if let Some(capacity) = capacity
            && self.entries.len() > capacity
        {
            let excess = self.entries.len() - capacity;
            for (evicted, _) in self.entries.drain(..excess) {
                tracing::debug!(path = %evicted.display(), "evicted cached file");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> (PathBuf, Rc<SourceFile>) {
        let path = PathBuf::from(name);
        let source: Rc<[u8]> = Rc::from(&b"<?php"[..]);
        (path.clone(), Rc::new(SourceFile::new(path, source, Vec::new())))
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut cache = SourceCache::new(Some(2));
        for name in ["a.php", "b.php", "c.php"] {
            let (path, f) = file(name);
            cache.insert(path, f);
        }
        let paths: Vec<_> = cache.paths().map(|p| p.to_path_buf()).collect();
        assert_eq!(paths, vec![PathBuf::from("b.php"), PathBuf::from("c.php")]);
    }

    #[test]
    fn test_set_capacity_keeps_newest() {
        let mut cache = SourceCache::new(None);
        for name in ["a.php", "b.php", "c.php", "d.php"] {
            let (path, f) = file(name);
            cache.insert(path, f);
        }
        cache.set_capacity(Some(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(Path::new("d.php")));
    }

    #[test]
    fn test_zero_capacity_caches_nothing() {
        let mut cache = SourceCache::new(Some(0));
        let (path, f) = file("a.php");
        cache.insert(path, f);
        assert!(cache.is_empty());
    }
}
