//! Shared fixtures for reflection tests
//!
//! PHP sources are written into a temporary directory; engines built from a
//! fixture locate classes through a class map of that directory.

use php_reflection::core::value::{ArrayData, ArrayKey, Val};
use php_reflection::reflection::{
    ClassMapLocator, ClassRef, EngineConfig, HostEnvironment, ReflectionEngine,
};
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Fixture with a single file `main.php`.
    pub fn with_source(code: &str) -> Self {
        let fixture = Self::new();
        fixture.write("main.php", code);
        fixture
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write `code` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, code: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        std::fs::write(&path, code).expect("failed to write fixture");
        path
    }

    pub fn class_map(&self) -> ClassMapLocator {
        ClassMapLocator::scan(&[self.dir.path()]).expect("failed to scan fixture")
    }

    /// Engine with the core builtins and a class map of the fixture.
    pub fn engine(&self) -> Rc<ReflectionEngine> {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> Rc<ReflectionEngine> {
        ReflectionEngine::builder()
            .with_locator(self.class_map())
            .with_host(HostEnvironment::with_core_builtins())
            .with_config(config)
            .build()
    }
}

/// Reflect `class` from a single-file fixture. The fixture is returned so
/// the directory outlives the reflection.
#[allow(dead_code)]
pub fn reflect(code: &str, class: &str) -> (Fixture, Rc<ReflectionEngine>, ClassRef) {
    let fixture = Fixture::with_source(code);
    let engine = fixture.engine();
    let class = engine
        .reflect_class(class)
        .unwrap_or_else(|err| panic!("failed to reflect {class}: {err}"));
    (fixture, engine, class)
}

/// Build a PHP array from key/value pairs.
#[allow(dead_code)]
pub fn php_array<K: Into<ArrayKey>>(entries: Vec<(K, Val)>) -> Val {
    let mut data = ArrayData::new();
    for (key, value) in entries {
        data.insert(key.into(), value);
    }
    Val::array(data)
}

#[allow(dead_code)]
pub fn list(values: Vec<Val>) -> Val {
    Val::array(values.into_iter().collect())
}
