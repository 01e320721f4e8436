mod common;

use common::Fixture;
use php_reflection::reflection::{
    ClassReflector, EngineConfig, ReflectionError, ReflectionFile,
};
use std::rc::Rc;

#[test]
fn test_reparse_returns_cached_tree() {
    let fixture = Fixture::with_source("<?php class A {}");
    let engine = fixture.engine();
    let path = fixture.path("main.php");

    let first = engine.parse_file(&path, None).unwrap();
    let second = engine.parse_file(&path, None).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert!(engine.is_cached(&path));
    assert_eq!(engine.cached_file_count(), 1);
}

#[test]
fn test_inline_content_bypasses_cache() {
    let fixture = Fixture::with_source("<?php class OnDisk {}");
    let engine = fixture.engine();
    let path = fixture.path("main.php");

    let inline = engine
        .parse_file(&path, Some("<?php class Inline {}"))
        .unwrap();
    assert!(inline.find_class("Inline").is_some());
    assert!(!engine.is_cached(&path));

    let on_disk = engine.parse_file(&path, None).unwrap();
    assert!(on_disk.find_class("OnDisk").is_some());
    assert!(!Rc::ptr_eq(&inline, &on_disk));

    // cached tree is untouched by later inline parses
    engine.parse_file(&path, Some("<?php")).unwrap();
    let again = engine.parse_file(&path, None).unwrap();
    assert!(Rc::ptr_eq(&on_disk, &again));
}

#[test]
fn test_reflection_file_with_content() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let file = ReflectionFile::with_content(
        engine.clone(),
        fixture.path("virtual.php"),
        "<?php namespace V; class Only {}",
    )
    .unwrap();

    assert!(file.has_file_namespace("V"));
    assert_eq!(engine.cached_file_count(), 0);
}

#[test]
fn test_oldest_files_are_evicted() {
    let fixture = Fixture::new();
    let paths: Vec<_> = (0..3)
        .map(|i| fixture.write(&format!("f{i}.php"), &format!("<?php class F{i} {{}}")))
        .collect();
    let engine = fixture.engine_with(EngineConfig {
        max_cached_files: Some(2),
        ..EngineConfig::default()
    });

    for path in &paths {
        engine.parse_file(path, None).unwrap();
    }
    assert_eq!(engine.cached_file_count(), 2);
    assert!(!engine.is_cached(&paths[0]));
    assert!(engine.is_cached(&paths[1]));
    assert!(engine.is_cached(&paths[2]));

    engine.set_maximum_cached_files(1);
    assert_eq!(engine.cached_file_count(), 1);
    assert!(engine.is_cached(&paths[2]));
}

#[test]
fn test_zero_capacity_caches_nothing() {
    let fixture = Fixture::with_source("<?php class A { const X = 1; }");
    let engine = fixture.engine_with(EngineConfig {
        max_cached_files: Some(0),
        ..EngineConfig::default()
    });
    let path = fixture.path("main.php");

    let first = engine.parse_file(&path, None).unwrap();
    let second = engine.parse_file(&path, None).unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(engine.cached_file_count(), 0);

    // reflection still works, it just reparses
    let class = engine.reflect_class("A").unwrap();
    assert!(class.has_constant("X").unwrap());
}

#[test]
fn test_missing_file_is_an_io_error() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let err = engine
        .parse_file(&fixture.path("absent.php"), None)
        .unwrap_err();
    assert!(matches!(err, ReflectionError::Io { .. }));
    assert!(err.to_string().contains("absent.php"));
}

#[test]
fn test_same_file_through_different_paths() {
    let fixture = Fixture::with_source("<?php class A {}");
    std::fs::create_dir_all(fixture.path("sub")).unwrap();
    let engine = fixture.engine();

    let direct = engine.parse_file(&fixture.path("main.php"), None).unwrap();
    let dotted = engine
        .parse_file(&fixture.path("sub/../main.php"), None)
        .unwrap();
    assert!(Rc::ptr_eq(&direct, &dotted));
}
