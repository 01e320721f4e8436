mod common;

use common::Fixture;
use php_reflection::core::value::Val;
use php_reflection::reflection::{
    ClassReflector, ReflectionError, ReflectionFile, ReflectionFileNamespace,
};

const MULTI_NAMESPACE: &str = r#"<?php
declare(strict_types=1);

/**
 * Storage layer.
 */
namespace App\Storage;

use Vendor\Package\Client;
use Vendor\Package\Logger as Log;
use Lib\{Alpha, Beta as B};
use function strlen;
use const PHP_EOL;

const DRIVER = 'file';
const PATH = '/tmp/' . DRIVER;
define('LEGACY_MODE', true);

/** Opens the store. */
function open(string $path = PATH, int ...$flags): bool {
    return true;
}

interface Store {}
final class FileStore implements Store {}

namespace App\Cache;

const TTL = 60, MAX_TTL = TTL * 10;

function &lookup(array $keys) {}

class Pool {}
"#;

fn load(fixture: &Fixture) -> ReflectionFile {
    let path = fixture.write("storage.php", MULTI_NAMESPACE);
    ReflectionFile::new(fixture.engine(), path).unwrap()
}

#[test]
fn test_file_lists_namespaces_in_order() {
    let fixture = Fixture::new();
    let file = load(&fixture);

    let names: Vec<_> = file.file_namespaces().keys().cloned().collect();
    assert_eq!(names, ["App\\Storage", "App\\Cache"]);
    assert!(file.has_file_namespace("\\app\\storage"));
    assert!(!file.has_file_namespace("App"));
    assert!(file.is_strict_mode());
    assert_eq!(file.declare("strict_types"), Some(Val::Int(1)));
    assert_eq!(file.declare("ticks"), None);
}

#[test]
fn test_namespace_metadata() {
    let fixture = Fixture::new();
    let file = load(&fixture);
    let storage = file.file_namespace("App\\Storage").unwrap();
    let cache = file.file_namespace("App\\Cache").unwrap();

    assert!(storage.doc_comment().unwrap().contains("Storage layer."));
    assert_eq!(cache.doc_comment(), None);
    assert_eq!(storage.start_line(), 7);
    assert!(storage.end_line() < cache.start_line());
    assert!(storage.last_token_position() <= cache.last_token_position());
    assert_eq!(storage.file_name(), file.name());
}

#[test]
fn test_namespace_aliases() {
    let fixture = Fixture::new();
    let file = load(&fixture);
    let storage = file.file_namespace("App\\Storage").unwrap();

    let aliases = storage.namespace_aliases();
    let pairs: Vec<_> = aliases
        .iter()
        .map(|(alias, name)| (alias.as_str(), name.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("Client", "Vendor\\Package\\Client"),
            ("Log", "Vendor\\Package\\Logger"),
            ("Alpha", "Lib\\Alpha"),
            ("B", "Lib\\Beta"),
        ]
    );

    let cache = file.file_namespace("App\\Cache").unwrap();
    assert!(cache.namespace_aliases().is_empty());
}

#[test]
fn test_namespace_constants() {
    let fixture = Fixture::new();
    let file = load(&fixture);
    let storage = file.file_namespace("App\\Storage").unwrap();

    let constants = storage.constants().unwrap();
    assert_eq!(
        constants.keys().collect::<Vec<_>>(),
        ["DRIVER", "PATH", "LEGACY_MODE"]
    );
    assert_eq!(constants["PATH"], Val::string("/tmp/file"));
    assert_eq!(storage.constant("LEGACY_MODE").unwrap(), Some(Val::Bool(true)));
    assert!(storage.has_constant("DRIVER"));
    assert!(!storage.has_constant("driver"));
    assert_eq!(storage.constant("TTL").unwrap(), None);

    let cache = file.file_namespace("App\\Cache").unwrap();
    assert_eq!(cache.constant("MAX_TTL").unwrap(), Some(Val::Int(600)));
}

#[test]
fn test_namespace_functions() {
    let fixture = Fixture::new();
    let file = load(&fixture);
    let storage = file.file_namespace("App\\Storage").unwrap();

    let functions = storage.functions();
    assert_eq!(functions.keys().collect::<Vec<_>>(), ["App\\Storage\\open"]);
    let open = storage.function("open").unwrap();
    assert_eq!(open.short_name(), "open");
    assert_eq!(open.namespace_name(), "App\\Storage");
    assert!(open.in_namespace());
    assert!(open.doc_comment().unwrap().contains("Opens the store."));
    assert_eq!(open.number_of_parameters(), 2);
    assert_eq!(open.number_of_required_parameters(), 0);
    assert_eq!(open.return_type().unwrap().to_string(), "bool");

    let params = open.parameters();
    assert_eq!(params[0].name(), "path");
    assert_eq!(params[0].default_value().unwrap(), Val::string("App\\Storage\\PATH"));
    assert_eq!(
        params[0].default_value_constant_name().unwrap().as_deref(),
        Some("App\\Storage\\PATH")
    );
    assert!(params[1].is_variadic());
    assert!(params[1].is_optional());

    let cache = file.file_namespace("App\\Cache").unwrap();
    let lookup = cache.function("App\\Cache\\lookup").unwrap();
    assert!(lookup.returns_reference());
    assert_eq!(lookup.number_of_required_parameters(), 1);
}

#[test]
fn test_namespace_classes() {
    let fixture = Fixture::new();
    let file = load(&fixture);
    let storage = file.file_namespace("App\\Storage").unwrap();

    let classes = storage.classes();
    assert_eq!(
        classes.keys().collect::<Vec<_>>(),
        ["App\\Storage\\Store", "App\\Storage\\FileStore"]
    );
    let store = storage.class("filestore").unwrap();
    assert!(store.is_final());
    assert!(store.implements_interface("App\\Storage\\Store").unwrap());
    assert!(storage.has_class("App\\Storage\\Store"));
    assert!(!storage.has_class("Pool"));
}

#[test]
fn test_global_namespace_of_plain_file() {
    let fixture = Fixture::with_source(
        r#"<?php
        const A = 1;
        define('B', A + 1);
        function helper() {}
        class Plain {}
        "#,
    );
    let engine = fixture.engine();
    let file = ReflectionFile::new(engine.clone(), fixture.path("main.php")).unwrap();

    assert!(!file.is_strict_mode());
    let global = file.file_namespace("").unwrap();
    assert_eq!(global.name(), "");
    assert_eq!(global.constant("B").unwrap(), Some(Val::Int(2)));
    assert!(global.function("helper").is_some());
    assert!(global.has_class("Plain"));

    let direct = ReflectionFileNamespace::new(engine, &fixture.path("main.php"), "").unwrap();
    assert_eq!(direct.constants().unwrap().len(), 2);
}

#[test]
fn test_unknown_namespace_is_not_found() {
    let fixture = Fixture::with_source("<?php namespace Known;");
    let engine = fixture.engine();

    let err = ReflectionFileNamespace::new(engine, &fixture.path("main.php"), "Unknown")
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, ReflectionError::NotFound { .. }));
}

#[test]
fn test_self_referencing_namespace_constant() {
    let fixture = Fixture::with_source(
        r#"<?php
        namespace Loop;
        const A = B;
        const B = A;
        "#,
    );
    let file = ReflectionFile::new(fixture.engine(), fixture.path("main.php")).unwrap();
    let namespace = file.file_namespace("Loop").unwrap();

    assert!(matches!(
        namespace.constant("A"),
        Err(ReflectionError::Resolution { .. })
    ));
}
