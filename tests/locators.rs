mod common;

use common::Fixture;
use php_reflection::core::value::Val;
use php_reflection::reflection::{
    ChainLocator, ClassMapLocator, ClassReflector, EntityKind, HostEnvironment, Locator,
    NativeClass, Psr4Locator, ReflectionEngine, ReflectionError,
};

fn psr4_fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.write(
        "src/Http/Controller.php",
        r#"<?php
        namespace App\Http;

        use App\Support\Helpers;

        abstract class Controller {
            const VERSION = Helpers::VERSION;
        }
        "#,
    );
    fixture.write(
        "src/Support/Helpers.php",
        r#"<?php
        namespace App\Support;

        final class Helpers {
            const VERSION = '2.1';
        }
        "#,
    );
    fixture.write(
        "lib/Legacy.php",
        r#"<?php
        class Legacy_Thing {}
        interface Legacy_Contract {}
        "#,
    );
    fixture
}

#[test]
fn test_psr4_maps_prefix_to_directory() {
    let fixture = psr4_fixture();
    let locator = Psr4Locator::new().with("App\\", fixture.path("src"));

    assert_eq!(
        locator.locate_class("App\\Http\\Controller"),
        Some(fixture.path("src/Http/Controller.php"))
    );
    assert_eq!(
        locator.locate_class("\\App\\Support\\Helpers"),
        Some(fixture.path("src/Support/Helpers.php"))
    );
    assert_eq!(locator.locate_class("App\\Missing"), None);
    assert_eq!(locator.locate_class("Other\\Http\\Controller"), None);
}

#[test]
fn test_longest_psr4_prefix_wins() {
    let fixture = psr4_fixture();
    fixture.write("alt/Controller.php", "<?php namespace App\\Http; class Controller {}");
    let locator = Psr4Locator::new()
        .with("App", fixture.path("src"))
        .with("App\\Http\\", fixture.path("alt"));

    assert_eq!(
        locator.locate_class("App\\Http\\Controller"),
        Some(fixture.path("alt/Controller.php"))
    );
    assert_eq!(
        locator.locate_class("App\\Support\\Helpers"),
        Some(fixture.path("src/Support/Helpers.php"))
    );
}

#[test]
fn test_class_map_scan_indexes_nested_files() {
    let fixture = psr4_fixture();
    fixture.write("src/notes.txt", "class NotPhp {}");
    let locator = fixture.class_map();

    assert_eq!(locator.len(), 4);
    assert_eq!(
        locator.locate_class("legacy_contract"),
        Some(fixture.path("lib/Legacy.php"))
    );
    assert_eq!(
        locator.locate_class("App\\Http\\Controller"),
        Some(fixture.path("src/Http/Controller.php"))
    );
    assert_eq!(locator.locate_class("NotPhp"), None);
}

#[test]
fn test_engine_resolves_across_psr4_files() {
    let fixture = psr4_fixture();
    let engine = ReflectionEngine::builder()
        .with_locator(Psr4Locator::new().with("App\\", fixture.path("src")))
        .with_core_builtins()
        .build();

    let controller = engine.reflect_class("App\\Http\\Controller").unwrap();
    assert!(controller.is_abstract().unwrap());
    assert_eq!(
        controller.constant("VERSION").unwrap(),
        Some(Val::string("2.1"))
    );
    assert_eq!(engine.cached_file_count(), 2);
}

#[test]
fn test_chain_falls_through_locators() {
    let fixture = psr4_fixture();
    let chain = ChainLocator::new()
        .with(Psr4Locator::new().with("App\\", fixture.path("src")))
        .with(ClassMapLocator::new().with("Legacy_Thing", fixture.path("lib/Legacy.php")));
    assert_eq!(chain.len(), 2);

    let engine = ReflectionEngine::builder().with_locator(chain).build();
    assert!(engine.reflect_class("Legacy_Thing").is_ok());
    assert!(engine.reflect_class("App\\Support\\Helpers").unwrap().is_final());
    assert!(engine.locate_class_file("Legacy_Contract").is_err());
}

#[test]
fn test_missing_class_and_members_are_not_found() {
    let fixture = Fixture::with_source(
        r#"<?php
        class Known {
            public $prop;
            const C = 1;
            public function run() {}
        }
        "#,
    );
    let engine = fixture.engine();

    let err = engine.locate_class_file("Unknown").unwrap_err();
    assert!(matches!(
        err,
        ReflectionError::NotFound {
            kind: EntityKind::Class,
            ..
        }
    ));
    assert_eq!(err.to_string(), "Class Unknown was not found");

    assert!(engine.parse_class_method("Known", "run").is_ok());
    let err = engine.parse_class_method("Known", "walk").unwrap_err();
    assert!(matches!(
        err,
        ReflectionError::NotFound {
            kind: EntityKind::Method,
            ..
        }
    ));
    assert_eq!(err.to_string(), "Method walk was not found in Known");

    assert!(engine.parse_class_property("Known", "prop").is_ok());
    assert!(engine.parse_class_property("Known", "other").unwrap_err().is_not_found());
    assert!(engine.parse_class_constant("Known", "C").is_ok());
    assert!(engine.parse_class_constant("Known", "D").unwrap_err().is_not_found());
}

#[test]
fn test_located_file_without_the_class() {
    let fixture = Fixture::with_source("<?php class Other {}");
    let engine = ReflectionEngine::builder()
        .with_locator(ClassMapLocator::new().with("Wanted", fixture.path("main.php")))
        .build();

    let err = engine.parse_class("Wanted").unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("main.php"));
}

#[test]
fn test_native_class_with_file_is_parsed() {
    let fixture = Fixture::with_source(
        r#"<?php
        class Extension {
            public function hook() {}
        }
        "#,
    );
    let mut host = HostEnvironment::new();
    host.register_class(NativeClass::class("Extension").in_file(fixture.path("main.php")));
    let engine = ReflectionEngine::builder().with_host(host).build();

    assert_eq!(
        engine.locate_class_file("Extension").unwrap(),
        fixture.path("main.php")
    );
    let class = engine.reflect_class("Extension").unwrap();
    assert!(class.as_source().is_some());
    assert!(class.has_method("hook").unwrap());
}
