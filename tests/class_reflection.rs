mod common;

use common::{Fixture, reflect};
use php_reflection::core::value::Val;
use php_reflection::reflection::resolver::evaluate;
use php_reflection::reflection::{
    ClassReflector, EvaluationContext, ReflectionClass, ReflectionError, Scope,
};
use std::rc::Rc;

#[test]
fn test_direct_constant_overrides_inherited() {
    let (_fixture, engine, _) = reflect(
        r#"<?php
        namespace App;

        class Base {
            const A = 1;
            const B = 'base';
        }

        class Child extends Base {
            const A = 2;
        }
        "#,
        "App\\Base",
    );

    let child = engine.reflect_class("App\\Child").unwrap();
    let constants = child.constants().unwrap();
    assert_eq!(constants.get("A"), Some(&Val::Int(2)));
    assert_eq!(constants.get("B"), Some(&Val::string("base")));
    assert_eq!(constants.keys().collect::<Vec<_>>(), ["A", "B"]);
    assert_eq!(child.constant("B").unwrap(), Some(Val::string("base")));
    assert!(!child.has_constant("C").unwrap());
}

#[test]
fn test_constant_expression_is_not_a_constant_reference() {
    let (_fixture, engine, class) = reflect(
        r#"<?php
        const SOME_CONST = 42;

        final class X {
            const C = 1 + 2 * 3;
            const D = SOME_CONST;
            const E = UNKNOWN_THING;
        }
        "#,
        "X",
    );
    let source = class.as_source().unwrap().source().clone();
    let context = EvaluationContext::new(engine.clone(), Scope::Class)
        .with_source(source)
        .with_class(class.clone());

    let (_, c) = engine.parse_class_constant("X", "C").unwrap();
    let value = evaluate(&c.value, &context).unwrap();
    assert_eq!(value.value, Val::Int(7));
    assert!(!value.is_constant);
    assert_eq!(value.constant_name, None);

    let (_, d) = engine.parse_class_constant("X", "D").unwrap();
    let value = evaluate(&d.value, &context).unwrap();
    assert_eq!(value.value, Val::Int(42));
    assert!(value.is_constant);
    assert_eq!(value.constant_name.as_deref(), Some("SOME_CONST"));

    let (_, e) = engine.parse_class_constant("X", "E").unwrap();
    let value = evaluate(&e.value, &context).unwrap();
    assert_eq!(value.value, Val::Null);
    assert!(value.is_constant);
    assert_eq!(value.constant_name.as_deref(), Some("UNKNOWN_THING"));

    assert!(class.is_final());
}

#[test]
fn test_parent_class_is_cached() {
    let (_fixture, engine, class) = reflect(
        r#"<?php
        class Base {}
        class Child extends Base {}
        class Orphan {}
        "#,
        "Child",
    );

    let first = class.parent_class().unwrap().unwrap();
    let second = class.parent_class().unwrap().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "Base");
    assert_eq!(class.parent_class_name().as_deref(), Some("Base"));

    let orphan = engine.reflect_class("Orphan").unwrap();
    assert!(orphan.parent_class().unwrap().is_none());
    assert!(orphan.parent_class().unwrap().is_none());
}

#[test]
fn test_interface_with_methods_is_abstract() {
    let (_fixture, engine, runner) = reflect(
        r#"<?php
        interface Runner {
            public function run(): void;
        }

        interface Marker {}

        interface Sized extends \Countable {}
        "#,
        "Runner",
    );

    assert!(runner.is_interface());
    assert!(runner.is_abstract().unwrap());
    let run = runner.method("run").unwrap().unwrap();
    assert!(run.is_abstract());
    assert!(run.is_public());

    let marker = engine.reflect_class("Marker").unwrap();
    assert!(!marker.is_abstract().unwrap());

    // methods inherited from a parent interface count too
    let sized = engine.reflect_class("Sized").unwrap();
    assert!(sized.is_abstract().unwrap());
    assert!(sized.has_method("count").unwrap());
}

#[test]
fn test_is_subclass_of_walks_parent_chain_only() {
    let (_fixture, engine, _) = reflect(
        r#"<?php
        namespace Zoo;

        interface Animal {}
        class Creature implements Animal {}
        class Mammal extends Creature {}
        class Cat extends Mammal {}
        "#,
        "Zoo\\Cat",
    );

    let cat = engine.reflect_class("Zoo\\Cat").unwrap();
    assert!(cat.is_subclass_of("Zoo\\Mammal").unwrap());
    assert!(cat.is_subclass_of("\\zoo\\creature").unwrap());
    assert!(!cat.is_subclass_of("Zoo\\Cat").unwrap());
    assert!(!cat.is_subclass_of("Zoo\\Animal").unwrap());
    assert!(cat.implements_interface("Zoo\\Animal").unwrap());
}

#[test]
fn test_interfaces_are_collected_transitively() {
    let (_fixture, engine, _) = reflect(
        r#"<?php
        interface First {}
        interface Second extends First {}
        class P implements Second {}
        class Q extends P implements \Countable {
            public function count(): int { return 0; }
        }
        "#,
        "Q",
    );

    let q = engine.reflect_class("Q").unwrap();
    assert_eq!(q.interface_names().unwrap(), ["Second", "First", "Countable"]);
    assert!(q.implements_interface("first").unwrap());
    assert!(!q.implements_interface("Traversable").unwrap());
}

#[test]
fn test_methods_prefer_direct_declarations() {
    let (_fixture, _engine, child) = reflect(
        r#"<?php
        class Base {
            public function run() {}
            protected function helper() {}
            private function secret() {}
        }

        class Child extends Base {
            public function run() {}
            final public static function extra() {}
        }
        "#,
        "Child",
    );

    let names: Vec<_> = child
        .methods()
        .unwrap()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, ["run", "extra", "helper", "secret"]);

    assert_eq!(child.method("RUN").unwrap().unwrap().class(), "Child");
    let helper = child.method("helper").unwrap().unwrap();
    assert_eq!(helper.class(), "Base");
    assert!(helper.is_protected());

    let extra = child.method("extra").unwrap().unwrap();
    assert!(extra.is_static());
    assert!(extra.is_final());
    assert_eq!(extra.declaring_class().unwrap().name(), "Child");
}

#[test]
fn test_trait_methods_follow_adaptations() {
    let (_fixture, _engine, person) = reflect(
        r#"<?php
        trait Greets {
            public function hello() {}
            public function bye() {}
        }

        trait Waves {
            public function hello() {}
        }

        class Person {
            use Greets, Waves {
                Greets::hello insteadof Waves;
                Waves::hello as wave;
                bye as protected;
            }
        }
        "#,
        "Person",
    );

    let names: Vec<_> = person
        .methods()
        .unwrap()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, ["hello", "bye", "wave"]);

    let wave = person.method("wave").unwrap().unwrap();
    assert_eq!(wave.class(), "Person");
    assert_eq!(wave.declared_name(), "hello");
    assert!(person.method("bye").unwrap().unwrap().is_protected());

    let source = person.as_source().unwrap();
    assert_eq!(source.trait_names(), ["Greets", "Waves"]);
    assert_eq!(source.traits().len(), 2);
}

#[test]
fn test_properties_skip_private_parent_members() {
    let (_fixture, engine, user) = reflect(
        r#"<?php
        class Model {
            public $id;
            protected ?string $name = null;
            private $secret = 'x';
            public static $count = 0;
        }

        class User extends Model {
            public $id = 5;
            public readonly int $age;
        }
        "#,
        "User",
    );

    let names: Vec<_> = user
        .properties()
        .unwrap()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, ["id", "age", "name", "count"]);
    assert!(!user.has_property("secret").unwrap());
    // still listed on the declaring class
    let model = engine.reflect_class("Model").unwrap();
    assert!(model.has_property("secret").unwrap());

    let age = user.property("age").unwrap().unwrap();
    assert!(age.is_readonly());
    assert!(!age.has_default_value());
    assert_eq!(age.type_().unwrap().to_string(), "int");

    let source = user.as_source().unwrap();
    let defaults = source.default_properties().unwrap();
    assert_eq!(defaults.get("id"), Some(&Val::Int(5)));
    assert_eq!(defaults.get("name"), Some(&Val::Null));
    assert!(!defaults.contains_key("age"));
    assert_eq!(
        source.static_properties().unwrap().get("count"),
        Some(&Val::Int(0))
    );
}

#[test]
fn test_instantiable_and_cloneable() {
    let (_fixture, engine, _) = reflect(
        r#"<?php
        abstract class Shape {}

        class Secret {
            private function __construct() {}
            private function __clone() {}
        }

        class Open {}

        interface Contract {}
        "#,
        "Open",
    );

    let class = |name: &str| engine.reflect_source_class(name).unwrap();

    assert!(!class("Shape").is_instantiable().unwrap());
    assert!(!class("Shape").is_cloneable().unwrap());
    assert!(!class("Secret").is_instantiable().unwrap());
    assert!(!class("Secret").is_cloneable().unwrap());
    assert!(class("Open").is_instantiable().unwrap());
    assert!(class("Open").is_cloneable().unwrap());
    assert!(!class("Contract").is_instantiable().unwrap());
    assert_eq!(
        class("Shape").modifiers() & ReflectionClass::IS_EXPLICIT_ABSTRACT,
        ReflectionClass::IS_EXPLICIT_ABSTRACT
    );
}

#[test]
fn test_backed_enum() {
    let (_fixture, _engine, suit) = reflect(
        r#"<?php
        enum Suit: string {
            case Hearts = 'H';
            case Spades = 'S';

            const Wild = self::Spades;
        }
        "#,
        "Suit",
    );

    assert!(suit.is_enum());
    assert!(suit.is_final());
    assert!(suit.implements_interface("UnitEnum").unwrap());
    assert!(suit.implements_interface("BackedEnum").unwrap());
    assert!(suit.has_method("tryFrom").unwrap());

    let source = suit.as_source().unwrap();
    assert_eq!(source.cases(), ["Hearts", "Spades"]);
    assert_eq!(
        source.case_value("Hearts").unwrap(),
        Some(Val::string("H"))
    );
    assert_eq!(source.backing_type().unwrap().to_string(), "string");

    let constants = suit.constants().unwrap();
    assert_eq!(constants.get("Wild"), Some(&Val::Null));
    assert!(!constants.contains_key("Hearts"));
}

#[test]
fn test_cyclic_hierarchy_terminates() {
    let (_fixture, engine, a) = reflect(
        r#"<?php
        class A extends B {
            public function fromA() {}
        }
        class B extends A {
            public function fromB() {}
        }
        "#,
        "A",
    );

    assert!(!a.is_subclass_of("Nope").unwrap());
    assert!(a.interfaces().unwrap().is_empty());
    let names: Vec<_> = a
        .methods()
        .unwrap()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, ["fromA", "fromB"]);
    assert!(engine.reflect_class("B").unwrap().constants().unwrap().is_empty());
}

#[test]
fn test_native_parent_class() {
    let (_fixture, _engine, error) = reflect(
        r#"<?php
        namespace App;

        class DomainError extends \RuntimeException {}
        "#,
        "App\\DomainError",
    );

    let parent = error.parent_class().unwrap().unwrap();
    assert_eq!(parent.name(), "RuntimeException");
    assert!(parent.is_internal());
    assert!(error.is_subclass_of("Exception").unwrap());
    assert!(error.implements_interface("Throwable").unwrap());
    assert!(error.has_method("getMessage").unwrap());
}

#[test]
fn test_self_referencing_constant_is_an_error() {
    let (_fixture, _engine, class) = reflect(
        r#"<?php
        class Loop {
            const A = self::B;
            const B = self::A;
            const OK = 1;
        }
        "#,
        "Loop",
    );

    let err = class.constants().unwrap_err();
    assert!(matches!(err, ReflectionError::Resolution { .. }));
    // other members are unaffected
    assert_eq!(class.constant("OK").unwrap(), Some(Val::Int(1)));
    let ok = class
        .as_source()
        .unwrap()
        .reflection_constant("OK")
        .unwrap()
        .unwrap();
    assert_eq!(ok.value().unwrap(), Val::Int(1));
}

#[test]
fn test_constants_across_files() {
    let fixture = Fixture::new();
    fixture.write(
        "src/Config.php",
        r#"<?php
        namespace App;

        class Config {
            const TIMEOUT = 30;
            const PATHS = ['cache' => '/tmp', 'logs' => '/var/log'];
        }
        "#,
    );
    fixture.write(
        "src/Client.php",
        r#"<?php
        namespace App;

        use App\Config as Settings;

        class Client {
            const TIMEOUT = Settings::TIMEOUT * 2;
            const LOGS = Config::PATHS['logs'];
            const NAME = Settings::class;
        }
        "#,
    );
    let engine = fixture.engine();

    let client = engine.reflect_class("App\\Client").unwrap();
    assert_eq!(client.constant("TIMEOUT").unwrap(), Some(Val::Int(60)));
    assert_eq!(client.constant("LOGS").unwrap(), Some(Val::string("/var/log")));
    assert_eq!(client.constant("NAME").unwrap(), Some(Val::string("App\\Config")));
    assert_eq!(engine.cached_file_count(), 2);
}

#[test]
fn test_unknown_class_in_constant_is_a_resolution_error() {
    let (_fixture, _engine, class) = reflect(
        r#"<?php
        class Broken {
            const A = Missing::VALUE;
        }
        "#,
        "Broken",
    );
    let err = class.constant("A").unwrap_err();
    assert!(matches!(err, ReflectionError::Resolution { .. }));
}

#[test]
fn test_method_parameters() {
    let (_fixture, _engine, service) = reflect(
        r#"<?php
        namespace App;

        const LIMIT = 10;

        class Service {
            const PREFIX = 'svc';

            /**
             * Runs the service.
             */
            public function run(
                int $count = LIMIT,
                string $mode = self::PREFIX,
                $label = self::PREFIX . '-x',
                ?array $opts = null,
                \DateTime $when = null,
                &$out = [1, 2],
                ...$rest
            ): ?int {
                return null;
            }
        }
        "#,
        "App\\Service",
    );

    let run = service.method("run").unwrap().unwrap();
    assert_eq!(run.number_of_parameters(), 7);
    assert_eq!(run.number_of_required_parameters(), 0);
    assert!(run.doc_comment().unwrap().contains("Runs the service."));
    assert_eq!(run.return_type().unwrap().to_string(), "?int");

    let params = run.parameters().unwrap();
    let count = &params[0];
    assert!(count.is_default_value_constant().unwrap());
    assert_eq!(
        count.default_value_constant_name().unwrap().as_deref(),
        Some("App\\LIMIT")
    );

    let mode = &params[1];
    assert_eq!(mode.default_value().unwrap(), Val::string("self::PREFIX"));
    assert_eq!(
        mode.default_value_constant_name().unwrap().as_deref(),
        Some("self::PREFIX")
    );

    let label = &params[2];
    assert_eq!(
        label.default_value().unwrap(),
        Val::string("self::PREFIX . '-x'")
    );
    assert!(!label.is_default_value_constant().unwrap());

    let opts = &params[3];
    assert!(opts.allows_null());
    assert_eq!(opts.default_value().unwrap(), Val::Null);
    assert!(!opts.is_default_value_constant().unwrap());

    let when = &params[4];
    assert_eq!(when.type_().unwrap().to_string(), "?DateTime");

    let out = &params[5];
    assert!(out.is_passed_by_reference());
    assert_eq!(out.default_value_text().as_deref(), Some("[1, 2]"));

    let rest = &params[6];
    assert!(rest.is_variadic());
    assert!(rest.is_optional());
    assert!(!rest.has_default_value());
    assert!(rest.default_value().is_err());
}
