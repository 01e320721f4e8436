mod common;

use common::{Fixture, list, php_array, reflect};
use php_reflection::core::value::Val;
use php_reflection::parser::parse_expression;
use php_reflection::reflection::resolver::evaluate;
use php_reflection::reflection::{
    ClassReflector, EvaluationContext, ReflectionEngine, ReflectionError, ReflectionFile,
};

fn eval(source: &str) -> Val {
    let engine = ReflectionEngine::builder().with_core_builtins().build();
    let context = EvaluationContext::standalone(engine);
    let expr = parse_expression(source).unwrap();
    evaluate(&expr, &context).unwrap().value
}

#[test]
fn test_standalone_expressions() {
    assert_eq!(eval("PHP_VERSION_ID >= 80000"), Val::Bool(true));
    assert_eq!(eval("'a' . 'b' . 1.5"), Val::string("ab1.5"));
    assert_eq!(eval("1 << 4 | 1"), Val::Int(17));
    assert_eq!(eval("!0"), Val::Bool(true));
    assert_eq!(eval("10 % 4 + 2 ** -1"), Val::Float(2.5));
    assert_eq!(
        eval("['x' => 1, 2, 'x' => 3]"),
        php_array(vec![("x", Val::Int(3)), ("0", Val::Int(2))])
    );
    assert_eq!(
        eval("[5 => 'a', 'b']"),
        php_array(vec![(5i64, Val::string("a")), (6i64, Val::string("b"))])
    );
    // magic constants outside any declaration are empty
    assert_eq!(eval("__FILE__"), Val::string(""));
    assert_eq!(eval("__CLASS__"), Val::string(""));
    assert_eq!(eval("__LINE__"), Val::Int(1));
}

#[test]
fn test_class_constants_resolve_self_parent_and_static() {
    let (_fixture, engine, _) = reflect(
        r#"<?php
        class Base {
            const NAME = 'base';
            const LABEL = self::NAME . '!';
        }

        class Child extends Base {
            const NAME = 'child';
            const PARENT_NAME = parent::NAME;
            const OWN = static::NAME;
            const CLASS_NAME = self::class;
        }
        "#,
        "Child",
    );

    let child = engine.reflect_class("Child").unwrap();
    assert_eq!(child.constant("PARENT_NAME").unwrap(), Some(Val::string("base")));
    assert_eq!(child.constant("OWN").unwrap(), Some(Val::string("child")));
    assert_eq!(child.constant("CLASS_NAME").unwrap(), Some(Val::string("Child")));
    // evaluated where it is declared
    assert_eq!(child.constant("LABEL").unwrap(), Some(Val::string("base!")));
}

#[test]
fn test_array_constants_and_unpacking() {
    let (_fixture, _engine, class) = reflect(
        r#"<?php
        class Lists {
            const A = [1, 2];
            const ALL = [...self::A, 'c' => 3];
            const SECOND = self::A[1];
            const NESTED = ['k' => ['deep' => true]];
        }
        "#,
        "Lists",
    );

    assert_eq!(
        class.constant("ALL").unwrap(),
        Some(php_array(vec![
            ("0", Val::Int(1)),
            ("1", Val::Int(2)),
            ("c", Val::Int(3)),
        ]))
    );
    assert_eq!(class.constant("SECOND").unwrap(), Some(Val::Int(2)));
    assert_eq!(
        class.constant("NESTED").unwrap(),
        Some(php_array(vec![(
            "k",
            php_array(vec![("deep", Val::Bool(true))])
        )]))
    );
    assert_eq!(class.constant("A").unwrap(), Some(list(vec![Val::Int(1), Val::Int(2)])));
}

#[test]
fn test_magic_constants_in_property_defaults() {
    let fixture = Fixture::with_source(
        r#"<?php
namespace App\Models;
class User {
    public $class = __CLASS__;
    public $ns = __NAMESPACE__;
    public $line = __LINE__;
    public $dir = __DIR__;
    public $file = __FILE__;
}
"#,
    );
    let engine = fixture.engine();
    let user = engine.reflect_class("App\\Models\\User").unwrap();
    let defaults = user.as_source().unwrap().default_properties().unwrap();

    let file = std::fs::canonicalize(fixture.path("main.php")).unwrap();
    let dir = file.parent().unwrap();
    assert_eq!(defaults["class"], Val::string("App\\Models\\User"));
    assert_eq!(defaults["ns"], Val::string("App\\Models"));
    assert_eq!(defaults["line"], Val::Int(6));
    assert_eq!(defaults["dir"], Val::string(dir.display().to_string()));
    assert_eq!(defaults["file"], Val::string(file.display().to_string()));
}

#[test]
fn test_parameter_defaults_keep_constant_names() {
    let (_fixture, _engine, class) = reflect(
        r#"<?php
        class Config {
            const PREFIX = 'app';

            public function load(
                $a = self::PREFIX,
                $b = PHP_EOL,
                $c = [1, 2],
                $d = self::PREFIX . '-x',
                $e = \PHP_INT_SIZE * 2,
                $f = null,
                $g = self::class
            ) {}
        }
        "#,
        "Config",
    );

    let load = class.method("load").unwrap().unwrap();
    let params = load.parameters().unwrap();
    assert_eq!(params.len(), 7);

    let a = &params[0];
    assert_eq!(a.default_value().unwrap(), Val::string("self::PREFIX"));
    assert!(a.is_default_value_constant().unwrap());
    assert_eq!(a.default_value_constant_name().unwrap().as_deref(), Some("self::PREFIX"));

    let b = &params[1];
    assert_eq!(b.default_value().unwrap(), Val::string("PHP_EOL"));
    assert_eq!(b.default_value_constant_name().unwrap().as_deref(), Some("PHP_EOL"));

    assert_eq!(params[2].default_value().unwrap(), list(vec![Val::Int(1), Val::Int(2)]));
    assert!(!params[2].is_default_value_constant().unwrap());

    let d = &params[3];
    assert_eq!(d.default_value().unwrap(), Val::string("self::PREFIX . '-x'"));
    assert!(!d.is_default_value_constant().unwrap());

    assert_eq!(params[4].default_value().unwrap(), Val::Int(16));
    assert_eq!(params[5].default_value().unwrap(), Val::Null);
    assert!(!params[5].is_default_value_constant().unwrap());
    assert_eq!(params[6].default_value().unwrap(), Val::string("Config"));
}

#[test]
fn test_enum_case_in_constant_is_null() {
    let (_fixture, _engine, class) = reflect(
        r#"<?php
        enum Suit {
            case Hearts;
            case Spades;
            const Wild = self::Spades;
            const Count = 2;
        }
        "#,
        "Suit",
    );

    assert_eq!(class.constant("Wild").unwrap(), Some(Val::Null));
    assert_eq!(class.constant("Count").unwrap(), Some(Val::Int(2)));
}

#[test]
fn test_unresolvable_class_constant_is_an_error() {
    let (_fixture, _engine, class) = reflect(
        r#"<?php
        class Broken {
            const MISSING = self::NOPE;
            const ELSEWHERE = Nowhere::VALUE;
            const SAFE = false && Nowhere::VALUE;
        }
        "#,
        "Broken",
    );

    assert!(matches!(
        class.constant("MISSING"),
        Err(ReflectionError::Resolution { .. })
    ));
    assert!(matches!(
        class.constant("ELSEWHERE"),
        Err(ReflectionError::Resolution { .. })
    ));
    assert_eq!(class.constant("SAFE").unwrap(), Some(Val::Bool(false)));
}

#[test]
fn test_namespace_constants_fall_back_to_global_section() {
    let fixture = Fixture::new();
    let path = fixture.write(
        "consts.php",
        r#"<?php
        namespace {
            const ROOT = '/srv';
        }

        namespace App {
            const HOME = ROOT . '/app';
            const LIMIT = PHP_INT_SIZE * 4;
            const FLAGS = [HOME, \ROOT];
        }
        "#,
    );
    let engine = fixture.engine();
    let file = ReflectionFile::new(engine, &path).unwrap();
    let app = file.file_namespace("App").unwrap();

    assert_eq!(app.constant("HOME").unwrap(), Some(Val::string("/srv/app")));
    assert_eq!(app.constant("LIMIT").unwrap(), Some(Val::Int(32)));
    assert_eq!(
        app.constant("FLAGS").unwrap(),
        Some(list(vec![Val::string("/srv/app"), Val::string("/srv")]))
    );
    assert_eq!(app.constant("ROOT").unwrap(), None);
}

const SCOPED_MAGIC: &str = r#"<?php
namespace App;

trait Tagged {
    public $t = __TRAIT__;
    public $c = __CLASS__;
}

class K {
    use Tagged;

    const M = __METHOD__;
    const F = __FUNCTION__;
    const T = __TRAIT__;

    public function run($a = __METHOD__, $b = __FUNCTION__, $c = __TRAIT__) {}
}

function helper($f = __FUNCTION__, $m = __METHOD__) {}
"#;

#[test]
fn test_method_and_function_magic_constants() {
    let (fixture, engine, k) = reflect(SCOPED_MAGIC, "App\\K");

    assert_eq!(k.constant("M").unwrap(), Some(Val::string("")));
    assert_eq!(k.constant("F").unwrap(), Some(Val::string("")));
    assert_eq!(k.constant("T").unwrap(), Some(Val::string("")));

    let run = k.method("run").unwrap().unwrap();
    let params = run.parameters().unwrap();
    assert_eq!(params[0].default_value().unwrap(), Val::string("App\\K::run"));
    assert!(!params[0].is_default_value_constant().unwrap());
    assert_eq!(params[1].default_value().unwrap(), Val::string("run"));
    assert_eq!(params[2].default_value().unwrap(), Val::string(""));

    let file = ReflectionFile::new(engine, fixture.path("main.php")).unwrap();
    let helper = file.file_namespace("App").unwrap().function("helper").unwrap();
    let params = helper.parameters();
    assert_eq!(params[0].default_value().unwrap(), Val::string("App\\helper"));
    assert_eq!(params[1].default_value().unwrap(), Val::string(""));
}

#[test]
fn test_trait_property_defaults_rebind_to_using_class() {
    let (_fixture, engine, k) = reflect(SCOPED_MAGIC, "App\\K");

    let tagged = engine.reflect_class("App\\Tagged").unwrap();
    let own = tagged.as_source().unwrap().default_properties().unwrap();
    assert_eq!(own["t"], Val::string("App\\Tagged"));
    assert_eq!(own["c"], Val::string("App\\Tagged"));

    let imported = k.as_source().unwrap().default_properties().unwrap();
    assert_eq!(imported["t"], Val::string(""));
    assert_eq!(imported["c"], Val::string("App\\K"));
    assert_eq!(k.property("t").unwrap().unwrap().class(), "App\\K");
}
