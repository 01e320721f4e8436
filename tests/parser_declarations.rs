mod common;

use common::Fixture;
use php_reflection::core::value::Val;
use php_reflection::parser::ast::printer::print_expr;
use php_reflection::parser::ast::{ClassKind, ClassLike, ClassMember, Expr, Stmt};
use php_reflection::parser::{parse_expression, parse_source, parse_source_lenient};
use php_reflection::reflection::{ClassReflector, EngineConfig, ReflectionError};

fn classes(statements: &[Stmt]) -> Vec<&ClassLike> {
    statements
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Namespace(ns) => Some(ns),
            _ => None,
        })
        .flat_map(|ns| ns.statements.iter())
        .filter_map(|stmt| match stmt {
            Stmt::ClassLike(class) => Some(class.as_ref()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_class_declaration_shape() {
    let code = br#"<?php
namespace Shop;

use Vendor\Money;

/**
 * An order.
 */
#[Entity]
abstract class Order extends Money implements \JsonSerializable, Payable
{
    use HasItems;

    const STATUS = 'open';

    private ?int $id = null;

    public function __construct(public readonly string $ref) {}

    abstract protected function total(): float;
}
"#;
    let statements = parse_source(code).unwrap();
    let found = classes(&statements);
    assert_eq!(found.len(), 1);
    let order = found[0];

    assert_eq!(order.kind, ClassKind::Class);
    assert_eq!(order.name, "Order");
    assert_eq!(order.namespaced_name, "Shop\\Order");
    assert_eq!(order.doc_comment.as_deref(), Some("/**\n * An order.\n */"));
    assert_eq!(order.start_line, 10);
    assert_eq!(order.end_line, 21);

    let parent = order.parent.as_ref().unwrap();
    assert_eq!(parent.resolved_or_text(), "Vendor\\Money");
    let interfaces: Vec<_> = order.interfaces.iter().map(|n| n.resolved_or_text()).collect();
    assert_eq!(interfaces, ["JsonSerializable", "Shop\\Payable"]);

    let kinds: Vec<_> = order
        .members
        .iter()
        .map(|member| match member {
            ClassMember::TraitUse(_) => "use",
            ClassMember::Const(_) => "const",
            ClassMember::Property(_) => "property",
            ClassMember::Method(_) => "method",
            ClassMember::Case(_) => "case",
        })
        .collect();
    assert_eq!(kinds, ["use", "const", "property", "method", "method"]);

    let constructor = order.find_method("__CONSTRUCT").unwrap();
    assert!(constructor.has_body);
    assert!(constructor.params[0].modifiers.has_visibility());
    assert!(!order.find_method("total").unwrap().has_body);
}

#[test]
fn test_file_without_namespace_gets_global_section() {
    let statements = parse_source(b"<?php declare(strict_types=1); class A {} function f() {}")
        .unwrap();
    assert!(matches!(statements[0], Stmt::Declare(_)));
    let Stmt::Namespace(global) = &statements[1] else {
        panic!("expected a namespace wrapper");
    };
    assert!(global.name.is_none());
    assert_eq!(global.statements.len(), 2);
}

#[test]
fn test_strict_parse_reports_first_error_line() {
    let code = b"<?php\nclass Good {}\nclass Bad extends {}\n";
    let failure = parse_source(code).unwrap_err();
    assert_eq!(failure.line, 3);
    assert!(!failure.errors.is_empty());

    let (statements, errors) = parse_source_lenient(code);
    assert!(!errors.is_empty());
    assert_eq!(classes(&statements)[0].name, "Good");
}

#[test]
fn test_engine_parse_modes() {
    let fixture = Fixture::with_source("<?php\nclass Good {}\nclass Bad extends {}\n");

    let strict = fixture.engine();
    let err = strict.parse_file(&fixture.path("main.php"), None).unwrap_err();
    let ReflectionError::Parse { line, .. } = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(*line, 3);
    assert!(strict.reflect_class("Good").is_err());

    let lenient = fixture.engine_with(EngineConfig {
        strict_parsing: false,
        ..EngineConfig::default()
    });
    let good = lenient.reflect_class("Good").unwrap();
    assert_eq!(good.name(), "Good");
}

#[test]
fn test_standalone_expressions_print_back() {
    let expr = parse_expression("[self::A => 'x', ...\\Other::LIST]").unwrap();
    assert_eq!(print_expr(&expr), "[self::A => 'x', ...\\Other::LIST]");

    let expr = parse_expression("\"Hello $name\"").unwrap();
    assert!(matches!(expr.as_ref(), Expr::Opaque { .. }));

    assert!(parse_expression("1 +").is_err());
}

#[test]
fn test_heredoc_and_nowdoc_constants() {
    let fixture = Fixture::with_source(
        "<?php\nclass Texts {\n    const RAW = <<<'EOT'\n    raw $text\n    EOT;\n    const PLAIN = <<<EOT\n    plain\n    EOT;\n}\n",
    );
    let engine = fixture.engine();
    let texts = engine.reflect_class("Texts").unwrap();

    assert_eq!(
        texts.constant("RAW").unwrap(),
        Some(Val::string("raw $text"))
    );
    assert_eq!(
        texts.constant("PLAIN").unwrap(),
        Some(Val::string("plain"))
    );
}
