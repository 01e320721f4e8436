//! End-to-end runs of the php-reflect binary.

mod common;

use common::Fixture;
use serde_json::Value;
use std::process::{Command, Output};

const SOURCE: &str = r#"<?php
namespace App;

interface Named {}

abstract class Base {
    const VERSION = 2;
    protected $id = 7;
}

final class K extends Base implements Named {
    const LIMIT = self::VERSION * 10;

    public function run(int $a = 1): string {
        return '';
    }
}
"#;

fn fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.write("src/K.php", SOURCE);
    fixture
}

fn php_reflect(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_php-reflect"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run php-reflect")
}

#[test]
fn test_json_summary_of_located_class() {
    let fixture = fixture();
    let dir = fixture.path("src");
    let output = php_reflect(&["--dir", dir.to_str().unwrap(), "--json", "App\\K"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let classes = json.as_array().unwrap();
    assert_eq!(classes.len(), 1);

    let k = &classes[0];
    assert_eq!(k["name"], "App\\K");
    assert_eq!(k["kind"], "class");
    assert_eq!(k["is_final"], true);
    assert_eq!(k["is_abstract"], false);
    assert_eq!(k["parent"], "App\\Base");
    assert_eq!(k["interfaces"], serde_json::json!(["App\\Named"]));
    assert_eq!(k["constants"]["LIMIT"], 20);
    assert_eq!(k["constants"]["VERSION"], 2);

    let id = &k["properties"][0];
    assert_eq!(id["name"], "id");
    assert_eq!(id["class"], "App\\Base");
    assert_eq!(id["visibility"], "protected");
    assert_eq!(id["default"], 7);

    let run = &k["methods"][0];
    assert_eq!(run["name"], "run");
    assert_eq!(run["return_type"], "string");
    assert_eq!(run["parameters"][0]["type"], "int");
    assert_eq!(run["parameters"][0]["default"], "1");
}

#[test]
fn test_file_mode_prints_declarations() {
    let fixture = fixture();
    let file = fixture.path("src/K.php");
    let output = php_reflect(&["--file", file.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("interface App\\Named"));
    assert!(stdout.contains("abstract class App\\Base"));
    assert!(stdout.contains("final class App\\K extends App\\Base implements App\\Named"));
    assert!(stdout.contains("  const LIMIT = 20;"));
    assert!(stdout.contains("  public function run(int $a = 1): string"));
}

#[test]
fn test_unknown_class_fails() {
    let fixture = fixture();
    let dir = fixture.path("src");
    let output = php_reflect(&["--dir", dir.to_str().unwrap(), "App\\Missing"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to reflect App\\Missing"));
    assert!(stderr.contains("Class App\\Missing was not found"));
}
