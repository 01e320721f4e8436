use crate::core::value::Val;
use crate::parser::ast::{ClassKind, Modifiers};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// A class the host environment already knows without parsing.
#[derive(Debug, Clone)]
pub struct NativeClass {
    pub name: String,
    pub kind: ClassKind,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_final: bool,
    pub is_abstract: bool,
    /// Set for user classes the host has loaded from a file.
    pub file_name: Option<PathBuf>,
    pub constants: IndexMap<String, Val>,
    pub methods: Vec<NativeMethod>,
}

#[derive(Debug, Clone)]
pub struct NativeMethod {
    pub name: String,
    pub modifiers: Modifiers,
}

impl NativeClass {
    fn new(name: &str, kind: ClassKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            parent: None,
            interfaces: Vec::new(),
            is_final: false,
            is_abstract: false,
            file_name: None,
            constants: IndexMap::new(),
            methods: Vec::new(),
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, ClassKind::Class)
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name, ClassKind::Interface)
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// For interfaces these are the extended interfaces.
    pub fn implements(mut self, interfaces: &[&str]) -> Self {
        self.interfaces
            .extend(interfaces.iter().map(|name| name.to_string()));
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn in_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_name = Some(path.into());
        self
    }

    pub fn constant(mut self, name: &str, value: impl Into<Val>) -> Self {
        self.constants.insert(name.to_string(), value.into());
        self
    }

    pub fn method(self, name: &str) -> Self {
        self.method_with(name, Modifiers::PUBLIC)
    }

    pub fn method_with(mut self, name: &str, modifiers: Modifiers) -> Self {
        let modifiers = if self.kind == ClassKind::Interface {
            modifiers.with(Modifiers::ABSTRACT)
        } else {
            modifiers
        };
        self.methods.push(NativeMethod {
            name: name.to_string(),
            modifiers,
        });
        self
    }

    fn methods_named(self, names: &[&str]) -> Self {
        names.iter().fold(self, |class, name| class.method(name))
    }

    pub fn find_method(&self, name: &str) -> Option<&NativeMethod> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// Registry of natively known classes and constants.
///
/// Class lookups are case-insensitive, constant lookups case-sensitive.
#[derive(Debug, Default, Clone)]
pub struct HostEnvironment {
    classes: HashMap<String, Rc<NativeClass>>,
    constants: HashMap<String, Val>,
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core_builtins() -> Self {
        let mut host = Self::new();
        register_core_classes(&mut host);
        register_core_constants(&mut host);
        host
    }

    pub fn register_class(&mut self, class: NativeClass) {
        self.classes
            .insert(class.name.to_ascii_lowercase(), Rc::new(class));
    }

    pub fn define_constant(&mut self, name: &str, value: impl Into<Val>) {
        self.constants.insert(name.to_string(), value.into());
    }

    pub fn class(&self, name: &str) -> Option<Rc<NativeClass>> {
        let name = name.trim_start_matches('\\');
        self.classes.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    pub fn constant(&self, name: &str) -> Option<&Val> {
        self.constants.get(name.trim_start_matches('\\'))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }
}

fn register_core_classes(host: &mut HostEnvironment) {
    let public_static = Modifiers::PUBLIC.with(Modifiers::STATIC);
    let public_final = Modifiers::PUBLIC.with(Modifiers::FINAL);

    host.register_class(NativeClass::interface("Traversable"));
    host.register_class(
        NativeClass::interface("Iterator")
            .implements(&["Traversable"])
            .methods_named(&["current", "next", "key", "valid", "rewind"]),
    );
    host.register_class(
        NativeClass::interface("IteratorAggregate")
            .implements(&["Traversable"])
            .method("getIterator"),
    );
    host.register_class(NativeClass::interface("ArrayAccess").methods_named(&[
        "offsetExists",
        "offsetGet",
        "offsetSet",
        "offsetUnset",
    ]));
    host.register_class(NativeClass::interface("Countable").method("count"));
    host.register_class(NativeClass::interface("Stringable").method("__toString"));
    host.register_class(NativeClass::interface("JsonSerializable").method("jsonSerialize"));
    host.register_class(
        NativeClass::interface("Serializable").methods_named(&["serialize", "unserialize"]),
    );
    host.register_class(NativeClass::interface("UnitEnum").method_with("cases", public_static));
    host.register_class(
        NativeClass::interface("BackedEnum")
            .implements(&["UnitEnum"])
            .method_with("from", public_static)
            .method_with("tryFrom", public_static),
    );
    host.register_class(
        NativeClass::interface("Throwable")
            .implements(&["Stringable"])
            .methods_named(&[
                "getMessage",
                "getCode",
                "getFile",
                "getLine",
                "getTrace",
                "getPrevious",
                "getTraceAsString",
            ]),
    );

    for base in ["Exception", "Error"] {
        let mut class = NativeClass::class(base)
            .implements(&["Throwable"])
            .method("__construct")
            .method_with("__clone", Modifiers::PRIVATE)
            .method("__wakeup");
        for name in [
            "getMessage",
            "getCode",
            "getFile",
            "getLine",
            "getTrace",
            "getPrevious",
            "getTraceAsString",
        ] {
            class = class.method_with(name, public_final);
        }
        host.register_class(class.method("__toString"));
    }

    let hierarchy: &[(&str, &str)] = &[
        ("ErrorException", "Exception"),
        ("JsonException", "Exception"),
        ("LogicException", "Exception"),
        ("BadFunctionCallException", "LogicException"),
        ("BadMethodCallException", "BadFunctionCallException"),
        ("DomainException", "LogicException"),
        ("InvalidArgumentException", "LogicException"),
        ("LengthException", "LogicException"),
        ("OutOfRangeException", "LogicException"),
        ("RuntimeException", "Exception"),
        ("OutOfBoundsException", "RuntimeException"),
        ("OverflowException", "RuntimeException"),
        ("RangeException", "RuntimeException"),
        ("UnderflowException", "RuntimeException"),
        ("UnexpectedValueException", "RuntimeException"),
        ("TypeError", "Error"),
        ("ValueError", "Error"),
        ("ArithmeticError", "Error"),
        ("DivisionByZeroError", "ArithmeticError"),
        ("ArgumentCountError", "TypeError"),
        ("AssertionError", "Error"),
        ("UnhandledMatchError", "Error"),
    ];
    for (name, parent) in hierarchy {
        host.register_class(NativeClass::class(name).extends(parent));
    }

    host.register_class(
        NativeClass::class("ArrayIterator")
            .implements(&["Iterator", "ArrayAccess", "Countable", "Serializable"])
            .methods_named(&[
                "__construct",
                "current",
                "next",
                "key",
                "valid",
                "rewind",
                "offsetExists",
                "offsetGet",
                "offsetSet",
                "offsetUnset",
                "count",
                "serialize",
                "unserialize",
                "getArrayCopy",
            ])
            .constant("STD_PROP_LIST", 1i64)
            .constant("ARRAY_AS_PROPS", 2i64),
    );
    host.register_class(
        NativeClass::class("ArrayObject")
            .implements(&["IteratorAggregate", "ArrayAccess", "Countable", "Serializable"])
            .methods_named(&[
                "__construct",
                "getIterator",
                "offsetExists",
                "offsetGet",
                "offsetSet",
                "offsetUnset",
                "count",
                "serialize",
                "unserialize",
                "getArrayCopy",
            ])
            .constant("STD_PROP_LIST", 1i64)
            .constant("ARRAY_AS_PROPS", 2i64),
    );
    host.register_class(NativeClass::class("stdClass"));
    host.register_class(
        NativeClass::class("Closure")
            .final_class()
            .method_with("__construct", Modifiers::PRIVATE)
            .method_with("bind", public_static)
            .methods_named(&["bindTo", "call"]),
    );
    host.register_class(
        NativeClass::class("Generator")
            .final_class()
            .implements(&["Iterator"])
            .methods_named(&[
                "current", "next", "key", "valid", "rewind", "send", "throw", "getReturn",
            ]),
    );
}

fn register_core_constants(host: &mut HostEnvironment) {
    let windows = cfg!(windows);
    host.define_constant("PHP_EOL", if windows { "\r\n" } else { "\n" });
    host.define_constant("PHP_INT_MAX", i64::MAX);
    host.define_constant("PHP_INT_MIN", i64::MIN);
    host.define_constant("PHP_INT_SIZE", 8i64);
    host.define_constant("PHP_FLOAT_EPSILON", f64::EPSILON);
    host.define_constant("PHP_FLOAT_MAX", f64::MAX);
    host.define_constant("PHP_FLOAT_MIN", f64::MIN_POSITIVE);
    host.define_constant("PHP_FLOAT_DIG", 15i64);
    host.define_constant("PHP_VERSION", "8.3.0");
    host.define_constant("PHP_MAJOR_VERSION", 8i64);
    host.define_constant("PHP_MINOR_VERSION", 3i64);
    host.define_constant("PHP_RELEASE_VERSION", 0i64);
    host.define_constant("PHP_VERSION_ID", 80300i64);

    let (os, family) = match std::env::consts::OS {
        "linux" => ("Linux", "Linux"),
        "macos" => ("Darwin", "Darwin"),
        "windows" => ("WINNT", "Windows"),
        "freebsd" => ("FreeBSD", "BSD"),
        "openbsd" => ("OpenBSD", "BSD"),
        "netbsd" => ("NetBSD", "BSD"),
        _ => ("Unknown", "Unknown"),
    };
    host.define_constant("PHP_OS", os);
    host.define_constant("PHP_OS_FAMILY", family);
    host.define_constant(
        "DIRECTORY_SEPARATOR",
        std::path::MAIN_SEPARATOR.to_string(),
    );
    host.define_constant("PATH_SEPARATOR", if windows { ";" } else { ":" });

    let error_levels: &[(&str, i64)] = &[
        ("E_ERROR", 1),
        ("E_WARNING", 2),
        ("E_PARSE", 4),
        ("E_NOTICE", 8),
        ("E_CORE_ERROR", 16),
        ("E_CORE_WARNING", 32),
        ("E_COMPILE_ERROR", 64),
        ("E_COMPILE_WARNING", 128),
        ("E_USER_ERROR", 256),
        ("E_USER_WARNING", 512),
        ("E_USER_NOTICE", 1024),
        ("E_STRICT", 2048),
        ("E_RECOVERABLE_ERROR", 4096),
        ("E_DEPRECATED", 8192),
        ("E_USER_DEPRECATED", 16384),
        ("E_ALL", 32767),
    ];
    let sort_flags: &[(&str, i64)] = &[
        ("SORT_REGULAR", 0),
        ("SORT_NUMERIC", 1),
        ("SORT_STRING", 2),
        ("SORT_DESC", 3),
        ("SORT_ASC", 4),
        ("SORT_LOCALE_STRING", 5),
        ("SORT_NATURAL", 6),
        ("SORT_FLAG_CASE", 8),
        ("COUNT_NORMAL", 0),
        ("COUNT_RECURSIVE", 1),
    ];
    let json_flags: &[(&str, i64)] = &[
        ("JSON_HEX_TAG", 1),
        ("JSON_HEX_AMP", 2),
        ("JSON_HEX_APOS", 4),
        ("JSON_HEX_QUOT", 8),
        ("JSON_FORCE_OBJECT", 16),
        ("JSON_NUMERIC_CHECK", 32),
        ("JSON_UNESCAPED_SLASHES", 64),
        ("JSON_PRETTY_PRINT", 128),
        ("JSON_UNESCAPED_UNICODE", 256),
        ("JSON_PARTIAL_OUTPUT_ON_ERROR", 512),
        ("JSON_PRESERVE_ZERO_FRACTION", 1024),
        ("JSON_UNESCAPED_LINE_TERMINATORS", 2048),
        ("JSON_OBJECT_AS_ARRAY", 1),
        ("JSON_BIGINT_AS_STRING", 2),
        ("JSON_INVALID_UTF8_IGNORE", 1_048_576),
        ("JSON_INVALID_UTF8_SUBSTITUTE", 2_097_152),
        ("JSON_THROW_ON_ERROR", 4_194_304),
    ];
    for (name, value) in error_levels.iter().chain(sort_flags).chain(json_flags) {
        host.define_constant(name, *value);
    }

    host.define_constant("M_PI", std::f64::consts::PI);
    host.define_constant("M_E", std::f64::consts::E);
    host.define_constant("M_SQRT2", std::f64::consts::SQRT_2);
    host.define_constant("M_LN2", std::f64::consts::LN_2);
    host.define_constant("M_LN10", std::f64::consts::LN_10);
    host.define_constant("INF", f64::INFINITY);
    host.define_constant("NAN", f64::NAN);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_builtins() {
        let host = HostEnvironment::with_core_builtins();
        let class = host.class("\\invalidargumentexception").unwrap();
        assert_eq!(class.name, "InvalidArgumentException");
        assert_eq!(class.parent.as_deref(), Some("LogicException"));
        assert!(host.class("Iterator").unwrap().find_method("rewind").is_some());
        assert_eq!(host.constant("PHP_INT_SIZE"), Some(&Val::Int(8)));
        assert_eq!(host.constant("php_int_size"), None);
    }

    #[test]
    fn test_empty_host() {
        let host = HostEnvironment::new();
        assert!(!host.has_class("Exception"));
        assert_eq!(host.constant_count(), 0);
    }
}
