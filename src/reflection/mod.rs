pub mod cache;
pub mod class;
pub mod class_constant;
pub mod context;
pub mod engine;
pub mod error;
pub mod file;
pub mod function;
pub mod host;
pub mod locator;
pub mod method;
pub mod namespace;
pub mod native;
pub mod parameter;
pub mod property;
pub mod reflector;
pub mod resolver;
pub mod summary;
pub mod types;

pub use cache::{SourceCache, SourceFile};
pub use class::ReflectionClass;
pub use class_constant::ReflectionClassConstant;
pub use context::{EvaluationContext, Scope};
pub use engine::{EngineBuilder, EngineConfig, ReflectionEngine};
pub use error::{EntityKind, ReflectionError, Result};
pub use file::ReflectionFile;
pub use function::ReflectionFunction;
pub use host::{HostEnvironment, NativeClass};
pub use locator::{ChainLocator, ClassMapLocator, Locator, Psr4Locator};
pub use method::ReflectionMethod;
pub use namespace::ReflectionFileNamespace;
pub use native::NativeReflectionClass;
pub use parameter::ReflectionParameter;
pub use property::ReflectionProperty;
pub use reflector::{ClassRef, ClassReflector};
pub use resolver::{ExpressionValue, NodeExpressionResolver};
pub use types::ReflectionType;
