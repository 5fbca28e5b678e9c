//! Cloister: a capability-scoped execution core for the Cloister scripting
//! dialect.
//!
//! The crate has two halves. The evaluator half executes untrusted source
//! with an explicitly granted set of named capabilities and nothing else in
//! scope, behind a composable pipeline of capability-extending and
//! source-rewriting hooks. The module half classifies source files by
//! dialect, discovers their dependencies without running them, and produces
//! uniform module records a linker can wire together; legacy-dialect
//! records execute through the same sandboxed evaluator.
//!
//! ```
//! use cloister::{evaluate, Capabilities, Value};
//!
//! let result = evaluate("1 + a", Capabilities::from([("a", Value::Number(2.0))])).unwrap();
//! assert_eq!(result, Value::Number(3.0));
//! ```

pub mod capabilities;
pub mod error;
pub mod evaluator;
pub mod family;
pub mod module_record;
pub mod parser;
pub mod registry;
pub mod transform;

pub use capabilities::Capabilities;
pub use error::{
    ConfigurationError, Error, ExecutionError, SourceSyntaxError, TypeMismatchError,
    UnboundNameError, UnsupportedExtensionError,
};
pub use evaluator::{ExportsCell, NativeFunction, RecordHandle, Value};
pub use family::{EvalOptions, EvaluatorFamily, evaluate, evaluate_expression, evaluate_program};
pub use module_record::{
    ImportScanner, ModuleCompiler, ModuleDialect, ModuleExecutor, ModuleRecord,
    NativeModuleParser, ResolvedImports,
};
pub use registry::ParserRegistry;
pub use transform::{EvalMode, EvalSettings, TransformHook};
