//! Module-record compilation: classify a source file by dialect, discover
//! its dependencies without executing it, and produce a uniform record
//! (declared imports + a controlled execute routine) for a higher-level
//! linker.

use crate::capabilities::Capabilities;
use crate::error::{Error, ExecutionError, SourceSyntaxError, SyntaxIssue, TypeMismatchError};
use crate::evaluator::{self, ExportsCell, NativeFunction, RecordHandle, Value};
use crate::transform::{EvalMode, EvalSettings};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;

/// The three supported source-file kinds. Resolved once at registry-build
/// time; dispatch afterwards is a total match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleDialect {
    /// Declarative modules, compiled by an external parser collaborator.
    Native,
    /// Legacy shimmed modules, executed through the sandboxed evaluator.
    Legacy,
    /// Data modules: a single JSON document exported as `default`.
    Data,
}

impl ModuleDialect {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "native" => Some(Self::Native),
            "legacy" => Some(Self::Legacy),
            "data" => Some(Self::Data),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Legacy => "legacy",
            Self::Data => "data",
        }
    }
}

/// Discovers dependency specifiers in legacy module text. Pure: must never
/// execute the source.
pub trait ImportScanner {
    fn scan(&self, source: &str, location: &str) -> Result<Vec<String>, Error>;
}

/// Compiles declarative module text into a record. Opaque to this core
/// beyond the record shape.
pub trait NativeModuleParser {
    fn parse(&self, source: &str, location: &str) -> Result<ModuleRecord, Error>;
}

/// The execute routine supplied by a [`NativeModuleParser`].
pub trait ModuleExecutor {
    fn execute(&self, exports: &RecordHandle, resolved: &ResolvedImports) -> Result<(), Error>;
}

/// Specifier → already-linked namespace value, provided by the caller once
/// it has resolved a record's imports.
pub type ResolvedImports = IndexMap<String, Value>;

/// A compiled, not-yet-linked module: declared imports plus an execute
/// routine. Imports are discovered without running anything and preserve
/// the scanner's order and multiplicity.
pub struct ModuleRecord {
    imports: Vec<String>,
    body: ModuleBody,
}

enum ModuleBody {
    Legacy { source: String, location: String },
    Data { source: String, location: String },
    Delegated(Rc<dyn ModuleExecutor>),
}

impl std::fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("imports", &self.imports)
            .finish_non_exhaustive()
    }
}

impl ModuleRecord {
    /// A record whose execute routine is supplied by a collaborator
    /// (declarative modules).
    pub fn delegated(imports: Vec<String>, executor: Rc<dyn ModuleExecutor>) -> Self {
        Self {
            imports,
            body: ModuleBody::Delegated(executor),
        }
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Populate `exports` by running the module body against the resolved
    /// imports. For legacy modules this drives the sandboxed evaluator; the
    /// module's whole effect flows through the exports accessor and the
    /// completion value is discarded.
    pub fn execute(&self, exports: &RecordHandle, resolved: &ResolvedImports) -> Result<(), Error> {
        match &self.body {
            ModuleBody::Legacy { source, location } => {
                execute_legacy(source, location, &self.imports, exports, resolved)
            }
            ModuleBody::Data { source, location } => execute_data(source, location, exports),
            ModuleBody::Delegated(executor) => executor.execute(exports, resolved),
        }
    }
}

/// Dispatches a dialect to its compiler function, holding the collaborators
/// the dialects need.
pub struct ModuleCompiler {
    scanner: Rc<dyn ImportScanner>,
    native_parser: Rc<dyn NativeModuleParser>,
}

impl ModuleCompiler {
    pub fn new(scanner: Rc<dyn ImportScanner>, native_parser: Rc<dyn NativeModuleParser>) -> Self {
        Self {
            scanner,
            native_parser,
        }
    }

    pub fn compile(
        &self,
        dialect: ModuleDialect,
        source: &[u8],
        location: &str,
    ) -> Result<ModuleRecord, Error> {
        debug!(dialect = dialect.name(), location, "compiling module record");
        let source = text_source(source, location)?;
        match dialect {
            ModuleDialect::Native => self.native_parser.parse(source, location),
            ModuleDialect::Legacy => {
                // Imports must be known before anything runs: the linker
                // needs them to build the dependency graph ahead of
                // executing any code.
                let imports = self.scanner.scan(source, location)?;
                Ok(ModuleRecord {
                    imports,
                    body: ModuleBody::Legacy {
                        source: source.to_owned(),
                        location: location.to_owned(),
                    },
                })
            }
            ModuleDialect::Data => Ok(ModuleRecord {
                imports: Vec::new(),
                body: ModuleBody::Data {
                    source: source.to_owned(),
                    location: location.to_owned(),
                },
            }),
        }
    }
}

fn text_source<'source>(source: &'source [u8], location: &str) -> Result<&'source str, Error> {
    std::str::from_utf8(source).map_err(|_| {
        TypeMismatchError {
            argument: "source",
            expected: "text",
            location: Some(location.to_owned()),
        }
        .into()
    })
}

/// Run a legacy module body with a restricted capability set of exactly
/// four names: the dependency accessor, the live exports cell, the module's
/// location, and its containing directory.
fn execute_legacy(
    source: &str,
    location: &str,
    imports: &[String],
    exports: &RecordHandle,
    resolved: &ResolvedImports,
) -> Result<(), Error> {
    let acquire = {
        let imports = imports.to_vec();
        let resolved = resolved.clone();
        let location = location.to_owned();
        NativeFunction::new("acquire", move |arguments| {
            let [Value::Text(specifier)] = arguments else {
                return Err(ExecutionError {
                    message: "acquire expects a single text specifier".to_owned(),
                    span: None,
                }
                .into());
            };
            let specifier = specifier.as_ref();
            // Missing entries are linker-contract violations (a
            // graph-construction bug in the caller), not capability checks.
            let Some(namespace) = resolved.get(specifier) else {
                let message = if imports.iter().any(|import| import == specifier) {
                    format!(
                        "specifier '{specifier}' of module at {location} was never linked",
                    )
                } else {
                    format!(
                        "specifier '{specifier}' is not among the imports declared by the module at {location}",
                    )
                };
                return Err(ExecutionError {
                    message,
                    span: None,
                }
                .into());
            };
            Ok(unwrap_default_export(namespace))
        })
    };

    let mut capabilities = Capabilities::new();
    capabilities.insert("acquire", acquire);
    capabilities.insert("module", Value::Exports(ExportsCell::new(exports.clone())));
    capabilities.insert("source_path", Value::text(location));
    capabilities.insert("source_dir", Value::text(parent_directory(location)));

    let settings = EvalSettings {
        source: source.to_owned(),
        mode: EvalMode::Program,
        capabilities,
    };
    evaluator::evaluate(&settings)
        .map_err(|error| error.with_location(location))
        .map(|_completion| ())
}

/// A namespace whose `default` field is set stands in for that field; bare
/// namespaces are handed through unchanged.
fn unwrap_default_export(namespace: &Value) -> Value {
    if let Value::Record(fields) = namespace {
        if let Some(default) = fields.borrow().get("default") {
            if !matches!(default, Value::None) {
                return default.clone();
            }
        }
    }
    namespace.clone()
}

fn execute_data(source: &str, location: &str, exports: &RecordHandle) -> Result<(), Error> {
    let document: serde_json::Value = serde_json::from_str(source).map_err(|error| {
        // Translated, never the collaborator's raw error type; the original
        // message and the module location both survive.
        SourceSyntaxError {
            location: Some(location.to_owned()),
            issues: vec![SyntaxIssue {
                span: 0..source.len(),
                message: format!("cannot parse data module: {error}"),
            }],
        }
    })?;
    exports
        .borrow_mut()
        .insert("default".to_owned(), json_to_value(document));
    Ok(())
}

fn json_to_value(document: serde_json::Value) -> Value {
    match document {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(value) => Value::Bool(value),
        serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(text) => Value::text(text),
        serde_json::Value::Array(items) => {
            Value::list(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(fields) => Value::record(
            fields
                .into_iter()
                .map(|(name, value)| (name, json_to_value(value))),
        ),
    }
}

fn parent_directory(location: &str) -> String {
    location
        .rsplit_once('/')
        .map(|(directory, _)| format!("{directory}/"))
        .unwrap_or_default()
}
