//! Extension → dialect registry. An explicit, immutable value constructed
//! once and passed to every caller that needs it — there is no process-wide
//! parser table to mutate.

use crate::error::{ConfigurationError, Error, UnsupportedExtensionError};
use crate::module_record::{
    ImportScanner, ModuleCompiler, ModuleDialect, ModuleRecord, NativeModuleParser,
};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;

pub struct ParserRegistry {
    parsers: IndexMap<String, ModuleDialect>,
    compiler: ModuleCompiler,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.parsers)
            .finish_non_exhaustive()
    }
}

impl ParserRegistry {
    /// Build a registry from `(extension, dialect_name)` pairs (extensions
    /// without the leading dot). Total-or-absent: every pair naming an
    /// unknown dialect is collected and reported in one
    /// [`ConfigurationError`]; partial validity is never observable.
    pub fn build(
        mapping: impl IntoIterator<Item = (String, String)>,
        scanner: Rc<dyn ImportScanner>,
        native_parser: Rc<dyn NativeModuleParser>,
    ) -> Result<Self, Error> {
        let mut parsers = IndexMap::new();
        let mut unknown = Vec::new();
        for (extension, dialect_name) in mapping {
            match ModuleDialect::from_name(&dialect_name) {
                Some(dialect) => {
                    parsers.insert(extension, dialect);
                }
                None => unknown.push((extension, dialect_name)),
            }
        }
        if !unknown.is_empty() {
            return Err(ConfigurationError { entries: unknown }.into());
        }
        debug!(extensions = parsers.len(), "built parser registry");
        Ok(Self {
            parsers,
            compiler: ModuleCompiler::new(scanner, native_parser),
        })
    }

    /// The stock extension table: `clo` → native, `scr` → legacy,
    /// `json` → data.
    pub fn with_default_extensions(
        scanner: Rc<dyn ImportScanner>,
        native_parser: Rc<dyn NativeModuleParser>,
    ) -> Self {
        let parsers = [
            ("clo", ModuleDialect::Native),
            ("scr", ModuleDialect::Legacy),
            ("json", ModuleDialect::Data),
        ]
        .into_iter()
        .map(|(extension, dialect)| (extension.to_owned(), dialect))
        .collect();
        Self {
            parsers,
            compiler: ModuleCompiler::new(scanner, native_parser),
        }
    }

    pub fn dialect_for(&self, extension: &str) -> Option<ModuleDialect> {
        self.parsers.get(extension).copied()
    }

    /// Compile a record for the file at `location`, dispatching on its
    /// extension.
    pub fn record_for(&self, source: &[u8], location: &str) -> Result<ModuleRecord, Error> {
        let extension = extension_of(location);
        let dialect = extension
            .and_then(|extension| self.parsers.get(extension))
            .copied()
            .ok_or_else(|| UnsupportedExtensionError {
                extension: extension.map(str::to_owned),
                location: location.to_owned(),
            })?;
        self.compiler.compile(dialect, source, location)
    }
}

/// The extension of the final path segment, without the dot.
fn extension_of(location: &str) -> Option<&str> {
    let segment = location.rsplit('/').next().unwrap_or(location);
    match segment.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => Some(extension),
        _ => None,
    }
}
