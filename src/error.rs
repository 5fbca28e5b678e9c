//! Typed error surface. Every failure mode of the core is a nameable type
//! carrying enough context (offending name, location, or aggregated list)
//! to render a precise diagnostic; nothing is reported as a bare string.

use ariadne::{Config, Label, Report, ReportKind, Source};
use std::fmt;
use std::io::Cursor;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    SourceSyntax(#[from] SourceSyntaxError),
    #[error(transparent)]
    UnboundName(#[from] UnboundNameError),
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),
    #[error(transparent)]
    UnsupportedExtension(#[from] UnsupportedExtensionError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl Error {
    /// Attach a module location to errors that can carry one and do not
    /// have one yet. Used when a module compiler translates an inner
    /// failure so the origin survives the translation.
    pub(crate) fn with_location(mut self, location: &str) -> Self {
        match &mut self {
            Error::SourceSyntax(error) if error.location.is_none() => {
                error.location = Some(location.to_owned());
            }
            Error::TypeMismatch(error) if error.location.is_none() => {
                error.location = Some(location.to_owned());
            }
            _ => {}
        }
        self
    }
}

/// One spanned problem inside malformed source.
#[derive(Debug, Clone)]
pub struct SyntaxIssue {
    pub span: Range<usize>,
    pub message: String,
}

/// Malformed expression or program text. Surfaced as a compile failure,
/// never retried.
#[derive(Debug, Clone)]
pub struct SourceSyntaxError {
    pub location: Option<String>,
    pub issues: Vec<SyntaxIssue>,
}

impl fmt::Display for SourceSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse source")?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        for (index, issue) in self.issues.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{}", issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for SourceSyntaxError {}

/// A reference to a name outside the final capability set. Always a
/// programming error in the evaluated source.
#[derive(Debug, Clone)]
pub struct UnboundNameError {
    pub name: String,
    pub span: Option<Range<usize>>,
}

impl fmt::Display for UnboundNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot find name '{}' in the capability scope", self.name)
    }
}

impl std::error::Error for UnboundNameError {}

/// The caller handed a module compiler the wrong shape of argument. Fails
/// fast, before any evaluation attempt.
#[derive(Debug, Clone)]
pub struct TypeMismatchError {
    pub argument: &'static str,
    pub expected: &'static str,
    pub location: Option<String>,
}

impl fmt::Display for TypeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot compile module: {} must be {}",
            self.argument, self.expected,
        )?;
        if let Some(location) = &self.location {
            write!(f, " (module at {location})")?;
        }
        Ok(())
    }
}

impl std::error::Error for TypeMismatchError {}

/// Registry dispatch miss: no parser is configured for the location's
/// extension.
#[derive(Debug, Clone)]
pub struct UnsupportedExtensionError {
    pub extension: Option<String>,
    pub location: String,
}

impl fmt::Display for UnsupportedExtensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(extension) => write!(
                f,
                "cannot compile module at {}, no parser configured for extension '{extension}'",
                self.location,
            ),
            None => write!(
                f,
                "cannot compile module at {}, the location has no extension",
                self.location,
            ),
        }
    }
}

impl std::error::Error for UnsupportedExtensionError {}

/// Registry construction failure: every `(extension, dialect)` pair with an
/// unknown dialect name, aggregated. The registry is total-or-absent, so a
/// single bad entry fails the whole build.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    pub entries: Vec<(String, String)>,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .entries
            .iter()
            .map(|(extension, dialect)| format!("'{dialect}' for extension '{extension}'"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "no parser available for dialect: {entries}")
    }
}

impl std::error::Error for ConfigurationError {}

/// A runtime fault inside well-formed evaluated code: calling a
/// non-function, arity mismatch, field access on the wrong kind of value,
/// a linker-contract violation, and so on.
#[derive(Debug, Clone)]
pub struct ExecutionError {
    pub message: String,
    pub span: Option<Range<usize>>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExecutionError {}

/// Render an error against its source as a plain-text ariadne report.
/// Errors that carry no span fall back to their `Display` form.
pub fn report_to_string(error: &Error, filename: &str, source: &str) -> String {
    let labels: Vec<(Range<usize>, String)> = match error {
        Error::SourceSyntax(error) => error
            .issues
            .iter()
            .map(|issue| (issue.span.clone(), issue.message.clone()))
            .collect(),
        Error::UnboundName(inner) => match &inner.span {
            Some(span) => vec![(span.clone(), inner.to_string())],
            None => vec![],
        },
        Error::Execution(inner) => match &inner.span {
            Some(span) => vec![(span.clone(), inner.to_string())],
            None => vec![],
        },
        _ => vec![],
    };

    if labels.is_empty() {
        return format!("error: {error}");
    }

    let start = labels.iter().map(|(span, _)| span.start).min().unwrap_or(0);
    let end = labels.iter().map(|(span, _)| span.end).max().unwrap_or(0);

    let mut report_bytes = Cursor::new(Vec::new());
    let mut report = Report::build(ReportKind::Error, (filename, start..end))
        .with_config(Config::default().with_color(false))
        .with_message(error.to_string());
    for (span, message) in labels {
        report = report.with_label(Label::new((filename, span)).with_message(message));
    }
    let _ = report
        .finish()
        .write((filename, Source::from(source)), &mut report_bytes);
    String::from_utf8_lossy(report_bytes.get_ref()).into_owned()
}
