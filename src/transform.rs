//! Transform hooks: pluggable units that may extend the capability set
//! and/or rewrite source text before the evaluator runs.

use crate::capabilities::Capabilities;

/// How the evaluator treats the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// The source is the sole expression of the evaluation.
    Expression,
    /// Same runtime contract as [`EvalMode::Expression`]; used by callers
    /// that have already asserted expression shape upstream.
    AssertedExpression,
    /// The source is a statement sequence.
    Program,
}

/// The settings tuple threaded through the transform pipeline. Hooks receive
/// a value and return a replacement; nothing is mutated in place.
#[derive(Clone)]
pub struct EvalSettings {
    pub source: String,
    pub mode: EvalMode,
    pub capabilities: Capabilities,
}

type ExtendFn = dyn Fn(Capabilities) -> Capabilities;
type RewriteFn = dyn Fn(EvalSettings) -> EvalSettings;

/// A hook may supply an `extend` operation, a `rewrite` operation, both,
/// or neither.
#[derive(Default)]
pub struct TransformHook {
    extend: Option<Box<ExtendFn>>,
    rewrite: Option<Box<RewriteFn>>,
}

impl TransformHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extend(mut self, extend: impl Fn(Capabilities) -> Capabilities + 'static) -> Self {
        self.extend = Some(Box::new(extend));
        self
    }

    pub fn with_rewrite(mut self, rewrite: impl Fn(EvalSettings) -> EvalSettings + 'static) -> Self {
        self.rewrite = Some(Box::new(rewrite));
        self
    }

    /// A hook that only extends capabilities.
    pub fn extending(extend: impl Fn(Capabilities) -> Capabilities + 'static) -> Self {
        Self::new().with_extend(extend)
    }

    /// A hook that only rewrites source.
    pub fn rewriting(rewrite: impl Fn(EvalSettings) -> EvalSettings + 'static) -> Self {
        Self::new().with_rewrite(rewrite)
    }
}

/// Run the pipeline over `settings` in two strictly ordered phases.
///
/// Phase one applies every `extend` in pipeline order; phase two applies
/// every `rewrite` in the same order, with capabilities already finalized,
/// so a rewrite can rely on names injected by *any* hook's extension. Only
/// the rewritten `source` is taken from a rewrite's return value; `mode`
/// and the finalized capabilities are reinstated afterwards.
pub fn apply_pipeline(hooks: &[&TransformHook], mut settings: EvalSettings) -> EvalSettings {
    for hook in hooks {
        if let Some(extend) = &hook.extend {
            settings.capabilities = extend(settings.capabilities.clone());
        }
    }
    for hook in hooks {
        if let Some(rewrite) = &hook.rewrite {
            settings.source = rewrite(settings.clone()).source;
        }
    }
    settings
}
