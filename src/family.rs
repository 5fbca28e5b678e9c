//! The evaluator factory: binds a fixed base capability set and a fixed
//! list of configured transform hooks into a reusable family of evaluators,
//! one entry point per evaluation mode.

use crate::capabilities::Capabilities;
use crate::error::Error;
use crate::evaluator::{self, Value};
use crate::transform::{self, EvalMode, EvalSettings, TransformHook};
use smallvec::SmallVec;
use tracing::debug;

/// Per-call options. Call-scoped hooks run before the family's configured
/// hooks, giving them the first opportunity to shape both capabilities and
/// source.
#[derive(Default)]
pub struct EvalOptions {
    pub hooks: Vec<TransformHook>,
}

pub struct EvaluatorFamily {
    base: Capabilities,
    configured: Vec<TransformHook>,
}

impl EvaluatorFamily {
    pub fn new(base: Capabilities, configured: Vec<TransformHook>) -> Self {
        Self { base, configured }
    }

    /// Evaluate `source` as a single expression.
    pub fn evaluate(
        &self,
        source: &str,
        capabilities: Capabilities,
        options: EvalOptions,
    ) -> Result<Value, Error> {
        self.run(EvalMode::Expression, source, capabilities, options)
    }

    /// Evaluate `source` as an expression the caller has already asserted
    /// to be expression-shaped. Same runtime contract as [`Self::evaluate`].
    pub fn evaluate_expression(
        &self,
        source: &str,
        capabilities: Capabilities,
        options: EvalOptions,
    ) -> Result<Value, Error> {
        self.run(EvalMode::AssertedExpression, source, capabilities, options)
    }

    /// Evaluate `source` as a statement sequence.
    pub fn evaluate_program(
        &self,
        source: &str,
        capabilities: Capabilities,
        options: EvalOptions,
    ) -> Result<Value, Error> {
        self.run(EvalMode::Program, source, capabilities, options)
    }

    fn run(
        &self,
        mode: EvalMode,
        source: &str,
        capabilities: Capabilities,
        options: EvalOptions,
    ) -> Result<Value, Error> {
        let capabilities = self.base.merged_with(&capabilities);
        let settings = EvalSettings {
            source: source.to_owned(),
            mode,
            capabilities,
        };
        let pipeline: SmallVec<[&TransformHook; 4]> = options
            .hooks
            .iter()
            .chain(self.configured.iter())
            .collect();
        debug!(?mode, hooks = pipeline.len(), "running evaluator");
        let settings = transform::apply_pipeline(&pipeline, settings);
        evaluator::evaluate(&settings)
    }
}

/// Expression-mode evaluation with no base capabilities and no configured
/// hooks.
pub fn evaluate(source: &str, capabilities: Capabilities) -> Result<Value, Error> {
    EvaluatorFamily::new(Capabilities::new(), Vec::new()).evaluate(
        source,
        capabilities,
        EvalOptions::default(),
    )
}

/// Asserted-expression-mode sibling of [`evaluate`].
pub fn evaluate_expression(source: &str, capabilities: Capabilities) -> Result<Value, Error> {
    EvaluatorFamily::new(Capabilities::new(), Vec::new()).evaluate_expression(
        source,
        capabilities,
        EvalOptions::default(),
    )
}

/// Program-mode sibling of [`evaluate`].
pub fn evaluate_program(source: &str, capabilities: Capabilities) -> Result<Value, Error> {
    EvaluatorFamily::new(Capabilities::new(), Vec::new()).evaluate_program(
        source,
        capabilities,
        EvalOptions::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_and_call_capabilities_merge() {
        let family = EvaluatorFamily::new(
            Capabilities::from([
                ("foo", Value::Number(1.0)),
                ("bar", Value::Number(2.0)),
            ]),
            Vec::new(),
        );
        let result = family
            .evaluate(
                "foo + bar",
                Capabilities::from([("bar", Value::Number(5.0))]),
                EvalOptions::default(),
            )
            .unwrap();
        assert_eq!(result, Value::Number(6.0));
    }

    #[test]
    fn test_mode_is_fixed_per_entry_point() {
        let family = EvaluatorFamily::new(Capabilities::new(), Vec::new());
        assert!(family
            .evaluate("123; 234", Capabilities::new(), EvalOptions::default())
            .is_err());
        assert!(family
            .evaluate_expression("123; 234", Capabilities::new(), EvalOptions::default())
            .is_err());
        assert_eq!(
            family
                .evaluate_program("123; 234", Capabilities::new(), EvalOptions::default())
                .unwrap(),
            Value::Number(234.0),
        );
    }

    #[test]
    fn test_configured_hook_applies_to_every_call() {
        let family = EvaluatorFamily::new(
            Capabilities::new(),
            vec![TransformHook::extending(|mut capabilities| {
                capabilities.insert("granted", Value::Number(9.0));
                capabilities
            })],
        );
        assert_eq!(
            family
                .evaluate("granted", Capabilities::new(), EvalOptions::default())
                .unwrap(),
            Value::Number(9.0),
        );
    }
}
