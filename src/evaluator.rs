//! The sandboxed evaluator: runs Cloister script under exactly the granted
//! capability set.
//!
//! The execution scope is rooted at the capabilities and nowhere else — no
//! prelude, no builtin table, no host globals. Every helper in this module
//! is an ordinary Rust item, so nothing the evaluator uses internally is
//! reachable as a free name from evaluated code. Referencing a name outside
//! the capability set fails with `UnboundNameError`; the `self` keyword
//! alone degrades to `none` instead of failing, because it stands for the
//! ambient receiver the sandbox deliberately withholds.

use crate::error::{Error, ExecutionError, UnboundNameError};
use crate::parser::{
    self, ArithmeticOperator, Comparator, Expression, Literal, Span, Spanned, Statement,
};
use crate::transform::{EvalMode, EvalSettings};
use tracing::trace;

mod scope;
mod value;

pub use scope::{Scope, ScopeRef};
pub use value::{
    ExportsCell, ExportsHandle, LambdaValue, ListHandle, NativeFunction, RecordHandle, Value,
};

/// Evaluate `settings.source` in `settings.mode` with
/// `settings.capabilities` as the only names in scope.
pub fn evaluate(settings: &EvalSettings) -> Result<Value, Error> {
    trace!(
        mode = ?settings.mode,
        capabilities = settings.capabilities.len(),
        source_bytes = settings.source.len(),
        "evaluating",
    );
    let scope = Scope::root(&settings.capabilities);
    match settings.mode {
        EvalMode::Expression | EvalMode::AssertedExpression => {
            let expression = parser::parse_expression(&settings.source)?;
            eval_expression(&expression, &scope)
        }
        EvalMode::Program => {
            let statements = parser::parse_program(&settings.source)?;
            eval_statements(&statements, &scope)
        }
    }
}

/// Invoke a callable value from the host side, e.g. a lambda an evaluation
/// returned. Behaves exactly like a call inside evaluated code, with no
/// source span to blame.
pub fn call(callee: &Value, arguments: &[Value]) -> Result<Value, Error> {
    call_value(callee, arguments, Span::from(0..0))
}

/// Runs statements in order. The completion value is the value of the last
/// statement when it was an expression statement, `none` otherwise.
fn eval_statements(statements: &[Spanned<Statement>], scope: &ScopeRef) -> Result<Value, Error> {
    let mut completion = Value::None;
    for statement in statements {
        completion = match &statement.node {
            Statement::Let { name, value } => {
                let value = eval_expression(value, scope)?;
                Scope::define(scope, name, value);
                Value::None
            }
            Statement::Assign {
                object,
                field,
                value,
            } => {
                let target = eval_expression(object, scope)?;
                let value = eval_expression(value, scope)?;
                assign_field(&target, field, value, statement.span)?;
                Value::None
            }
            Statement::Expression(expression) => eval_expression(expression, scope)?,
        };
    }
    Ok(completion)
}

fn eval_expression(expression: &Spanned<Expression>, scope: &ScopeRef) -> Result<Value, Error> {
    let span = expression.span;
    match &expression.node {
        Expression::Literal(literal) => Ok(match literal {
            Literal::Number(number) => Value::Number(*number),
            Literal::Text(text) => Value::text(text),
            Literal::Bool(value) => Value::Bool(*value),
            Literal::None => Value::None,
        }),
        // The ambient receiver is never bound by the evaluator itself, at
        // any nesting depth; it only exists if the caller granted it.
        Expression::SelfRef => Ok(Scope::get(scope, "self").unwrap_or(Value::None)),
        Expression::Alias { name } => Scope::get(scope, name).ok_or_else(|| {
            UnboundNameError {
                name: name.clone(),
                span: Some(span.into_range()),
            }
            .into()
        }),
        Expression::List { items } => {
            let items = items
                .iter()
                .map(|item| eval_expression(item, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(items))
        }
        Expression::Record { fields } => {
            let mut evaluated = Vec::with_capacity(fields.len());
            for (name, value) in fields {
                evaluated.push((name.clone(), eval_expression(value, scope)?));
            }
            Ok(Value::record(evaluated))
        }
        Expression::Lambda { parameters, body } => Ok(Value::Lambda(
            LambdaValue {
                parameters: parameters.clone(),
                body: body.clone(),
                captured: scope.clone(),
            }
            .into(),
        )),
        Expression::Call { callee, arguments } => {
            let callee_value = eval_expression(callee, scope)?;
            let arguments = arguments
                .iter()
                .map(|argument| eval_expression(argument, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call_value(&callee_value, &arguments, span)
        }
        Expression::Member { object, field } => {
            let object = eval_expression(object, scope)?;
            read_field(&object, field, span)
        }
        Expression::Comparator(comparator) => eval_comparator(comparator, scope),
        Expression::Arithmetic(operator) => eval_arithmetic(operator, scope, span),
    }
}

fn call_value(callee: &Value, arguments: &[Value], span: Span) -> Result<Value, Error> {
    match callee {
        Value::Lambda(lambda) => {
            if arguments.len() != lambda.parameters.len() {
                return Err(execution_error(
                    format!(
                        "lambda takes {} argument(s) but {} were supplied",
                        lambda.parameters.len(),
                        arguments.len(),
                    ),
                    span,
                ));
            }
            // The call scope chains onto the lambda's captured scope, never
            // onto the caller's, which keeps scoping purely lexical.
            let call_scope = Scope::child(&lambda.captured);
            for (parameter, argument) in lambda.parameters.iter().zip(arguments) {
                Scope::define(&call_scope, parameter, argument.clone());
            }
            eval_expression(&lambda.body, &call_scope)
        }
        Value::Native(native) => native.call(arguments),
        other => Err(execution_error(
            format!("cannot call a {}", other.kind()),
            span,
        )),
    }
}

fn read_field(object: &Value, field: &str, span: Span) -> Result<Value, Error> {
    match object {
        Value::Record(fields) => fields.borrow().get(field).cloned().ok_or_else(|| {
            execution_error(format!("record has no field '{field}'"), span)
        }),
        Value::Exports(cell) if field == "exports" => Ok(cell.borrow().live()),
        Value::Exports(_) => Err(execution_error(
            format!("the exports cell has no field '{field}', only 'exports'"),
            span,
        )),
        other => Err(execution_error(
            format!("cannot read field '{field}' of a {}", other.kind()),
            span,
        )),
    }
}

fn assign_field(target: &Value, field: &str, value: Value, span: Span) -> Result<(), Error> {
    match target {
        Value::Record(fields) => {
            fields.borrow_mut().insert(field.to_owned(), value);
            Ok(())
        }
        Value::Exports(cell) if field == "exports" => {
            cell.borrow_mut().redirect(value);
            Ok(())
        }
        Value::Exports(_) => Err(execution_error(
            format!("the exports cell has no field '{field}', only 'exports'"),
            span,
        )),
        other => Err(execution_error(
            format!("cannot assign field '{field}' of a {}", other.kind()),
            span,
        )),
    }
}

fn eval_comparator(comparator: &Comparator, scope: &ScopeRef) -> Result<Value, Error> {
    use Comparator::*;
    let (operand_a, operand_b) = match comparator {
        Equal { operand_a, operand_b }
        | NotEqual { operand_a, operand_b }
        | Greater { operand_a, operand_b }
        | GreaterOrEqual { operand_a, operand_b }
        | Less { operand_a, operand_b }
        | LessOrEqual { operand_a, operand_b } => (operand_a, operand_b),
    };
    let a = eval_expression(operand_a, scope)?;
    let b = eval_expression(operand_b, scope)?;
    let result = match comparator {
        Equal { .. } => a == b,
        NotEqual { .. } => a != b,
        Greater { .. } => ordering(&a, &b, operand_a.span)?.is_gt(),
        GreaterOrEqual { .. } => ordering(&a, &b, operand_a.span)?.is_ge(),
        Less { .. } => ordering(&a, &b, operand_a.span)?.is_lt(),
        LessOrEqual { .. } => ordering(&a, &b, operand_a.span)?.is_le(),
    };
    Ok(Value::Bool(result))
}

fn ordering(a: &Value, b: &Value, span: Span) -> Result<std::cmp::Ordering, Error> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| {
                execution_error("cannot order numbers involving NaN".to_owned(), span)
            })
        }
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (a, b) => Err(execution_error(
            format!("cannot order a {} against a {}", a.kind(), b.kind()),
            span,
        )),
    }
}

fn eval_arithmetic(
    operator: &ArithmeticOperator,
    scope: &ScopeRef,
    span: Span,
) -> Result<Value, Error> {
    use ArithmeticOperator::*;
    match operator {
        Negate { operand } => match eval_expression(operand, scope)? {
            Value::Number(number) => Ok(Value::Number(-number)),
            other => Err(execution_error(
                format!("cannot negate a {}", other.kind()),
                span,
            )),
        },
        Add { operand_a, operand_b } => {
            let a = eval_expression(operand_a, scope)?;
            let b = eval_expression(operand_b, scope)?;
            match (&a, &b) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Text(a), Value::Text(b)) => Ok(Value::text(format!("{a}{b}"))),
                _ => Err(execution_error(
                    format!("cannot add a {} to a {}", b.kind(), a.kind()),
                    span,
                )),
            }
        }
        Subtract { operand_a, operand_b } => {
            numeric(operator_name(operator), operand_a, operand_b, scope, span, |a, b| a - b)
        }
        Multiply { operand_a, operand_b } => {
            numeric(operator_name(operator), operand_a, operand_b, scope, span, |a, b| a * b)
        }
        Divide { operand_a, operand_b } => {
            numeric(operator_name(operator), operand_a, operand_b, scope, span, |a, b| a / b)
        }
    }
}

fn operator_name(operator: &ArithmeticOperator) -> &'static str {
    match operator {
        ArithmeticOperator::Negate { .. } => "negate",
        ArithmeticOperator::Add { .. } => "add",
        ArithmeticOperator::Subtract { .. } => "subtract",
        ArithmeticOperator::Multiply { .. } => "multiply",
        ArithmeticOperator::Divide { .. } => "divide",
    }
}

fn numeric(
    operation: &str,
    operand_a: &Spanned<Expression>,
    operand_b: &Spanned<Expression>,
    scope: &ScopeRef,
    span: Span,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    let a = eval_expression(operand_a, scope)?;
    let b = eval_expression(operand_b, scope)?;
    match (&a, &b) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(apply(*a, *b))),
        _ => Err(execution_error(
            format!("cannot {operation} a {} and a {}", a.kind(), b.kind()),
            span,
        )),
    }
}

fn execution_error(message: String, span: Span) -> Error {
    ExecutionError {
        message,
        span: Some(span.into_range()),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;

    fn eval(source: &str, mode: EvalMode, capabilities: Capabilities) -> Result<Value, Error> {
        evaluate(&EvalSettings {
            source: source.to_owned(),
            mode,
            capabilities,
        })
    }

    fn eval_expr(source: &str) -> Result<Value, Error> {
        eval(source, EvalMode::Expression, Capabilities::new())
    }

    #[test]
    fn test_expression_arithmetic() {
        assert_eq!(eval_expr("1+2").unwrap(), Value::Number(3.0));
        assert_eq!(eval_expr("2 * 3 + 4").unwrap(), Value::Number(10.0));
        assert_eq!(eval_expr("-(1 + 2)").unwrap(), Value::Number(-3.0));
    }

    #[test]
    fn test_text_concatenation() {
        assert_eq!(eval_expr("'ab' + 'cd'").unwrap(), Value::text("abcd"));
    }

    #[test]
    fn test_mixed_addition_is_an_execution_error() {
        assert!(matches!(
            eval_expr("'ab' + 1"),
            Err(Error::Execution(_)),
        ));
    }

    #[test]
    fn test_unbound_name() {
        let error = eval_expr("missing").unwrap_err();
        let Error::UnboundName(error) = error else {
            panic!("expected UnboundName, got {error:?}");
        };
        assert_eq!(error.name, "missing");
    }

    #[test]
    fn test_program_completion_value() {
        assert_eq!(
            eval("123; 234", EvalMode::Program, Capabilities::new()).unwrap(),
            Value::Number(234.0),
        );
        // A trailing binding statement leaves no completion value.
        assert_eq!(
            eval("123; let x = 4", EvalMode::Program, Capabilities::new()).unwrap(),
            Value::None,
        );
    }

    #[test]
    fn test_lambda_capture_is_lexical() {
        let capabilities = Capabilities::from([("base", Value::Number(10.0))]);
        let result = eval(
            "let add = |a| a + base\nadd(5)",
            EvalMode::Program,
            capabilities,
        )
        .unwrap();
        assert_eq!(result, Value::Number(15.0));
    }

    #[test]
    fn test_lambda_arity_is_strict() {
        assert!(matches!(
            eval_expr("(|a, b| a + b)(1)"),
            Err(Error::Execution(_)),
        ));
    }

    #[test]
    fn test_record_field_access_and_assignment() {
        let result = eval(
            "let box = { count: 1 }\nbox.count = box.count + 1\nbox.count",
            EvalMode::Program,
            Capabilities::new(),
        )
        .unwrap();
        assert_eq!(result, Value::Number(2.0));
    }

    #[test]
    fn test_injected_record_mutation_is_visible_to_caller() {
        let shared = Value::empty_record_handle();
        let capabilities = Capabilities::from([("state", Value::Record(shared.clone()))]);
        eval("state.count = 5", EvalMode::Program, capabilities).unwrap();
        assert_eq!(shared.borrow().get("count"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn test_self_is_none_in_every_mode() {
        assert_eq!(eval_expr("self").unwrap(), Value::None);
        assert_eq!(
            eval("self", EvalMode::AssertedExpression, Capabilities::new()).unwrap(),
            Value::None,
        );
        assert_eq!(
            eval("self", EvalMode::Program, Capabilities::new()).unwrap(),
            Value::None,
        );
        // ... and inside nested lambdas.
        assert_eq!(eval_expr("(|| self)()").unwrap(), Value::None);
    }

    #[test]
    fn test_self_can_be_granted_explicitly() {
        let capabilities = Capabilities::from([("self", Value::Number(1.0))]);
        assert_eq!(
            eval("self", EvalMode::Expression, capabilities).unwrap(),
            Value::Number(1.0),
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval_expr("1 < 2").unwrap(), Value::Bool(true));
        assert_eq!(eval_expr("'a' >= 'b'").unwrap(), Value::Bool(false));
        assert_eq!(eval_expr("[1, 2] == [1, 2]").unwrap(), Value::Bool(true));
        assert!(matches!(eval_expr("'a' < 1"), Err(Error::Execution(_))));
    }

    #[test]
    fn test_division_follows_float_semantics() {
        let Value::Number(result) = eval_expr("1 / 0").unwrap() else {
            panic!("expected a number");
        };
        assert!(result.is_infinite());
    }
}
