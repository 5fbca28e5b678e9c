//! Behavior of the three evaluation modes: leak-freedom, basics,
//! capabilities and the transform pipeline.

use cloister::{
    Capabilities, Error, EvalOptions, EvaluatorFamily, TransformHook, Value, evaluate,
    evaluate_expression, evaluate_program, evaluator,
};

type Evaluator = fn(&str, Capabilities) -> Result<Value, Error>;

const EVALUATORS: [(&str, Evaluator); 3] = [
    ("evaluate", evaluate),
    ("evaluate_expression", evaluate_expression),
    ("evaluate_program", evaluate_program),
];

fn number(value: f64) -> Value {
    Value::Number(value)
}

#[test]
fn leakage() {
    for (name, eval) in EVALUATORS {
        for internal in ["scoped_eval", "make_evaluator", "eval_expression", "scope"] {
            assert!(
                matches!(eval(internal, Capabilities::new()), Err(Error::UnboundName(_))),
                "{name} must not leak '{internal}'",
            );
        }
        assert_eq!(
            eval("self", Capabilities::new()).unwrap(),
            Value::None,
            "{name} must not leak an ambient receiver",
        );
        // ... including inside nested functions.
        let lambda = eval("|| self", Capabilities::new()).unwrap();
        assert_eq!(
            evaluator::call(&lambda, &[]).unwrap(),
            Value::None,
            "{name} must not leak a nested ambient receiver",
        );
    }
}

#[test]
fn basic() {
    for (name, eval) in EVALUATORS {
        assert_eq!(
            eval("1+2", Capabilities::new()).unwrap(),
            number(3.0),
            "{name} addition",
        );
        let lambda = eval("|a, b| a + b", Capabilities::new()).unwrap();
        assert_eq!(
            evaluator::call(&lambda, &[number(1.0), number(2.0)]).unwrap(),
            number(3.0),
            "{name} lambda",
        );
    }
    assert!(
        matches!(
            evaluate("123; 234", Capabilities::new()),
            Err(Error::SourceSyntax(_)),
        ),
        "evaluate fails on a program",
    );
    assert!(
        matches!(
            evaluate_expression("123; 234", Capabilities::new()),
            Err(Error::SourceSyntax(_)),
        ),
        "evaluate_expression fails on a program",
    );
    assert_eq!(
        evaluate_program("123; 234", Capabilities::new()).unwrap(),
        number(234.0),
        "evaluate_program succeeds",
    );
}

#[test]
fn capabilities() {
    for (name, eval) in EVALUATORS {
        assert_eq!(
            eval("1+a", Capabilities::from([("a", number(2.0))])).unwrap(),
            number(3.0),
            "{name} capability addition",
        );
        let lambda = eval("|a, b| a + b + c", Capabilities::from([("c", number(3.0))])).unwrap();
        assert_eq!(
            evaluator::call(&lambda, &[number(1.0), number(2.0)]).unwrap(),
            number(6.0),
            "{name} capability closure",
        );
        assert_eq!(
            eval(
                "1+a+b",
                Capabilities::from([("a", number(2.0)), ("b", number(3.0))]),
            )
            .unwrap(),
            number(6.0),
            "{name} multiple capabilities",
        );
    }
}

#[test]
fn capability_override_precedence() {
    let family = EvaluatorFamily::new(
        Capabilities::from([("foo", number(1.0)), ("bar", number(2.0))]),
        Vec::new(),
    );
    assert_eq!(
        family
            .evaluate(
                "bar",
                Capabilities::from([("bar", number(5.0))]),
                EvalOptions::default(),
            )
            .unwrap(),
        number(5.0),
    );
    assert_eq!(
        family
            .evaluate(
                "foo",
                Capabilities::from([("bar", number(5.0))]),
                EvalOptions::default(),
            )
            .unwrap(),
        number(1.0),
    );
}

#[test]
fn unbound_capability_fails_in_every_mode() {
    for (name, eval) in EVALUATORS {
        let error = eval("granted + withheld", Capabilities::from([("granted", number(1.0))]))
            .unwrap_err();
        let Error::UnboundName(error) = error else {
            panic!("{name}: expected UnboundName, got {error:?}");
        };
        assert_eq!(error.name, "withheld");
    }
}

#[test]
fn injected_mutable_capability_is_shared_with_the_caller() {
    let shared = Value::empty_record_handle();
    shared
        .borrow_mut()
        .insert("count".to_owned(), number(1.0));
    evaluate_program(
        "state.count = state.count + 1",
        Capabilities::from([("state", Value::Record(shared.clone()))]),
    )
    .unwrap();
    assert_eq!(shared.borrow().get("count"), Some(&number(2.0)));
}

#[test]
fn transforms_two_phases() {
    // A configured hook that both grants `abc` and rewrites ABC => abc:
    // the rewrite runs after every extension settled, so the rewritten
    // source resolves the granted capability.
    let hook = TransformHook::new()
        .with_extend(|mut capabilities| {
            capabilities.insert("abc", number(123.0));
            capabilities
        })
        .with_rewrite(|mut settings| {
            if settings.source == "ABC" {
                settings.source = "abc".to_owned();
            }
            settings
        });
    let family = EvaluatorFamily::new(Capabilities::new(), vec![hook]);
    assert_eq!(
        family
            .evaluate_program("ABC", Capabilities::new(), EvalOptions::default())
            .unwrap(),
        number(123.0),
    );
}

#[test]
fn call_scoped_hooks_run_before_configured_hooks() {
    let configured = TransformHook::rewriting(|mut settings| {
        if settings.source == "X" {
            settings.source = "'configured'".to_owned();
        }
        settings
    });
    let family = EvaluatorFamily::new(Capabilities::new(), vec![configured]);

    // Without a call-scoped hook the configured rewrite applies.
    assert_eq!(
        family
            .evaluate("X", Capabilities::new(), EvalOptions::default())
            .unwrap(),
        Value::text("configured"),
    );

    // With one, it rewrites first and the configured hook's condition no
    // longer matches.
    let call_scoped = TransformHook::rewriting(|mut settings| {
        if settings.source == "X" {
            settings.source = "'call-scoped'".to_owned();
        }
        settings
    });
    assert_eq!(
        family
            .evaluate(
                "X",
                Capabilities::new(),
                EvalOptions {
                    hooks: vec![call_scoped],
                },
            )
            .unwrap(),
        Value::text("call-scoped"),
    );
}

#[test]
fn pipeline_extensions_override_base_and_call_capabilities() {
    let configured = TransformHook::extending(|mut capabilities| {
        capabilities.insert("level", Value::text("pipeline"));
        capabilities
    });
    let family = EvaluatorFamily::new(
        Capabilities::from([("level", Value::text("base"))]),
        vec![configured],
    );
    assert_eq!(
        family
            .evaluate(
                "level",
                Capabilities::from([("level", Value::text("call"))]),
                EvalOptions::default(),
            )
            .unwrap(),
        Value::text("pipeline"),
    );
}
