//! Runtime values. Compound values share their backing storage through
//! `Rc<RefCell<...>>`: mutation of an injected list, record or exports cell
//! is visible to the caller that granted it, and ownership stays with that
//! caller. The core is single-threaded by design, so `Rc` is deliberate.

use crate::error::Error;
use crate::evaluator::scope::ScopeRef;
use crate::parser::{Expression, Spanned};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ListHandle = Rc<RefCell<Vec<Value>>>;
pub type RecordHandle = Rc<RefCell<IndexMap<String, Value>>>;
pub type ExportsHandle = Rc<RefCell<ExportsCell>>;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    List(ListHandle),
    Record(RecordHandle),
    Lambda(Rc<LambdaValue>),
    Native(Rc<NativeFunction>),
    Exports(ExportsHandle),
}

impl Value {
    pub fn text(text: impl AsRef<str>) -> Self {
        Value::Text(Rc::from(text.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn record(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Record(Rc::new(RefCell::new(fields.into_iter().collect())))
    }

    pub fn empty_record_handle() -> RecordHandle {
        Rc::new(RefCell::new(IndexMap::new()))
    }

    /// Short noun for diagnostics ("cannot call a number", ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Lambda(_) => "lambda",
            Value::Native(_) => "native function",
            Value::Exports(_) => "exports cell",
        }
    }
}

/// A user lambda: parameter names, the body expression, and the scope it
/// closed over. Calls chain a fresh scope onto `captured`, never onto the
/// caller's scope.
pub struct LambdaValue {
    pub parameters: Vec<String>,
    pub body: Rc<Spanned<Expression>>,
    pub captured: ScopeRef,
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value, Error>;

/// A host function injected as a capability.
pub struct NativeFunction {
    pub name: String,
    call: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        call: impl Fn(&[Value]) -> Result<Value, Error> + 'static,
    ) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: name.into(),
            call: Box::new(call),
        }))
    }

    pub fn call(&self, arguments: &[Value]) -> Result<Value, Error> {
        (self.call)(arguments)
    }
}

/// The live exports accessor handed to legacy module bodies as the single
/// capability `module`. Reading `module.exports` yields the live target;
/// assigning `module.exports = v` redirects the live target *and* mirrors
/// `v` into the original target's `default` field, atomically, so consumers
/// holding either the original record or the reassigned namespace agree.
pub struct ExportsCell {
    live: Value,
    original: RecordHandle,
}

impl ExportsCell {
    pub fn new(target: RecordHandle) -> ExportsHandle {
        Rc::new(RefCell::new(ExportsCell {
            live: Value::Record(target.clone()),
            original: target,
        }))
    }

    pub fn live(&self) -> Value {
        self.live.clone()
    }

    pub fn redirect(&mut self, namespace: Value) {
        self.original
            .borrow_mut()
            .insert("default".to_owned(), namespace.clone());
        self.live = namespace;
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Exports(a), Value::Exports(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Number(value) => write!(f, "Number({value})"),
            Value::Text(value) => write!(f, "Text({value:?})"),
            Value::List(items) => f.debug_tuple("List").field(&items.borrow()).finish(),
            Value::Record(fields) => f.debug_tuple("Record").field(&fields.borrow()).finish(),
            Value::Lambda(_) => write!(f, "Lambda"),
            Value::Native(native) => write!(f, "Native({})", native.name),
            Value::Exports(_) => write!(f, "Exports"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(value) => write!(f, "{}", if *value { "True" } else { "False" }),
            Value::Number(value) => {
                if value.is_finite() && value.fract() == 0.0 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            Value::Text(value) => write!(f, "{value}"),
            Value::List(items) => {
                let items = items.borrow();
                let inner = items
                    .iter()
                    .map(|item| item.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{inner}]")
            }
            Value::Record(fields) => {
                let fields = fields.borrow();
                let inner = fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{ {inner} }}")
            }
            Value::Lambda(_) => write!(f, "<lambda>"),
            Value::Native(native) => write!(f, "<native {}>", native.name),
            Value::Exports(_) => write!(f, "<exports>"),
        }
    }
}
