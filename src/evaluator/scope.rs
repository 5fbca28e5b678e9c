//! Lexical scope chain. The root scope holds exactly the granted
//! capabilities; lookups walk parents and stop at the root, so there is no
//! ambient fallback of any kind.

use crate::capabilities::Capabilities;
use crate::evaluator::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type ScopeRef = Rc<RefCell<Scope>>;

pub struct Scope {
    parent: Option<ScopeRef>,
    bindings: IndexMap<String, Value>,
}

impl Scope {
    /// The execution root: the capability set and nothing else.
    pub fn root(capabilities: &Capabilities) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: None,
            bindings: capabilities
                .iter()
                .map(|(name, value)| (name.to_owned(), value.clone()))
                .collect(),
        }))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            bindings: IndexMap::new(),
        }))
    }

    pub fn define(scope: &ScopeRef, name: &str, value: Value) {
        scope.borrow_mut().bindings.insert(name.to_owned(), value);
    }

    pub fn get(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(next) = current {
            if let Some(value) = next.borrow().bindings.get(name) {
                return Some(value.clone());
            }
            current = next.borrow().parent.clone();
        }
        None
    }
}
