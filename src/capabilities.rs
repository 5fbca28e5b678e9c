//! Named values granted to sandboxed code. A capability set is the *only*
//! thing evaluated source can observe beyond its own text.

use crate::evaluator::Value;
use indexmap::IndexMap;

/// An insertion-ordered mapping from capability name to value. Inserting an
/// existing key replaces its value: the last writer for a key wins.
#[derive(Clone, Default)]
pub struct Capabilities {
    entries: IndexMap<String, Value>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Pure merge: keys present in `overrides` win, everything else is kept.
    /// This seeds every evaluation (base capabilities overridden by
    /// call-supplied ones) and is reused key-by-key when transform hooks add
    /// their own capabilities on top.
    pub fn merged_with(&self, overrides: &Capabilities) -> Capabilities {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            merged.insert(name, value.clone());
        }
        merged
    }
}

impl FromIterator<(String, Value)> for Capabilities {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(entries: I) -> Self {
        let mut capabilities = Capabilities::new();
        for (name, value) in entries {
            capabilities.insert(name, value);
        }
        capabilities
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Capabilities {
    fn from(entries: [(&str, Value); N]) -> Self {
        entries
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect()
    }
}
