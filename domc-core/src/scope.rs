// domc-core/src/scope.rs

use std::collections::BTreeMap;

use crate::value::Value;

/// Named-value bag a template instance is built and updated from.
///
/// Reads are synchronous and side-effect free; a name that was never set
/// reads as `undefined`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: BTreeMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn lookup(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy of this scope restricted to `names`. Names missing here are
    /// simply absent from the result.
    pub fn narrow<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Scope {
        let vars = names
            .into_iter()
            .filter_map(|n| self.vars.get(n).map(|v| (n.to_string(), v.clone())))
            .collect();
        Scope { vars }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Scope {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
