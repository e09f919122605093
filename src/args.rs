//! Hierarchical named task arguments
//!
//! Positional values passed to a task are bound to its declared argument
//! names. Prerequisites receive a child scope holding only their own
//! declared names, each looked up in the invoking task's arguments.

use std::collections::HashMap;
use std::rc::Rc;

/// Named parameters bound for one task invocation
#[derive(Debug, Clone, Default)]
pub struct TaskArguments {
    names: Vec<String>,
    values: HashMap<String, String>,
    parent: Option<Rc<TaskArguments>>,
}

impl TaskArguments {
    /// Bind `values` to `names` by position. Names without a value stay
    /// unbound; surplus values are dropped.
    pub fn new<S: Into<String>>(names: &[String], values: impl IntoIterator<Item = S>) -> Self {
        let values = values.into_iter().map(|v| Some(v.into()));
        Self::bind(names, values, None)
    }

    fn bind(
        names: &[String],
        values: impl IntoIterator<Item = Option<String>>,
        parent: Option<Rc<TaskArguments>>,
    ) -> Self {
        let values = names
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (name.clone(), v)))
            .collect();

        Self {
            names: names.to_vec(),
            values,
            parent,
        }
    }

    /// Build the arguments for a prerequisite declaring `names`
    pub fn new_scope(&self, names: &[String]) -> Self {
        let values: Vec<Option<String>> = names.iter().map(|name| self.lookup(name)).collect();
        Self::bind(names, values, Some(Rc::new(self.clone())))
    }

    /// Resolve `name`: own bindings, then the environment (exact name,
    /// then upper-cased), then the parent scope.
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }

        if let Ok(value) = std::env::var(name) {
            return Some(value);
        }

        if let Ok(value) = std::env::var(name.to_uppercase()) {
            return Some(value);
        }

        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Fill unbound names from `defaults`
    pub fn with_defaults<K, V>(&mut self, defaults: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in defaults {
            self.values.entry(key.into()).or_insert_with(|| value.into());
        }
    }

    /// Own binding only, no fallback
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether `name` is declared here or in an enclosing scope
    pub fn declares(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name) || self.parent.as_ref().is_some_and(|p| p.declares(name))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn parent(&self) -> Option<&TaskArguments> {
        self.parent.as_deref()
    }

    /// Bound values in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .filter_map(|name| self.values.get_key_value(name))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.values.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
