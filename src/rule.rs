//! Rules for synthesizing file tasks on demand
//!
//! A rule pairs a name pattern with a list of source specs and an action.
//! When a name has no registered task, the manager tries every matching
//! rule; see [`TaskManager::lookup_task`](crate::manager::TaskManager::lookup_task).

use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::error::{JakeError, Result};
use crate::pathmap;
use crate::task::Action;

/// Computes source names from the task name
pub type SourceFn = Rc<dyn Fn(&str) -> Vec<String>>;

/// How a rule derives one prerequisite from the requested name
#[derive(Clone)]
pub enum RuleSource {
    /// Replace the extension, e.g. `.c`
    Extension(String),
    /// A pathmap spec, e.g. `%{^obj,src}X.c`
    PathMap(String),
    /// A fixed name
    Literal(String),
    /// Computed from the task name
    Computed(SourceFn),
}

impl RuleSource {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + 'static,
    {
        RuleSource::Computed(Rc::new(f))
    }

    /// Candidate source names for `task_name`
    pub fn sources_for(&self, task_name: &str) -> Result<Vec<String>> {
        Ok(match self {
            RuleSource::Extension(new_ext) => vec![pathmap::ext(task_name, new_ext)],
            RuleSource::PathMap(spec) => vec![pathmap::pathmap(task_name, spec)?],
            RuleSource::Literal(name) => vec![name.clone()],
            RuleSource::Computed(f) => f(task_name),
        })
    }
}

impl From<&str> for RuleSource {
    fn from(spec: &str) -> Self {
        if spec.contains('%') {
            RuleSource::PathMap(spec.to_string())
        } else if spec.contains('/') {
            RuleSource::Literal(spec.to_string())
        } else if spec.starts_with('.') {
            RuleSource::Extension(spec.to_string())
        } else {
            RuleSource::Literal(spec.to_string())
        }
    }
}

impl From<String> for RuleSource {
    fn from(spec: String) -> Self {
        RuleSource::from(spec.as_str())
    }
}

impl fmt::Debug for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Extension(e) => f.debug_tuple("Extension").field(e).finish(),
            RuleSource::PathMap(p) => f.debug_tuple("PathMap").field(p).finish(),
            RuleSource::Literal(l) => f.debug_tuple("Literal").field(l).finish(),
            RuleSource::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A pattern-driven recipe for file tasks
#[derive(Clone)]
pub struct Rule {
    pattern: Regex,
    sources: Vec<RuleSource>,
    action: Option<Action>,
}

impl Rule {
    /// A rule for names ending in `suffix`, e.g. `.o`
    pub fn new(suffix: &str, sources: Vec<RuleSource>, action: Option<Action>) -> Result<Self> {
        let pattern = format!("{}$", regex::escape(suffix));
        let pattern = Regex::new(&pattern).map_err(|e| JakeError::invalid_pattern(suffix, e))?;
        Ok(Self::with_regex(pattern, sources, action))
    }

    pub fn with_regex(pattern: Regex, sources: Vec<RuleSource>, action: Option<Action>) -> Self {
        Self {
            pattern,
            sources,
            action,
        }
    }

    pub fn matches(&self, task_name: &str) -> bool {
        self.pattern.is_match(task_name)
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// All candidate sources for `task_name`, in spec order
    pub fn make_sources(&self, task_name: &str) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        for source in &self.sources {
            sources.extend(source.sources_for(task_name)?);
        }
        Ok(sources)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern.as_str())
            .field("sources", &self.sources)
            .field("action", &self.action.is_some())
            .finish()
    }
}
