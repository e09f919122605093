//! Error types for jake
//!
//! Uses `miette` for pretty error reporting with codes and help text.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised by a task action. Carried unmodified as the source of
/// [`JakeError::ActionFailed`].
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for jake operations
#[derive(Error, Diagnostic, Debug)]
pub enum JakeError {
    #[error("Circular dependency detected: {chain}")]
    #[diagnostic(
        code(jake::task::cycle),
        help("Check the prerequisites of the tasks named in the chain")
    )]
    CircularDependency { chain: String },

    #[error("Don't know how to build task '{name}'")]
    #[diagnostic(
        code(jake::task::unknown),
        help("Run `jake --tasks` to see documented tasks")
    )]
    UnknownTask { name: String },

    #[error("Malformed task definition: {reason}")]
    #[diagnostic(code(jake::task::malformed))]
    MalformedTaskDefinition { reason: String },

    #[error("Rule recursion too deep while synthesizing '{name}'")]
    #[diagnostic(
        code(jake::rule::too_deep),
        help("Two or more rules probably derive their sources from each other")
    )]
    RuleRecursionTooDeep { name: String },

    #[error("Task '{task}' failed")]
    #[diagnostic(code(jake::action::failed))]
    ActionFailed {
        task: String,
        #[source]
        source: ActionError,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    #[diagnostic(code(jake::pattern))]
    InvalidPattern { pattern: String, reason: String },

    #[error("Jakefile not found")]
    #[diagnostic(
        code(jake::config::not_found),
        help("Create a Jakefile.toml in your project root, or specify one with --jakefile")
    )]
    ConfigNotFound { searched: Vec<PathBuf> },

    #[error("Failed to parse {}", path.display())]
    #[diagnostic(code(jake::config::parse))]
    ConfigParse {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Invalid task configuration for '{task}': {reason}")]
    #[diagnostic(code(jake::config::invalid_task))]
    InvalidTask { task: String, reason: String },

    #[error("Script execution failed in task '{task}'")]
    #[diagnostic(code(jake::script::failed))]
    ScriptFailed {
        task: String,
        #[source]
        source: Box<rhai::EvalAltResult>,
    },

    #[error("Command `{command}` failed with exit code {code}")]
    #[diagnostic(code(jake::exec::failed))]
    CommandFailed { command: String, code: i32 },

    #[error("I/O error")]
    #[diagnostic(code(jake::io))]
    Io(#[from] std::io::Error),

    #[error("Watch error")]
    #[diagnostic(code(jake::watch))]
    Watch {
        #[source]
        source: notify::Error,
    },
}

impl JakeError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for jake operations
pub type Result<T> = std::result::Result<T, JakeError>;
