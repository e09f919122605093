//! Tasks: the unit of work in the dependency graph
//!
//! A task carries its prerequisites as unresolved names, an ordered list of
//! actions and a one-shot `invoked` flag. Its [`TaskKind`] selects the
//! staleness policy and the scoping rule for its name.

use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use tracing::debug;

use crate::args::TaskArguments;
use crate::error::{ActionError, JakeError, Result};

/// An opaque unit of work run by [`Task::execute`]
pub type Action = Rc<dyn Fn(&Task, &TaskArguments) -> std::result::Result<(), ActionError>>;

/// Wrap a closure as an [`Action`]
pub fn action<F>(f: F) -> Action
where
    F: Fn(&Task, &TaskArguments) -> std::result::Result<(), ActionError> + 'static,
{
    Rc::new(f)
}

/// The closed set of task variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Always needed when invoked
    Plain,
    /// Needed when the file is missing or older than a prerequisite
    File,
    /// Needed only when the file is missing
    FileCreation,
}

impl TaskKind {
    /// Apply `scope` to `name` according to this kind's rules. File based
    /// tasks ignore the scope.
    pub fn scope_name(self, scope: &[String], name: &str) -> String {
        match self {
            TaskKind::Plain => {
                let mut parts: Vec<&str> = scope.iter().map(String::as_str).collect();
                parts.push(name);
                parts.join(":")
            }
            TaskKind::File | TaskKind::FileCreation => name.to_string(),
        }
    }

    pub fn is_file_based(self) -> bool {
        !matches!(self, TaskKind::Plain)
    }
}

/// Point in time used for staleness decisions.
///
/// `Early` orders before every real instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timestamp {
    Early,
    At(SystemTime),
}

impl Timestamp {
    pub fn now() -> Self {
        Timestamp::At(SystemTime::now())
    }

    /// Modification time of `path`, or `Early` if it doesn't exist
    pub fn of_path(path: impl AsRef<Path>) -> Self {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map(Timestamp::At)
            .unwrap_or(Timestamp::Early)
    }
}

/// A named unit with prerequisites and actions
pub struct Task {
    name: String,
    kind: TaskKind,
    prerequisites: Vec<String>,
    actions: Vec<Action>,
    invoked: bool,
    argument_names: Vec<String>,
    scope: Vec<String>,
    full_comment: Option<String>,
}

impl Task {
    pub(crate) fn new(name: impl Into<String>, kind: TaskKind, scope: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            prerequisites: Vec::new(),
            actions: Vec::new(),
            invoked: false,
            argument_names: Vec::new(),
            scope,
            full_comment: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Scope active when the task was created
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn argument_names(&self) -> &[String] {
        &self.argument_names
    }

    pub fn set_argument_names(&mut self, names: Vec<String>) {
        self.argument_names = names;
    }

    pub fn is_invoked(&self) -> bool {
        self.invoked
    }

    /// Mark as invoked. Returns `false` if it already was.
    pub(crate) fn begin_invocation(&mut self) -> bool {
        !std::mem::replace(&mut self.invoked, true)
    }

    pub fn full_comment(&self) -> &str {
        self.full_comment.as_deref().unwrap_or("")
    }

    /// First sentence of the description
    pub fn comment(&self) -> &str {
        let full = self.full_comment();
        let line = full.lines().next().unwrap_or("");
        match line.find(". ") {
            Some(end) => &line[..=end],
            None => line,
        }
    }

    /// Descriptions given across repeated definitions are joined
    pub fn add_description(&mut self, description: &str) {
        let description = description.trim();
        if description.is_empty() {
            return;
        }
        self.full_comment = Some(match self.full_comment.take() {
            Some(existing) => format!("{} / {}", existing, description),
            None => description.to_string(),
        });
    }

    /// Append prerequisites and an action to the task
    pub fn enhance<I, S>(&mut self, prerequisites: I, action: Option<Action>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites
            .extend(prerequisites.into_iter().map(Into::into));
        if let Some(action) = action {
            self.actions.push(action);
        }
    }

    /// Allow the task to run again in this process
    pub fn reenable(&mut self) {
        self.invoked = false;
    }

    pub fn clear(&mut self) {
        self.clear_prerequisites();
        self.clear_actions();
    }

    pub fn clear_prerequisites(&mut self) {
        self.prerequisites.clear();
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }

    /// Run every action in order. The first failure aborts the rest.
    pub fn execute(&self, args: &TaskArguments) -> Result<()> {
        debug!("** Execute {}", self.name);

        for action in &self.actions {
            action(self, args).map_err(|source| JakeError::ActionFailed {
                task: self.name.clone(),
                source,
            })?;
        }

        Ok(())
    }

    pub fn target_exists(&self) -> bool {
        self.kind.is_file_based() && Path::new(&self.name).exists()
    }

    /// Does the staleness policy need the newest prerequisite timestamp?
    pub fn compares_prerequisites(&self) -> bool {
        match self.kind {
            TaskKind::Plain => false,
            TaskKind::File => self.target_exists() && !self.prerequisites.is_empty(),
            TaskKind::FileCreation => false,
        }
    }

    /// Does [`Task::timestamp`] derive from the prerequisites?
    pub fn derives_timestamp(&self) -> bool {
        self.kind == TaskKind::Plain && !self.prerequisites.is_empty()
    }

    /// Should the actions run, given the newest prerequisite timestamp?
    pub fn is_needed(&self, newest_prerequisite: Option<Timestamp>) -> bool {
        match self.kind {
            TaskKind::Plain => true,
            TaskKind::File => {
                if !self.target_exists() {
                    return true;
                }
                let own = Timestamp::of_path(&self.name);
                newest_prerequisite.is_some_and(|newest| newest > own)
            }
            TaskKind::FileCreation => !self.target_exists(),
        }
    }

    /// Time stamp of this task, given the newest prerequisite timestamp
    pub fn timestamp(&self, newest_prerequisite: Option<Timestamp>) -> Timestamp {
        match self.kind {
            TaskKind::Plain => newest_prerequisite.unwrap_or_else(Timestamp::now),
            TaskKind::File => Timestamp::of_path(&self.name),
            TaskKind::FileCreation => Timestamp::Early,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("prerequisites", &self.prerequisites)
            .field("actions", &self.actions.len())
            .field("invoked", &self.invoked)
            .field("argument_names", &self.argument_names)
            .field("scope", &self.scope)
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task ({})", self.name)
    }
}
