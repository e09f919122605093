//! The task registry
//!
//! `TaskManager` owns every task, the namespace scope stack used while tasks
//! are registered, and the rules used to synthesize file tasks on demand.
//! Invocation is driven from here because resolving a prerequisite may
//! register new tasks.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::args::TaskArguments;
use crate::chain::InvocationChain;
use crate::error::{JakeError, Result};
use crate::pathmap;
use crate::rule::{Rule, RuleSource};
use crate::task::{action, Action, Task, TaskKind, Timestamp};

/// Prefix that anchors a name at the root scope
pub const ROOT_PREFIX: &str = "jake:";

/// Rule synthesis gives up past this depth
pub const MAX_RULE_DEPTH: usize = 16;

/// One positional piece of a task definition
#[derive(Clone)]
pub enum DefinitionPart {
    List(Vec<String>),
    Action(Action),
}

impl DefinitionPart {
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DefinitionPart::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Action> for DefinitionPart {
    fn from(action: Action) -> Self {
        DefinitionPart::Action(action)
    }
}

impl From<Vec<String>> for DefinitionPart {
    fn from(items: Vec<String>) -> Self {
        DefinitionPart::List(items)
    }
}

impl From<&[&str]> for DefinitionPart {
    fn from(items: &[&str]) -> Self {
        DefinitionPart::list(items.iter().copied())
    }
}

/// The typed result of [`resolve_arguments`]
#[derive(Clone, Default)]
pub struct ResolvedArguments {
    pub argument_names: Vec<String>,
    pub prerequisites: Vec<String>,
    pub action: Option<Action>,
}

/// Resolve the trailing parts of a task definition.
///
/// The shapes recognized are:
///
/// ```text
/// (action)
/// ([prerequisite])
/// ([prerequisite], action)
/// ([argument_name], [prerequisite], action)
/// ([argument_name], [prerequisite])
/// ```
///
/// A trailing action is the action, the trailing list before it the
/// prerequisites and a further list the argument names.
pub fn resolve_arguments(mut parts: Vec<DefinitionPart>) -> Result<ResolvedArguments> {
    let mut resolved = ResolvedArguments::default();

    if let Some(DefinitionPart::Action(_)) = parts.last() {
        if let Some(DefinitionPart::Action(action)) = parts.pop() {
            resolved.action = Some(action);
        }
    }

    match parts.pop() {
        Some(DefinitionPart::List(prerequisites)) => resolved.prerequisites = prerequisites,
        Some(DefinitionPart::Action(_)) => {
            return Err(malformed("an action may only appear last"));
        }
        None => return Ok(resolved),
    }

    match parts.pop() {
        Some(DefinitionPart::List(names)) => resolved.argument_names = names,
        Some(DefinitionPart::Action(_)) => {
            return Err(malformed("an action may only appear last"));
        }
        None => return Ok(resolved),
    }

    if !parts.is_empty() {
        return Err(malformed("too many parts in task definition"));
    }

    Ok(resolved)
}

fn malformed(reason: &str) -> JakeError {
    JakeError::MalformedTaskDefinition {
        reason: reason.to_string(),
    }
}

/// Registry of tasks, scopes and rules for one run
#[derive(Default)]
pub struct TaskManager {
    tasks: HashMap<String, Task>,
    rules: Vec<Rule>,
    scope: Vec<String>,
    last_description: Option<String>,
    anonymous_seed: usize,
    dry_run: bool,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ----------------------------------------------------------------
    // Definition
    // ----------------------------------------------------------------

    /// Define (or extend) a task from positional definition parts
    pub fn define_task(
        &mut self,
        kind: TaskKind,
        name: &str,
        parts: Vec<DefinitionPart>,
    ) -> Result<&mut Task> {
        let resolved = resolve_arguments(parts)?;
        self.define(kind, name, resolved)
    }

    /// Define (or extend) a task from an already resolved triple.
    ///
    /// Repeated definitions under one name accumulate prerequisites and
    /// actions. Argument names are replaced only when new ones are given.
    pub fn define(
        &mut self,
        kind: TaskKind,
        name: &str,
        resolved: ResolvedArguments,
    ) -> Result<&mut Task> {
        let description = self.last_description.take();
        if name.is_empty() {
            return Err(malformed("no name given for task"));
        }

        let name = match name.strip_prefix(ROOT_PREFIX) {
            Some(rest) => kind.scope_name(&[], rest),
            None => kind.scope_name(&self.scope, name),
        };
        let task = self.intern(kind, &name);

        if !resolved.argument_names.is_empty() {
            task.set_argument_names(resolved.argument_names);
        }
        if let Some(description) = description {
            task.add_description(&description);
        }
        task.enhance(resolved.prerequisites, resolved.action);

        Ok(task)
    }

    /// Define a plain task
    pub fn task<I, S>(&mut self, name: &str, prerequisites: I, action: Option<Action>) -> Result<&mut Task>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.define(TaskKind::Plain, name, resolved(prerequisites, action))
    }

    /// Define a file task
    pub fn file<I, S>(&mut self, name: &str, prerequisites: I, action: Option<Action>) -> Result<&mut Task>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.define(TaskKind::File, name, resolved(prerequisites, action))
    }

    /// Define a file creation task
    pub fn file_create<I, S>(
        &mut self,
        name: &str,
        prerequisites: I,
        action: Option<Action>,
    ) -> Result<&mut Task>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.define(TaskKind::FileCreation, name, resolved(prerequisites, action))
    }

    /// Define file creation tasks for `path` and each of its parents
    pub fn directory(&mut self, path: &str) -> Result<()> {
        let mut dir = path.trim_end_matches('/').to_string();
        if dir.is_empty() {
            dir = path.to_string();
        }

        loop {
            if dir == "." || dir.is_empty() {
                break;
            }

            let parent = pathmap::dirname(&dir).to_string();
            let prerequisites: Vec<String> = if parent == "." || parent == dir {
                Vec::new()
            } else {
                vec![parent.clone()]
            };

            self.file_create(
                &dir,
                prerequisites,
                Some(action(|task, _| {
                    std::fs::create_dir_all(task.name())?;
                    Ok(())
                })),
            )?;

            if parent == dir {
                break;
            }
            dir = parent;
        }

        Ok(())
    }

    /// Define a file task that depends on the creation of its directory
    pub fn filedir<I, S>(&mut self, name: &str, prerequisites: I, action: Option<Action>) -> Result<&mut Task>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = pathmap::dirname(name).to_string();
        let mut prerequisites: Vec<String> = prerequisites.into_iter().map(Into::into).collect();

        if dir != "." {
            self.directory(&dir)?;
            prerequisites.insert(0, dir);
        }

        self.file(name, prerequisites, action)
    }

    /// Attach a description to the next defined task
    pub fn describe(&mut self, description: &str) {
        self.last_description = Some(description.to_string());
    }

    /// Return the task named `name`, creating one of `kind` if absent
    pub fn intern(&mut self, kind: TaskKind, name: &str) -> &mut Task {
        let scope = &self.scope;
        self.tasks
            .entry(name.to_string())
            .or_insert_with(|| Task::new(name, kind, scope.clone()))
    }

    /// Register a rule for names ending in `suffix`
    pub fn rule(&mut self, suffix: &str, sources: Vec<RuleSource>, action: Option<Action>) -> Result<()> {
        let rule = Rule::new(suffix, sources, action)?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    // ----------------------------------------------------------------
    // Scopes
    // ----------------------------------------------------------------

    /// Snapshot of the active namespace segments
    pub fn current_scope(&self) -> Vec<String> {
        self.scope.clone()
    }

    pub fn push_scope(&mut self, segment: &str) {
        self.scope.push(segment.to_string());
    }

    pub fn pop_scope(&mut self) -> Option<String> {
        self.scope.pop()
    }

    /// Run `f` inside a nested namespace. `None` opens an anonymous one.
    pub fn in_namespace<T>(
        &mut self,
        name: Option<&str>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let segment = match name {
            Some(name) => name.to_string(),
            None => {
                self.anonymous_seed += 1;
                format!("_anon_{}", self.anonymous_seed)
            }
        };

        self.scope.push(segment);
        let result = f(self);
        self.scope.pop();
        result
    }

    // ----------------------------------------------------------------
    // Lookup
    // ----------------------------------------------------------------

    /// Straight lookup honouring scope hints, without synthesis
    pub fn lookup(&self, name: &str, scope: Option<&[String]>) -> Option<&Task> {
        self.find(name, scope).and_then(|key| self.tasks.get(&key))
    }

    fn find(&self, name: &str, scope: Option<&[String]>) -> Option<String> {
        let initial = scope.unwrap_or(self.scope.as_slice());

        if let Some(rest) = name.strip_prefix(ROOT_PREFIX) {
            return self.find_in_scope(rest, &[]);
        }

        let carets = name.chars().take_while(|&c| c == '^').count();
        if carets > 0 {
            let kept = initial.len().saturating_sub(carets);
            return self.find_in_scope(&name[carets..], &initial[..kept]);
        }

        self.find_in_scope(name, initial)
    }

    /// Search `scope` from innermost to root for `name`
    fn find_in_scope(&self, name: &str, scope: &[String]) -> Option<String> {
        (0..=scope.len()).rev().find_map(|count| {
            let key = TaskKind::Plain.scope_name(&scope[..count], name);
            self.tasks.contains_key(&key).then_some(key)
        })
    }

    /// Resolve `name` to a task, synthesizing one from a rule or from an
    /// existing file if needed
    pub fn lookup_task(&mut self, name: &str, scope: Option<&[String]>) -> Result<&Task> {
        let key = self.resolve(name, scope)?;
        self.task_ref(&key)
    }

    fn resolve(&mut self, name: &str, scope: Option<&[String]>) -> Result<String> {
        if let Some(key) = self.find(name, scope) {
            return Ok(key);
        }

        if let Some(key) = self.enhance_with_matching_rule(name, 0, &InvocationChain::empty())? {
            return Ok(key);
        }

        if let Some(key) = self.synthesize_file_task(name)? {
            return Ok(key);
        }

        Err(JakeError::UnknownTask {
            name: name.to_string(),
        })
    }

    fn synthesize_file_task(&mut self, name: &str) -> Result<Option<String>> {
        if !Path::new(name).exists() {
            return Ok(None);
        }

        let task = self.file(name, Vec::<String>::new(), None)?;
        Ok(Some(task.name().to_string()))
    }

    /// Try each rule matching `name` in registration order
    fn enhance_with_matching_rule(
        &mut self,
        name: &str,
        level: usize,
        attempting: &InvocationChain,
    ) -> Result<Option<String>> {
        if level >= MAX_RULE_DEPTH {
            return Err(JakeError::RuleRecursionTooDeep {
                name: name.to_string(),
            });
        }

        // A name already being synthesized up the stack can't be a source
        let Ok(attempting) = attempting.append(name) else {
            return Ok(None);
        };

        for idx in 0..self.rules.len() {
            if !self.rules[idx].matches(name) {
                continue;
            }
            let rule = self.rules[idx].clone();
            if let Some(key) = self.attempt_rule(name, &rule, level, &attempting)? {
                return Ok(Some(key));
            }
        }

        Ok(None)
    }

    fn attempt_rule(
        &mut self,
        name: &str,
        rule: &Rule,
        level: usize,
        attempting: &InvocationChain,
    ) -> Result<Option<String>> {
        let indent = "    ".repeat(level);
        let mut prerequisites = Vec::new();

        for source in rule.make_sources(name)? {
            debug!("{}Attempting Rule {} => {}", indent, name, source);

            if Path::new(&source).exists() || self.find(&source, None).is_some() {
                debug!("{}({} => {} ... EXIST)", indent, name, source);
                prerequisites.push(source);
            } else if let Some(parent) = self.enhance_with_matching_rule(&source, level + 1, attempting)? {
                debug!("{}({} => {} ... ENHANCE)", indent, name, source);
                prerequisites.push(parent);
            } else {
                debug!("{}({} => {} ... FAIL)", indent, name, source);
                return Ok(None);
            }
        }

        let task = self.file(name, prerequisites, rule.action().cloned())?;
        Ok(Some(task.name().to_string()))
    }

    // ----------------------------------------------------------------
    // Invocation
    // ----------------------------------------------------------------

    /// Invoke `name` at the top level with positional argument values
    pub fn invoke<S: Into<String>>(&mut self, name: &str, values: impl IntoIterator<Item = S>) -> Result<()> {
        let key = self.resolve(name, None)?;
        let args = TaskArguments::new(self.task_ref(&key)?.argument_names(), values);
        self.invoke_with_chain(&key, &args, &InvocationChain::empty())
    }

    /// Invoke the task registered as `key`, detecting cycles through `chain`
    pub fn invoke_with_chain(
        &mut self,
        key: &str,
        args: &TaskArguments,
        chain: &InvocationChain,
    ) -> Result<()> {
        let chain = chain.append(key)?;

        let task = self.task_mut(key)?;
        if !task.begin_invocation() {
            return Ok(());
        }
        debug!("** Invoke {}", key);

        let prerequisites = task.prerequisites().to_vec();
        let scope = task.scope().to_vec();
        self.invoke_prerequisites(&prerequisites, &scope, args, &chain)?;

        if self.is_needed(key)? {
            self.execute(key, args)
        } else {
            debug!("** Skip {} (up to date)", key);
            Ok(())
        }
    }

    fn invoke_prerequisites(
        &mut self,
        prerequisites: &[String],
        scope: &[String],
        args: &TaskArguments,
        chain: &InvocationChain,
    ) -> Result<()> {
        for name in prerequisites {
            let key = self.resolve(name, Some(scope))?;
            let child_args = args.new_scope(self.task_ref(&key)?.argument_names());
            self.invoke_with_chain(&key, &child_args, chain)?;
        }
        Ok(())
    }

    /// Run the actions of `key` unless in dry-run mode
    pub fn execute(&self, key: &str, args: &TaskArguments) -> Result<()> {
        let task = self.task_ref(key)?;
        if self.dry_run {
            info!("** Execute (dry run) {}", key);
            return Ok(());
        }
        task.execute(args)
    }

    /// Staleness policy of `key`
    pub fn is_needed(&mut self, key: &str) -> Result<bool> {
        let newest = if self.task_ref(key)?.compares_prerequisites() {
            self.newest_prerequisite(key, &InvocationChain::empty())?
        } else {
            None
        };
        Ok(self.task_ref(key)?.is_needed(newest))
    }

    /// Time stamp of `key`
    pub fn timestamp(&mut self, key: &str) -> Result<Timestamp> {
        self.timestamp_in(key, &InvocationChain::empty())
    }

    fn timestamp_in(&mut self, key: &str, chain: &InvocationChain) -> Result<Timestamp> {
        let newest = if self.task_ref(key)?.derives_timestamp() {
            self.newest_prerequisite(key, chain)?
        } else {
            None
        };
        Ok(self.task_ref(key)?.timestamp(newest))
    }

    fn newest_prerequisite(&mut self, key: &str, chain: &InvocationChain) -> Result<Option<Timestamp>> {
        let chain = chain.append(key)?;
        let task = self.task_ref(key)?;
        let prerequisites = task.prerequisites().to_vec();
        let scope = task.scope().to_vec();

        let mut newest = None;
        for name in &prerequisites {
            let prerequisite = self.resolve(name, Some(&scope))?;
            let timestamp = self.timestamp_in(&prerequisite, &chain)?;
            newest = newest.max(Some(timestamp));
        }
        Ok(newest)
    }

    // ----------------------------------------------------------------
    // Administration
    // ----------------------------------------------------------------

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reset the invoked flag of `name`
    pub fn reenable(&mut self, name: &str) -> Result<()> {
        let key = self
            .find(name, None)
            .ok_or_else(|| JakeError::UnknownTask {
                name: name.to_string(),
            })?;
        self.task_mut(&key)?.reenable();
        Ok(())
    }

    /// Reset every invoked flag so the whole graph can run again
    pub fn reenable_all(&mut self) {
        for task in self.tasks.values_mut() {
            task.reenable();
        }
    }

    /// Drop every task and rule
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.rules.clear();
    }

    /// Names of all tasks, sorted
    pub fn tasks(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of all tasks defined in `scope` and its sub-scopes, sorted
    pub fn tasks_in_scope(&self, scope: &[String]) -> Vec<&str> {
        let prefix = format!("{}:", scope.join(":"));
        self.tasks()
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect()
    }

    /// Registered task by exact name
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.get_mut(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.find(name, None).is_some()
    }

    fn task_ref(&self, key: &str) -> Result<&Task> {
        self.tasks.get(key).ok_or_else(|| JakeError::UnknownTask {
            name: key.to_string(),
        })
    }

    fn task_mut(&mut self, key: &str) -> Result<&mut Task> {
        self.tasks.get_mut(key).ok_or_else(|| JakeError::UnknownTask {
            name: key.to_string(),
        })
    }
}

fn resolved<I, S>(prerequisites: I, action: Option<Action>) -> ResolvedArguments
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ResolvedArguments {
        argument_names: Vec::new(),
        prerequisites: prerequisites.into_iter().map(Into::into).collect(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime};

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log) -> Action {
        let log = Rc::clone(log);
        action(move |task, _| {
            log.borrow_mut().push(task.name().to_string());
            Ok(())
        })
    }

    fn no_prereqs() -> Vec<String> {
        Vec::new()
    }

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_resolve_arguments_shapes() {
        let act = action(|_, _| Ok(()));

        let r = resolve_arguments(vec![act.clone().into()]).unwrap();
        assert!(r.action.is_some() && r.prerequisites.is_empty());

        let r = resolve_arguments(vec![DefinitionPart::list(["a"])]).unwrap();
        assert_eq!(r.prerequisites, vec!["a"]);
        assert!(r.action.is_none());

        let r = resolve_arguments(vec![
            DefinitionPart::list(["x", "y"]),
            DefinitionPart::list(["a"]),
            act.clone().into(),
        ])
        .unwrap();
        assert_eq!(r.argument_names, vec!["x", "y"]);
        assert_eq!(r.prerequisites, vec!["a"]);
        assert!(r.action.is_some());

        assert!(matches!(
            resolve_arguments(vec![act.clone().into(), act.into()]),
            Err(JakeError::MalformedTaskDefinition { .. })
        ));
    }

    #[test]
    fn test_define_without_name_is_malformed() {
        let mut manager = TaskManager::new();
        assert!(matches!(
            manager.define_task(TaskKind::Plain, "", Vec::new()),
            Err(JakeError::MalformedTaskDefinition { .. })
        ));
    }

    #[test]
    fn test_repeated_definitions_accumulate() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("t", ["a"], Some(recorder(&log))).unwrap();
        manager.task("t", ["b"], Some(recorder(&log))).unwrap();
        manager.task("a", no_prereqs(), None).unwrap();
        manager.task("b", no_prereqs(), None).unwrap();

        let task = manager.get("t").unwrap();
        assert_eq!(task.prerequisites(), ["a", "b"]);
        assert_eq!(task.actions().len(), 2);

        manager.invoke("t", Vec::<String>::new()).unwrap();
        assert_eq!(*log.borrow(), vec!["t", "t"]);
    }

    #[test]
    fn test_invocation_is_idempotent() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("t", no_prereqs(), Some(recorder(&log))).unwrap();

        manager.invoke("t", Vec::<String>::new()).unwrap();
        manager.invoke("t", Vec::<String>::new()).unwrap();
        assert_eq!(log.borrow().len(), 1);

        manager.reenable("t").unwrap();
        manager.invoke("t", Vec::<String>::new()).unwrap();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_prerequisites_run_depth_first_in_order() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("a", no_prereqs(), Some(recorder(&log))).unwrap();
        manager.task("b", ["a"], Some(recorder(&log))).unwrap();
        manager.task("c", ["a"], Some(recorder(&log))).unwrap();
        manager.task("d", ["b", "c"], Some(recorder(&log))).unwrap();

        manager.invoke("d", Vec::<String>::new()).unwrap();
        // Diamond: `a` runs once, before both of its dependents
        assert_eq!(*log.borrow(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_forward_references_resolve_at_invocation() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("top", ["later"], Some(recorder(&log))).unwrap();
        manager.task("later", no_prereqs(), Some(recorder(&log))).unwrap();

        manager.invoke("top", Vec::<String>::new()).unwrap();
        assert_eq!(*log.borrow(), vec!["later", "top"]);
    }

    #[test]
    fn test_cycle_fails_before_any_action() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("a", ["b"], Some(recorder(&log))).unwrap();
        manager.task("b", ["a"], Some(recorder(&log))).unwrap();

        match manager.invoke("a", Vec::<String>::new()) {
            Err(JakeError::CircularDependency { chain }) => {
                assert_eq!(chain, "TOP => a => b => a");
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_unknown_task() {
        let mut manager = TaskManager::new();
        match manager.invoke("no-such-task-here", Vec::<String>::new()) {
            Err(JakeError::UnknownTask { name }) => assert_eq!(name, "no-such-task-here"),
            other => panic!("expected unknown task, got {:?}", other),
        }
    }

    #[test]
    fn test_action_failure_stops_the_run() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager
            .task("bad", no_prereqs(), Some(action(|_, _| Err("exploded".into()))))
            .unwrap();
        manager.task("top", ["bad"], Some(recorder(&log))).unwrap();

        let err = manager.invoke("top", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, JakeError::ActionFailed { ref task, .. } if task == "bad"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_scoped_names_and_resolution() {
        let mut manager = TaskManager::new();
        manager.task("t", no_prereqs(), None).unwrap();
        manager
            .in_namespace(Some("outer"), |m| {
                m.task("t", no_prereqs(), None)?;
                m.in_namespace(Some("inner"), |m| {
                    m.task("t", no_prereqs(), None)?;
                    m.task("only_inner", no_prereqs(), None)?;
                    Ok(())
                })
            })
            .unwrap();

        let inner = vec!["outer".to_string(), "inner".to_string()];
        let outer = vec!["outer".to_string()];

        assert_eq!(manager.lookup("t", Some(inner.as_slice())).unwrap().name(), "outer:inner:t");
        assert_eq!(manager.lookup("t", Some(outer.as_slice())).unwrap().name(), "outer:t");
        assert_eq!(manager.lookup("t", None).unwrap().name(), "t");
        assert_eq!(manager.lookup("^t", Some(inner.as_slice())).unwrap().name(), "outer:t");
        assert_eq!(manager.lookup("^^t", Some(inner.as_slice())).unwrap().name(), "t");
        assert_eq!(manager.lookup("jake:t", Some(inner.as_slice())).unwrap().name(), "t");
        assert!(manager.lookup("only_inner", Some(outer.as_slice())).is_none());
        assert_eq!(
            manager.lookup("inner:only_inner", Some(outer.as_slice())).unwrap().name(),
            "outer:inner:only_inner"
        );
    }

    #[test]
    fn test_scope_falls_back_to_ancestors() {
        let mut manager = TaskManager::new();
        manager.task("t", no_prereqs(), None).unwrap();
        manager
            .in_namespace(Some("outer"), |m| {
                m.in_namespace(Some("inner"), |m| {
                    m.task("x", ["t"], None)?;
                    Ok(())
                })
            })
            .unwrap();

        let inner = vec!["outer".to_string(), "inner".to_string()];
        assert_eq!(manager.lookup("t", Some(inner.as_slice())).unwrap().name(), "t");
        assert_eq!(manager.get("outer:inner:x").unwrap().scope(), inner.as_slice());
        assert!(manager.current_scope().is_empty());
    }

    #[test]
    fn test_prerequisites_resolve_in_defining_scope() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("setup", no_prereqs(), Some(recorder(&log))).unwrap();
        manager
            .in_namespace(Some("db"), |m| {
                m.task("setup", no_prereqs(), Some(recorder(&log)))?;
                m.task("migrate", ["setup", "^setup"], Some(recorder(&log)))?;
                Ok(())
            })
            .unwrap();

        manager.invoke("db:migrate", Vec::<String>::new()).unwrap();
        assert_eq!(*log.borrow(), vec!["db:setup", "setup", "db:migrate"]);
    }

    #[test]
    fn test_anonymous_namespaces() {
        let mut manager = TaskManager::new();
        manager
            .in_namespace(None, |m| m.task("a", no_prereqs(), None).map(|_| ()))
            .unwrap();
        manager
            .in_namespace(None, |m| m.task("a", no_prereqs(), None).map(|_| ()))
            .unwrap();
        assert_eq!(manager.tasks(), vec!["_anon_1:a", "_anon_2:a"]);
    }

    #[test]
    fn test_file_tasks_ignore_scope() {
        let mut manager = TaskManager::new();
        manager
            .in_namespace(Some("build"), |m| {
                m.file("out/app", no_prereqs(), None)?;
                m.task("app", ["out/app"], None)?;
                Ok(())
            })
            .unwrap();

        assert!(manager.get("out/app").is_some());
        assert!(manager.get("build:app").is_some());
        assert_eq!(
            manager.tasks_in_scope(&["build".to_string()]),
            vec!["build:app"]
        );
    }

    #[test]
    fn test_arguments_flow_to_prerequisites() {
        let seen: Rc<RefCell<Vec<(String, Option<String>)>>> = Rc::default();
        let mut manager = TaskManager::new();

        let record = |seen: &Rc<RefCell<Vec<(String, Option<String>)>>>| {
            let seen = Rc::clone(seen);
            action(move |task, args| {
                seen.borrow_mut()
                    .push((task.name().to_string(), args.lookup("jake_test_flavor")));
                Ok(())
            })
        };

        manager
            .define_task(
                TaskKind::Plain,
                "child",
                vec![
                    DefinitionPart::list(["jake_test_flavor"]),
                    DefinitionPart::list(Vec::<String>::new()),
                    record(&seen).into(),
                ],
            )
            .unwrap();
        manager
            .define_task(
                TaskKind::Plain,
                "parent",
                vec![
                    DefinitionPart::list(["jake_test_flavor"]),
                    DefinitionPart::list(["child"]),
                    record(&seen).into(),
                ],
            )
            .unwrap();

        manager.invoke("parent", ["vanilla"]).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                ("child".to_string(), Some("vanilla".to_string())),
                ("parent".to_string(), Some("vanilla".to_string())),
            ]
        );
    }

    #[test]
    fn test_missing_file_task_is_needed() {
        let dir = tempfile::tempdir().unwrap();
        let target = path_str(&dir.path().join("out.txt"));
        let log: Log = Rc::default();

        let mut manager = TaskManager::new();
        manager.file(&target, no_prereqs(), Some(recorder(&log))).unwrap();
        manager.invoke(&target, Vec::<String>::new()).unwrap();
        assert_eq!(*log.borrow(), vec![target]);
    }

    #[test]
    fn test_fresh_file_task_is_skipped_and_stale_one_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");
        let target = dir.path().join("out.txt");
        std::fs::write(&source, "in").unwrap();
        std::fs::write(&target, "out").unwrap();

        let now = SystemTime::now();
        set_mtime(&source, now - Duration::from_secs(3600));
        set_mtime(&target, now);

        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager
            .file(&path_str(&target), [path_str(&source)], Some(recorder(&log)))
            .unwrap();

        manager.invoke(&path_str(&target), Vec::<String>::new()).unwrap();
        assert!(log.borrow().is_empty());
        // The existing source was synthesized as a file task
        assert_eq!(manager.get(&path_str(&source)).unwrap().kind(), TaskKind::File);

        set_mtime(&source, now + Duration::from_secs(3600));
        manager.reenable_all();
        manager.invoke(&path_str(&target), Vec::<String>::new()).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_file_creation_task_runs_only_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");
        let target = dir.path().join("made");
        std::fs::write(&source, "in").unwrap();

        let log: Log = Rc::default();
        let log_clone = Rc::clone(&log);
        let mut manager = TaskManager::new();
        manager
            .file_create(
                &path_str(&target),
                [path_str(&source)],
                Some(action(move |task, _| {
                    log_clone.borrow_mut().push(task.name().to_string());
                    std::fs::create_dir(task.name())?;
                    Ok(())
                })),
            )
            .unwrap();

        manager.invoke(&path_str(&target), Vec::<String>::new()).unwrap();
        assert_eq!(log.borrow().len(), 1);

        set_mtime(&source, SystemTime::now() + Duration::from_secs(3600));
        manager.reenable_all();
        manager.invoke(&path_str(&target), Vec::<String>::new()).unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(manager.timestamp(&path_str(&target)).unwrap(), Timestamp::Early);
    }

    #[test]
    fn test_file_creation_prerequisite_does_not_force_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let target = out_dir.join("app");
        std::fs::create_dir(&out_dir).unwrap();
        std::fs::write(&target, "bin").unwrap();

        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.directory(&path_str(&out_dir)).unwrap();
        manager
            .file(&path_str(&target), [path_str(&out_dir)], Some(recorder(&log)))
            .unwrap();

        manager.invoke(&path_str(&target), Vec::<String>::new()).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_plain_timestamp_is_newest_prerequisite() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        std::fs::write(&old, "").unwrap();
        std::fs::write(&new, "").unwrap();
        let base = SystemTime::now() - Duration::from_secs(7200);
        set_mtime(&old, base);
        set_mtime(&new, base + Duration::from_secs(60));

        let mut manager = TaskManager::new();
        manager.task("group", [path_str(&old), path_str(&new)], None).unwrap();
        assert_eq!(
            manager.timestamp("group").unwrap(),
            Timestamp::of_path(&new)
        );
    }

    #[test]
    fn test_directory_defines_each_level() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");

        let mut manager = TaskManager::new();
        manager.directory(&path_str(&nested)).unwrap();

        let c = manager.get(&path_str(&nested)).unwrap();
        assert_eq!(c.kind(), TaskKind::FileCreation);
        assert_eq!(c.prerequisites(), [path_str(&dir.path().join("a/b"))]);

        manager.invoke(&path_str(&nested), Vec::<String>::new()).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_filedir_creates_parent_first() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("build/out.txt");

        let mut manager = TaskManager::new();
        manager
            .filedir(
                &path_str(&target),
                no_prereqs(),
                Some(action(|task, _| {
                    std::fs::write(task.name(), "done")?;
                    Ok(())
                })),
            )
            .unwrap();

        manager.invoke(&path_str(&target), Vec::<String>::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "done");
    }

    #[test]
    fn test_rule_synthesizes_file_task() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.c"), "int main;").unwrap();
        let object = path_str(&dir.path().join("main.o"));

        let mut manager = TaskManager::new();
        manager
            .rule(
                ".o",
                vec![".c".into()],
                Some(action(|task, _| {
                    let source = &task.prerequisites()[0];
                    std::fs::copy(source, task.name())?;
                    Ok(())
                })),
            )
            .unwrap();

        let task = manager.lookup_task(&object, None).unwrap();
        assert_eq!(task.kind(), TaskKind::File);
        assert_eq!(task.prerequisites(), [path_str(&dir.path().join("main.c"))]);

        manager.invoke(&object, Vec::<String>::new()).unwrap();
        assert!(Path::new(&object).exists());
    }

    #[test]
    fn test_rule_chains_through_other_rules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.md"), "# doc").unwrap();
        let pdf = path_str(&dir.path().join("doc.pdf"));
        let html = path_str(&dir.path().join("doc.html"));

        let mut manager = TaskManager::new();
        manager.rule(".pdf", vec![".html".into()], None).unwrap();
        manager.rule(".html", vec![".md".into()], None).unwrap();

        let task = manager.lookup_task(&pdf, None).unwrap();
        assert_eq!(task.prerequisites(), [html.clone()]);
        assert!(manager.get(&html).is_some());
    }

    #[test]
    fn test_failed_rule_falls_through_to_next() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cc"), "").unwrap();
        let object = path_str(&dir.path().join("a.o"));

        let mut manager = TaskManager::new();
        manager.rule(".o", vec![".c".into()], None).unwrap();
        manager.rule(".o", vec![".cc".into()], None).unwrap();

        let task = manager.lookup_task(&object, None).unwrap();
        assert_eq!(task.prerequisites(), [path_str(&dir.path().join("a.cc"))]);
    }

    #[test]
    fn test_rule_without_sources_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let object = path_str(&dir.path().join("nothing.o"));

        let mut manager = TaskManager::new();
        manager.rule(".o", vec![".c".into()], None).unwrap();

        assert!(matches!(
            manager.lookup_task(&object, None),
            Err(JakeError::UnknownTask { .. })
        ));
        assert!(manager.get(&object).is_none());
    }

    #[test]
    fn test_mutually_recursive_rules_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let name = path_str(&dir.path().join("x.a"));

        let mut manager = TaskManager::new();
        manager.rule(".a", vec![".b".into()], None).unwrap();
        manager.rule(".b", vec![".a".into()], None).unwrap();

        // x.a -> x.b -> x.a is cut off by the attempt chain
        assert!(matches!(
            manager.lookup_task(&name, None),
            Err(JakeError::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_growing_rule_recursion_is_bounded() {
        let mut manager = TaskManager::new();
        manager
            .add_rule(Rule::with_regex(
                regex::Regex::new(r"\.x$").unwrap(),
                vec!["%p.x".into()],
                None,
            ));

        assert!(matches!(
            manager.lookup_task("/nonexistent-jake-dir/seed.x", None),
            Err(JakeError::RuleRecursionTooDeep { .. })
        ));
    }

    #[test]
    fn test_describe_applies_to_next_task() {
        let mut manager = TaskManager::new();
        manager.describe("Compile everything.");
        manager.task("build", no_prereqs(), None).unwrap();
        manager.task("other", no_prereqs(), None).unwrap();

        assert_eq!(manager.get("build").unwrap().comment(), "Compile everything.");
        assert_eq!(manager.get("other").unwrap().comment(), "");
    }

    #[test]
    fn test_description_dropped_with_failed_definition() {
        let mut manager = TaskManager::new();
        manager.describe("Never attached.");
        assert!(manager.task("", no_prereqs(), None).is_err());
        manager.task("next", no_prereqs(), None).unwrap();

        assert_eq!(manager.get("next").unwrap().comment(), "");
    }

    #[test]
    fn test_dry_run_skips_actions() {
        let log: Log = Rc::default();
        let mut manager = TaskManager::new();
        manager.task("t", no_prereqs(), Some(recorder(&log))).unwrap();
        manager.set_dry_run(true);

        manager.invoke("t", Vec::<String>::new()).unwrap();
        assert!(log.borrow().is_empty());
        assert!(manager.get("t").unwrap().is_invoked());
    }

    #[test]
    fn test_clear_drops_tasks_and_rules() {
        let mut manager = TaskManager::new();
        manager.task("t", no_prereqs(), None).unwrap();
        manager.rule(".o", vec![".c".into()], None).unwrap();
        manager.clear();
        assert!(manager.tasks().is_empty());
        assert!(manager.rules().is_empty());
    }
}
