//! Registers a parsed build definition with a [`TaskManager`]

use tracing::debug;

use crate::clean::{define_clean_tasks, default_clean_set};
use crate::command::command_action;
use crate::config::{Config, NamespaceConfig, TaskConfig};
use crate::error::Result;
use crate::fileset::FileSet;
use crate::manager::{ResolvedArguments, TaskManager};
use crate::rule::RuleSource;
use crate::script::script_action;
use crate::task::{Action, TaskKind};

/// Define every task, directory, namespace and rule in `config`
pub fn load(manager: &mut TaskManager, config: &Config) -> Result<()> {
    let shell = config.settings.shell.as_str();

    register_namespace(manager, &config.root(), shell)?;

    for rule in &config.rules {
        let sources = rule.sources.iter().map(|s| RuleSource::from(s.as_str())).collect();
        let action = build_action(&rule.pattern, &rule.run, rule.script.as_deref(), shell)?;
        manager.rule(&rule.pattern, sources, action)?;
    }

    if !config.clean.is_empty() || !config.clobber.is_empty() {
        let mut clean = default_clean_set();
        clean.include(config.clean.iter().cloned());
        let clobber = FileSet::from_patterns(config.clobber.iter().cloned());
        define_clean_tasks(manager, clean, clobber)?;
    }

    debug!("Loaded {} tasks and {} rules", manager.tasks().len(), manager.rules().len());
    Ok(())
}

fn register_namespace(manager: &mut TaskManager, ns: &NamespaceConfig, shell: &str) -> Result<()> {
    for dir in &ns.directories {
        manager.directory(dir)?;
    }

    for (name, task) in &ns.tasks {
        define(manager, TaskKind::Plain, name, task, shell)?;
    }
    for (name, task) in &ns.files {
        define(manager, TaskKind::File, name, task, shell)?;
    }
    for (name, task) in &ns.file_create {
        define(manager, TaskKind::FileCreation, name, task, shell)?;
    }

    for (segment, nested) in &ns.namespace {
        manager.in_namespace(Some(segment.as_str()), |m| register_namespace(m, nested, shell))?;
    }

    Ok(())
}

fn define(manager: &mut TaskManager, kind: TaskKind, name: &str, task: &TaskConfig, shell: &str) -> Result<()> {
    let action = build_action(name, &task.run, task.script.as_deref(), shell)?;
    if let Some(desc) = &task.desc {
        manager.describe(desc);
    }
    manager.define(
        kind,
        name,
        ResolvedArguments {
            argument_names: task.args.clone(),
            prerequisites: task.deps.clone(),
            action,
        },
    )?;
    Ok(())
}

fn build_action(name: &str, run: &[String], script: Option<&str>, shell: &str) -> Result<Option<Action>> {
    if let Some(script) = script {
        return script_action(name, script).map(Some);
    }
    if run.is_empty() {
        return Ok(None);
    }
    Ok(Some(command_action(shell, run)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(toml: &str) -> Config {
        Config::parse(toml, Path::new("Jakefile.toml")).unwrap()
    }

    #[test]
    fn test_registers_scoped_tasks() {
        let config = config(
            r#"
            [tasks.default]
            deps = ["db:migrate"]

            [namespace.db.tasks.migrate]
            desc = "Migrate the database."
            deps = ["^setup"]
            args = ["version"]

            [tasks.setup]
            run = ["true"]
        "#,
        );

        let mut manager = TaskManager::new();
        load(&mut manager, &config).unwrap();

        assert_eq!(manager.tasks(), vec!["db:migrate", "default", "setup"]);
        let migrate = manager.get("db:migrate").unwrap();
        assert_eq!(migrate.comment(), "Migrate the database.");
        assert_eq!(migrate.argument_names(), ["version"]);
        assert_eq!(migrate.scope(), ["db".to_string()]);
        assert_eq!(manager.get("setup").unwrap().actions().len(), 1);
        assert!(manager.get("clean").is_none());
    }

    #[test]
    fn test_registers_files_rules_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().display().to_string();
        std::fs::write(dir.path().join("main.c"), "").unwrap();

        let config = config(&format!(
            r#"
            directories = ["{base}/build"]
            clobber = ["{base}/build"]

            [file_create."{base}/stamp"]
            run = ["touch ${{name}}"]

            [files."{base}/build/main.o"]
            deps = ["{base}/build"]

            [[rules]]
            pattern = ".o"
            sources = ["%{{/build/,/}}X.c"]
            run = ["cp ${{source}} ${{name}}"]
        "#
        ));

        let mut manager = TaskManager::new();
        load(&mut manager, &config).unwrap();

        assert_eq!(
            manager.get(&format!("{}/build", base)).unwrap().kind(),
            TaskKind::FileCreation
        );
        assert_eq!(manager.get(&format!("{}/stamp", base)).unwrap().kind(), TaskKind::FileCreation);
        assert_eq!(manager.rules().len(), 1);
        assert!(manager.get("clean").is_some());
        assert_eq!(manager.get("clobber").unwrap().prerequisites(), ["jake:clean"]);
    }

    #[test]
    fn test_rule_from_config_builds_target() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().display().to_string();
        std::fs::write(dir.path().join("doc.md"), "hello").unwrap();

        let config = config(
            r#"
            [[rules]]
            pattern = ".html"
            sources = [".md"]
            run = ["cp ${source} ${name}"]
        "#,
        );

        let mut manager = TaskManager::new();
        load(&mut manager, &config).unwrap();

        let target = format!("{}/doc.html", base);
        manager.invoke(&target, Vec::<String>::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn test_bad_script_fails_loading() {
        let config = config("[tasks.bad]\nscript = \"let = ;\"\n");
        let mut manager = TaskManager::new();
        assert!(load(&mut manager, &config).is_err());
    }

    #[test]
    fn test_failed_definition_does_not_leak_description() {
        let bad = TaskConfig {
            desc: Some("Broken task.".to_string()),
            script: Some("let = ;".to_string()),
            ..Default::default()
        };
        let mut manager = TaskManager::new();
        assert!(define(&mut manager, TaskKind::Plain, "bad", &bad, "sh").is_err());

        define(&mut manager, TaskKind::Plain, "next", &TaskConfig::default(), "sh").unwrap();
        assert_eq!(manager.get("next").unwrap().comment(), "");
    }
}
