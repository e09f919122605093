//! Configuration parsing for Jakefile.toml
//!
//! Handles loading and validating the build definition.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{JakeError, Result};

/// Default build file names to search for
pub const CONFIG_FILES: &[&str] = &["Jakefile.toml", "jakefile.toml"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Environment variables set before any task runs
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Plain tasks in the root scope
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,

    /// File tasks, keyed by path
    #[serde(default)]
    pub files: BTreeMap<String, TaskConfig>,

    /// File creation tasks, keyed by path
    #[serde(default)]
    pub file_create: BTreeMap<String, TaskConfig>,

    /// Directories to create on demand
    #[serde(default)]
    pub directories: Vec<String>,

    /// Nested namespaces
    #[serde(default)]
    pub namespace: BTreeMap<String, NamespaceConfig>,

    /// Rules for synthesizing file tasks, tried in order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Extra patterns removed by `clean`
    #[serde(default)]
    pub clean: Vec<String>,

    /// Patterns removed by `clobber`
    #[serde(default)]
    pub clobber: Vec<String>,
}

/// Global settings for jake behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Shell used for `run` commands
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Watch debounce delay in milliseconds
    #[serde(default = "default_debounce")]
    pub watch_debounce_ms: u64,

    /// Task run when none is named on the command line
    #[serde(default = "default_task")]
    pub default: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            watch_debounce_ms: default_debounce(),
            default: default_task(),
        }
    }
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_debounce() -> u64 {
    300
}

fn default_task() -> String {
    "default".to_string()
}

/// Tasks, files and sub-namespaces registered under one namespace segment
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,

    #[serde(default)]
    pub files: BTreeMap<String, TaskConfig>,

    #[serde(default)]
    pub file_create: BTreeMap<String, TaskConfig>,

    #[serde(default)]
    pub directories: Vec<String>,

    #[serde(default)]
    pub namespace: BTreeMap<String, NamespaceConfig>,
}

/// Configuration for a single task
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Human-readable description
    #[serde(default)]
    pub desc: Option<String>,

    /// Prerequisite names, resolved when the task is invoked
    #[serde(default)]
    pub deps: Vec<String>,

    /// Declared argument names, bound from `task[a,b]`
    #[serde(default)]
    pub args: Vec<String>,

    /// Shell commands to run
    #[serde(default)]
    pub run: Vec<String>,

    /// Rhai script to execute (alternative to `run`)
    #[serde(default)]
    pub script: Option<String>,
}

/// A rule: names ending in `pattern` get a file task built from `sources`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub pattern: String,

    /// Source specs: `.ext`, a pathmap spec with `%`, or a literal path
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub run: Vec<String>,

    #[serde(default)]
    pub script: Option<String>,
}

impl Config {
    /// Load configuration from the specified path or search for it
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf)> {
        let config_path = match path {
            Some(p) => {
                if p.exists() {
                    p.to_path_buf()
                } else {
                    return Err(JakeError::ConfigNotFound {
                        searched: vec![p.to_path_buf()],
                    });
                }
            }
            None => Self::find_config(&std::env::current_dir()?)?,
        };

        let content = std::fs::read_to_string(&config_path)?;
        let config = Self::parse(&content, &config_path)?;

        Ok((config, config_path))
    }

    /// Parse and validate a build definition
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| JakeError::ConfigParse {
            source: e,
            path: path.to_path_buf(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Search for a build file starting from `start` and walking upward
    pub fn find_config(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();
        let mut searched = Vec::new();

        loop {
            for name in CONFIG_FILES {
                let candidate = current.join(name);
                searched.push(candidate.clone());
                if candidate.exists() {
                    return Ok(candidate);
                }
            }

            if !current.pop() {
                break;
            }
        }

        Err(JakeError::ConfigNotFound { searched })
    }

    /// The root scope's definitions
    pub fn root(&self) -> NamespaceConfig {
        NamespaceConfig {
            tasks: self.tasks.clone(),
            files: self.files.clone(),
            file_create: self.file_create.clone(),
            directories: self.directories.clone(),
            namespace: self.namespace.clone(),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.root().validate("")?;

        for rule in &self.rules {
            if rule.pattern.is_empty() {
                return Err(JakeError::InvalidTask {
                    task: "rule".to_string(),
                    reason: "Rule pattern cannot be empty".to_string(),
                });
            }
            check_action(&rule.pattern, &rule.run, rule.script.as_deref())?;
        }

        Ok(())
    }
}

impl NamespaceConfig {
    fn validate(&self, prefix: &str) -> Result<()> {
        let definitions = self
            .tasks
            .iter()
            .chain(self.files.iter())
            .chain(self.file_create.iter());

        for (name, task) in definitions {
            let qualified = format!("{}{}", prefix, name);

            if name.is_empty() {
                return Err(JakeError::InvalidTask {
                    task: qualified,
                    reason: "Task name cannot be empty".to_string(),
                });
            }

            check_action(&qualified, &task.run, task.script.as_deref())?;

            // Check for self-dependency
            if task.deps.contains(name) {
                return Err(JakeError::InvalidTask {
                    task: qualified,
                    reason: "Task cannot depend on itself".to_string(),
                });
            }
        }

        for (segment, nested) in &self.namespace {
            nested.validate(&format!("{}{}:", prefix, segment))?;
        }

        Ok(())
    }
}

fn check_action(task: &str, run: &[String], script: Option<&str>) -> Result<()> {
    if !run.is_empty() && script.is_some() {
        return Err(JakeError::InvalidTask {
            task: task.to_string(),
            reason: "Task cannot have both 'run' and 'script'".to_string(),
        });
    }
    Ok(())
}
