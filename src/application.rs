//! The top-level driver
//!
//! An [`Application`] locates and loads the build file into its
//! [`TaskManager`], turns command line targets into invocations and
//! renders task listings.

use std::path::{Path, PathBuf};
use std::time::Instant;

use console::style;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::loader;
use crate::manager::TaskManager;

static TASK_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\[]+)\[(.*)\]$").expect("valid task string regex"));

static ENV_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)=(.*)$").expect("valid env assignment regex"));

/// Split `name[a,b]` into the name and its positional arguments
pub fn parse_task_string(string: &str) -> (String, Vec<String>) {
    match TASK_STRING.captures(string) {
        Some(caps) => {
            let args = caps[2].trim();
            let args = if args.is_empty() {
                Vec::new()
            } else {
                args.split(',').map(|a| a.trim().to_string()).collect()
            };
            (caps[1].to_string(), args)
        }
        None => (string.to_string(), Vec::new()),
    }
}

/// Listing modes for `--tasks`, `--describe` and `--prereqs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Described tasks with the first sentence of their description
    Tasks,
    /// Described tasks with their full description
    Describe,
    /// Every task with its prerequisites
    Prereqs,
}

/// Options that shape a run
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Build file; searched for when absent
    pub jakefile: Option<PathBuf>,
    /// Log actions instead of running them
    pub dry_run: bool,
    /// Suppress the build time line
    pub quiet: bool,
}

/// Command line targets split into environment assignments and tasks
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub env: Vec<(String, String)>,
    pub tasks: Vec<String>,
}

impl CommandLine {
    pub fn parse(targets: &[String]) -> Self {
        let mut line = Self::default();
        for target in targets {
            match ENV_ASSIGNMENT.captures(target) {
                Some(caps) => line.env.push((caps[1].to_string(), caps[2].to_string())),
                None => line.tasks.push(target.clone()),
            }
        }
        line
    }
}

pub struct Application {
    manager: TaskManager,
    config: Config,
    config_path: Option<PathBuf>,
    options: Options,
}

impl Application {
    pub fn new(options: Options) -> Self {
        let mut manager = TaskManager::new();
        manager.set_dry_run(options.dry_run);

        Self {
            manager,
            config: Config::default(),
            config_path: None,
            options,
        }
    }

    /// Find and load the build file, then change into its directory so
    /// relative names resolve against it
    pub fn load(&mut self) -> Result<()> {
        let (config, path) = Config::load(self.options.jakefile.as_deref())?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::env::set_current_dir(dir)?;
        }
        info!("Loaded {}", path.display());

        self.load_config(config)?;
        self.config_path = Some(path);
        Ok(())
    }

    /// Register an already parsed build definition
    pub fn load_config(&mut self, config: Config) -> Result<()> {
        for (key, value) in &config.env {
            std::env::set_var(key, value);
        }
        loader::load(&mut self.manager, &config)?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut TaskManager {
        &mut self.manager
    }

    /// Tasks to run for `targets`: the named ones, or the default task
    pub fn top_level_tasks(&self, targets: &[String]) -> Vec<String> {
        let line = CommandLine::parse(targets);
        if line.tasks.is_empty() {
            vec![self.config.settings.default.clone()]
        } else {
            line.tasks
        }
    }

    /// Invoke one `name[args]` task string
    pub fn invoke_task(&mut self, task_string: &str) -> Result<()> {
        let (name, args) = parse_task_string(task_string);
        debug!("Top level invoke {} with {:?}", name, args);
        self.manager.invoke(&name, args)
    }

    /// Apply environment assignments and invoke every top-level task
    pub fn run(&mut self, targets: &[String]) -> Result<()> {
        let started = Instant::now();

        for (key, value) in CommandLine::parse(targets).env {
            std::env::set_var(key, value);
        }

        for task in self.top_level_tasks(targets) {
            self.invoke_task(&task)?;
        }

        if !self.options.quiet {
            eprintln!(
                "{}",
                style(format!("Finished in {:.2}s", started.elapsed().as_secs_f64())).dim()
            );
        }
        Ok(())
    }

    /// Re-enable every task and run `targets` again
    pub fn rerun(&mut self, targets: &[String]) -> Result<()> {
        self.manager.reenable_all();
        self.run(targets)
    }

    /// Render the requested listing
    pub fn task_listing(&self, listing: Listing) -> String {
        let mut out = String::new();

        match listing {
            Listing::Tasks => {
                let described = self.described_tasks();
                let width = described.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
                for (name, task) in described {
                    out.push_str(&format!("jake {:<width$}  # {}\n", name, task.comment(), width = width));
                }
            }
            Listing::Describe => {
                for (name, task) in self.described_tasks() {
                    out.push_str(&format!("jake {}\n", name));
                    for line in task.full_comment().lines() {
                        out.push_str(&format!("    {}\n", line));
                    }
                    out.push('\n');
                }
            }
            Listing::Prereqs => {
                for name in self.manager.tasks() {
                    out.push_str(&format!("jake {}\n", name));
                    if let Some(task) = self.manager.get(name) {
                        for prerequisite in task.prerequisites() {
                            out.push_str(&format!("    {}\n", prerequisite));
                        }
                    }
                }
            }
        }

        out
    }

    fn described_tasks(&self) -> Vec<(&str, &crate::task::Task)> {
        self.manager
            .tasks()
            .into_iter()
            .filter_map(|name| self.manager.get(name).map(|task| (name, task)))
            .filter(|(_, task)| !task.full_comment().is_empty())
            .collect()
    }
}
