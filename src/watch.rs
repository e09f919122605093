//! File watching for automatic re-invocation
//!
//! Uses `notify` with debouncing. After every batch of relevant changes
//! all tasks are re-enabled and the top-level targets invoked again, so
//! staleness checks decide what actually rebuilds.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use console::style;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tracing::debug;

use crate::application::Application;
use crate::error::{JakeError, Result};
use crate::fileset::{default_exclusions, Exclusion};

/// File watcher for a build directory
pub struct BuildWatcher {
    /// Debounced watcher
    debouncer: Debouncer<RecommendedWatcher>,
    /// Receive channel for events
    rx: mpsc::Receiver<Vec<PathBuf>>,
    root: PathBuf,
    ignore: Vec<Exclusion>,
}

impl BuildWatcher {
    /// Create a watcher for everything under `root`
    pub fn new(root: &Path, debounce_ms: u64) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |events: std::result::Result<Vec<DebouncedEvent>, notify::Error>| {
                if let Ok(events) = events {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    let _ = tx.send(paths);
                }
            },
        )
        .map_err(|e| JakeError::Watch { source: e })?;

        let mut watcher = Self {
            debouncer,
            rx,
            root: root.to_path_buf(),
            ignore: default_exclusions(),
        };

        watcher
            .debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| JakeError::Watch { source: e })?;

        Ok(watcher)
    }

    /// Block until the next batch of relevant changes. `None` once the
    /// watcher has shut down.
    pub fn wait_for_change(&self) -> Option<Vec<PathBuf>> {
        loop {
            let paths = self.rx.recv().ok()?;
            let relevant = relevant_changes(&self.root, paths, &self.ignore);
            if !relevant.is_empty() {
                return Some(relevant);
            }
        }
    }
}

/// Drop changes under version control directories, backups and the like
pub fn relevant_changes(root: &Path, paths: Vec<PathBuf>, ignore: &[Exclusion]) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path.as_path());
            let relative = relative.to_string_lossy();
            !ignore.iter().any(|e| e.matches(&relative))
        })
        .collect()
}

/// Run `targets`, then run them again after every change under the
/// build directory. Failures are reported and the loop continues.
pub fn watch_and_run(app: &mut Application, targets: &[String]) -> Result<()> {
    let root = std::env::current_dir()?;
    let debounce = app.config().settings.watch_debounce_ms;

    println!(
        "{} Watching {} for changes",
        style("👀").cyan(),
        style(root.display()).bold()
    );
    println!("{}", style("─".repeat(60)).dim());
    report(app.run(targets));
    println!("{}", style("─".repeat(60)).dim());

    let watcher = BuildWatcher::new(&root, debounce)?;

    while let Some(changed) = watcher.wait_for_change() {
        debug!("{} paths changed", changed.len());
        println!();
        println!(
            "{} Changed: {}",
            style("📝").yellow(),
            changed
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("{}", style("─".repeat(60)).dim());

        report(app.rerun(targets));

        println!("{}", style("─".repeat(60)).dim());
        println!("{} Waiting for changes...", style("👀").cyan());
    }

    Ok(())
}

fn report(result: Result<()>) {
    if let Err(e) = result {
        eprintln!("{}: {:?}", style("error").red().bold(), miette::Report::new(e));
    }
}
