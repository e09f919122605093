//! CLI definitions
//!
//! Uses `clap` derive API for argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::application::{Listing, Options};

/// jake - a make-style build tool with namespaces, rules and file tasks
#[derive(Parser, Debug)]
#[command(name = "jake")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the Jakefile.toml to use
    #[arg(short = 'f', long = "jakefile", env = "JAKEFILE")]
    pub jakefile: Option<PathBuf>,

    /// Change to this directory before doing anything
    #[arg(short = 'C', long = "directory")]
    pub directory: Option<PathBuf>,

    /// Display the tasks with descriptions, then exit
    #[arg(short = 'T', long = "tasks")]
    pub tasks: bool,

    /// Describe the tasks in full, then exit
    #[arg(short = 'D', long = "describe", conflicts_with = "tasks")]
    pub describe: bool,

    /// Display the tasks and their prerequisites, then exit
    #[arg(short = 'P', long = "prereqs", conflicts_with_all = ["tasks", "describe"])]
    pub prereqs: bool,

    /// Log actions instead of executing them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Trace invocation and rule resolution
    #[arg(short = 't', long)]
    pub trace: bool,

    /// Don't print the build time
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Re-run the targets whenever files change
    #[arg(short, long)]
    pub watch: bool,

    /// Tasks to run, as `name` or `name[arg1,arg2]`, and `VAR=value` settings
    pub targets: Vec<String>,
}

impl Cli {
    /// The listing requested, if any
    pub fn listing(&self) -> Option<Listing> {
        if self.tasks {
            Some(Listing::Tasks)
        } else if self.describe {
            Some(Listing::Describe)
        } else if self.prereqs {
            Some(Listing::Prereqs)
        } else {
            None
        }
    }

    pub fn options(&self) -> Options {
        Options {
            jakefile: self.jakefile.clone(),
            dry_run: self.dry_run,
            quiet: self.quiet,
        }
    }

    /// Log filter directive for the `jake` target
    pub fn log_directive(&self) -> &'static str {
        if self.trace || self.dry_run {
            "jake=debug"
        } else if self.verbose {
            "jake=info"
        } else {
            "jake=warn"
        }
    }
}
