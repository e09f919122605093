//! jake - a make-style build tool for Rust projects and beyond
//!
//! Tasks are named units of work with prerequisites and actions. Invoking
//! a task invokes its prerequisites depth-first, then runs its own actions
//! if its staleness policy says so, at most once per run.
//!
//! # Features
//!
//! - **Namespaces** - `db:migrate`, with `^name` and `jake:name` lookups
//! - **File tasks** - rebuilt only when older than a prerequisite
//! - **Rules** - file tasks synthesized on demand, e.g. `.o` from `.c`
//! - **File sets** - lazily globbed path lists with exclusions
//! - **Task arguments** - `jake deploy[prod]`
//! - **Rhai scripting** and shell commands as actions
//!
//! # Example
//!
//! ```toml
//! # Jakefile.toml
//!
//! [tasks.default]
//! deps = ["build/app"]
//!
//! [files."build/app"]
//! deps = ["build/main.o"]
//! run = ["cc -o ${name} ${sources}"]
//!
//! [[rules]]
//! pattern = ".o"
//! sources = ["%{^build,src}X.c"]
//! run = ["cc -c -o ${name} ${source}"]
//! ```
//!
//! # Library Usage
//!
//! ```rust
//! use jake::{action, TaskManager};
//!
//! let mut manager = TaskManager::new();
//! manager.task("prep", Vec::<String>::new(), None)?;
//! manager.task("build", ["prep"], Some(action(|task, _| {
//!     println!("building {}", task.name());
//!     Ok(())
//! })))?;
//! manager.invoke("build", Vec::<String>::new())?;
//! # Ok::<(), jake::JakeError>(())
//! ```

pub mod application;
pub mod args;
pub mod chain;
pub mod clean;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod fileset;
pub mod loader;
pub mod manager;
pub mod pathmap;
pub mod rule;
pub mod script;
pub mod task;
pub mod watch;

// Re-export main types
pub use application::{Application, Options};
pub use args::TaskArguments;
pub use chain::InvocationChain;
pub use config::Config;
pub use error::{ActionError, JakeError, Result};
pub use fileset::FileSet;
pub use manager::{DefinitionPart, TaskManager};
pub use rule::{Rule, RuleSource};
pub use script::ScriptEngine;
pub use task::{action, Action, Task, TaskKind, Timestamp};
