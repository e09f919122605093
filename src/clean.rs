//! `clean` and `clobber` tasks
//!
//! `clean` removes temporary products listed in the CLEAN set; `clobber`
//! runs `clean` and then removes everything in the CLOBBER set.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::fileset::FileSet;
use crate::manager::TaskManager;
use crate::pathmap;
use crate::task::action;

/// Patterns the CLEAN set starts with
pub const DEFAULT_CLEAN_PATTERNS: [&str; 3] = ["**/*~", "**/*.bak", "**/core"];

/// The CLEAN set with its default patterns
pub fn default_clean_set() -> FileSet {
    clean_set(DEFAULT_CLEAN_PATTERNS)
}

/// A set for removal. Backups are wanted here, so only `core` directories
/// are excluded.
pub fn clean_set<I, S>(patterns: I) -> FileSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set = FileSet::from_patterns(patterns);
    set.clear_exclude();
    set.exclude_if(|path| pathmap::basename(path) == "core" && Path::new(path).is_dir());
    set
}

/// Define `clean` and `clobber` in the root scope.
///
/// Each run resolves a fresh copy of its set, so paths created after an
/// earlier run are picked up.
pub fn define_clean_tasks(manager: &mut TaskManager, clean: FileSet, clobber: FileSet) -> Result<()> {

    manager.describe("Remove any temporary products.");
    manager.task(
        "jake:clean",
        Vec::<String>::new(),
        Some(action(move |_, _| {
            remove_all(&mut clean.clone())?;
            Ok(())
        })),
    )?;

    manager.describe("Remove any generated file.");
    manager.task(
        "jake:clobber",
        ["jake:clean"],
        Some(action(move |_, _| {
            remove_all(&mut clobber.clone())?;
            Ok(())
        })),
    )?;

    Ok(())
}

/// Remove every path in `set`. Removal failures are ignored.
fn remove_all(set: &mut FileSet) -> Result<()> {
    for path in set.to_vec()? {
        let path = Path::new(&path);
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match removed {
            Ok(()) => debug!("rm -r {}", path.display()),
            Err(e) => debug!("could not remove {}: {}", path.display(), e),
        }
    }
    Ok(())
}
