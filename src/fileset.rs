//! Lazily resolved lists of file paths
//!
//! A [`FileSet`] collects literal names and glob patterns. Nothing touches
//! the filesystem until the set is read, at which point every queued
//! pattern is expanded and every exclusion applied. Reads therefore take
//! `&mut self`.

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use globset::{GlobBuilder, GlobMatcher};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{JakeError, Result};
use crate::pathmap;

static GLOB_META: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*?\[{]").expect("valid glob meta regex"));

static DEFAULT_IGNORE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(^|/)CVS(/|$)",
        r"(^|/)\.svn(/|$)",
        r"(^|/)\.git(/|$)",
        r"(^|/)\.hg(/|$)",
        r"\.bak$",
        r"~$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid default exclude"))
    .collect()
});

/// Does `pattern` contain a glob meta character?
pub fn is_glob(pattern: &str) -> bool {
    GLOB_META.is_match(pattern)
}

/// A filter removing matching paths from a [`FileSet`]
#[derive(Clone)]
pub enum Exclusion {
    /// Exact path
    Literal(String),
    /// Shell glob; `*` does not cross `/`
    Glob(GlobMatcher),
    Regex(Regex),
    Predicate(Rc<dyn Fn(&str) -> bool>),
}

impl Exclusion {
    /// A glob if `pattern` has `*` or `?`, otherwise an exact path
    pub fn pattern(pattern: &str) -> Result<Self> {
        if !pattern.contains(['*', '?']) {
            return Ok(Exclusion::Literal(pattern.to_string()));
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| JakeError::invalid_pattern(pattern, e))?;
        Ok(Exclusion::Glob(glob.compile_matcher()))
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + 'static,
    {
        Exclusion::Predicate(Rc::new(f))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Exclusion::Literal(literal) => literal == path,
            Exclusion::Glob(glob) => glob.is_match(path),
            Exclusion::Regex(regex) => regex.is_match(path),
            Exclusion::Predicate(f) => f(path),
        }
    }
}

impl From<Regex> for Exclusion {
    fn from(regex: Regex) -> Self {
        Exclusion::Regex(regex)
    }
}

impl fmt::Debug for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Literal(l) => f.debug_tuple("Literal").field(l).finish(),
            Exclusion::Glob(g) => f.debug_tuple("Glob").field(&g.glob().glob()).finish(),
            Exclusion::Regex(r) => f.debug_tuple("Regex").field(&r.as_str()).finish(),
            Exclusion::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// The default exclusions: version control directories, backup files and
/// `core` dumps that are not directories
pub fn default_exclusions() -> Vec<Exclusion> {
    let mut exclusions: Vec<Exclusion> = DEFAULT_IGNORE.iter().cloned().map(Exclusion::Regex).collect();
    exclusions.push(Exclusion::predicate(|path| {
        pathmap::basename(path) == "core" && !Path::new(path).is_dir()
    }));
    exclusions
}

#[derive(Debug, Clone)]
enum Entry {
    /// Globbed if it has meta characters, else taken as is
    Pattern(String),
    /// Already resolved elsewhere, never globbed
    Path(String),
}

#[derive(Debug, Clone)]
enum State {
    /// `items` were resolved before more entries were queued
    Pending { items: Vec<String>, queued: Vec<Entry> },
    Resolved(Vec<String>),
}

/// An ordered, lazily globbed list of paths
#[derive(Debug, Clone)]
pub struct FileSet {
    state: State,
    exclusions: Vec<Exclusion>,
}

impl Default for FileSet {
    fn default() -> Self {
        Self {
            state: State::Resolved(Vec::new()),
            exclusions: default_exclusions(),
        }
    }
}

impl FileSet {
    /// An empty set with the default exclusions
    pub fn new() -> Self {
        Self::default()
    }

    /// A set queueing `items` for resolution
    pub fn from_patterns<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        set.include(items);
        set
    }

    fn derived(&self, items: Vec<String>) -> Self {
        let exclusions = self.exclusions.clone();
        let items = items
            .into_iter()
            .filter(|item| !exclusions.iter().any(|e| e.matches(item)))
            .collect();
        Self {
            state: State::Resolved(items),
            exclusions,
        }
    }

    /// Queue literal paths or glob patterns
    pub fn include<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue(items.into_iter().map(|item| Entry::Pattern(item.into())));
        self
    }

    /// Queue the resolved contents of another set
    pub fn include_set(&mut self, other: &mut FileSet) -> Result<&mut Self> {
        let paths = other.to_vec()?;
        self.queue(paths.into_iter().map(Entry::Path));
        Ok(self)
    }

    fn queue(&mut self, entries: impl IntoIterator<Item = Entry>) {
        let state = std::mem::replace(&mut self.state, State::Resolved(Vec::new()));
        let (items, mut queued) = match state {
            State::Pending { items, queued } => (items, queued),
            State::Resolved(items) => (items, Vec::new()),
        };
        queued.extend(entries);
        self.state = State::Pending { items, queued };
    }

    /// Exclude paths equal to `pattern`, or matching it as a glob
    pub fn exclude(&mut self, pattern: &str) -> Result<&mut Self> {
        let exclusion = Exclusion::pattern(pattern)?;
        Ok(self.exclude_with(exclusion))
    }

    pub fn exclude_regex(&mut self, regex: Regex) -> &mut Self {
        self.exclude_with(Exclusion::Regex(regex))
    }

    pub fn exclude_if<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&str) -> bool + 'static,
    {
        self.exclude_with(Exclusion::predicate(f))
    }

    /// Add an exclusion. A resolved set is filtered immediately.
    pub fn exclude_with(&mut self, exclusion: Exclusion) -> &mut Self {
        if let State::Resolved(items) = &mut self.state {
            items.retain(|item| !exclusion.matches(item));
        }
        self.exclusions.push(exclusion);
        self
    }

    /// Drop every exclusion, including the defaults
    pub fn clear_exclude(&mut self) -> &mut Self {
        self.exclusions.clear();
        self
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    /// Expand queued patterns and apply exclusions. Idempotent.
    pub fn resolve(&mut self) -> Result<&mut Self> {
        if let State::Pending { items, queued } = &self.state {
            let mut resolved = items.clone();
            for entry in queued {
                match entry {
                    Entry::Pattern(pattern) if is_glob(pattern) => resolved.extend(expand_glob(pattern)?),
                    Entry::Pattern(path) | Entry::Path(path) => resolved.push(path.clone()),
                }
            }
            resolved.retain(|item| !self.exclusions.iter().any(|e| e.matches(item)));
            self.state = State::Resolved(resolved);
        }
        Ok(self)
    }

    /// The resolved paths
    pub fn resolved_items(&mut self) -> Result<&[String]> {
        self.resolve()?;
        match &self.state {
            State::Resolved(items) => Ok(items),
            State::Pending { .. } => Ok(&[]),
        }
    }

    pub fn to_vec(&mut self) -> Result<Vec<String>> {
        Ok(self.resolved_items()?.to_vec())
    }

    pub fn len(&mut self) -> Result<usize> {
        Ok(self.resolved_items()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.resolved_items()?.is_empty())
    }

    /// Paths joined with `separator`
    pub fn join(&mut self, separator: &str) -> Result<String> {
        Ok(self.resolved_items()?.join(separator))
    }

    pub fn map<F>(&mut self, f: F) -> Result<FileSet>
    where
        F: FnMut(&String) -> String,
    {
        let items = self.resolved_items()?.iter().map(f).collect();
        Ok(self.derived(items))
    }

    pub fn filter<F>(&mut self, mut f: F) -> Result<FileSet>
    where
        F: FnMut(&str) -> bool,
    {
        let items = self
            .resolved_items()?
            .iter()
            .filter(|item| f(item.as_str()))
            .cloned()
            .collect();
        Ok(self.derived(items))
    }

    pub fn sorted(&mut self) -> Result<FileSet> {
        let mut items = self.to_vec()?;
        items.sort();
        Ok(self.derived(items))
    }

    /// Every path with its extension replaced
    pub fn ext(&mut self, new_ext: &str) -> Result<FileSet> {
        self.map(|item| pathmap::ext(item, new_ext))
    }

    /// Every path rewritten through a pathmap spec
    pub fn pathmap(&mut self, spec: &str) -> Result<FileSet> {
        let items = self
            .resolved_items()?
            .iter()
            .map(|item| pathmap::pathmap(item, spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.derived(items))
    }

    /// First match of `regex` in every path replaced with `replacement`
    pub fn sub(&mut self, regex: &Regex, replacement: &str) -> Result<FileSet> {
        self.map(|item| regex.replace(item, replacement).into_owned())
    }

    /// Only the paths that exist on disk
    pub fn existing(&mut self) -> Result<FileSet> {
        self.filter(|item| Path::new(item).exists())
    }

    /// Drop the paths that don't exist on disk, in place
    pub fn keep_existing(&mut self) -> Result<&mut Self> {
        self.resolve()?;
        if let State::Resolved(items) = &mut self.state {
            items.retain(|item| Path::new(item).exists());
        }
        Ok(self)
    }
}

/// Expand one pattern against the filesystem, braces first
fn expand_glob(pattern: &str) -> Result<Vec<String>> {
    let mut paths = Vec::new();

    for expanded in expand_braces(pattern) {
        let entries = glob::glob(&expanded).map_err(|e| JakeError::invalid_pattern(pattern, e))?;
        // Unreadable entries are skipped
        paths.extend(
            entries
                .filter_map(|entry| entry.ok())
                .map(|path| path.to_string_lossy().to_string()),
        );
    }

    Ok(paths)
}

/// `src/{a,b}.c` becomes `src/a.c`, `src/b.c`
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut close = None;
    let mut splits = Vec::new();
    for (idx, ch) in pattern[open..].char_indices() {
        let idx = open + idx;
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(idx),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
        })
        .collect()
}
