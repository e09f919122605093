//! Path string transforms
//!
//! `ext` swaps a file extension; `pathmap` rewrites a path through a small
//! format language:
//!
//! | spec     | expands to                                   |
//! |----------|----------------------------------------------|
//! | `%p`     | the complete path                            |
//! | `%f`     | the base name with extension                 |
//! | `%n`     | the base name without extension              |
//! | `%d`     | the directory (`.` when there is none)       |
//! | `%2d`    | the first two directories                    |
//! | `%-2d`   | the last two directories                     |
//! | `%x`     | the extension, including the dot             |
//! | `%X`     | everything but the extension                 |
//! | `%s`     | the path separator                           |
//! | `%%`     | a literal `%`                                |
//!
//! A `{pat,rep;pat2,rep2}` block between `%` and the specifier applies regex
//! substitutions to that part, e.g. `%{^src,obj}X.o`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{JakeError, Result};

const SEPARATOR: &str = "/";

static FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{[^}]*\}-?\d*[sdpfnxX%]|%-?\d+d|%.?|[^%]+").expect("valid fragment regex")
});

static SUBSTITUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%\{([^}]*)\}(-?\d*[sdpfnxX%])$").expect("valid substitution regex"));

static PARTIAL_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%(-?\d+)d$").expect("valid partial dir regex"));

/// Base name: everything after the last separator
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Directory part, `.` for bare names and `/` for root entries
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => SEPARATOR,
        Some(idx) => &path[..idx],
        None => ".",
    }
}

/// Extension of the base name including the dot. Dot files have none.
pub fn extname(path: &str) -> &str {
    let base = basename(path);
    match base.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < base.len() => &base[idx..],
        _ => "",
    }
}

/// Replace the extension of `path` with `new_ext`. An empty `new_ext`
/// strips the extension.
pub fn ext(path: &str, new_ext: &str) -> String {
    if path == "." || path == ".." {
        return path.to_string();
    }

    let stem = &path[..path.len() - extname(path).len()];
    if new_ext.is_empty() || new_ext.starts_with('.') {
        format!("{}{}", stem, new_ext)
    } else {
        format!("{}.{}", stem, new_ext)
    }
}

/// Rewrite `path` according to `spec`
pub fn pathmap(path: &str, spec: &str) -> Result<String> {
    let mut result = String::new();

    for fragment in FRAGMENT.find_iter(spec).map(|m| m.as_str()) {
        match fragment {
            "%p" => result.push_str(path),
            "%f" => result.push_str(basename(path)),
            "%n" => result.push_str(&ext(basename(path), "")),
            "%d" => result.push_str(dirname(path)),
            "%x" => result.push_str(extname(path)),
            "%X" => result.push_str(&ext(path, "")),
            "%s" => result.push_str(SEPARATOR),
            "%%" => result.push('%'),
            _ if !fragment.starts_with('%') => result.push_str(fragment),
            _ => {
                if let Some(caps) = PARTIAL_DIR.captures(fragment) {
                    let count: i64 = caps[1]
                        .parse()
                        .map_err(|e| JakeError::invalid_pattern(spec, e))?;
                    result.push_str(&partial_dirs(path, count));
                } else if let Some(caps) = SUBSTITUTION.captures(fragment) {
                    let part = pathmap(path, &format!("%{}", &caps[2]))?;
                    result.push_str(&replace(&part, &caps[1])?);
                } else {
                    return Err(JakeError::invalid_pattern(
                        spec,
                        format!("unknown pathmap specifier {}", fragment),
                    ));
                }
            }
        }
    }

    Ok(result)
}

fn partial_dirs(path: &str, count: i64) -> String {
    let dir = dirname(path);
    let absolute = dir.starts_with('/');
    let dirs: Vec<&str> = dir.split('/').filter(|d| !d.is_empty()).collect();

    let take = count.unsigned_abs() as usize;
    if count > 0 {
        let joined = dirs[..take.min(dirs.len())].join(SEPARATOR);
        if absolute {
            format!("/{}", joined)
        } else {
            joined
        }
    } else if count < 0 {
        dirs[dirs.len().saturating_sub(take)..].join(SEPARATOR)
    } else {
        ".".to_string()
    }
}

fn replace(part: &str, patterns: &str) -> Result<String> {
    let mut result = part.to_string();

    for pair in patterns.split(';') {
        let (pattern, replacement) = pair.split_once(',').unwrap_or((pair, ""));
        let regex = Regex::new(pattern).map_err(|e| JakeError::invalid_pattern(pattern, e))?;
        result = regex.replacen(&result, 1, replacement).into_owned();
    }

    Ok(result)
}
