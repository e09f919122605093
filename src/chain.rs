//! Invocation chain used for cycle detection
//!
//! An immutable cons-list of the task names currently being invoked,
//! innermost first. Extending the chain never mutates it: every
//! [`InvocationChain::append`] produces a new node sharing the old tail.

use std::fmt;
use std::rc::Rc;

use crate::error::{JakeError, Result};

/// The live call path of an invocation
#[derive(Debug, Clone, Default)]
pub struct InvocationChain {
    head: Option<Rc<Link>>,
}

#[derive(Debug)]
struct Link {
    task: String,
    tail: InvocationChain,
}

impl InvocationChain {
    /// The empty chain, the root of every top-level invocation
    pub fn empty() -> Self {
        Self { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Is `task` already on the call path?
    pub fn is_member(&self, task: &str) -> bool {
        self.iter().any(|name| name == task)
    }

    /// Extend the chain with `task`, failing if it is already a member
    pub fn append(&self, task: &str) -> Result<Self> {
        if self.is_member(task) {
            return Err(JakeError::CircularDependency {
                chain: format!("{} => {}", self, task),
            });
        }

        Ok(Self {
            head: Some(Rc::new(Link {
                task: task.to_string(),
                tail: self.clone(),
            })),
        })
    }

    /// Task names from the innermost invocation outwards
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

/// Iterator over an [`InvocationChain`], innermost first
pub struct Iter<'a> {
    next: Option<&'a Link>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.next?;
        self.next = link.tail.head.as_deref();
        Some(&link.task)
    }
}

impl fmt::Display for InvocationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.iter().collect();
        names.reverse();

        write!(f, "TOP")?;
        for name in names {
            write!(f, " => {}", name)?;
        }
        Ok(())
    }
}
