//! Unique name allocation.

use std::collections::HashSet;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// A set of names in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Names {
    used: HashSet<ArcStr>,
}

impl Names {
    /// Creates a new, empty name set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns `true` if `name` is in use.
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// The name `base_name` would be assigned, without reserving it.
    pub fn peek(&self, base_name: &str) -> ArcStr {
        if !self.used.contains(base_name) {
            return base_name.into();
        }
        let mut i = 1;
        loop {
            let candidate = arcstr::format!("{}_{}", base_name, i);
            if !self.used.contains(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Reserves a unique name based on `base_name`.
    ///
    /// The name is `base_name` itself if it is free; otherwise `_1`, `_2`, ...
    /// is appended until the name is unique.
    ///
    /// ```
    /// # use layir::names::Names;
    /// let mut names = Names::new();
    /// assert_eq!(names.assign("a"), "a");
    /// assert_eq!(names.assign("a"), "a_1");
    /// assert_eq!(names.assign("a"), "a_2");
    /// ```
    pub fn assign(&mut self, base_name: &str) -> ArcStr {
        let name = self.peek(base_name);
        self.used.insert(name.clone());
        name
    }

    /// Releases a name so it may be assigned again.
    pub fn release(&mut self, name: &str) {
        self.used.remove(name);
    }
}
