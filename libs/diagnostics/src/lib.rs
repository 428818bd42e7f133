//! Utilities for collecting located diagnostics.
//!
//! Every diagnostic produced while reconstructing a layout refers to one or
//! more coordinates in the cell being processed, so that a viewer or a
//! command-line front end can point the user at the offending geometry.

#![warn(missing_docs)]

#[cfg(test)]
pub(crate) mod tests;

use std::fmt::{Debug, Display};

use geometry::point::Point;
use serde::{Deserialize, Serialize};

/// A diagnostic issue that should be reported to users.
pub trait Diagnostic: Debug + Display {
    /// Returns an optional help message that should indicate
    /// what users need to do to resolve an issue.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }

    /// Returns the severity of this issue.
    ///
    /// The default implementation returns [`Severity::default`].
    fn severity(&self) -> Severity {
        Default::default()
    }

    /// The layout coordinates this issue refers to.
    ///
    /// The default implementation returns no locations.
    fn locations(&self) -> Vec<Point> {
        Vec::new()
    }
}

/// An enumeration of possible severity levels.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Often, but not always, fatal.
    Error,
}

/// A collection of issues.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    num_errors: usize,
    num_warnings: usize,
}

impl<T> IssueSet<T> {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues in this issue set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this issue set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Adds the given issue to the issue set.
    #[inline]
    pub fn add(&mut self, issue: T) {
        match issue.severity() {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        };
        self.issues.push(issue);
    }

    /// Adds the given issue and emits it as a `tracing` event.
    ///
    /// The event level is selected according to the issue's severity.
    pub fn add_and_log(&mut self, issue: T) {
        let locations = issue.locations();
        match issue.severity() {
            Severity::Info => tracing::info!(?locations, "{}", issue),
            Severity::Warning => tracing::warn!(?locations, "{}", issue),
            Severity::Error => tracing::error!(?locations, "{}", issue),
        }
        self.add(issue);
    }

    /// Moves every issue of `other` into this set.
    pub fn extend(&mut self, other: IssueSet<T>) {
        for issue in other {
            self.add(issue);
        }
    }

    /// Returns an iterator over issues at or above the given severity.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &T> {
        self.issues.iter().filter(move |i| i.severity() >= severity)
    }

    /// Returns `true` if this issue set contains an error.
    ///
    /// Errors are determined by [`Diagnostic`]s with a
    /// [severity](Diagnostic::severity) of [`Severity::Error`].
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    /// The number of errors in this issue set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// Returns `true` if this issue set contains a warning.
    ///
    /// Warnings are determined by [`Diagnostic`]s with a
    /// [severity](Diagnostic::severity) of [`Severity::Warning`].
    pub fn has_warning(&self) -> bool {
        self.num_warnings > 0
    }

    /// The number of warnings in this issue set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = <std::vec::Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Severity {
    /// Returns log level corresponding to this severity.
    #[inline]
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Returns `true` if the severity is [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(*self, Self::Error)
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl<T: Diagnostic> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            write!(f, "{}: {}", issue.severity(), issue)?;
            let locations = issue.locations();
            if !locations.is_empty() {
                write!(f, " at")?;
                for loc in locations {
                    write!(f, " {}", loc)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
