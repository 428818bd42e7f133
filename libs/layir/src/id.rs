use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// An arena index for objects of type `T`.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T>(u64, #[serde(skip)] std::marker::PhantomData<T>);

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<T> Id<T> {
    pub(crate) fn new() -> Self {
        Self(0, std::marker::PhantomData)
    }

    pub(crate) fn alloc(&mut self) -> Self {
        *self = Self(self.0 + 1, std::marker::PhantomData);
        *self
    }

    /// The raw index.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The null id, never handed out by an arena.
impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
