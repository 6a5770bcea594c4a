//! Component identities derived from tree position.
//!
//! An identity is the dotted path from the root to an instance: the root is
//! `.0`, the third child of the root is `.0.2`, and a keyed child is
//! `.0.$sidebar`. Because the path depends only on the shape of the tree,
//! the server pass that writes a payload entry and the client pass that reads
//! it agree on the key for every matching instance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one component instance within one render pass.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// The identity of the root instance.
    pub fn root() -> Self {
        Self(".0".to_string())
    }

    /// The identity of the `index`-th child of this instance.
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}.{index}", self.0))
    }

    /// The identity of a child addressed by an explicit key.
    ///
    /// Keys survive reordering of siblings, positional indices do not.
    pub fn keyed(&self, key: &str) -> Self {
        Self(format!("{}.${key}", self.0))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of levels below the root (the root itself is depth 0).
    pub fn depth(&self) -> usize {
        self.0.matches('.').count().saturating_sub(1)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Position of an instance as seen by a renderer walking the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<'a> {
    Root,
    Child {
        parent: &'a ComponentId,
        index: usize,
        key: Option<&'a str>,
    },
}

/// Derives the identity for an instance at `position`.
///
/// Keyed children use their key; unkeyed children use their index among
/// siblings.
pub fn identity_of(position: Position<'_>) -> ComponentId {
    match position {
        Position::Root => ComponentId::root(),
        Position::Child {
            parent,
            key: Some(key),
            ..
        } => parent.keyed(key),
        Position::Child { parent, index, .. } => parent.child(index),
    }
}
