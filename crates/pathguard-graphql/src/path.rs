//! Resource paths derived from positions in the query-execution tree.
//!
//! A resource path names a field by the chain of field names leading to it,
//! e.g. `project.members.tickets.message`. List indices are elided, so every
//! element of a list is governed by the same path and the same rule.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_graphql::{PathSegment, QueryPathNode, QueryPathSegment};

/// Separator between path segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Canonical dotted identifier of a field position, ignoring list indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Derives the path of the field at `node`.
    ///
    /// Walks parent links up to the root, skipping index segments, and joins
    /// the collected names root-first.
    #[must_use]
    pub fn derive(node: &QueryPathNode<'_>) -> Self {
        let mut names = Vec::new();
        let mut current = Some(node);

        while let Some(n) = current {
            if let QueryPathSegment::Name(name) = &n.segment {
                names.push(*name);
            }
            current = n.parent;
        }

        names.reverse();
        Self(names.join("."))
    }

    /// Builds a path from field names, root first.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for segment in segments {
            if !path.is_empty() {
                path.push(SEGMENT_SEPARATOR);
            }
            path.push_str(segment.as_ref());
        }
        Self(path)
    }

    /// Returns the path of field `name` nested under this one.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            return Self(name.to_string());
        }
        Self(format!("{}{SEGMENT_SEPARATOR}{name}", self.0))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the field names, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEGMENT_SEPARATOR)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}

/// Converts `node` into a response error path. Unlike [`ResourcePath`], list
/// indices are kept so the error lands on the exact element.
#[must_use]
pub fn error_path(node: &QueryPathNode<'_>) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = Some(node);

    while let Some(n) = current {
        segments.push(match &n.segment {
            QueryPathSegment::Name(name) => PathSegment::Field((*name).to_string()),
            QueryPathSegment::Index(idx) => PathSegment::Index(*idx),
        });
        current = n.parent;
    }

    segments.reverse();
    segments
}

/// Renders the response position of `node`, indices included, as a map key.
fn response_key(node: &QueryPathNode<'_>) -> String {
    let mut key = String::new();
    for segment in error_path(node) {
        if !key.is_empty() {
            key.push('/');
        }
        match segment {
            PathSegment::Field(name) => key.push_str(&name),
            PathSegment::Index(idx) => key.push_str(&idx.to_string()),
        }
    }
    key
}

/// Nearest ancestor of `node` that names a field, skipping list positions.
fn field_parent<'a>(node: &'a QueryPathNode<'a>) -> Option<&'a QueryPathNode<'a>> {
    let mut current = node.parent;
    while let Some(n) = current {
        if matches!(n.segment, QueryPathSegment::Name(_)) {
            return Some(n);
        }
        current = n.parent;
    }
    None
}

/// Derives resource paths from field names rather than response keys.
///
/// Execution path nodes carry response keys, which are aliases when the query
/// uses them. Resolving `{ p: project { n: name } }` must still yield
/// `project.name`, otherwise an alias could borrow another field's rule. The
/// tracker remembers the canonical path of every field resolved so far in a
/// request; a parent always resolves before its children, so each child
/// extends its parent's canonical path with its own field name.
#[derive(Debug, Default)]
pub struct PathTracker {
    resolved: Mutex<HashMap<String, ResourcePath>>,
}

impl PathTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical path of the field `field_name` resolved at `node`.
    pub fn resolve(&self, node: &QueryPathNode<'_>, field_name: &str) -> ResourcePath {
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);

        let path = match field_parent(node) {
            None => ResourcePath::from_segments([field_name]),
            Some(parent) => resolved
                .get(&response_key(parent))
                .cloned()
                .unwrap_or_else(|| ResourcePath::derive(parent))
                .child(field_name),
        };

        resolved.insert(response_key(node), path.clone());
        path
    }
}
