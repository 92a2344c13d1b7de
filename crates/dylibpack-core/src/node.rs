//! Dependency nodes
//!
//! A node is one on-disk library (or the root executable) identified by its
//! canonical path. Nodes are owned by the graph arena and addressed by
//! [`NodeId`]; edges are ids, so pointing a consumer at an existing node is
//! an index update.

use indexmap::IndexSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Index of a node inside a dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root executable is always the first node discovered
    pub const ROOT: NodeId = NodeId(0);

    /// Arena index
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Check if this is the root node
    #[inline]
    #[must_use]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One library or executable in the dependency closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    canonical_path: PathBuf,
    declared_name: String,
    referred_as: IndexSet<String>,
    edges: Vec<NodeId>,
}

impl DependencyNode {
    /// Create a node for a resolved path
    ///
    /// The declared name is the file name of the canonical path; it names
    /// the copy in the destination directory.
    #[must_use]
    pub fn new(canonical_path: impl Into<PathBuf>) -> Self {
        let canonical_path = canonical_path.into();
        let declared_name = canonical_path
            .file_name()
            .map_or_else(
                || canonical_path.display().to_string(),
                |name| name.to_string_lossy().into_owned(),
            );

        Self {
            canonical_path,
            declared_name,
            referred_as: IndexSet::new(),
            edges: Vec::new(),
        }
    }

    /// Create a node that is already known under one reference string
    #[must_use]
    pub fn referenced(canonical_path: impl Into<PathBuf>, reference: impl Into<String>) -> Self {
        let mut node = Self::new(canonical_path);
        node.add_reference(reference);
        node
    }

    /// Resolved absolute path, the identity key
    #[inline]
    #[must_use]
    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }

    /// Short name used for display and for the copied file
    #[inline]
    #[must_use]
    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    /// Every string by which some consumer refers to this node
    #[inline]
    #[must_use]
    pub fn referred_as(&self) -> &IndexSet<String> {
        &self.referred_as
    }

    /// Direct, non-system dependencies in discovery order
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[NodeId] {
        &self.edges
    }

    /// Check if this node is the same logical dependency as `other`
    #[inline]
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.canonical_path == other.canonical_path
    }

    /// Record one more reference string; returns false if already known
    pub(crate) fn add_reference(&mut self, reference: impl Into<String>) -> bool {
        self.referred_as.insert(reference.into())
    }

    /// Add an outgoing edge; duplicates by identity are ignored
    pub(crate) fn add_edge(&mut self, to: NodeId) -> bool {
        if self.edges.contains(&to) {
            return false;
        }
        self.edges.push(to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_name_is_file_name() {
        let node = DependencyNode::new("/opt/local/lib/libfoo.1.dylib");
        assert_eq!(node.declared_name(), "libfoo.1.dylib");
        assert_eq!(node.canonical_path(), Path::new("/opt/local/lib/libfoo.1.dylib"));
    }

    #[test]
    fn references_are_distinct_and_ordered() {
        let mut node = DependencyNode::referenced("/opt/lib/libfoo.dylib", "@rpath/libfoo.dylib");
        assert!(node.add_reference("/opt/lib/libfoo.dylib"));
        assert!(!node.add_reference("@rpath/libfoo.dylib"));

        let refs: Vec<_> = node.referred_as().iter().map(String::as_str).collect();
        assert_eq!(refs, vec!["@rpath/libfoo.dylib", "/opt/lib/libfoo.dylib"]);
    }

    #[test]
    fn edges_reject_duplicates() {
        let mut node = DependencyNode::new("/opt/lib/liba.dylib");
        assert!(node.add_edge(NodeId(2)));
        assert!(node.add_edge(NodeId(1)));
        assert!(!node.add_edge(NodeId(2)));
        assert_eq!(node.edges(), &[NodeId(2), NodeId(1)]);
    }

    #[test]
    fn identity_ignores_references() {
        let a = DependencyNode::referenced("/opt/lib/libc.dylib", "@rpath/libc.dylib");
        let b = DependencyNode::referenced("/opt/lib/libc.dylib", "/opt/lib/libc.dylib");
        assert!(a.same_identity(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn root_id() {
        assert!(NodeId::ROOT.is_root());
        assert!(!NodeId(3).is_root());
        assert_eq!(NodeId(3).to_string(), "#3");
    }
}
