//! Inspection collaborator
//!
//! Lists the libraries a binary declares and resolves each declaration to a
//! file on disk. The graph builder calls [`Inspector::inspect`] once per
//! node, concurrently for every node of a frontier.

pub mod otool;

pub use otool::OtoolInspector;

use crate::error::InspectError;
use crate::node::DependencyNode;
use std::path::{Path, PathBuf};

/// A declared library reference and the file it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredReference {
    /// Literal text embedded in the consumer's load command
    pub reference: String,
    /// Resolved absolute path of the library
    pub canonical_path: PathBuf,
}

impl DeclaredReference {
    /// Create a reference
    #[must_use]
    pub fn new(reference: impl Into<String>, canonical_path: impl Into<PathBuf>) -> Self {
        Self {
            reference: reference.into(),
            canonical_path: canonical_path.into(),
        }
    }
}

/// Result of inspecting one binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// Immediate references that resolved to a file
    pub references: Vec<DeclaredReference>,
    /// Reference strings that could not be mapped to an existing file
    pub unresolved: Vec<String>,
}

impl Inspection {
    /// Create an empty inspection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolved reference
    #[must_use]
    pub fn with_reference(mut self, reference: DeclaredReference) -> Self {
        self.references.push(reference);
        self
    }

    /// Add an unresolved reference
    #[must_use]
    pub fn with_unresolved(mut self, reference: impl Into<String>) -> Self {
        self.unresolved.push(reference.into());
        self
    }
}

/// Lists a binary's immediate library references
///
/// Implementations may be invoked concurrently for distinct nodes and must
/// not mutate shared state visible to the graph builder.
#[async_trait::async_trait]
pub trait Inspector: Send + Sync {
    /// Inspect one node
    ///
    /// # Arguments
    /// * `node` - The binary to inspect
    /// * `executable` - Canonical path of the root executable, the anchor
    ///   for `@executable_path` references
    async fn inspect(
        &self,
        node: &DependencyNode,
        executable: &Path,
    ) -> Result<Inspection, InspectError>;
}
