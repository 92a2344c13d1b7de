//! Dependency graph construction
//!
//! Discovery runs in waves. Every node of the current frontier is inspected
//! concurrently; once the whole wave has answered, the references are folded
//! into the arena one by one. A reference whose canonical path is already in
//! the arena (resolved earlier or queued in this wave) merges into the
//! existing node; anything else becomes a new node in the next frontier.
//!
//! A node enters the arena exactly once, so no path is ever expanded twice
//! and reference cycles terminate.

use crate::error::InspectError;
use crate::inspect::{Inspection, Inspector};
use crate::node::{DependencyNode, NodeId};
use crate::system::SystemLibraries;
use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Closed, deduplicated dependency set rooted at the bundled executable
///
/// Immutable once built. The root is [`NodeId::ROOT`]; every other node is
/// a non-system library reachable from it, in discovery order.
#[derive(Debug, Clone)]
pub struct ClosedGraph {
    nodes: IndexMap<PathBuf, DependencyNode>,
}

impl ClosedGraph {
    /// The bundled executable
    #[inline]
    #[must_use]
    pub fn root(&self) -> &DependencyNode {
        &self.nodes[NodeId::ROOT.index()]
    }

    /// Look up a node by id
    ///
    /// # Panics
    /// Panics if `id` was not produced by this graph.
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.index()]
    }

    /// Look up a node by canonical path
    #[must_use]
    pub fn find(&self, canonical_path: &Path) -> Option<NodeId> {
        self.nodes.get_index_of(canonical_path).map(NodeId)
    }

    /// Root followed by every dependency, in discovery order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> + '_ {
        self.nodes
            .values()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Every dependency except the root, in discovery order
    pub fn dependencies(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> + '_ {
        self.nodes().skip(1)
    }

    /// Number of nodes including the root
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a graph contains at least its root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of dependencies excluding the root
    #[inline]
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Direct dependencies of a node
    #[inline]
    #[must_use]
    pub fn direct_dependencies(&self, id: NodeId) -> &[NodeId] {
        self.node(id).edges()
    }

    /// Every node reachable from `id`, breadth first, excluding `id`
    #[must_use]
    pub fn transitive_dependencies(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<NodeId> = self.node(id).edges().iter().copied().collect();
        let mut order = Vec::new();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            order.push(next);
            queue.extend(self.node(next).edges().iter().copied());
        }

        order
    }
}

/// Result of graph construction
#[derive(Debug)]
pub struct BuildOutcome {
    /// The closed dependency graph
    pub graph: ClosedGraph,
    /// Reference strings that could not be resolved, in discovery order
    pub unresolved: Vec<String>,
    /// Nodes whose inspection failed outright
    pub failed_inspections: Vec<(PathBuf, InspectError)>,
}

impl BuildOutcome {
    /// Check if discovery saw anything worth warning about
    #[inline]
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.unresolved.is_empty() || !self.failed_inspections.is_empty()
    }
}

/// Builds the closed dependency graph of a root binary
pub struct GraphBuilder {
    inspector: Arc<dyn Inspector>,
    system: SystemLibraries,
}

impl GraphBuilder {
    /// Create a builder
    #[must_use]
    pub fn new(inspector: Arc<dyn Inspector>, system: SystemLibraries) -> Self {
        Self { inspector, system }
    }

    /// Discover the transitive closure of non-system dependencies
    ///
    /// Unresolvable references and failed inspections are collected in the
    /// outcome; they never stop discovery of the rest of the graph.
    pub async fn build(&self, root: DependencyNode) -> BuildOutcome {
        let executable = root.canonical_path().to_path_buf();
        let mut nodes = IndexMap::new();
        nodes.insert(executable.clone(), root);

        let mut unresolved = Vec::new();
        let mut failed_inspections = Vec::new();
        let mut frontier: Range<usize> = 0..1;
        let mut wave = 0usize;

        while !frontier.is_empty() {
            tracing::debug!(wave, nodes = frontier.len(), "inspecting frontier");

            let inspections = join_all(
                frontier
                    .clone()
                    .map(|index| self.inspector.inspect(&nodes[index], &executable)),
            )
            .await;

            let next_start = nodes.len();
            for (consumer, inspection) in frontier.zip(inspections) {
                match inspection {
                    Ok(inspection) => {
                        unresolved.extend(self.merge(&mut nodes, NodeId(consumer), inspection));
                    }
                    Err(error) => {
                        let path = nodes[consumer].canonical_path().to_path_buf();
                        tracing::warn!(node = %path.display(), %error, "inspection failed");
                        failed_inspections.push((path, error));
                    }
                }
            }

            frontier = next_start..nodes.len();
            wave += 1;
        }

        tracing::info!(
            dependencies = nodes.len() - 1,
            unresolved = unresolved.len(),
            waves = wave,
            "dependency graph closed"
        );

        BuildOutcome {
            graph: ClosedGraph { nodes },
            unresolved,
            failed_inspections,
        }
    }

    /// Fold one consumer's inspection into the arena
    ///
    /// Returns the consumer's unresolved references.
    fn merge(
        &self,
        nodes: &mut IndexMap<PathBuf, DependencyNode>,
        consumer: NodeId,
        inspection: Inspection,
    ) -> Vec<String> {
        for declared in inspection.references {
            if self.system.is_system(&declared.canonical_path) {
                continue;
            }

            let target = match nodes.get_index_of(&declared.canonical_path) {
                Some(existing) => {
                    tracing::trace!(
                        reference = %declared.reference,
                        into = %nodes[existing].declared_name(),
                        "merging reference"
                    );
                    NodeId(existing)
                }
                None => {
                    let node = DependencyNode::new(declared.canonical_path.clone());
                    let (index, _) = nodes.insert_full(declared.canonical_path, node);
                    tracing::debug!(node = %nodes[index].declared_name(), "discovered dependency");
                    NodeId(index)
                }
            };

            if target == consumer {
                continue;
            }

            nodes[target.index()].add_reference(declared.reference);
            nodes[consumer.index()].add_edge(target);
        }

        inspection.unresolved
    }
}
