//! Patch planning
//!
//! Derives, for every node of a closed graph, the install name it will
//! claim and the rewritten form of every reference it makes. Bundled
//! libraries live flat in one destination directory, so siblings refer to
//! each other as `@loader_path/<name>`; the root refers to them through its
//! own loader path, which points at the destination.

use crate::error::PlanError;
use crate::graph::ClosedGraph;
use crate::node::NodeId;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Loader-relative marker understood by dyld
pub const LOADER_PATH: &str = "@loader_path";

/// Default destination, relative to the root binary's directory
pub const DEFAULT_DESTINATION: &str = "../libs";

/// Where bundled libraries are written and how the root reaches them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    dir: PathBuf,
    root_loader_path: String,
}

impl Destination {
    /// Create a destination from explicit parts
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, root_loader_path: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            root_loader_path: root_loader_path.into(),
        }
    }

    /// Resolve a user-supplied destination against the root binary
    ///
    /// An absolute destination is used as-is, and the root references it
    /// absolutely. A relative destination is taken relative to the root's
    /// directory, and the root references it through `@loader_path`.
    #[must_use]
    pub fn resolve(root_path: &Path, destination: &Path) -> Self {
        if destination.is_absolute() {
            return Self::new(destination, destination.display().to_string());
        }

        let root_dir = root_path.parent().unwrap_or_else(|| Path::new("/"));
        let relative = normalize(destination);
        let relative = relative.to_string_lossy();

        Self {
            dir: normalize(&root_dir.join(destination)),
            root_loader_path: join_reference(LOADER_PATH, &relative),
        }
    }

    /// Directory receiving the copied libraries
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Prefix the root binary uses to reach the destination
    #[inline]
    #[must_use]
    pub fn root_loader_path(&self) -> &str {
        &self.root_loader_path
    }
}

/// Fold `.` and `..` components without touching the filesystem
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    parts.iter().collect()
}

/// Join a reference prefix and a name with `/`
#[must_use]
pub fn join_reference(base: &str, name: &str) -> String {
    let base = if base.len() > 1 { base.trim_end_matches('/') } else { base };
    if name.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Which file a plan patches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchTarget {
    /// The root, patched where it lies
    InPlace(PathBuf),
    /// A dependency, copied into the destination first
    Copy {
        /// Original library
        source: PathBuf,
        /// Copy in the destination directory
        destination: PathBuf,
    },
}

impl PatchTarget {
    /// File handed to the patch primitive
    #[must_use]
    pub fn file(&self) -> &Path {
        match self {
            Self::InPlace(path) => path,
            Self::Copy { destination, .. } => destination,
        }
    }
}

/// One old-to-new reference rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Reference as currently embedded
    pub old: String,
    /// Reference after patching
    pub new: String,
}

impl Rewrite {
    /// Create a rewrite
    #[must_use]
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Patch instructions for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    /// Node being patched
    pub node: NodeId,
    /// Declared name of the node
    pub name: String,
    /// File to patch
    pub target: PatchTarget,
    /// Install name the node claims after patching
    pub new_identifier: String,
    /// Reference rewrites, one per edge and referred-as string
    pub rewrites: Vec<Rewrite>,
}

impl PatchPlan {
    /// New reference for a given old one, if planned
    #[must_use]
    pub fn rewrite_for(&self, old: &str) -> Option<&str> {
        self.rewrites
            .iter()
            .find(|rewrite| rewrite.old == old)
            .map(|rewrite| rewrite.new.as_str())
    }
}

/// Computes patch plans for a closed graph
#[derive(Debug, Clone)]
pub struct PatchPlanner {
    destination: Destination,
}

impl PatchPlanner {
    /// Create a planner for a destination
    #[must_use]
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    /// Destination being planned for
    #[inline]
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Plan every node of the graph, root first, in discovery order
    ///
    /// # Errors
    /// Returns `PlanError::NameCollision` if two libraries would be copied
    /// to the same destination file.
    pub fn plan(&self, graph: &ClosedGraph) -> Result<Vec<PatchPlan>, PlanError> {
        self.check_names(graph)?;

        Ok(graph
            .nodes()
            .map(|(id, node)| {
                let target = if id.is_root() {
                    PatchTarget::InPlace(node.canonical_path().to_path_buf())
                } else {
                    PatchTarget::Copy {
                        source: node.canonical_path().to_path_buf(),
                        destination: self.destination.dir().join(node.declared_name()),
                    }
                };

                PatchPlan {
                    node: id,
                    name: node.declared_name().to_string(),
                    target,
                    new_identifier: join_reference(LOADER_PATH, node.declared_name()),
                    rewrites: self.rewrites(graph, id),
                }
            })
            .collect())
    }

    fn rewrites(&self, graph: &ClosedGraph, consumer: NodeId) -> Vec<Rewrite> {
        let mut rewrites = Vec::new();

        for &dependency in graph.direct_dependencies(consumer) {
            let base = if consumer.is_root() && !dependency.is_root() {
                self.destination.root_loader_path()
            } else {
                LOADER_PATH
            };

            let target = graph.node(dependency);
            let new = join_reference(base, target.declared_name());
            rewrites.extend(
                target
                    .referred_as()
                    .iter()
                    .map(|old| Rewrite::new(old.clone(), new.clone())),
            );
        }

        rewrites
    }

    fn check_names(&self, graph: &ClosedGraph) -> Result<(), PlanError> {
        let mut seen: HashMap<&str, &Path> = HashMap::new();

        for (_, node) in graph.dependencies() {
            if let Some(first) = seen.insert(node.declared_name(), node.canonical_path()) {
                return Err(PlanError::NameCollision {
                    name: node.declared_name().to_string(),
                    first: first.to_path_buf(),
                    second: node.canonical_path().to_path_buf(),
                });
            }
        }

        Ok(())
    }
}
