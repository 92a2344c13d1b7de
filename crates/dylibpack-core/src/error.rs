//! Error types for dylibpack
//!
//! Covers every failure the bundling pipeline can surface:
//! - Inspection tool failures (per node, non-fatal to discovery)
//! - Patch primitive spawn failures (per node, collected)
//! - Planning conflicts in the flat destination directory
//! - The aggregate patch failure raised after a full batch
//! - Configuration loading

use crate::executor::{NodeOutcome, PatchReport};
use std::path::PathBuf;

/// Top-level error for a bundling run
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The root binary does not exist
    #[error("{} does not exist!", .path.display())]
    MissingInput {
        /// Path as given by the caller
        path: PathBuf,
        /// Underlying lookup failure
        #[source]
        source: std::io::Error,
    },

    /// Patch planning failed before any file was touched
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    /// One or more nodes could not be patched
    #[error(transparent)]
    Patch(#[from] PatchFailure),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BundleError {
    /// Check if this is the end-of-run aggregate patch failure
    #[inline]
    #[must_use]
    pub fn is_patch_failure(&self) -> bool {
        matches!(self, Self::Patch(_))
    }

    /// Check if the root binary was missing
    #[inline]
    #[must_use]
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::MissingInput { .. })
    }
}

/// Failure of the inspection collaborator for one node
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// The inspection tool could not be started
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Tool name
        tool: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The inspection tool exited unsuccessfully
    #[error("{tool} exited with {status:?}: {stderr}")]
    Tool {
        /// Tool name
        tool: String,
        /// Exit code, if any
        status: Option<i32>,
        /// Captured stderr
        stderr: String,
    },
}

/// Failure to invoke the patch primitive at all
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The patch tool could not be started
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Tool name
        tool: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Patch planning errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Two distinct libraries would land on the same destination file name
    #[error("{name} is provided by both {} and {}", .first.display(), .second.display())]
    NameCollision {
        /// Shared file name
        name: String,
        /// First library discovered with this name
        first: PathBuf,
        /// Second library discovered with this name
        second: PathBuf,
    },
}

/// Aggregate failure after every node of a batch has been attempted
#[derive(Debug, thiserror::Error)]
#[error(
    "{} of {} files could not be patched: {}",
    .failed.len(),
    .report.outcomes().len(),
    failed_names(.failed)
)]
pub struct PatchFailure {
    /// Outcomes of the failed nodes, in plan order
    pub failed: Vec<NodeOutcome>,
    /// Full report including successful nodes
    pub report: PatchReport,
}

fn failed_names(failed: &[NodeOutcome]) -> String {
    failed
        .iter()
        .map(|outcome| outcome.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
}
