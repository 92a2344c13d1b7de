//! Bundling orchestration
//!
//! Two phases with a hard boundary between them:
//! 1. **Discovery**: resolve the root and close its dependency graph
//! 2. **Patching**: plan against the closed graph, then copy and patch
//!
//! Patching never starts before the graph is closed, since relative
//! references can only be computed from the full node set.

use crate::config::BundleConfig;
use crate::error::BundleError;
use crate::executor::{PatchExecutor, PatchReport};
use crate::graph::{BuildOutcome, ClosedGraph, GraphBuilder};
use crate::inspect::{Inspector, OtoolInspector};
use crate::node::DependencyNode;
use crate::patch::{InstallNameTool, Patcher};
use crate::plan::{Destination, PatchPlan, PatchPlanner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output of the discovery phase
#[derive(Debug)]
pub struct Discovery {
    /// Root path as given by the caller
    pub input: PathBuf,
    /// Closed graph plus discovery warnings
    pub outcome: BuildOutcome,
    /// Resolved destination for this root
    pub destination: Destination,
}

impl Discovery {
    /// The closed dependency graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &ClosedGraph {
        &self.outcome.graph
    }

    /// Reference strings that could not be resolved
    #[inline]
    #[must_use]
    pub fn unresolved(&self) -> &[String] {
        &self.outcome.unresolved
    }
}

/// Result of a full run
#[derive(Debug)]
pub struct BundleSummary {
    /// Discovery output
    pub discovery: Discovery,
    /// Patch outcomes; `None` for a dry run
    pub report: Option<PatchReport>,
}

/// Bundles a root binary with its non-system dependencies
pub struct Bundler {
    config: BundleConfig,
    inspector: Arc<dyn Inspector>,
    patcher: Arc<dyn Patcher>,
}

impl Bundler {
    /// Create a bundler with explicit collaborators
    #[must_use]
    pub fn new(config: BundleConfig, inspector: Arc<dyn Inspector>, patcher: Arc<dyn Patcher>) -> Self {
        Self {
            config,
            inspector,
            patcher,
        }
    }

    /// Create a bundler backed by `otool` and `install_name_tool`
    #[must_use]
    pub fn with_defaults(config: BundleConfig) -> Self {
        let inspector = OtoolInspector::with_tool(config.system.clone(), config.tools.otool.clone());
        let patcher = InstallNameTool::with_tool(config.tools.install_name_tool.clone());
        Self::new(config, Arc::new(inspector), Arc::new(patcher))
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Resolve the root and close its dependency graph
    ///
    /// # Errors
    /// Returns `BundleError::MissingInput` if `input` does not exist.
    /// Unresolvable references are reported in the result, not as errors.
    pub async fn discover(&self, input: &Path) -> Result<Discovery, BundleError> {
        let root_path = tokio::fs::canonicalize(input)
            .await
            .map_err(|source| BundleError::MissingInput {
                path: input.to_path_buf(),
                source,
            })?;

        tracing::info!(root = %root_path.display(), "discovering dependencies");

        let builder = GraphBuilder::new(self.inspector.clone(), self.config.system.clone());
        let outcome = builder.build(DependencyNode::new(root_path.clone())).await;

        for reference in &outcome.unresolved {
            tracing::warn!(%reference, "could not resolve reference");
        }

        let destination = Destination::resolve(&root_path, &self.config.destination);
        tracing::debug!(
            dir = %destination.dir().display(),
            loader_path = destination.root_loader_path(),
            "resolved destination"
        );

        Ok(Discovery {
            input: input.to_path_buf(),
            outcome,
            destination,
        })
    }

    /// Compute patch plans for a discovered graph
    ///
    /// # Errors
    /// Returns `BundleError::Plan` if two libraries share a file name.
    pub fn plan(&self, discovery: &Discovery) -> Result<Vec<PatchPlan>, BundleError> {
        Ok(PatchPlanner::new(discovery.destination.clone()).plan(discovery.graph())?)
    }

    /// Copy and patch every node of a discovered graph
    ///
    /// # Errors
    /// Returns `BundleError::Plan` before touching any file if planning
    /// fails, or `BundleError::Patch` after every node has been attempted
    /// if any of them failed.
    pub async fn patch(&self, discovery: &Discovery) -> Result<PatchReport, BundleError> {
        let plans = self.plan(discovery)?;
        let report = PatchExecutor::new(self.patcher.clone()).execute(&plans).await?;

        tracing::info!(files = report.outcomes().len(), "bundle patched");
        Ok(report)
    }

    /// Discover, then patch unless this is a dry run
    ///
    /// # Errors
    /// See [`Bundler::discover`] and [`Bundler::patch`].
    pub async fn run(&self, input: &Path) -> Result<BundleSummary, BundleError> {
        let discovery = self.discover(input).await?;

        if self.config.dry_run {
            tracing::info!("dry run, skipping copy and patch");
            return Ok(BundleSummary {
                discovery,
                report: None,
            });
        }

        let report = self.patch(&discovery).await?;
        Ok(BundleSummary {
            discovery,
            report: Some(report),
        })
    }
}
