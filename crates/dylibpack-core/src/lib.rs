//! dylibpack core
//!
//! Bundles an executable with every non-system dynamic library it loads,
//! rewriting load references so the bundle runs from any directory.
//!
//! Two-phase design:
//! 1. **Discovery**: [`GraphBuilder`] closes the dependency graph in
//!    concurrent waves, merging every reference to the same file into one node
//! 2. **Patching**: [`PatchPlanner`] derives loader-relative references and
//!    [`PatchExecutor`] copies and patches every node in one batch
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dylibpack_core::prelude::*;
//!
//! let config = BundleConfig::new().with_destination("../Frameworks");
//! let bundler = Bundler::with_defaults(config);
//!
//! let summary = bundler.run(Path::new("build/MyApp")).await?;
//! println!("{} dependencies", summary.discovery.graph().dependency_count());
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod inspect;
pub mod node;
pub mod patch;
pub mod plan;
pub mod system;

pub use bundle::{BundleSummary, Bundler, Discovery};
pub use config::{BundleConfig, ToolConfig};
pub use error::{BundleError, ConfigError, InspectError, PatchError, PatchFailure, PlanError};
pub use executor::{NodeOutcome, PatchExecutor, PatchReport};
pub use graph::{BuildOutcome, ClosedGraph, GraphBuilder};
pub use inspect::{DeclaredReference, Inspection, Inspector, OtoolInspector};
pub use node::{DependencyNode, NodeId};
pub use patch::{InstallNameTool, PatchOutput, Patcher};
pub use plan::{Destination, PatchPlan, PatchPlanner, PatchTarget, Rewrite, LOADER_PATH};
pub use system::SystemLibraries;

/// Common imports
pub mod prelude {
    pub use crate::{
        BundleConfig, BundleError, Bundler, ClosedGraph, DependencyNode, Destination,
        GraphBuilder, Inspector, NodeId, PatchExecutor, PatchPlanner, Patcher, SystemLibraries,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
