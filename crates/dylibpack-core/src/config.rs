//! Bundling configuration
//!
//! One value threaded through builder, planner and executor. Loadable from
//! TOML; every field has a default so a config file may set only what it
//! needs.

use crate::error::ConfigError;
use crate::plan::DEFAULT_DESTINATION;
use crate::system::SystemLibraries;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// External tools used for inspection and patching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Inspection tool
    pub otool: String,
    /// Patch tool
    pub install_name_tool: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            otool: crate::inspect::otool::DEFAULT_TOOL.to_string(),
            install_name_tool: crate::patch::DEFAULT_TOOL.to_string(),
        }
    }
}

/// Configuration for one bundling run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Destination directory; relative paths are taken from the root's directory
    pub destination: PathBuf,
    /// Only discover and report, never copy or patch
    pub dry_run: bool,
    /// Report full diagnostics
    pub verbose: bool,
    /// System library classification
    pub system: SystemLibraries,
    /// External tools
    pub tools: ToolConfig,
}

impl BundleConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// With destination directory
    #[inline]
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    /// With dry-run mode
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With verbose reporting
    #[inline]
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// With system library classification
    #[inline]
    #[must_use]
    pub fn with_system(mut self, system: SystemLibraries) -> Self {
        self.system = system;
        self
    }

    /// With external tools
    #[inline]
    #[must_use]
    pub fn with_tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from(DEFAULT_DESTINATION),
            dry_run: false,
            verbose: false,
            system: SystemLibraries::default(),
            tools: ToolConfig::default(),
        }
    }
}
