//! System library classification

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Locations whose libraries ship with the operating system
///
/// Anything under one of these prefixes is never bundled or patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemLibraries {
    prefixes: Vec<PathBuf>,
}

impl SystemLibraries {
    /// Create a classifier from explicit prefixes
    #[must_use]
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Configured prefixes
    #[inline]
    #[must_use]
    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// Check if a canonical path belongs to the operating system
    ///
    /// Matching is by whole path components, so `/usr/libexec` is not
    /// under `/usr/lib`.
    #[must_use]
    pub fn is_system(&self, path: &Path) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

impl Default for SystemLibraries {
    fn default() -> Self {
        Self::new(["/usr/lib", "/System/Library"])
    }
}
