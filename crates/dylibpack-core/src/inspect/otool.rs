//! `otool`-backed inspector
//!
//! `otool -L` lists the dylib load commands of a Mach-O file, `otool -l`
//! dumps every load command and is only consulted for `LC_RPATH` entries.

use super::{DeclaredReference, Inspection, Inspector};
use crate::error::InspectError;
use crate::node::DependencyNode;
use crate::plan::LOADER_PATH;
use crate::system::SystemLibraries;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Marker for the directory of the main executable
pub const EXECUTABLE_PATH: &str = "@executable_path";

/// Marker for the run-path search list
pub const RPATH: &str = "@rpath";

/// Default inspection tool
pub const DEFAULT_TOOL: &str = "otool";

/// Inspector that shells out to `otool`
#[derive(Debug)]
pub struct OtoolInspector {
    tool: String,
    system: SystemLibraries,
    rpath_cache: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl OtoolInspector {
    /// Create an inspector using `otool` from `PATH`
    #[must_use]
    pub fn new(system: SystemLibraries) -> Self {
        Self::with_tool(system, DEFAULT_TOOL)
    }

    /// Create an inspector using a specific `otool` binary
    #[must_use]
    pub fn with_tool(system: SystemLibraries, tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            system,
            rpath_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn run(&self, flag: &str, file: &Path) -> Result<String, InspectError> {
        let output = Command::new(&self.tool)
            .arg(flag)
            .arg(file)
            .output()
            .await
            .map_err(|source| InspectError::Spawn {
                tool: self.tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(InspectError::Tool {
                tool: self.tool.clone(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn rpaths_of(&self, file: &Path) -> Result<Vec<String>, InspectError> {
        if let Some(cached) = self.rpath_cache.lock().get(file) {
            return Ok(cached.clone());
        }

        let rpaths = parse_rpaths(&self.run("-l", file).await?);
        self.rpath_cache
            .lock()
            .insert(file.to_path_buf(), rpaths.clone());
        Ok(rpaths)
    }
}

#[async_trait::async_trait]
impl Inspector for OtoolInspector {
    async fn inspect(
        &self,
        node: &DependencyNode,
        executable: &Path,
    ) -> Result<Inspection, InspectError> {
        let path = node.canonical_path();
        let declared = parse_load_references(&self.run("-L", path).await?);

        let loader_dir = parent_dir(path);
        let executable_dir = parent_dir(executable);

        // each rpath expands against the image that declares it
        let rpath_dirs = if declared.iter().any(|r| strip_marker(r, RPATH).is_some()) {
            let mut dirs = expand_rpaths(&self.rpaths_of(path).await?, loader_dir, executable_dir);
            if path != executable {
                dirs.extend(expand_rpaths(
                    &self.rpaths_of(executable).await?,
                    executable_dir,
                    executable_dir,
                ));
            }
            dirs
        } else {
            Vec::new()
        };

        let mut inspection = Inspection::new();

        for reference in declared {
            if Path::new(&reference).is_absolute() && self.system.is_system(Path::new(&reference)) {
                let canonical = PathBuf::from(&reference);
                inspection
                    .references
                    .push(DeclaredReference::new(reference, canonical));
                continue;
            }

            let candidates = candidate_paths(&reference, loader_dir, executable_dir, &rpath_dirs);
            match first_existing(candidates).await {
                Some(resolved) if resolved == path => {
                    tracing::trace!(node = %path.display(), %reference, "skipping own install name");
                }
                Some(resolved) => {
                    inspection
                        .references
                        .push(DeclaredReference::new(reference, resolved));
                }
                None => {
                    tracing::debug!(node = %path.display(), %reference, "reference did not resolve");
                    inspection.unresolved.push(reference);
                }
            }
        }

        Ok(inspection)
    }
}

async fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    for candidate in candidates {
        if let Ok(resolved) = tokio::fs::canonicalize(&candidate).await {
            return Some(resolved);
        }
    }
    None
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("/"))
}

/// Strip a leading `@marker` and the separator after it
///
/// Returns `None` if `reference` does not start with the marker as a whole
/// path component.
#[must_use]
pub fn strip_marker<'a>(reference: &'a str, marker: &str) -> Option<&'a str> {
    let rest = reference.strip_prefix(marker)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// Expand `@loader_path` and `@executable_path` in a path
#[must_use]
pub fn expand_markers(path: &str, loader_dir: &Path, executable_dir: &Path) -> PathBuf {
    if let Some(rest) = strip_marker(path, LOADER_PATH) {
        loader_dir.join(rest)
    } else if let Some(rest) = strip_marker(path, EXECUTABLE_PATH) {
        executable_dir.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Expand the `LC_RPATH` entries of one image
///
/// `declaring_dir` is the directory of the image carrying the entries; it
/// is what `@loader_path` means inside them.
#[must_use]
pub fn expand_rpaths(rpaths: &[String], declaring_dir: &Path, executable_dir: &Path) -> Vec<PathBuf> {
    rpaths
        .iter()
        .map(|rpath| expand_markers(rpath, declaring_dir, executable_dir))
        .collect()
}

/// Files a reference may denote, in lookup order
///
/// `@rpath` references expand against every already expanded rpath
/// directory; other references have exactly one candidate.
#[must_use]
pub fn candidate_paths(
    reference: &str,
    loader_dir: &Path,
    executable_dir: &Path,
    rpath_dirs: &[PathBuf],
) -> Vec<PathBuf> {
    match strip_marker(reference, RPATH) {
        Some(rest) => rpath_dirs.iter().map(|dir| dir.join(rest)).collect(),
        None => vec![expand_markers(reference, loader_dir, executable_dir)],
    }
}

/// Parse `otool -L` output into reference strings
///
/// Header lines (the file name, or one per architecture for universal
/// binaries) start at column zero; references are indented. Duplicates
/// across architectures are reported once.
#[must_use]
pub fn parse_load_references(output: &str) -> Vec<String> {
    let mut references: Vec<String> = Vec::new();

    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reference = match line.find(" (") {
            Some(end) => line[..end].trim_end(),
            None => line,
        };
        if !references.iter().any(|known| known == reference) {
            references.push(reference.to_string());
        }
    }

    references
}

/// Parse `LC_RPATH` entries out of `otool -l` output
#[must_use]
pub fn parse_rpaths(output: &str) -> Vec<String> {
    let mut rpaths: Vec<String> = Vec::new();
    let mut in_rpath = false;

    for line in output.lines() {
        let line = line.trim();
        if line.starts_with("Load command") {
            in_rpath = false;
        } else if line == "cmd LC_RPATH" {
            in_rpath = true;
        } else if in_rpath {
            if let Some(rest) = line.strip_prefix("path ") {
                let rpath = match rest.rfind(" (offset") {
                    Some(end) => &rest[..end],
                    None => rest,
                };
                let rpath = rpath.trim().to_string();
                if !rpaths.contains(&rpath) {
                    rpaths.push(rpath);
                }
                in_rpath = false;
            }
        }
    }

    rpaths
}
