//! Testing utilities for the dylibpack workspace
//!
//! Shared fakes, fixtures, and helpers.

#![allow(missing_docs)]

use dylibpack_core::{
    DeclaredReference, DependencyNode, InspectError, Inspection, Inspector, PatchError,
    PatchOutput, Patcher, Rewrite,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Inspector answering from an in-memory reference table
///
/// Paths with no entry inspect as having no dependencies.
#[derive(Debug, Default)]
pub struct FakeInspector {
    table: HashMap<PathBuf, Inspection>,
    failing: HashSet<PathBuf>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `consumer` references `path` through `reference`
    pub fn reference(
        mut self,
        consumer: impl Into<PathBuf>,
        reference: &str,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.table
            .entry(consumer.into())
            .or_default()
            .references
            .push(DeclaredReference::new(reference, path));
        self
    }

    /// Declare a reference of `consumer` that does not resolve
    pub fn unresolved(mut self, consumer: impl Into<PathBuf>, reference: &str) -> Self {
        self.table
            .entry(consumer.into())
            .or_default()
            .unresolved
            .push(reference.to_string());
        self
    }

    /// Make inspection of `path` fail
    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Paths inspected so far, in call order
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }

    /// Number of times `path` was inspected
    pub fn call_count(&self, path: &Path) -> usize {
        self.calls.lock().iter().filter(|p| p.as_path() == path).count()
    }
}

#[async_trait::async_trait]
impl Inspector for FakeInspector {
    async fn inspect(
        &self,
        node: &DependencyNode,
        _executable: &Path,
    ) -> Result<Inspection, InspectError> {
        let path = node.canonical_path();
        self.calls.lock().push(path.to_path_buf());

        if self.failing.contains(path) {
            return Err(InspectError::Tool {
                tool: "fake-otool".to_string(),
                status: Some(1),
                stderr: format!("{}: is not an object file", path.display()),
            });
        }

        Ok(self.table.get(path).cloned().unwrap_or_default())
    }
}

/// One recorded patch invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCall {
    pub file: PathBuf,
    pub new_identifier: String,
    pub rewrites: Vec<Rewrite>,
    /// Whether the file existed when the primitive was invoked
    pub file_existed: bool,
}

/// Patcher that records calls and fails on request
#[derive(Debug, Default)]
pub struct RecordingPatcher {
    failing: HashSet<String>,
    calls: Mutex<Vec<PatchCall>>,
}

impl RecordingPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every patch of a file with this file name
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }

    /// Calls so far, in call order
    pub fn calls(&self) -> Vec<PatchCall> {
        self.calls.lock().clone()
    }

    /// The call for a given file name, if any
    pub fn call_for(&self, file_name: &str) -> Option<PatchCall> {
        self.calls
            .lock()
            .iter()
            .find(|call| file_name_of(&call.file) == file_name)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Patcher for RecordingPatcher {
    async fn patch(
        &self,
        file: &Path,
        new_identifier: &str,
        rewrites: &[Rewrite],
    ) -> Result<PatchOutput, PatchError> {
        self.calls.lock().push(PatchCall {
            file: file.to_path_buf(),
            new_identifier: new_identifier.to_string(),
            rewrites: rewrites.to_vec(),
            file_existed: file.exists(),
        });

        if self.failing.contains(&file_name_of(file)) {
            return Ok(PatchOutput::failure(
                1,
                format!("error: fake-install_name_tool: can't open file: {}", file.display()),
            ));
        }

        Ok(PatchOutput::success())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Temporary directory tree holding a fake application and its libraries
#[derive(Debug)]
pub struct BundleFixture {
    dir: TempDir,
    root: PathBuf,
}

impl BundleFixture {
    /// Create `<tmp>/app/bin/<name>` as the root binary
    pub fn new(root_name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let base = std::fs::canonicalize(dir.path()).expect("canonicalize temp dir");
        let root = base.join("app").join("bin").join(root_name);
        write_file(&root, root_name.as_bytes());
        Self { dir, root }
    }

    /// Canonical path of the root binary
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical base directory of the fixture
    pub fn base(&self) -> PathBuf {
        std::fs::canonicalize(self.dir.path()).expect("canonicalize temp dir")
    }

    /// Create a library at a path relative to the fixture base
    ///
    /// The file content is its own relative path, so copies can be checked.
    pub fn library(&self, relative: &str) -> PathBuf {
        let path = self.base().join(relative);
        write_file(&path, relative.as_bytes());
        path
    }

    /// Directory that the default `../libs` destination resolves to
    pub fn default_destination(&self) -> PathBuf {
        self.base().join("app").join("libs")
    }

    /// Sorted file names in a directory; empty if it does not exist
    pub fn file_names(dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(path, content).expect("write fixture file");
}
