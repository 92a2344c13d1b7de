//! Patch execution
//!
//! Applies a set of patch plans in one concurrent batch. Each dependency is
//! copied into the destination before its own patch call; plans are
//! otherwise independent, and a failing node never stops its siblings.
//! Failures are reported together once the whole batch has finished.

use crate::error::PatchFailure;
use crate::node::NodeId;
use crate::patch::{PatchOutput, Patcher};
use crate::plan::{PatchPlan, PatchTarget};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of patching one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    /// Node that was patched
    pub node: NodeId,
    /// Declared name of the node
    pub name: String,
    /// File handed to the patch primitive
    pub file: PathBuf,
    /// Whether copy and patch both succeeded
    pub success: bool,
    /// Exit code of the patch primitive, if it ran
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr, or the copy/spawn error
    pub stderr: String,
}

impl NodeOutcome {
    fn from_output(plan: &PatchPlan, output: PatchOutput) -> Self {
        Self {
            node: plan.node,
            name: plan.name.clone(),
            file: plan.target.file().to_path_buf(),
            success: output.succeeded(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    fn failed(plan: &PatchPlan, diagnostic: String) -> Self {
        Self {
            node: plan.node,
            name: plan.name.clone(),
            file: plan.target.file().to_path_buf(),
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: diagnostic,
        }
    }
}

/// Outcomes of one batch, in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    outcomes: Vec<NodeOutcome>,
}

impl PatchReport {
    /// Create a report from outcomes
    #[must_use]
    pub fn new(outcomes: Vec<NodeOutcome>) -> Self {
        Self { outcomes }
    }

    /// Every outcome
    #[inline]
    #[must_use]
    pub fn outcomes(&self) -> &[NodeOutcome] {
        &self.outcomes
    }

    /// Failed outcomes only
    pub fn failed(&self) -> impl Iterator<Item = &NodeOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }

    /// Check if every node was patched
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.success)
    }

    /// Turn the report into the aggregate failure if any node failed
    ///
    /// # Errors
    /// Returns `PatchFailure` naming every failed node.
    pub fn into_result(self) -> Result<Self, PatchFailure> {
        if self.is_success() {
            return Ok(self);
        }

        let failed = self.failed().cloned().collect();
        Err(PatchFailure {
            failed,
            report: self,
        })
    }
}

/// Copies and patches every node of a plan set
pub struct PatchExecutor {
    patcher: Arc<dyn Patcher>,
}

impl PatchExecutor {
    /// Create an executor over a patch primitive
    #[must_use]
    pub fn new(patcher: Arc<dyn Patcher>) -> Self {
        Self { patcher }
    }

    /// Apply every plan
    ///
    /// All plans are attempted even when some fail.
    ///
    /// # Errors
    /// Returns `PatchFailure` once the batch completes if any node could not
    /// be copied or patched.
    pub async fn execute(&self, plans: &[PatchPlan]) -> Result<PatchReport, PatchFailure> {
        tracing::info!(files = plans.len(), "patching");

        let outcomes = join_all(plans.iter().map(|plan| self.apply(plan))).await;
        for outcome in outcomes.iter().filter(|outcome| !outcome.success) {
            tracing::warn!(
                node = %outcome.name,
                exit_code = ?outcome.exit_code,
                stderr = %outcome.stderr.trim(),
                "patch failed"
            );
        }

        PatchReport::new(outcomes).into_result()
    }

    async fn apply(&self, plan: &PatchPlan) -> NodeOutcome {
        if let PatchTarget::Copy {
            source,
            destination,
        } = &plan.target
        {
            if let Err(error) = copy_into(source, destination).await {
                return NodeOutcome::failed(
                    plan,
                    format!(
                        "cannot copy {} to {}: {error}",
                        source.display(),
                        destination.display()
                    ),
                );
            }
        }

        match self
            .patcher
            .patch(plan.target.file(), &plan.new_identifier, &plan.rewrites)
            .await
        {
            Ok(output) => {
                tracing::debug!(node = %plan.name, exit_code = ?output.exit_code, "patched");
                NodeOutcome::from_output(plan, output)
            }
            Err(error) => NodeOutcome::failed(plan, error.to_string()),
        }
    }
}

/// Copy a library into the destination, leaving the copy owner-writable
///
/// An earlier read-only copy is overwritten.
async fn copy_into(source: &Path, destination: &Path) -> std::io::Result<()> {
    if let Some(dir) = destination.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    if tokio::fs::try_exists(destination).await? {
        if same_file(source, destination).await? {
            tracing::debug!(file = %destination.display(), "already in destination");
            return make_writable(destination).await;
        }
        make_writable(destination).await?;
    }
    tokio::fs::copy(source, destination).await?;
    make_writable(destination).await
}

/// Copying a file onto itself truncates it
async fn same_file(a: &Path, b: &Path) -> std::io::Result<bool> {
    Ok(tokio::fs::canonicalize(a).await? == tokio::fs::canonicalize(b).await?)
}

#[cfg(unix)]
async fn make_writable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    let mode = permissions.mode();
    if mode & 0o200 == 0 {
        permissions.set_mode(mode | 0o200);
        tokio::fs::set_permissions(path, permissions).await?;
    }
    Ok(())
}

#[cfg(not(unix))]
async fn make_writable(path: &Path) -> std::io::Result<()> {
    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        tokio::fs::set_permissions(path, permissions).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, success: bool) -> NodeOutcome {
        NodeOutcome {
            node: NodeId(0),
            name: name.to_string(),
            file: PathBuf::from(name),
            success,
            exit_code: Some(i32::from(!success)),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn report_success() {
        let report = PatchReport::new(vec![outcome("app", true), outcome("liba.dylib", true)]);
        assert!(report.is_success());
        assert_eq!(report.into_result().unwrap().outcomes().len(), 2);
    }

    #[test]
    fn report_failure_names_failed_nodes() {
        let report = PatchReport::new(vec![
            outcome("app", true),
            outcome("liba.dylib", false),
            outcome("libb.dylib", true),
        ]);
        let failure = report.into_result().unwrap_err();

        assert_eq!(failure.failed.len(), 1);
        assert_eq!(failure.failed[0].name, "liba.dylib");
        assert_eq!(failure.to_string(), "1 of 3 files could not be patched: liba.dylib");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_overwrites_read_only_copy() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("libsrc.dylib");
        std::fs::write(&source, b"v1").unwrap();
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o444)).unwrap();

        let destination = dir.path().join("out").join("libsrc.dylib");
        copy_into(&source, &destination).await.unwrap();
        let mode = std::fs::metadata(&destination).unwrap().permissions().mode();
        assert_ne!(mode & 0o200, 0);

        std::fs::set_permissions(&destination, std::fs::Permissions::from_mode(0o444)).unwrap();
        copy_into(&source, &destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn copy_onto_itself_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("libs").join("libfoo.dylib");
        std::fs::create_dir_all(library.parent().unwrap()).unwrap();
        std::fs::write(&library, b"bundled").unwrap();

        copy_into(&library, &library).await.unwrap();
        assert_eq!(std::fs::read(&library).unwrap(), b"bundled");

        let dotted = dir.path().join("libs").join(".").join("libfoo.dylib");
        copy_into(&dotted, &library).await.unwrap();
        assert_eq!(std::fs::read(&library).unwrap(), b"bundled");
    }
}
