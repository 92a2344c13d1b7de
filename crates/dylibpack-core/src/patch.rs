//! Patch primitive
//!
//! Rewrites the install name and dylib references embedded in a single
//! Mach-O file. The default implementation drives `install_name_tool`.

use crate::error::PatchError;
use crate::plan::Rewrite;
use std::path::Path;
use tokio::process::Command;

/// Default patch tool
pub const DEFAULT_TOOL: &str = "install_name_tool";

/// Raw result of one patch invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutput {
    /// Exit code; `None` if the tool was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl PatchOutput {
    /// Successful output with no diagnostics
    #[must_use]
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Failed output with a diagnostic on stderr
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Check if the invocation succeeded
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Rewrites one binary's identifier and references
///
/// Operates on exactly one file per call and has no effect on other files,
/// so calls for distinct files may run concurrently.
#[async_trait::async_trait]
pub trait Patcher: Send + Sync {
    /// Patch `file` in place
    ///
    /// A non-zero exit is reported through [`PatchOutput`]; `Err` means the
    /// primitive could not be invoked at all.
    async fn patch(
        &self,
        file: &Path,
        new_identifier: &str,
        rewrites: &[Rewrite],
    ) -> Result<PatchOutput, PatchError>;
}

/// Patcher that shells out to `install_name_tool`
#[derive(Debug, Clone)]
pub struct InstallNameTool {
    tool: String,
}

impl InstallNameTool {
    /// Use `install_name_tool` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::with_tool(DEFAULT_TOOL)
    }

    /// Use a specific tool binary
    #[must_use]
    pub fn with_tool(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Arguments for one invocation, file last
    #[must_use]
    pub fn arguments(file: &Path, new_identifier: &str, rewrites: &[Rewrite]) -> Vec<String> {
        let mut args = Vec::with_capacity(3 + rewrites.len() * 3);
        args.push("-id".to_string());
        args.push(new_identifier.to_string());
        for rewrite in rewrites {
            args.push("-change".to_string());
            args.push(rewrite.old.clone());
            args.push(rewrite.new.clone());
        }
        args.push(file.to_string_lossy().into_owned());
        args
    }
}

impl Default for InstallNameTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Patcher for InstallNameTool {
    async fn patch(
        &self,
        file: &Path,
        new_identifier: &str,
        rewrites: &[Rewrite],
    ) -> Result<PatchOutput, PatchError> {
        tracing::debug!(file = %file.display(), id = new_identifier, rewrites = rewrites.len(), "running {}", self.tool);

        let output = Command::new(&self.tool)
            .args(Self::arguments(file, new_identifier, rewrites))
            .output()
            .await
            .map_err(|source| PatchError::Spawn {
                tool: self.tool.clone(),
                source,
            })?;

        Ok(PatchOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arguments_put_file_last() {
        let args = InstallNameTool::arguments(
            Path::new("/dst/libA.dylib"),
            "@loader_path/libA.dylib",
            &[
                Rewrite::new("@rpath/libC.dylib", "@loader_path/libC.dylib"),
                Rewrite::new("/opt/lib/libC.dylib", "@loader_path/libC.dylib"),
            ],
        );

        assert_eq!(
            args,
            vec![
                "-id",
                "@loader_path/libA.dylib",
                "-change",
                "@rpath/libC.dylib",
                "@loader_path/libC.dylib",
                "-change",
                "/opt/lib/libC.dylib",
                "@loader_path/libC.dylib",
                "/dst/libA.dylib",
            ]
        );
    }

    #[test]
    fn output_status() {
        assert!(PatchOutput::success().succeeded());
        assert!(!PatchOutput::failure(1, "boom").succeeded());
        assert!(!PatchOutput::default().succeeded());
    }

    #[tokio::test]
    async fn missing_tool_is_spawn_error() {
        let patcher = InstallNameTool::with_tool("/nonexistent/dylibpack-install-name-tool");
        let err = patcher
            .patch(Path::new("/tmp/none"), "@loader_path/none", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PatchError::Spawn { .. }));
    }
}
