use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::TransformError;

/// Report written by the versions plugin, relative to the descriptor's directory.
pub const REPORT_PATH: &str = "target/dependency-updates-aggregate-report.xml";

/// Lists newer versions of the dependencies declared in a build descriptor.
pub trait DependencyTool {
    /// Returns the raw report text for `descriptor`. Dropping the future
    /// abandons the listing.
    async fn list_versions(&self, descriptor: &Path) -> Result<String, TransformError>;
}

/// Runs the Maven versions plugin found on `PATH`.
#[derive(Debug, Clone)]
pub struct MavenVersionsTool {
    executable: String,
}

impl MavenVersionsTool {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Resolved at call time so a missing Maven only fails runs that pause.
    fn resolve(&self) -> Result<PathBuf, TransformError> {
        which::which(&self.executable).map_err(|e| {
            TransformError::DependencyTool(format!("{} not found on PATH: {e}", self.executable))
        })
    }
}

impl DependencyTool for MavenVersionsTool {
    async fn list_versions(&self, descriptor: &Path) -> Result<String, TransformError> {
        let executable = self.resolve()?;
        let dir = descriptor.parent().unwrap_or_else(|| Path::new("."));

        debug!(executable = %executable.display(), descriptor = %descriptor.display(), "listing dependency versions");
        let output = Command::new(&executable)
            .arg("versions:dependency-updates-aggregate-report")
            .arg("-f")
            .arg(descriptor)
            .arg("-DonlyProjectDependencies=true")
            .arg("-DdependencyUpdateReportFormats=xml")
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            let lines: Vec<&str> = detail.lines().collect();
            let tail = lines[lines.len().saturating_sub(20)..].join("\n");
            warn!(status = ?output.status.code(), "versions report failed");
            return Err(TransformError::DependencyTool(format!(
                "{} exited with {}: {tail}",
                executable.display(),
                output.status
            )));
        }

        let report = dir.join(REPORT_PATH);
        tokio::fs::read_to_string(&report).await.map_err(|e| {
            TransformError::DependencyTool(format!("cannot read {}: {e}", report.display()))
        })
    }
}
