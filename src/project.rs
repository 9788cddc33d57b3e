//! Local project discovery and eligibility checks.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::TransformError;
use crate::job::TransformationType;

const BUILD_FILE: &str = "pom.xml";
const SKIPPED_DIRS: &[&str] = &["target", ".git", "node_modules", ".idea", "build"];
const SQL_MARKERS: &[&str] = &["oracle.jdbc", "jdbc:oracle", "java.sql."];

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name) || name.starts_with('.'))
}

fn java_sources(project: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(project)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "java"))
        .map(DirEntry::into_path)
}

/// Every directory under `root` (including `root`) that holds a `pom.xml`,
/// sorted by path.
pub fn discover_projects(root: &Path) -> Result<Vec<PathBuf>, TransformError> {
    if !root.is_dir() {
        return Err(TransformError::ProjectNotEligible(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut projects: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir() && e.path().join(BUILD_FILE).is_file())
        .map(DirEntry::into_path)
        .collect();
    projects.sort();
    debug!(root = %root.display(), count = projects.len(), "projects discovered");
    Ok(projects)
}

/// Check that `project` can be submitted for `kind`.
pub fn validate_project(project: &Path, kind: TransformationType) -> Result<(), TransformError> {
    if !project.is_dir() {
        return Err(TransformError::ProjectNotEligible(format!(
            "{} is not a directory",
            project.display()
        )));
    }

    match kind {
        TransformationType::LanguageUpgrade => {
            if !project.join(BUILD_FILE).is_file() {
                return Err(TransformError::ProjectNotEligible(format!(
                    "no {BUILD_FILE} in {}",
                    project.display()
                )));
            }
            if java_sources(project).next().is_none() {
                return Err(TransformError::ProjectNotEligible(format!(
                    "no Java sources in {}",
                    project.display()
                )));
            }
        }
        TransformationType::SqlConversion => {
            let has_sql = java_sources(project).any(|path| {
                std::fs::read_to_string(&path)
                    .is_ok_and(|src| SQL_MARKERS.iter().any(|m| src.contains(m)))
            });
            if !has_sql {
                return Err(TransformError::ProjectNotEligible(format!(
                    "no Java sources with embedded SQL in {}",
                    project.display()
                )));
            }
        }
    }
    Ok(())
}
