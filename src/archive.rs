//! Zip packaging for upload payloads and extraction of downloaded artifacts.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::TransformError;

pub const MANIFEST_FILE: &str = "manifest.json";

const SOURCES_ROOT: &str = "sources/";
const DEPENDENCIES_ROOT: &str = "dependencies/";
const HIL_CAPABILITY: &str = "HIL_1pDependency_VersionUpgrade";

/// Directories never shipped with a project payload.
const EXCLUDED_DIRS: &[&str] = &["target", ".git", "node_modules", ".idea", ".gradle"];

/// Manifest embedded at the root of every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadManifest {
    pub sources_root: String,
    pub dependencies_root: String,
    pub version: String,
    pub hil_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hil_input: Option<HilInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HilInput {
    pub dependencies_to_upgrade: Vec<DependencyUpgrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyUpgrade {
    pub name: String,
    pub destination_version: String,
}

impl PayloadManifest {
    fn base() -> Self {
        Self {
            sources_root: SOURCES_ROOT.to_string(),
            dependencies_root: DEPENDENCIES_ROOT.to_string(),
            version: "1.0".to_string(),
            hil_capabilities: vec![HIL_CAPABILITY.to_string()],
            custom_build_command: None,
            hil_input: None,
        }
    }

    pub fn for_project(build_command: Option<String>) -> Self {
        Self {
            custom_build_command: build_command.filter(|c| !c.trim().is_empty()),
            ..Self::base()
        }
    }

    pub fn for_dependency_upgrade(artifact_id: &str, version: &str) -> Self {
        Self {
            hil_input: Some(HilInput {
                dependencies_to_upgrade: vec![DependencyUpgrade {
                    name: artifact_id.to_string(),
                    destination_version: version.to_string(),
                }],
            }),
            ..Self::base()
        }
    }
}

fn packaging<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> TransformError + '_ {
    move |e| TransformError::Packaging(format!("{context}: {e}"))
}

/// Archive path for `path` relative to `root`, always with forward slashes.
fn archive_name(prefix: &str, root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("{prefix}{}", parts.join("/")))
}

fn is_excluded(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn write_archive(
    entries: &[(String, PathBuf)],
    manifest: &PayloadManifest,
    dest: &Path,
) -> Result<u64, TransformError> {
    let file = File::create(dest).map_err(packaging("cannot create archive"))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest_json = serde_json::to_vec_pretty(manifest)?;
    writer
        .start_file(MANIFEST_FILE, options)
        .map_err(packaging("cannot add manifest"))?;
    writer
        .write_all(&manifest_json)
        .map_err(packaging("cannot add manifest"))?;

    for (name, path) in entries {
        let contents = std::fs::read(path).map_err(packaging("cannot read project file"))?;
        writer
            .start_file(name.as_str(), options)
            .map_err(packaging("cannot add file"))?;
        writer
            .write_all(&contents)
            .map_err(packaging("cannot add file"))?;
    }

    writer.finish().map_err(packaging("cannot finish archive"))?;
    let size = std::fs::metadata(dest)
        .map_err(packaging("cannot stat archive"))?
        .len();
    Ok(size)
}

/// Zip every project file under `sources/` next to the manifest. Returns the
/// archive size in bytes.
pub fn package_project(
    project: &Path,
    manifest: &PayloadManifest,
    dest: &Path,
) -> Result<u64, TransformError> {
    if !project.is_dir() {
        return Err(TransformError::Packaging(format!(
            "project directory {} does not exist",
            project.display()
        )));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(project)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
    {
        let entry = entry.map_err(packaging("cannot walk project"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = archive_name(SOURCES_ROOT, project, entry.path()) {
            entries.push((name, entry.into_path()));
        }
    }

    write_archive(&entries, manifest, dest)
}

/// Zip an explicit list of `(archive name, file)` pairs next to the manifest.
pub fn package_files(
    files: &[(String, PathBuf)],
    manifest: &PayloadManifest,
    dest: &Path,
) -> Result<u64, TransformError> {
    write_archive(files, manifest, dest)
}

/// Extract a downloaded zip archive into `dest`.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<(), TransformError> {
    std::fs::create_dir_all(dest).map_err(packaging("cannot create extraction dir"))?;
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(packaging("invalid archive"))?;
    archive
        .extract(dest)
        .map_err(packaging("cannot extract archive"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn names_in(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let zip = ZipArchive::new(file).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn project_archive_skips_build_dirs() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("pom.xml"), "<project/>").unwrap();
        fs::create_dir_all(project.path().join("src/main/java")).unwrap();
        fs::write(project.path().join("src/main/java/App.java"), "class App {}").unwrap();
        fs::create_dir_all(project.path().join("target/classes")).unwrap();
        fs::write(project.path().join("target/classes/App.class"), "bin").unwrap();
        fs::create_dir_all(project.path().join(".git")).unwrap();
        fs::write(project.path().join(".git/HEAD"), "ref").unwrap();

        let out = TempDir::new().unwrap();
        let dest = out.path().join("payload.zip");
        let size = package_project(project.path(), &PayloadManifest::for_project(None), &dest)
            .unwrap();

        assert!(size > 0);
        assert_eq!(
            names_in(&dest),
            vec![
                "manifest.json".to_string(),
                "sources/pom.xml".to_string(),
                "sources/src/main/java/App.java".to_string(),
            ]
        );
    }

    #[test]
    fn manifest_carries_build_command() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("pom.xml"), "<project/>").unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("payload.zip");
        let manifest = PayloadManifest::for_project(Some("mvn -DskipTests package".into()));
        package_project(project.path(), &manifest, &dest).unwrap();

        let mut zip = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut raw = String::new();
        zip.by_name(MANIFEST_FILE)
            .unwrap()
            .read_to_string(&mut raw)
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["customBuildCommand"], "mvn -DskipTests package");
        assert_eq!(json["sourcesRoot"], "sources/");
        assert!(json.get("hilInput").is_none());
    }

    #[test]
    fn blank_build_command_is_dropped() {
        let manifest = PayloadManifest::for_project(Some("   ".into()));
        assert!(manifest.custom_build_command.is_none());
    }

    #[test]
    fn dependency_manifest_names_upgrade() {
        let manifest = PayloadManifest::for_dependency_upgrade("commons-lang3", "3.14.0");
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            json["hilInput"]["dependenciesToUpgrade"][0]["destinationVersion"],
            "3.14.0"
        );
        assert_eq!(
            json["hilInput"]["dependenciesToUpgrade"][0]["name"],
            "commons-lang3"
        );
    }

    #[test]
    fn package_files_then_extract() {
        let src = TempDir::new().unwrap();
        let pom = src.path().join("pom.xml");
        fs::write(&pom, "<project><version>1</version></project>").unwrap();
        let dest = src.path().join("deps.zip");
        package_files(
            &[("pom.xml".to_string(), pom)],
            &PayloadManifest::for_dependency_upgrade("a", "2"),
            &dest,
        )
        .unwrap();

        let out = TempDir::new().unwrap();
        extract_archive(&fs::read(&dest).unwrap(), out.path()).unwrap();
        assert_eq!(
            fs::read_to_string(out.path().join("pom.xml")).unwrap(),
            "<project><version>1</version></project>"
        );
        assert!(out.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn extract_rejects_garbage() {
        let out = TempDir::new().unwrap();
        let err = extract_archive(b"definitely not a zip", out.path()).unwrap_err();
        assert!(matches!(err, TransformError::Packaging(_)));
    }
}
