//! Maven descriptor rewriting and dependency-updates report parsing.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use serde::Serialize;

/// Report status the versions plugin writes when nothing newer exists.
const NO_NEW_AVAILABLE: &str = "no new available";

// `<dependencies>` does not match: the literal requires `>` right after the name.
static DEPENDENCY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<dependency>.*?</dependency>").unwrap());

static VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<version>.*?</version>").unwrap());

/// Versions offered to the operator for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionCandidates {
    pub latest: Option<String>,
    pub majors: Vec<String>,
    pub minors: Vec<String>,
}

impl VersionCandidates {
    pub fn is_empty(&self) -> bool {
        self.latest.is_none() && self.majors.is_empty() && self.minors.is_empty()
    }

    pub fn contains(&self, version: &str) -> bool {
        self.latest.as_deref() == Some(version)
            || self.majors.iter().any(|v| v == version)
            || self.minors.iter().any(|v| v == version)
    }

    /// Every candidate once, latest first.
    pub fn all(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for v in self
            .latest
            .iter()
            .chain(self.majors.iter())
            .chain(self.minors.iter())
        {
            if !out.contains(v) {
                out.push(v.clone());
            }
        }
        out
    }
}

fn tag_value(block: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?s)<{tag}>\s*(.*?)\s*</{tag}>")).ok()?;
    re.captures(block)
        .map(|c| c[1].to_string())
        .filter(|v| !v.is_empty())
}

fn tag_values(block: &str, tag: &str) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(r"(?s)<{tag}>\s*(.*?)\s*</{tag}>")) else {
        return Vec::new();
    };
    re.captures_iter(block)
        .map(|c| c[1].to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn dependency_blocks(xml: &str) -> impl Iterator<Item = regex::Match<'_>> {
    DEPENDENCY_BLOCK.find_iter(xml)
}

/// Set the `<version>` of `group_id:artifact_id` in a pom. Returns `None` when
/// the dependency is absent or declares no version.
pub fn rewrite_dependency_version(
    pom: &str,
    group_id: &str,
    artifact_id: &str,
    version: &str,
) -> Option<String> {
    let block = dependency_blocks(pom).find(|m| {
        tag_value(m.as_str(), "groupId").as_deref() == Some(group_id)
            && tag_value(m.as_str(), "artifactId").as_deref() == Some(artifact_id)
    })?;

    if !VERSION_TAG.is_match(block.as_str()) {
        return None;
    }
    let replacement = format!("<version>{version}</version>");
    let rewritten = VERSION_TAG.replace(block.as_str(), NoExpand(&replacement));

    let mut out = String::with_capacity(pom.len() + version.len());
    out.push_str(&pom[..block.start()]);
    out.push_str(&rewritten);
    out.push_str(&pom[block.end()..]);
    Some(out)
}

/// Extract the candidates for `group_id:artifact_id` from a
/// `dependency-updates-aggregate-report.xml`. A missing entry, the
/// "no new available" status and empty lists all yield empty candidates.
pub fn parse_dependency_report(xml: &str, group_id: &str, artifact_id: &str) -> VersionCandidates {
    let Some(block) = dependency_blocks(xml).find(|m| {
        tag_value(m.as_str(), "groupId").as_deref() == Some(group_id)
            && tag_value(m.as_str(), "artifactId").as_deref() == Some(artifact_id)
    }) else {
        return VersionCandidates::default();
    };
    let block = block.as_str();

    if tag_value(block, "status").is_some_and(|s| s.eq_ignore_ascii_case(NO_NEW_AVAILABLE)) {
        return VersionCandidates::default();
    }

    VersionCandidates {
        latest: tag_value(block, "lastVersion"),
        majors: tag_values(block, "major"),
        minors: tag_values(block, "minor"),
    }
}
