//! Dependency-version resolution for jobs the service pauses.

mod controller;
mod maven;
mod tool;

pub use controller::{DependencyChoice, HilController, HilPhase, HilResolution};
pub use maven::VersionCandidates;
pub use tool::{DependencyTool, MavenVersionsTool};
