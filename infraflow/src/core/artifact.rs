//! Artifact handles passed between actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque named handle to data produced by one action and consumed by a
/// later one.
///
/// The orchestration service moves the payload; this type only names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(String);

impl Artifact {
    /// Creates a new artifact handle.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the artifact name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Refers to a file inside this artifact.
    #[must_use]
    pub fn at_path(&self, path: impl Into<String>) -> ArtifactPath {
        ArtifactPath {
            artifact: self.clone(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file within an artifact, rendered as `Artifact::path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactPath {
    /// The artifact holding the file.
    pub artifact: Artifact,
    /// Path of the file relative to the artifact root.
    pub path: String,
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.artifact, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name() {
        let artifact = Artifact::new("SourceArtifact");
        assert_eq!(artifact.name(), "SourceArtifact");
        assert_eq!(artifact.to_string(), "SourceArtifact");
    }

    #[test]
    fn test_at_path() {
        let path = Artifact::new("BuildArtifact").at_path("template.yml");
        assert_eq!(path.artifact.name(), "BuildArtifact");
        assert_eq!(path.to_string(), "BuildArtifact::template.yml");
    }

    #[test]
    fn test_artifact_serializes_as_string() {
        let json = serde_json::to_string(&Artifact::new("A")).unwrap();
        assert_eq!(json, "\"A\"");
    }
}
