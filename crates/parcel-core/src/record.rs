use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Metadata of one package entry in one repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub description: String,
    pub license: Option<String>,
    pub homepage: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionReq>,
    #[serde(default)]
    pub conflicts: BTreeMap<String, VersionReq>,
    pub artifact: Option<PackageArtifact>,
    /// Hex Ed25519 signature over [`PackageRecord::signing_payload`].
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageArtifact {
    pub url: String,
    pub sha256: String,
    pub size: Option<u64>,
}

impl PackageRecord {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let record: Self = toml::from_str(input).context("failed to parse package record")?;
        if record.name.trim().is_empty() {
            return Err(anyhow!("package name must not be empty"));
        }
        if record.dependencies.contains_key(&record.name) {
            return Err(anyhow!("package '{}' depends on itself", record.name));
        }
        if record.conflicts.contains_key(&record.name) {
            return Err(anyhow!("package '{}' conflicts with itself", record.name));
        }
        if let Some(artifact) = &record.artifact {
            if artifact.url.trim().is_empty() {
                return Err(anyhow!(
                    "artifact url must not be empty for package '{}'",
                    record.name
                ));
            }
            if artifact.sha256.len() != 64
                || !artifact.sha256.chars().all(|ch| ch.is_ascii_hexdigit())
            {
                return Err(anyhow!(
                    "artifact sha256 for package '{}' must be 64 hex characters",
                    record.name
                ));
            }
        }
        Ok(record)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self)
            .with_context(|| format!("failed to serialize package record '{}'", self.name))
    }

    /// License identifiers, whitespace separated in the record.
    pub fn licenses(&self) -> Vec<&str> {
        self.license
            .as_deref()
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        let sha256 = self
            .artifact
            .as_ref()
            .map(|artifact| artifact.sha256.as_str())
            .unwrap_or("");
        format!("{}\n{}\n{}\n", self.name, self.version, sha256).into_bytes()
    }

    pub fn conflicts_with(&self, other: &PackageRecord) -> bool {
        self.conflicts
            .get(&other.name)
            .map(|req| req.matches(&other.version))
            .unwrap_or(false)
            || other
                .conflicts
                .get(&self.name)
                .map(|req| req.matches(&self.version))
                .unwrap_or(false)
    }
}
