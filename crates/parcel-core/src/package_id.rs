use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Frontend package identifier: `name;version;arch;repository`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub repository: String,
}

impl PackageId {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
            repository: repository.into(),
        }
    }

    /// Accepts the full four-field form only.
    pub fn parse(value: &str) -> Result<Self> {
        let fields = value.split(';').collect::<Vec<_>>();
        if fields.len() != 4 {
            return Err(anyhow!(
                "the package id {value} does not contain 4 fields"
            ));
        }
        if fields[0].trim().is_empty() {
            return Err(anyhow!("the package id {value} has an empty name"));
        }
        Ok(Self::new(fields[0], fields[1], fields[2], fields[3]))
    }

    pub fn looks_like_id(value: &str) -> bool {
        value.contains(';')
    }
}

impl FromStr for PackageId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.name, self.version, self.arch, self.repository
        )
    }
}

pub fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "x86",
        "aarch64" => "arm64",
        other => other,
    }
}
