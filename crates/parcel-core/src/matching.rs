use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::{anyhow, Result};
use semver::Version;

use crate::{current_arch, PackageId, PackageRecord, RepositoryHandle};

/// One concrete package entry in one concrete repository.
#[derive(Clone)]
pub struct PackageMatch {
    name: String,
    version: Version,
    repository: RepositoryHandle,
}

impl PackageMatch {
    pub fn new(name: impl Into<String>, version: Version, repository: RepositoryHandle) -> Self {
        Self {
            name: name.into(),
            version,
            repository,
        }
    }

    pub fn from_record(record: &PackageRecord, repository: RepositoryHandle) -> Self {
        Self::new(record.name.clone(), record.version.clone(), repository)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn repository(&self) -> &RepositoryHandle {
        &self.repository
    }

    pub fn repository_id(&self) -> &str {
        self.repository.id()
    }

    pub fn record(&self) -> Result<PackageRecord> {
        self.repository
            .record(&self.name, &self.version)?
            .ok_or_else(|| anyhow!("package {self} is missing from its repository"))
    }

    pub fn package_id(&self) -> PackageId {
        PackageId::new(
            self.name.clone(),
            self.version.to_string(),
            current_arch(),
            self.repository.id(),
        )
    }
}

impl PartialEq for PackageMatch {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.repository.id() == other.repository.id()
    }
}

impl Eq for PackageMatch {}

impl Hash for PackageMatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.repository.id().hash(state);
    }
}

impl fmt::Debug for PackageMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageMatch")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("repository", &self.repository.id())
            .finish()
    }
}

impl fmt::Display for PackageMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}@{}", self.name, self.version, self.repository.id())
    }
}
