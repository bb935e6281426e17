use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;
use parcel_core::{
    InstalledRepository, PackageId, PackageMatch, RepositoryHandle,
    INSTALLED_REPOSITORY_ID,
};
use parcel_lock::ResourceLock;
use semver::Version;

use crate::config::sort_repositories;
use crate::{FsInstalledRepository, FsRepository, RepositoryConfig};

/// Resolves repository ids to handles and owns the installed-registry lock.
pub struct RepositoryRegistry {
    installed: Arc<dyn InstalledRepository>,
    installed_handle: RepositoryHandle,
    available: Vec<RepositoryHandle>,
    installed_lock: ResourceLock,
}

impl RepositoryRegistry {
    pub fn new<I>(installed: Arc<I>) -> Self
    where
        I: InstalledRepository + 'static,
    {
        let installed_handle: RepositoryHandle = installed.clone();
        Self {
            installed,
            installed_handle,
            available: Vec::new(),
            installed_lock: ResourceLock::new("installed-registry"),
        }
    }

    /// Later repositories have lower priority.
    pub fn with_repository(mut self, repository: RepositoryHandle) -> Self {
        self.available.push(repository);
        self
    }

    pub fn open_fs(state_root: &Path, configs: &[RepositoryConfig]) -> Result<Self> {
        let mut configs = configs.to_vec();
        sort_repositories(&mut configs);

        let mut registry = Self::new(Arc::new(FsInstalledRepository::new(
            state_root.join("installed"),
        )));
        let mut seen = BTreeSet::new();
        for config in configs {
            config
                .validate()
                .with_context(|| format!("invalid repository configuration '{}'", config.name))?;
            if !seen.insert(config.name.clone()) {
                anyhow::bail!("repository '{}' is configured twice", config.name);
            }
            if !config.enabled {
                debug!("repository '{}' is disabled", config.name);
                continue;
            }
            registry
                .available
                .push(Arc::new(FsRepository::new(config, state_root)));
        }
        Ok(registry)
    }

    pub fn installed(&self) -> &Arc<dyn InstalledRepository> {
        &self.installed
    }

    pub fn installed_handle(&self) -> &RepositoryHandle {
        &self.installed_handle
    }

    pub fn available(&self) -> &[RepositoryHandle] {
        &self.available
    }

    pub fn installed_lock(&self) -> &ResourceLock {
        &self.installed_lock
    }

    pub fn open(&self, repository_id: &str) -> Option<RepositoryHandle> {
        if repository_id == INSTALLED_REPOSITORY_ID {
            return Some(self.installed_handle.clone());
        }
        self.available
            .iter()
            .find(|repository| repository.id() == repository_id)
            .cloned()
    }

    pub fn resolve_id(&self, id: &PackageId) -> Result<Option<PackageMatch>> {
        let Some(repository) = self.open(&id.repository) else {
            return Ok(None);
        };
        let Ok(version) = Version::parse(&id.version) else {
            return Ok(None);
        };
        Ok(repository
            .record(&id.name, &version)?
            .map(|record| PackageMatch::from_record(&record, repository.clone())))
    }

    pub fn installed_match(&self, name: &str) -> Result<Option<PackageMatch>> {
        Ok(self
            .installed
            .package_versions(name)?
            .into_iter()
            .next()
            .map(|record| PackageMatch::from_record(&record, self.installed_handle.clone())))
    }

    /// Highest version of `name` in the first available repository carrying it.
    pub fn latest_available(&self, name: &str) -> Result<Option<PackageMatch>> {
        for repository in &self.available {
            let versions = repository.package_versions(name)?;
            if let Some(record) = versions.iter().max_by(|a, b| a.version.cmp(&b.version)) {
                return Ok(Some(PackageMatch::from_record(record, repository.clone())));
            }
        }
        Ok(None)
    }

    /// Accepts a full package id or a bare package name.
    pub fn resolve_identifier(
        &self,
        identifier: &str,
        prefer_installed: bool,
    ) -> Result<Option<PackageMatch>> {
        if PackageId::looks_like_id(identifier) {
            let id = PackageId::parse(identifier)?;
            return self.resolve_id(&id);
        }
        if prefer_installed {
            self.installed_match(identifier)
        } else {
            self.latest_available(identifier)
        }
    }

    pub fn search(&self, needle: &str) -> Result<Vec<PackageMatch>> {
        let mut matches = Vec::new();
        for repository in std::iter::once(&self.installed_handle).chain(self.available.iter()) {
            for name in repository.package_names()? {
                if !name.contains(needle) {
                    continue;
                }
                for record in repository.package_versions(&name)? {
                    matches.push(PackageMatch::from_record(&record, repository.clone()));
                }
            }
        }
        Ok(matches)
    }
}

impl fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field(
                "available",
                &self
                    .available
                    .iter()
                    .map(|repository| repository.id().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("installed_lock", &self.installed_lock)
            .finish()
    }
}
