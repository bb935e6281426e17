use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use semver::Version;

use crate::{InstallSource, PackageRecord};

pub const INSTALLED_REPOSITORY_ID: &str = "installed";

pub type RepositoryHandle = Arc<dyn Repository>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshStatus {
    Updated,
    UpToDate,
}

/// Read-side query service over one repository of package records.
pub trait Repository: Send + Sync {
    fn id(&self) -> &str;

    fn package_names(&self) -> Result<Vec<String>>;

    fn package_versions(&self, name: &str) -> Result<Vec<PackageRecord>>;

    fn license_text(&self, license: &str) -> Result<Option<String>>;

    /// Hex Ed25519 key trusted to sign records of this repository.
    fn public_key(&self) -> Option<String> {
        None
    }

    fn record(&self, name: &str, version: &Version) -> Result<Option<PackageRecord>> {
        Ok(self
            .package_versions(name)?
            .into_iter()
            .find(|record| &record.version == version))
    }

    fn is_installed(&self) -> bool {
        self.id() == INSTALLED_REPOSITORY_ID
    }

    /// Replaces the repository metadata from its source.
    fn refresh(&self, _force: bool) -> Result<RefreshStatus> {
        Ok(RefreshStatus::UpToDate)
    }
}

/// The installed-package registry. Writers must hold the registry lock
/// exclusively.
pub trait InstalledRepository: Repository {
    fn install_source(&self, name: &str) -> Result<Option<InstallSource>>;

    fn record_install(&self, record: &PackageRecord, source: InstallSource) -> Result<()>;

    fn record_removal(&self, name: &str) -> Result<bool>;

    fn accepted_licenses(&self) -> Result<BTreeSet<String>>;

    fn accept_license(&self, license: &str) -> Result<()>;
}
