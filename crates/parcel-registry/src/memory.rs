use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use parcel_core::{
    InstallSource, InstalledRepository, PackageRecord, Repository, INSTALLED_REPOSITORY_ID,
};

/// In-process repository, used for embedding and tests.
#[derive(Debug)]
pub struct MemoryRepository {
    id: String,
    records: Mutex<Vec<PackageRecord>>,
    licenses: BTreeMap<String, String>,
    public_key: Option<String>,
}

impl MemoryRepository {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: Mutex::new(Vec::new()),
            licenses: BTreeMap::new(),
            public_key: None,
        }
    }

    pub fn with_record(self, record: PackageRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn with_license_text(mut self, license: &str, text: &str) -> Self {
        self.licenses.insert(license.to_string(), text.to_string());
        self
    }

    pub fn with_public_key(mut self, public_key_hex: &str) -> Self {
        self.public_key = Some(public_key_hex.to_string());
        self
    }

    pub fn insert(&self, record: PackageRecord) {
        let mut records = lock(&self.records);
        records.retain(|existing| {
            !(existing.name == record.name && existing.version == record.version)
        });
        records.push(record);
    }
}

impl Repository for MemoryRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn package_names(&self) -> Result<Vec<String>> {
        let names = lock(&self.records)
            .iter()
            .map(|record| record.name.clone())
            .collect::<BTreeSet<_>>();
        Ok(names.into_iter().collect())
    }

    fn package_versions(&self, name: &str) -> Result<Vec<PackageRecord>> {
        let mut records = lock(&self.records)
            .iter()
            .filter(|record| record.name == name)
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(records)
    }

    fn license_text(&self, license: &str) -> Result<Option<String>> {
        Ok(self.licenses.get(license).cloned())
    }

    fn public_key(&self) -> Option<String> {
        self.public_key.clone()
    }
}

#[derive(Debug, Default)]
pub struct MemoryInstalledRepository {
    packages: Mutex<BTreeMap<String, (PackageRecord, InstallSource)>>,
    accepted: Mutex<BTreeSet<String>>,
}

impl MemoryInstalledRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, record: PackageRecord) -> Self {
        lock(&self.packages).insert(record.name.clone(), (record, InstallSource::User));
        self
    }
}

impl Repository for MemoryInstalledRepository {
    fn id(&self) -> &str {
        INSTALLED_REPOSITORY_ID
    }

    fn package_names(&self) -> Result<Vec<String>> {
        Ok(lock(&self.packages).keys().cloned().collect())
    }

    fn package_versions(&self, name: &str) -> Result<Vec<PackageRecord>> {
        Ok(lock(&self.packages)
            .get(name)
            .map(|(record, _)| vec![record.clone()])
            .unwrap_or_default())
    }

    fn license_text(&self, _license: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

impl InstalledRepository for MemoryInstalledRepository {
    fn install_source(&self, name: &str) -> Result<Option<InstallSource>> {
        Ok(lock(&self.packages).get(name).map(|(_, source)| *source))
    }

    fn record_install(&self, record: &PackageRecord, source: InstallSource) -> Result<()> {
        lock(&self.packages).insert(record.name.clone(), (record.clone(), source));
        Ok(())
    }

    fn record_removal(&self, name: &str) -> Result<bool> {
        Ok(lock(&self.packages).remove(name).is_some())
    }

    fn accepted_licenses(&self) -> Result<BTreeSet<String>> {
        Ok(lock(&self.accepted).clone())
    }

    fn accept_license(&self, license: &str) -> Result<()> {
        lock(&self.accepted).insert(license.to_string());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
