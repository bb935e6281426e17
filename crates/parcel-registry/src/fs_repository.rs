use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use parcel_core::{PackageRecord, RefreshStatus, Repository};

use crate::fs_ops::{
    checked_file_stem, compute_snapshot_id, copy_dir_recursive, unique_suffix,
};
use crate::RepositoryConfig;

const SNAPSHOT_ID_FILE: &str = "snapshot.id";
const PUBLIC_KEY_FILE: &str = "repository.pub";

/// An available repository served from a local snapshot of its source
/// directory (`index/<name>/<version>.toml`, `licenses/<id>.txt`).
#[derive(Debug, Clone)]
pub struct FsRepository {
    config: RepositoryConfig,
    snapshot_root: PathBuf,
}

impl FsRepository {
    pub fn new(config: RepositoryConfig, state_root: &Path) -> Self {
        let snapshot_root = state_root.join("repositories").join(&config.name);
        Self {
            config,
            snapshot_root,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn snapshot_root(&self) -> &Path {
        &self.snapshot_root
    }

    pub fn snapshot_id(&self) -> Option<String> {
        fs::read_to_string(self.snapshot_root.join(SNAPSHOT_ID_FILE))
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    }

    fn index_root(&self) -> PathBuf {
        self.snapshot_root.join("index")
    }

    fn replace_snapshot(&self, staged_root: &Path, snapshot_id: &str) -> Result<()> {
        let parent = self
            .snapshot_root
            .parent()
            .context("repository snapshot root has no parent")?;
        let backup = parent.join(format!(".{}-backup-{}", self.config.name, unique_suffix()));
        let had_existing = self.snapshot_root.exists();

        if had_existing {
            fs::rename(&self.snapshot_root, &backup).with_context(|| {
                format!(
                    "failed backing up repository snapshot {}",
                    self.snapshot_root.display()
                )
            })?;
        }

        if let Err(err) = fs::rename(staged_root, &self.snapshot_root) {
            if had_existing {
                let _ = fs::rename(&backup, &self.snapshot_root);
            }
            return Err(err).with_context(|| {
                format!(
                    "failed replacing repository snapshot {}",
                    self.snapshot_root.display()
                )
            });
        }

        fs::write(self.snapshot_root.join(SNAPSHOT_ID_FILE), format!("{snapshot_id}\n"))
            .with_context(|| {
                format!(
                    "failed writing snapshot id for repository '{}'",
                    self.config.name
                )
            })?;
        if had_existing {
            let _ = fs::remove_dir_all(&backup);
        }
        Ok(())
    }
}

impl Repository for FsRepository {
    fn id(&self) -> &str {
        &self.config.name
    }

    fn package_names(&self) -> Result<Vec<String>> {
        let index_root = self.index_root();
        if !index_root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&index_root)
            .with_context(|| format!("failed to read repository index: {}", index_root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn package_versions(&self, name: &str) -> Result<Vec<PackageRecord>> {
        let package_dir = self.index_root().join(checked_file_stem(name, "package name")?);
        if !package_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&package_dir)
            .with_context(|| format!("failed to read package directory: {name}"))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("toml") {
                continue;
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed reading package record: {}", path.display()))?;
            let record = PackageRecord::from_toml_str(&content)
                .with_context(|| format!("failed parsing package record: {}", path.display()))?;
            if record.name != name {
                anyhow::bail!(
                    "package record {} declares name '{}' inside index directory '{}'",
                    path.display(),
                    record.name,
                    name
                );
            }
            records.push(record);
        }

        records.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(records)
    }

    fn license_text(&self, license: &str) -> Result<Option<String>> {
        let path = self
            .snapshot_root
            .join("licenses")
            .join(format!("{}.txt", checked_file_stem(license, "license id")?));
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed reading license text: {}", path.display())),
        }
    }

    fn public_key(&self) -> Option<String> {
        self.config.public_key.clone().or_else(|| {
            fs::read_to_string(self.snapshot_root.join(PUBLIC_KEY_FILE))
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        })
    }

    fn refresh(&self, force: bool) -> Result<RefreshStatus> {
        let source_root = PathBuf::from(&self.config.location);
        let parent = self
            .snapshot_root
            .parent()
            .context("repository snapshot root has no parent")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let staged_root = parent.join(format!("tmp-{}-{}", self.config.name, unique_suffix()));
        let snapshot_id = match copy_dir_recursive(&source_root, &staged_root)
            .and_then(|()| compute_snapshot_id(&staged_root, &[SNAPSHOT_ID_FILE]))
        {
            Ok(snapshot_id) => snapshot_id,
            Err(err) => {
                let _ = fs::remove_dir_all(&staged_root);
                return Err(err).with_context(|| {
                    format!("failed to refresh repository '{}'", self.config.name)
                });
            }
        };

        if !force && self.snapshot_id().as_deref() == Some(snapshot_id.as_str()) {
            let _ = fs::remove_dir_all(&staged_root);
            debug!("repository '{}' is up to date ({snapshot_id})", self.config.name);
            return Ok(RefreshStatus::UpToDate);
        }

        if let Err(err) = self.replace_snapshot(&staged_root, &snapshot_id) {
            let _ = fs::remove_dir_all(&staged_root);
            return Err(err);
        }
        info!("repository '{}' refreshed to {snapshot_id}", self.config.name);
        Ok(RefreshStatus::Updated)
    }
}
