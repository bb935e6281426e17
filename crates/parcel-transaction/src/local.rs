use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use parcel_core::{ActionKind, PackageArtifact, PackageMatch};
use parcel_registry::RepositoryRegistry;
use parcel_security::verify_sha256_file;

use crate::{ActionOptions, FetchOutcome, PackageActionFactory};

/// Fetches artifacts into `cache/<repository>/` under the state root.
/// Installing places the artifact in `packages/<name>/` and records the
/// package in the installed registry.
#[derive(Debug)]
pub struct LocalActionFactory {
    registry: Arc<RepositoryRegistry>,
    cache_root: PathBuf,
    payload_root: PathBuf,
}

impl LocalActionFactory {
    pub fn new(registry: Arc<RepositoryRegistry>, state_root: &Path) -> Self {
        Self {
            registry,
            cache_root: state_root.join("cache"),
            payload_root: state_root.join("packages"),
        }
    }

    pub fn cache_path(&self, package: &PackageMatch, artifact: &PackageArtifact) -> PathBuf {
        self.cache_root
            .join(package.repository_id())
            .join(artifact_file_name(package, artifact))
    }

    pub fn payload_dir(&self, name: &str) -> PathBuf {
        self.payload_root.join(name)
    }

    fn install(&self, package: &PackageMatch, options: &ActionOptions) -> Result<i32> {
        let record = package.record()?;
        let payload_dir = self.payload_dir(&record.name);
        if let Some(artifact) = &record.artifact {
            let cached = self.cache_path(package, artifact);
            if !cached.exists() {
                anyhow::bail!(
                    "artifact of {package} has not been fetched: {}",
                    cached.display()
                );
            }
            if payload_dir.exists() {
                fs::remove_dir_all(&payload_dir)
                    .with_context(|| format!("failed to clear {}", payload_dir.display()))?;
            }
            fs::create_dir_all(&payload_dir)
                .with_context(|| format!("failed to create {}", payload_dir.display()))?;
            let placed = payload_dir.join(artifact_file_name(package, artifact));
            fs::copy(&cached, &placed).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    cached.display(),
                    placed.display()
                )
            })?;
        }
        self.registry
            .installed()
            .record_install(&record, options.install_source)?;
        debug!("installed {package} ({})", options.install_source.as_str());
        Ok(0)
    }

    fn remove(&self, package: &PackageMatch, options: &ActionOptions) -> Result<i32> {
        if !self.registry.installed().record_removal(package.name())? {
            warn!("{package} is not installed");
            return Ok(1);
        }
        let payload_dir = self.payload_dir(package.name());
        if payload_dir.exists() {
            fs::remove_dir_all(&payload_dir)
                .with_context(|| format!("failed to remove {}", payload_dir.display()))?;
        }
        if options.remove_config_files {
            debug!("{package} keeps no configuration files outside its payload");
        }
        debug!("removed {package}");
        Ok(0)
    }
}

impl PackageActionFactory for LocalActionFactory {
    fn fetch(&self, package: &PackageMatch, options: &ActionOptions) -> Result<FetchOutcome> {
        let record = package.record()?;
        let Some(artifact) = &record.artifact else {
            debug!("{package} has no artifact to fetch");
            return Ok(FetchOutcome::fetched(None));
        };

        let destination = match &options.fetch_destination {
            Some(directory) => directory.join(artifact_file_name(package, artifact)),
            None => self.cache_path(package, artifact),
        };
        if destination.exists() && verify_sha256_file(&destination, &artifact.sha256)? {
            debug!("cache hit for {package}: {}", destination.display());
            return Ok(FetchOutcome::fetched(Some(destination)));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        transfer(&artifact.url, &destination)?;
        if !verify_sha256_file(&destination, &artifact.sha256)? {
            let _ = fs::remove_file(&destination);
            anyhow::bail!(
                "sha256 mismatch for {}: expected {}",
                artifact.url,
                artifact.sha256
            );
        }
        Ok(FetchOutcome::fetched(Some(destination)))
    }

    fn apply(
        &self,
        kind: ActionKind,
        package: &PackageMatch,
        options: &ActionOptions,
    ) -> Result<i32> {
        match kind {
            ActionKind::Install => self.install(package, options),
            ActionKind::Remove => self.remove(package, options),
        }
    }
}

fn artifact_file_name(package: &PackageMatch, artifact: &PackageArtifact) -> String {
    artifact
        .url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("{}-{}.pkg", package.name(), package.version()))
}

/// Copies or downloads `url` through a `.part` file next to `destination`.
fn transfer(url: &str, destination: &Path) -> Result<()> {
    let part_path = destination.with_file_name(format!(
        "{}.part",
        destination
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("artifact")
    ));

    let result = if url.starts_with("http://") || url.starts_with("https://") {
        download_http(url, &part_path)
    } else {
        let source = url.strip_prefix("file://").unwrap_or(url);
        fs::copy(source, &part_path)
            .map(|_| ())
            .with_context(|| format!("failed to copy artifact from {source}"))
    };
    if let Err(err) = result {
        let _ = fs::remove_file(&part_path);
        return Err(err);
    }

    fs::rename(&part_path, destination).with_context(|| {
        format!(
            "failed to move fetched artifact into place: {}",
            destination.display()
        )
    })
}

fn download_http(url: &str, out_path: &Path) -> Result<()> {
    let mut response = reqwest::blocking::get(url)
        .with_context(|| format!("failed to request {url}"))?
        .error_for_status()
        .with_context(|| format!("download of {url} was refused"))?;
    let mut file = fs::File::create(out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    response
        .copy_to(&mut file)
        .with_context(|| format!("failed to download {url}"))?;
    Ok(())
}
