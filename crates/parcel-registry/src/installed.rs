use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use parcel_core::{
    InstallSource, InstalledRepository, PackageRecord, Repository, INSTALLED_REPOSITORY_ID,
};
use semver::{Version, VersionReq};

use crate::fs_ops::{checked_file_stem, current_unix_timestamp};

const ACCEPTED_LICENSES_FILE: &str = "licenses.accepted";

/// Installed-package registry kept as one receipt file per package.
#[derive(Debug, Clone)]
pub struct FsInstalledRepository {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InstalledReceipt {
    record: PackageRecord,
    install_source: InstallSource,
    installed_at_unix: u64,
}

impl FsInstalledRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn receipt_path(&self, name: &str) -> Result<PathBuf> {
        let name = checked_file_stem(name, "package name")?;
        Ok(self.root.join(format!("{name}.receipt")))
    }

    fn read_receipt(&self, name: &str) -> Result<Option<InstalledReceipt>> {
        let path = self.receipt_path(name)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read receipt: {}", path.display()))
            }
        };
        let receipt = parse_receipt(&raw)
            .with_context(|| format!("failed to parse receipt: {}", path.display()))?;
        Ok(Some(receipt))
    }
}

impl Repository for FsInstalledRepository {
    fn id(&self) -> &str {
        INSTALLED_REPOSITORY_ID
    }

    fn package_names(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).with_context(|| {
            format!(
                "failed to read installed registry directory: {}",
                self.root.display()
            )
        })? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("receipt") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|v| v.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn package_versions(&self, name: &str) -> Result<Vec<PackageRecord>> {
        Ok(self
            .read_receipt(name)?
            .map(|receipt| vec![receipt.record])
            .unwrap_or_default())
    }

    fn license_text(&self, _license: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

impl InstalledRepository for FsInstalledRepository {
    fn install_source(&self, name: &str) -> Result<Option<InstallSource>> {
        Ok(self.read_receipt(name)?.map(|receipt| receipt.install_source))
    }

    fn record_install(&self, record: &PackageRecord, source: InstallSource) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let receipt = InstalledReceipt {
            record: record.clone(),
            install_source: source,
            installed_at_unix: current_unix_timestamp(),
        };
        let path = self.receipt_path(&record.name)?;
        fs::write(&path, serialize_receipt(&receipt))
            .with_context(|| format!("failed to write receipt: {}", path.display()))
    }

    fn record_removal(&self, name: &str) -> Result<bool> {
        let path = self.receipt_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove receipt: {}", path.display()))
            }
        }
    }

    fn accepted_licenses(&self) -> Result<BTreeSet<String>> {
        let path = self.root.join(ACCEPTED_LICENSES_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read accepted licenses: {}", path.display())
                })
            }
        };
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn accept_license(&self, license: &str) -> Result<()> {
        let mut accepted = self.accepted_licenses()?;
        if !accepted.insert(license.to_string()) {
            return Ok(());
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let mut payload = accepted.into_iter().collect::<Vec<_>>().join("\n");
        payload.push('\n');
        let path = self.root.join(ACCEPTED_LICENSES_FILE);
        fs::write(&path, payload)
            .with_context(|| format!("failed to write accepted licenses: {}", path.display()))
    }
}

fn serialize_receipt(receipt: &InstalledReceipt) -> String {
    let record = &receipt.record;
    let mut payload = String::new();
    payload.push_str(&format!("name={}\n", record.name));
    payload.push_str(&format!("version={}\n", record.version));
    if !record.description.is_empty() {
        payload.push_str(&format!("description={}\n", record.description.replace('\n', " ")));
    }
    if let Some(license) = &record.license {
        payload.push_str(&format!("license={license}\n"));
    }
    if let Some(homepage) = &record.homepage {
        payload.push_str(&format!("homepage={homepage}\n"));
    }
    for (name, req) in &record.dependencies {
        payload.push_str(&format!("dependency={name}@{req}\n"));
    }
    for (name, req) in &record.conflicts {
        payload.push_str(&format!("conflict={name}@{req}\n"));
    }
    payload.push_str(&format!(
        "install_source={}\n",
        receipt.install_source.as_str()
    ));
    payload.push_str(&format!(
        "installed_at_unix={}\n",
        receipt.installed_at_unix
    ));
    payload
}

fn parse_receipt(raw: &str) -> Result<InstalledReceipt> {
    let mut name = None;
    let mut version = None;
    let mut description = String::new();
    let mut license = None;
    let mut homepage = None;
    let mut dependencies = BTreeMap::new();
    let mut conflicts = BTreeMap::new();
    let mut install_source = None;
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "name" => name = Some(v.to_string()),
            "version" => {
                version = Some(Version::parse(v).with_context(|| format!("invalid version: {v}"))?)
            }
            "description" => description = v.to_string(),
            "license" => license = Some(v.to_string()),
            "homepage" => homepage = Some(v.to_string()),
            "dependency" => {
                let (dep, req) = parse_requirement_entry(v)?;
                dependencies.insert(dep, req);
            }
            "conflict" => {
                let (other, req) = parse_requirement_entry(v)?;
                conflicts.insert(other, req);
            }
            "install_source" => install_source = Some(InstallSource::parse(v)?),
            "installed_at_unix" => {
                installed_at_unix = Some(v.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(InstalledReceipt {
        record: PackageRecord {
            name: name.context("missing name")?,
            version: version.context("missing version")?,
            description,
            license,
            homepage,
            dependencies,
            conflicts,
            artifact: None,
            signature: None,
        },
        install_source: install_source.unwrap_or(InstallSource::User),
        installed_at_unix: installed_at_unix.unwrap_or_default(),
    })
}

fn parse_requirement_entry(entry: &str) -> Result<(String, VersionReq)> {
    let (name, req) = entry
        .split_once('@')
        .ok_or_else(|| anyhow!("invalid requirement entry '{entry}': expected name@requirement"))?;
    let req = VersionReq::parse(req)
        .with_context(|| format!("invalid version requirement for '{name}': {req}"))?;
    Ok((name.to_string(), req))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_receipt() {
        let receipt = parse_receipt("name=zlib\nversion=1.3.0\n").expect("must parse");
        assert_eq!(receipt.record.name, "zlib");
        assert_eq!(receipt.install_source, InstallSource::User);
        assert!(receipt.record.dependencies.is_empty());
    }

    #[test]
    fn parses_full_receipt() {
        let raw = "name=editor\nversion=2.0.0\ndescription=text editor\nlicense=GPL-2\ndependency=zlib@^1.2\nconflict=vi@*\ninstall_source=automatic_dependency\ninstalled_at_unix=42\n";
        let receipt = parse_receipt(raw).expect("must parse");
        assert_eq!(receipt.record.description, "text editor");
        assert_eq!(
            receipt.record.dependencies.get("zlib"),
            Some(&VersionReq::parse("^1.2").expect("req"))
        );
        assert!(receipt.record.conflicts.contains_key("vi"));
        assert_eq!(receipt.install_source, InstallSource::AutomaticDependency);
        assert_eq!(receipt.installed_at_unix, 42);
    }

    #[test]
    fn rejects_receipt_without_version() {
        let err = parse_receipt("name=zlib\n").expect_err("version is required");
        assert!(err.to_string().contains("missing version"));
    }

    #[test]
    fn rejects_malformed_dependency() {
        assert!(parse_receipt("name=a\nversion=1.0.0\ndependency=zlib\n").is_err());
    }
}
