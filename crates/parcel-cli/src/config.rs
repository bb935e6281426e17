use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use parcel_registry::RepositoryConfig;
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_ENV: &str = "PARCEL_CONFIG";
pub(crate) const ROOT_ENV: &str = "PARCEL_ROOT";
pub(crate) const ACCEPTED_EULAS_ENV: &str = "PARCEL_ACCEPTED_EULAS";
const CONFIG_FILE_NAME: &str = "parcel.toml";

/// Contents of `parcel.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ParcelConfig {
    /// State root holding the installed registry, caches and snapshots.
    pub root: Option<PathBuf>,
    pub repositories: Vec<RepositoryConfig>,
    /// Packages that can never be removed.
    pub vital: Vec<String>,
    pub accepted_licenses: Vec<String>,
}

impl ParcelConfig {
    pub(crate) fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse parcel config")
    }

    /// A missing file is an empty config.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub config_path: PathBuf,
    pub state_root: PathBuf,
    pub config: ParcelConfig,
}

impl Settings {
    pub(crate) fn resolve(cli_config: Option<&Path>) -> Result<Self> {
        Self::from_sources(
            cli_config,
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var_os(ROOT_ENV).map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
    }

    /// Config path: `--config`, then `$PARCEL_CONFIG`, then
    /// `<root>/parcel.toml`. The `root` key of the config overrides the
    /// default root.
    pub(crate) fn from_sources(
        cli_config: Option<&Path>,
        env_config: Option<PathBuf>,
        env_root: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        let default_root = env_root.or_else(|| home.map(|home| home.join(".parcel")));
        let config_path = match (cli_config, env_config, &default_root) {
            (Some(path), _, _) => path.to_path_buf(),
            (None, Some(path), _) => path,
            (None, None, Some(root)) => root.join(CONFIG_FILE_NAME),
            (None, None, None) => {
                anyhow::bail!("HOME is not set; cannot resolve the parcel root (set {ROOT_ENV})")
            }
        };
        let config = ParcelConfig::load(&config_path)?;
        let state_root = config
            .root
            .clone()
            .or(default_root)
            .with_context(|| {
                format!(
                    "no state root: set `root` in {} or {ROOT_ENV}",
                    config_path.display()
                )
            })?;
        Ok(Self {
            config_path,
            state_root,
            config,
        })
    }

    /// Config list, then `--accept-license` flags, then
    /// `$PARCEL_ACCEPTED_EULAS`.
    pub(crate) fn accepted_licenses(
        &self,
        from_flags: &[String],
        from_env: Option<&str>,
    ) -> BTreeSet<String> {
        let env_licenses = from_env
            .into_iter()
            .flat_map(|value| value.split(';'))
            .map(str::trim)
            .filter(|license| !license.is_empty())
            .map(ToOwned::to_owned);
        self.config
            .accepted_licenses
            .iter()
            .chain(from_flags)
            .cloned()
            .chain(env_licenses)
            .collect()
    }
}
