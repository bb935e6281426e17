use std::path::PathBuf;

use parcel_core::InstallSource;

/// Per-action options handed to the [`crate::PackageActionFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOptions {
    pub remove_config_files: bool,
    /// Directory receiving fetched artifacts instead of the package cache.
    pub fetch_destination: Option<PathBuf>,
    pub install_source: InstallSource,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            remove_config_files: false,
            fetch_destination: None,
            install_source: InstallSource::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub exit_code: i32,
    pub local_path: Option<PathBuf>,
}

impl FetchOutcome {
    pub fn fetched(local_path: Option<PathBuf>) -> Self {
        Self {
            exit_code: 0,
            local_path,
        }
    }

    pub fn failed(exit_code: i32) -> Self {
        Self {
            exit_code,
            local_path: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
