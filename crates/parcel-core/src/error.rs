use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Fetch,
    Install,
    Remove,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Fetch => "download",
            Self::Install => "install",
            Self::Remove => "remove",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("cannot find the following dependencies: {}", .missing.join(", "))]
    DependenciesNotFound { missing: Vec<String> },

    #[error("dependencies collisions, cannot continue: {}", .packages.join(", "))]
    DependenciesCollision { packages: Vec<String> },

    #[error("some packages are needed by other packages: {}", .packages.join(", "))]
    NeededByOthers { packages: Vec<String> },

    #[error("cannot remove a package coming from a repository: {package}")]
    NotInstalled { package: String },
}

/// The single terminal error of a failed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("dependency resolution failed: {0}")]
    ResolutionFailed(#[from] ResolutionFailure),

    #[error("could not perform remove operation, these packages are vital: {}", .vital.join(", "))]
    NotRemovable { vital: Vec<String> },

    #[error("following EULAs are not accepted: {}", .licenses.join(" "))]
    LicenseRequired { licenses: Vec<String> },

    #[error("package {package} is not signed by a trusted key")]
    MissingSignature { package: String },

    #[error("cannot {phase} package: {package} ({detail})")]
    ActionFailed {
        phase: ActionPhase,
        package: String,
        detail: String,
    },

    #[error("package {identifier} was not found")]
    NotFound { identifier: String },

    #[error("transaction cancelled before {package}")]
    Cancelled { package: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl TransactionError {
    pub fn internal(err: &anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }

    /// Stable status token reported to the frontend.
    pub fn exit_status(&self) -> &'static str {
        match self {
            Self::ResolutionFailed(_) => "dep-resolution-failed",
            Self::NotRemovable { .. } => "cannot-remove-system-package",
            Self::LicenseRequired { .. } => "eula-required",
            Self::MissingSignature { .. } => "missing-gpg-signature",
            Self::ActionFailed {
                phase: ActionPhase::Fetch,
                ..
            } => "package-download-failed",
            Self::ActionFailed {
                phase: ActionPhase::Install,
                ..
            } => "package-failed-to-install",
            Self::ActionFailed {
                phase: ActionPhase::Remove,
                ..
            } => "package-failed-to-remove",
            Self::NotFound { .. } => "package-not-found",
            Self::Cancelled { .. } => "transaction-cancelled",
            Self::Internal(_) => "internal-error",
        }
    }
}
