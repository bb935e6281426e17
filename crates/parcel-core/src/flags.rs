use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFlags {
    pub only_trusted: bool,
    pub simulate: bool,
    pub only_download: bool,
    pub allow_dependencies: bool,
    pub auto_remove: bool,
    /// Honor a caller abort signal between discrete actions.
    pub allow_cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Install,
    Remove,
    Update,
    Download,
    Refresh,
    Query,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::Download => "download",
            Self::Refresh => "refresh",
            Self::Query => "query",
        }
    }

    /// Operations that mutate the installed registry or replace repository
    /// metadata.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Install | Self::Remove | Self::Update | Self::Refresh
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallSource {
    User,
    AutomaticDependency,
}

impl InstallSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AutomaticDependency => "automatic_dependency",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "user" => Ok(Self::User),
            "automatic_dependency" => Ok(Self::AutomaticDependency),
            _ => Err(anyhow!("invalid install_source: {value}")),
        }
    }
}
