use std::path::PathBuf;

use serde::Serialize;

use crate::RefreshStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStatus {
    Running,
    DepResolve,
    Download,
    Install,
    Remove,
    Refresh,
    Info,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageInfo {
    Downloading,
    Installing,
    Removing,
    Installed,
    Available,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TransactionEvent {
    Status {
        status: TransactionStatus,
    },
    Percentage {
        value: u8,
    },
    Package {
        info: PackageInfo,
        package_id: String,
        summary: String,
    },
    Files {
        package_id: String,
        path: PathBuf,
    },
    Details {
        package_id: String,
        license: Option<String>,
        description: String,
        homepage: Option<String>,
        size: Option<u64>,
    },
    RepositoryDetail {
        repository: String,
        trusted: bool,
    },
    LicenseRequired {
        license: String,
        package_id: String,
        vendor: String,
        text: String,
    },
    RepositoryRefreshed {
        repository: String,
        status: Option<RefreshStatus>,
        error: Option<String>,
    },
}

pub trait TransactionObserver {
    fn emit(&mut self, event: TransactionEvent);
}

impl<F> TransactionObserver for F
where
    F: FnMut(TransactionEvent),
{
    fn emit(&mut self, event: TransactionEvent) {
        self(event)
    }
}
