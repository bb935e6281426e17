mod error;
mod events;
mod flags;
mod matching;
mod package_id;
mod progress;
mod queue;
mod record;
mod repository;

pub use error::{ActionPhase, ResolutionFailure, TransactionError};
pub use events::{PackageInfo, TransactionEvent, TransactionObserver, TransactionStatus};
pub use flags::{InstallSource, OperationKind, TransactionFlags};
pub use matching::PackageMatch;
pub use package_id::{current_arch, PackageId};
pub use progress::{percentage, ProgressReporter};
pub use queue::{ActionKind, ActionQueue};
pub use record::{PackageArtifact, PackageRecord};
pub use repository::{
    InstalledRepository, RefreshStatus, Repository, RepositoryHandle, INSTALLED_REPOSITORY_ID,
};

#[cfg(test)]
mod tests;
