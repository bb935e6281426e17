use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use parcel_core::{
    OperationKind, PackageInfo, PackageMatch, PackageRecord, ProgressReporter,
    TransactionError, TransactionEvent, TransactionFlags, TransactionObserver, TransactionStatus,
};
use parcel_lock::{CancellationToken, LockHandle, LockKind, ResourceLock};
use parcel_registry::RepositoryRegistry;
use parcel_resolver::DependencyResolver;

use crate::executor::{
    lookup, outer_lock_is_exclusive, update_candidates, Executor, Selection,
};
use crate::{PackageActionFactory, TransactionContext};

/// Entry point for every operation a frontend can request.
///
/// Each call runs synchronously on the calling thread and holds the outer
/// resource lock for its whole duration: shared for queries and downloads,
/// exclusive for anything that changes the installed registry or repository
/// metadata. Events go to `observer`; the return value is the single
/// terminal outcome.
pub struct PackageBackend {
    registry: Arc<RepositoryRegistry>,
    resolver: Arc<dyn DependencyResolver>,
    factory: Arc<dyn PackageActionFactory>,
    resources: Arc<ResourceLock>,
    cancel: CancellationToken,
}

impl PackageBackend {
    pub fn new(
        registry: Arc<RepositoryRegistry>,
        resolver: Arc<dyn DependencyResolver>,
        factory: Arc<dyn PackageActionFactory>,
    ) -> Self {
        Self {
            registry,
            resolver,
            factory,
            resources: ResourceLock::global(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resource_lock(mut self, resources: Arc<ResourceLock>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.registry
    }

    pub fn resource_lock(&self) -> &Arc<ResourceLock> {
        &self.resources
    }

    pub fn install(
        &self,
        targets: &[String],
        flags: TransactionFlags,
        accepted_licenses: &BTreeSet<String>,
        observer: &mut dyn TransactionObserver,
    ) -> Result<(), TransactionError> {
        let _resources = self.outer_lock(OperationKind::Install, flags);
        self.executor(OperationKind::Install, flags, observer).install(
            Selection::Available(targets),
            accepted_licenses,
            None,
        )
    }

    /// Installs newer available versions of `targets`, or of every installed
    /// package when `targets` is empty.
    pub fn update(
        &self,
        targets: &[String],
        flags: TransactionFlags,
        accepted_licenses: &BTreeSet<String>,
        observer: &mut dyn TransactionObserver,
    ) -> Result<(), TransactionError> {
        let _resources = self.outer_lock(OperationKind::Update, flags);
        self.executor(OperationKind::Update, flags, observer).install(
            Selection::Updates(targets),
            accepted_licenses,
            None,
        )
    }

    pub fn remove(
        &self,
        targets: &[String],
        flags: TransactionFlags,
        observer: &mut dyn TransactionObserver,
    ) -> Result<(), TransactionError> {
        let _resources = self.outer_lock(OperationKind::Remove, flags);
        self.executor(OperationKind::Remove, flags, observer)
            .remove(targets)
    }

    /// Fetches exactly the named packages into `directory`; dependencies
    /// are not expanded.
    pub fn download(
        &self,
        targets: &[String],
        directory: &Path,
        flags: TransactionFlags,
        accepted_licenses: &BTreeSet<String>,
        observer: &mut dyn TransactionObserver,
    ) -> Result<(), TransactionError> {
        let flags = TransactionFlags {
            only_download: true,
            ..flags
        };
        let _resources = self.outer_lock(OperationKind::Download, flags);
        self.executor(OperationKind::Download, flags, observer)
            .install(
                Selection::Available(targets),
                accepted_licenses,
                Some(directory),
            )
    }

    /// Re-snapshots every available repository. Fails only when none of
    /// them could be refreshed.
    pub fn refresh(
        &self,
        force: bool,
        observer: &mut dyn TransactionObserver,
    ) -> Result<(), TransactionError> {
        let _resources = self.outer_lock(OperationKind::Refresh, TransactionFlags::default());
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Refresh,
        });

        let repositories = self.registry.available();
        let mut progress = ProgressReporter::new(repositories.len() as u64);
        emit_percentage(observer, progress.start());

        let mut failures = Vec::new();
        for repository in repositories {
            match repository.refresh(force) {
                Ok(status) => {
                    info!("repository '{}': {status:?}", repository.id());
                    observer.emit(TransactionEvent::RepositoryRefreshed {
                        repository: repository.id().to_string(),
                        status: Some(status),
                        error: None,
                    });
                }
                Err(err) => {
                    warn!("failed to refresh repository '{}': {err:#}", repository.id());
                    observer.emit(TransactionEvent::RepositoryRefreshed {
                        repository: repository.id().to_string(),
                        status: None,
                        error: Some(format!("{err:#}")),
                    });
                    failures.push(format!("{}: {err:#}", repository.id()));
                }
            }
            emit_percentage(observer, progress.advance());
        }

        if !repositories.is_empty() && failures.len() == repositories.len() {
            return Err(TransactionError::Internal(format!(
                "no repository could be refreshed ({})",
                failures.join("; ")
            )));
        }
        emit_percentage(observer, progress.finish());
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Finished,
        });
        Ok(())
    }

    /// Packages the targets pull in when installed, targets excluded.
    pub fn depends_on(
        &self,
        targets: &[String],
        recursive: bool,
        observer: &mut dyn TransactionObserver,
    ) -> Result<Vec<PackageMatch>, TransactionError> {
        let _resources = self.outer_lock(OperationKind::Query, TransactionFlags::default());
        let _installed = self.registry.installed_lock().shared();
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Info,
        });

        let matches = self.query_targets(targets, false)?;
        let queue = self.resolver.resolve_install(&matches, recursive)?;
        let found = queue
            .added_entries(&matches)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        self.emit_query_results(&found, observer)?;
        Ok(found)
    }

    /// Installed packages depending on the targets.
    pub fn required_by(
        &self,
        targets: &[String],
        recursive: bool,
        observer: &mut dyn TransactionObserver,
    ) -> Result<Vec<PackageMatch>, TransactionError> {
        let _resources = self.outer_lock(OperationKind::Query, TransactionFlags::default());
        let _installed = self.registry.installed_lock().shared();
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Info,
        });

        let matches = self.query_targets(targets, true)?;
        let queue = self.resolver.resolve_reverse(&matches, recursive)?;
        let found = queue.entries().to_vec();
        self.emit_query_results(&found, observer)?;
        Ok(found)
    }

    /// Packages, installed or available, whose name contains `needle`.
    pub fn search(
        &self,
        needle: &str,
        observer: &mut dyn TransactionObserver,
    ) -> Result<Vec<PackageMatch>, TransactionError> {
        let _resources = self.outer_lock(OperationKind::Query, TransactionFlags::default());
        let _installed = self.registry.installed_lock().shared();
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Info,
        });

        let found = self
            .registry
            .search(needle)
            .map_err(|err| TransactionError::internal(&err))?;
        self.emit_query_results(&found, observer)?;
        Ok(found)
    }

    /// Newer available versions of `targets`, or of every installed package
    /// when `targets` is empty. Nothing is installed.
    pub fn get_updates(
        &self,
        targets: &[String],
        observer: &mut dyn TransactionObserver,
    ) -> Result<Vec<PackageMatch>, TransactionError> {
        let _resources = self.outer_lock(OperationKind::Query, TransactionFlags::default());
        let _installed = self.registry.installed_lock().shared();
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Info,
        });

        let found = update_candidates(&self.registry, targets)?;
        info!("{} update(s) available", found.len());
        self.emit_query_results(&found, observer)?;
        Ok(found)
    }

    /// Full records of the targets, looked up in the installed registry
    /// first.
    pub fn get_details(
        &self,
        targets: &[String],
        observer: &mut dyn TransactionObserver,
    ) -> Result<Vec<PackageRecord>, TransactionError> {
        let _resources = self.outer_lock(OperationKind::Query, TransactionFlags::default());
        let _installed = self.registry.installed_lock().shared();
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Info,
        });

        let mut matches = Vec::new();
        for identifier in targets {
            let found = match lookup(&self.registry, identifier, true)? {
                Some(installed) => Some(installed),
                None => lookup(&self.registry, identifier, false)?,
            };
            match found {
                Some(found) if !matches.contains(&found) => matches.push(found),
                Some(_) => {}
                None => warn!("cannot match {identifier}"),
            }
        }

        let mut records = Vec::with_capacity(matches.len());
        for package in &matches {
            let record = package
                .record()
                .map_err(|err| TransactionError::internal(&err))?;
            observer.emit(TransactionEvent::Details {
                package_id: package.package_id().to_string(),
                license: record.license.clone(),
                description: record.description.clone(),
                homepage: record.homepage.clone(),
                size: record.artifact.as_ref().and_then(|artifact| artifact.size),
            });
            records.push(record);
        }
        finish_query(observer);
        Ok(records)
    }

    /// Ids of the enabled repositories, highest priority first.
    pub fn get_repo_list(
        &self,
        observer: &mut dyn TransactionObserver,
    ) -> Result<Vec<String>, TransactionError> {
        let _resources = self.outer_lock(OperationKind::Query, TransactionFlags::default());
        observer.emit(TransactionEvent::Status {
            status: TransactionStatus::Info,
        });

        let mut ids = Vec::new();
        for repository in self.registry.available() {
            observer.emit(TransactionEvent::RepositoryDetail {
                repository: repository.id().to_string(),
                trusted: repository.public_key().is_some(),
            });
            ids.push(repository.id().to_string());
        }
        finish_query(observer);
        Ok(ids)
    }

    fn outer_lock(&self, operation: OperationKind, flags: TransactionFlags) -> LockHandle<'_> {
        let kind = if outer_lock_is_exclusive(operation, flags) {
            LockKind::Exclusive
        } else {
            LockKind::Shared
        };
        debug!("{}: taking {kind} {} lock", operation.as_str(), self.resources.label());
        self.resources.acquire(kind)
    }

    fn executor<'a>(
        &'a self,
        operation: OperationKind,
        flags: TransactionFlags,
        observer: &'a mut dyn TransactionObserver,
    ) -> Executor<'a> {
        Executor::new(
            &self.registry,
            self.resolver.as_ref(),
            self.factory.as_ref(),
            &self.cancel,
            observer,
            TransactionContext::new(operation, flags),
        )
    }

    /// Unknown identifiers are skipped in queries.
    fn query_targets(
        &self,
        targets: &[String],
        prefer_installed: bool,
    ) -> Result<Vec<PackageMatch>, TransactionError> {
        let mut matches = Vec::new();
        for identifier in targets {
            match lookup(&self.registry, identifier, prefer_installed)? {
                Some(found) if !matches.contains(&found) => matches.push(found),
                Some(_) => {}
                None => warn!("cannot match {identifier}"),
            }
        }
        Ok(matches)
    }

    fn emit_query_results(
        &self,
        found: &[PackageMatch],
        observer: &mut dyn TransactionObserver,
    ) -> Result<(), TransactionError> {
        for package in found {
            let record = package
                .record()
                .map_err(|err| TransactionError::internal(&err))?;
            let info = if package.repository().is_installed() {
                PackageInfo::Installed
            } else {
                PackageInfo::Available
            };
            observer.emit(TransactionEvent::Package {
                info,
                package_id: package.package_id().to_string(),
                summary: record.description,
            });
        }
        finish_query(observer);
        Ok(())
    }
}

fn finish_query(observer: &mut dyn TransactionObserver) {
    emit_percentage(observer, Some(100));
    observer.emit(TransactionEvent::Status {
        status: TransactionStatus::Finished,
    });
}

fn emit_percentage(observer: &mut dyn TransactionObserver, value: Option<u8>) {
    if let Some(value) = value {
        observer.emit(TransactionEvent::Percentage { value });
    }
}
