use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, info, warn};
use parcel_core::{
    ActionKind, ActionPhase, ActionQueue, InstallSource, OperationKind, PackageId, PackageInfo,
    PackageMatch, ResolutionFailure, TransactionError, TransactionEvent, TransactionFlags,
    TransactionObserver, TransactionStatus,
};
use parcel_lock::CancellationToken;
use parcel_registry::RepositoryRegistry;
use parcel_resolver::DependencyResolver;
use parcel_security::check_record_trust;

use crate::license::{license_events, pending_obligations};
use crate::{ActionOptions, PackageActionFactory, TransactionContext, TransactionState};

/// How the targets of an install-type transaction are picked.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Selection<'s> {
    /// Package ids or names of available packages.
    Available(&'s [String]),
    /// Package ids or names of installed packages.
    Installed(&'s [String]),
    /// Newer available versions of the named installed packages, or of all
    /// installed packages when empty.
    Updates(&'s [String]),
}

/// Drives one transaction through its states. Outer locks are held by the
/// caller; the installed-registry lock is taken here around each registry
/// access.
pub(crate) struct Executor<'a> {
    registry: &'a RepositoryRegistry,
    resolver: &'a dyn DependencyResolver,
    factory: &'a dyn PackageActionFactory,
    cancel: &'a CancellationToken,
    observer: &'a mut dyn TransactionObserver,
    ctx: TransactionContext,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        registry: &'a RepositoryRegistry,
        resolver: &'a dyn DependencyResolver,
        factory: &'a dyn PackageActionFactory,
        cancel: &'a CancellationToken,
        observer: &'a mut dyn TransactionObserver,
        ctx: TransactionContext,
    ) -> Self {
        Self {
            registry,
            resolver,
            factory,
            cancel,
            observer,
            ctx,
        }
    }

    pub(crate) fn install(
        mut self,
        selection: Selection<'_>,
        pre_accepted: &BTreeSet<String>,
        destination: Option<&Path>,
    ) -> Result<(), TransactionError> {
        let result = self.run_install(selection, pre_accepted, destination);
        self.finish(result)
    }

    pub(crate) fn remove(mut self, identifiers: &[String]) -> Result<(), TransactionError> {
        let result = self.run_remove(identifiers);
        self.finish(result)
    }

    fn run_install(
        &mut self,
        selection: Selection<'_>,
        pre_accepted: &BTreeSet<String>,
        destination: Option<&Path>,
    ) -> Result<(), TransactionError> {
        let flags = self.ctx.flags();
        self.status(TransactionStatus::Running);
        self.ctx.advance_to(TransactionState::Resolving)?;
        self.status(TransactionStatus::DepResolve);

        let targets = self.select(selection)?;
        let queue = if flags.only_download {
            ActionQueue::new(ActionKind::Install, targets.clone())
        } else {
            let _installed = self.registry.installed_lock().shared();
            self.resolver.resolve_install(&targets, true)?
        };
        info!(
            "{}: {} action(s) queued for {} target(s)",
            self.ctx.operation().as_str(),
            queue.len(),
            targets.len()
        );
        self.ctx.plan(targets, queue);

        self.ctx.advance_to(TransactionState::LicenseCheck)?;
        let obligation =
            pending_obligations(self.registry, self.ctx.queue(), pre_accepted, !flags.simulate)
                .map_err(|err| TransactionError::internal(&err))?;
        if !obligation.is_empty() {
            let events = {
                let _installed = self.registry.installed_lock().shared();
                license_events(&obligation).map_err(|err| TransactionError::internal(&err))?
            };
            for event in events {
                self.emit(event);
            }
            return Err(TransactionError::LicenseRequired {
                licenses: obligation.licenses(),
            });
        }

        self.ctx.advance_to(TransactionState::Fetching)?;
        self.start_progress();
        self.status(TransactionStatus::Download);
        self.fetch_all(destination)?;

        if !self.ctx.applies() {
            return self.ctx.advance_to(TransactionState::Done);
        }

        self.ctx.advance_to(TransactionState::Applying)?;
        self.status(TransactionStatus::Install);
        self.apply_all()?;
        self.ctx.advance_to(TransactionState::Done)
    }

    fn run_remove(&mut self, identifiers: &[String]) -> Result<(), TransactionError> {
        let flags = self.ctx.flags();
        self.status(TransactionStatus::Running);
        self.ctx.advance_to(TransactionState::Resolving)?;
        self.status(TransactionStatus::DepResolve);

        let targets = self.select(Selection::Installed(identifiers))?;
        if flags.auto_remove {
            info!("auto_remove is not supported, ignoring it");
        }
        let queue = {
            let _installed = self.registry.installed_lock().shared();
            self.resolver.resolve_removal(&targets)?
        };

        let added = queue
            .added_entries(&targets)
            .into_iter()
            .map(|package| package.package_id().to_string())
            .collect::<Vec<_>>();
        if !added.is_empty() && !flags.allow_dependencies {
            return Err(ResolutionFailure::NeededByOthers { packages: added }.into());
        }
        info!(
            "remove: {} action(s) queued for {} target(s)",
            queue.len(),
            targets.len()
        );
        self.ctx.plan(targets, queue);

        self.ctx.advance_to(TransactionState::Applying)?;
        self.start_progress();
        self.status(TransactionStatus::Remove);
        self.apply_all()?;
        self.ctx.advance_to(TransactionState::Done)
    }

    fn finish(mut self, result: Result<(), TransactionError>) -> Result<(), TransactionError> {
        match result {
            Ok(()) => {
                let value = self.ctx.progress_mut().finish();
                self.report(value);
                self.status(TransactionStatus::Finished);
                Ok(())
            }
            Err(err) => {
                let err = self.ctx.abort(err);
                warn!(
                    "{} transaction aborted: {err}",
                    self.ctx.operation().as_str()
                );
                Err(err)
            }
        }
    }

    fn select(&self, selection: Selection<'_>) -> Result<Vec<PackageMatch>, TransactionError> {
        let _installed = self.registry.installed_lock().shared();
        let mut selected = Vec::new();
        match selection {
            Selection::Available(identifiers) => {
                for identifier in identifiers {
                    push_unique(&mut selected, require(self.registry, identifier, false)?);
                }
            }
            Selection::Installed(identifiers) => {
                for identifier in identifiers {
                    let package = require(self.registry, identifier, true)?;
                    if !package.repository().is_installed() {
                        return Err(ResolutionFailure::NotInstalled {
                            package: package.package_id().to_string(),
                        }
                        .into());
                    }
                    push_unique(&mut selected, package);
                }
            }
            Selection::Updates(identifiers) => {
                for package in update_candidates(self.registry, identifiers)? {
                    push_unique(&mut selected, package);
                }
            }
        }
        Ok(selected)
    }

    fn fetch_all(&mut self, destination: Option<&Path>) -> Result<(), TransactionError> {
        let flags = self.ctx.flags();
        let entries = self.ctx.queue().entries().to_vec();
        for package in &entries {
            self.check_cancelled(package)?;
            let package_id = package.package_id().to_string();
            let record = {
                let _installed = self.registry.installed_lock().shared();
                package
                    .record()
                    .map_err(|err| TransactionError::internal(&err))?
            };

            if flags.only_trusted {
                let verdict =
                    check_record_trust(&record, package.repository().public_key().as_deref());
                if !verdict.is_trusted() {
                    warn!("refusing {package_id}: {verdict:?}");
                    return Err(TransactionError::MissingSignature {
                        package: package_id,
                    });
                }
            }

            self.emit(TransactionEvent::Package {
                info: PackageInfo::Downloading,
                package_id: package_id.clone(),
                summary: record.description.clone(),
            });

            if !flags.simulate {
                let options = ActionOptions {
                    fetch_destination: destination.map(Path::to_path_buf),
                    ..ActionOptions::default()
                };
                let outcome = self
                    .factory
                    .fetch(package, &options)
                    .map_err(|err| action_failed(ActionPhase::Fetch, &package_id, &err))?;
                if !outcome.succeeded() {
                    return Err(exit_failed(ActionPhase::Fetch, &package_id, outcome.exit_code));
                }
                if let Some(path) = outcome.local_path {
                    self.emit(TransactionEvent::Files {
                        package_id: package_id.clone(),
                        path,
                    });
                }
            }

            let value = self.ctx.progress_mut().advance();
            debug!("fetch: done {}/100", self.ctx.progress().current());
            self.report(value);
        }
        Ok(())
    }

    fn apply_all(&mut self) -> Result<(), TransactionError> {
        let flags = self.ctx.flags();
        let kind = self.ctx.queue().kind();
        let (info, phase) = match kind {
            ActionKind::Install => (PackageInfo::Installing, ActionPhase::Install),
            ActionKind::Remove => (PackageInfo::Removing, ActionPhase::Remove),
        };
        let entries = self.ctx.queue().entries().to_vec();
        let targets = self.ctx.targets().to_vec();

        for package in &entries {
            self.check_cancelled(package)?;
            let package_id = package.package_id().to_string();
            let summary = {
                let _installed = self.registry.installed_lock().shared();
                package
                    .record()
                    .map_err(|err| TransactionError::internal(&err))?
                    .description
            };
            self.emit(TransactionEvent::Package {
                info,
                package_id: package_id.clone(),
                summary,
            });

            if !flags.simulate {
                let options = ActionOptions {
                    install_source: if targets.contains(package) {
                        InstallSource::User
                    } else {
                        InstallSource::AutomaticDependency
                    },
                    ..ActionOptions::default()
                };
                let exit_code = {
                    let _installed = self.registry.installed_lock().exclusive();
                    self.factory.apply(kind, package, &options)
                }
                .map_err(|err| action_failed(phase, &package_id, &err))?;
                if exit_code != 0 {
                    return Err(exit_failed(phase, &package_id, exit_code));
                }
            }

            let value = self.ctx.progress_mut().advance();
            debug!("{phase}: done {}/100", self.ctx.progress().current());
            self.report(value);
        }
        Ok(())
    }

    fn check_cancelled(&self, next: &PackageMatch) -> Result<(), TransactionError> {
        if self.ctx.flags().allow_cancel && self.cancel.is_cancelled() {
            return Err(TransactionError::Cancelled {
                package: next.package_id().to_string(),
            });
        }
        Ok(())
    }

    fn start_progress(&mut self) {
        let value = self.ctx.progress_mut().start();
        self.report(value);
    }

    fn report(&mut self, value: Option<u8>) {
        if let Some(value) = value {
            self.emit(TransactionEvent::Percentage { value });
        }
    }

    fn status(&mut self, status: TransactionStatus) {
        self.emit(TransactionEvent::Status { status });
    }

    fn emit(&mut self, event: TransactionEvent) {
        self.observer.emit(event);
    }
}

/// Looks `identifier` up as a package id or a name. Malformed ids match
/// nothing.
pub(crate) fn lookup(
    registry: &RepositoryRegistry,
    identifier: &str,
    prefer_installed: bool,
) -> Result<Option<PackageMatch>, TransactionError> {
    if PackageId::looks_like_id(identifier) {
        if let Err(err) = PackageId::parse(identifier) {
            debug!("{err}");
            return Ok(None);
        }
    }
    registry
        .resolve_identifier(identifier, prefer_installed)
        .map_err(|err| TransactionError::internal(&err))
}

fn require(
    registry: &RepositoryRegistry,
    identifier: &str,
    prefer_installed: bool,
) -> Result<PackageMatch, TransactionError> {
    lookup(registry, identifier, prefer_installed)?.ok_or_else(|| TransactionError::NotFound {
        identifier: identifier.to_string(),
    })
}

/// Newer available versions of the named installed packages, or of every
/// installed package when `identifiers` is empty. A package id pins the
/// candidate version. The caller holds the installed-registry lock.
pub(crate) fn update_candidates(
    registry: &RepositoryRegistry,
    identifiers: &[String],
) -> Result<Vec<PackageMatch>, TransactionError> {
    let names = if identifiers.is_empty() {
        registry
            .installed()
            .package_names()
            .map_err(|err| TransactionError::internal(&err))?
    } else {
        identifiers.to_vec()
    };

    let mut candidates = Vec::new();
    for identifier in &names {
        let not_found = || TransactionError::NotFound {
            identifier: identifier.clone(),
        };
        let name = if PackageId::looks_like_id(identifier) {
            PackageId::parse(identifier).map_err(|_| not_found())?.name
        } else {
            identifier.clone()
        };
        let current = registry
            .installed_match(&name)
            .map_err(|err| TransactionError::internal(&err))?
            .ok_or_else(not_found)?;
        let candidate = if PackageId::looks_like_id(identifier) {
            Some(require(registry, identifier, false)?)
        } else {
            registry
                .latest_available(&name)
                .map_err(|err| TransactionError::internal(&err))?
        };
        match candidate {
            Some(candidate) if candidate.version() > current.version() => {
                debug!("{current} can be updated to {candidate}");
                push_unique(&mut candidates, candidate);
            }
            Some(candidate) => debug!("{current} is not older than {candidate}, skipping"),
            None => debug!("{current} is up to date"),
        }
    }
    Ok(candidates)
}

fn push_unique(selected: &mut Vec<PackageMatch>, package: PackageMatch) {
    if !selected.contains(&package) {
        selected.push(package);
    }
}

fn action_failed(phase: ActionPhase, package_id: &str, err: &anyhow::Error) -> TransactionError {
    TransactionError::ActionFailed {
        phase,
        package: package_id.to_string(),
        detail: format!("{err:#}"),
    }
}

fn exit_failed(phase: ActionPhase, package_id: &str, exit_code: i32) -> TransactionError {
    TransactionError::ActionFailed {
        phase,
        package: package_id.to_string(),
        detail: format!("exit code {exit_code}"),
    }
}

pub(crate) fn outer_lock_is_exclusive(operation: OperationKind, flags: TransactionFlags) -> bool {
    operation.is_mutating() && !flags.only_download
}
