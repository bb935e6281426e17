use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use log::debug;
use parcel_core::{ActionKind, ActionQueue, PackageMatch, PackageRecord};
use parcel_registry::RepositoryRegistry;
use semver::VersionReq;

use crate::order::topo_order;
use crate::select::select_highest_compatible;
use crate::{DependencyResolver, ResolveError};

/// Resolver over the repositories of a [`RepositoryRegistry`].
///
/// Dependencies pick the highest compatible version from the first available
/// repository, in priority order, that carries one. Dependencies the
/// installed set already satisfies are left alone.
#[derive(Debug)]
pub struct GraphResolver {
    registry: Arc<RepositoryRegistry>,
    vital: BTreeSet<String>,
}

impl GraphResolver {
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            registry,
            vital: BTreeSet::new(),
        }
    }

    pub fn with_vital<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vital.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn vital(&self) -> &BTreeSet<String> {
        &self.vital
    }

    fn installed_records(&self) -> Result<BTreeMap<String, PackageRecord>> {
        let installed = self.registry.installed();
        let mut records = BTreeMap::new();
        for name in installed.package_names()? {
            if let Some(record) = installed.package_versions(&name)?.into_iter().next() {
                records.insert(name, record);
            }
        }
        Ok(records)
    }

    fn find_candidate(
        &self,
        name: &str,
        requirement: &VersionReq,
    ) -> Result<Option<(PackageMatch, PackageRecord)>> {
        for repository in self.registry.available() {
            let versions = repository.package_versions(name)?;
            if let Some(record) = select_highest_compatible(&versions, requirement) {
                let found = PackageMatch::from_record(record, repository.clone());
                return Ok(Some((found, record.clone())));
            }
        }
        Ok(None)
    }

    /// Installed packages reachable from `seeds` through reverse dependency
    /// edges, seeds included.
    fn dependents(
        installed: &BTreeMap<String, PackageRecord>,
        seeds: &BTreeSet<String>,
        recursive: bool,
    ) -> BTreeSet<String> {
        let mut reached = seeds.clone();
        let mut frontier = seeds.clone();
        while !frontier.is_empty() {
            let next = installed
                .iter()
                .filter(|(name, _)| !reached.contains(*name))
                .filter(|(_, record)| {
                    record
                        .dependencies
                        .keys()
                        .any(|dep| frontier.contains(dep))
                })
                .map(|(name, _)| name.clone())
                .collect::<BTreeSet<_>>();
            reached.extend(next.iter().cloned());
            if !recursive {
                break;
            }
            frontier = next;
        }
        reached
    }

    /// Dependents-first queue over `names`, reusing the caller's matches
    /// for targets.
    fn removal_queue(
        &self,
        installed: &BTreeMap<String, PackageRecord>,
        names: &BTreeSet<String>,
        targets: &[PackageMatch],
    ) -> Result<ActionQueue, ResolveError> {
        let mut selected = BTreeMap::new();
        for name in names {
            if let Some(record) = installed.get(name) {
                selected.insert(name.clone(), record.clone());
            } else if let Some(target) = targets.iter().find(|target| target.name() == name) {
                selected.insert(name.clone(), target.record()?);
            }
        }

        let mut order = topo_order(&selected).map_err(ResolveError::DependenciesCollision)?;
        order.reverse();

        let installed_handle = self.registry.installed_handle();
        let entries = order
            .into_iter()
            .filter_map(|name| {
                let record = selected.get(&name)?;
                Some(
                    targets
                        .iter()
                        .find(|target| target.name() == name)
                        .cloned()
                        .unwrap_or_else(|| {
                            PackageMatch::from_record(record, installed_handle.clone())
                        }),
                )
            })
            .collect();
        Ok(ActionQueue::new(ActionKind::Remove, entries))
    }
}

impl DependencyResolver for GraphResolver {
    fn resolve_install(
        &self,
        targets: &[PackageMatch],
        recursive: bool,
    ) -> Result<ActionQueue, ResolveError> {
        let installed = self.installed_records()?;
        let mut selected: BTreeMap<String, PackageRecord> = BTreeMap::new();
        let mut matches: BTreeMap<String, PackageMatch> = BTreeMap::new();
        let mut collisions = BTreeSet::new();
        let mut missing = BTreeSet::new();
        let mut pending = VecDeque::new();

        for target in targets {
            if let Some(existing) = matches.get(target.name()) {
                if existing != target {
                    collisions.insert(target.name().to_string());
                }
                continue;
            }
            selected.insert(target.name().to_string(), target.record()?);
            matches.insert(target.name().to_string(), target.clone());
            pending.push_back((target.name().to_string(), 0_usize));
        }

        while let Some((name, depth)) = pending.pop_front() {
            if !recursive && depth > 0 {
                continue;
            }
            let Some(record) = selected.get(&name) else {
                continue;
            };
            let dependencies = record.dependencies.clone();
            for (dep, requirement) in dependencies {
                if let Some(chosen) = selected.get(&dep) {
                    if !requirement.matches(&chosen.version) {
                        collisions.insert(dep);
                    }
                    continue;
                }
                if installed
                    .get(&dep)
                    .is_some_and(|record| requirement.matches(&record.version))
                {
                    continue;
                }
                match self.find_candidate(&dep, &requirement)? {
                    Some((found, record)) => {
                        debug!("{name} pulls in {found}");
                        selected.insert(dep.clone(), record);
                        matches.insert(dep.clone(), found);
                        pending.push_back((dep, depth + 1));
                    }
                    None => {
                        missing.insert(format!("{dep} {requirement}"));
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(ResolveError::DependenciesNotFound(missing));
        }

        let chosen = selected.values().collect::<Vec<_>>();
        for (index, left) in chosen.iter().enumerate() {
            for right in chosen.iter().skip(index + 1) {
                if left.conflicts_with(right) {
                    collisions.insert(left.name.clone());
                    collisions.insert(right.name.clone());
                }
            }
            for (installed_name, installed_record) in &installed {
                if !selected.contains_key(installed_name) && left.conflicts_with(installed_record)
                {
                    collisions.insert(left.name.clone());
                    collisions.insert(installed_name.clone());
                }
            }
        }
        if !collisions.is_empty() {
            return Err(ResolveError::DependenciesCollision(
                collisions.into_iter().collect(),
            ));
        }

        let order = topo_order(&selected).map_err(ResolveError::DependenciesCollision)?;
        let entries = order
            .into_iter()
            .filter_map(|name| matches.remove(&name))
            .collect::<Vec<_>>();
        debug!(
            "install queue for {} target(s) has {} entries",
            targets.len(),
            entries.len()
        );
        Ok(ActionQueue::new(ActionKind::Install, entries))
    }

    fn resolve_removal(&self, targets: &[PackageMatch]) -> Result<ActionQueue, ResolveError> {
        let installed = self.installed_records()?;
        let seeds = targets
            .iter()
            .map(|target| target.name().to_string())
            .collect::<BTreeSet<_>>();
        let names = Self::dependents(&installed, &seeds, true);

        let vital = names
            .intersection(&self.vital)
            .cloned()
            .collect::<BTreeSet<_>>();
        if !vital.is_empty() {
            return Err(ResolveError::DependenciesNotRemovable(vital));
        }

        let queue = self.removal_queue(&installed, &names, targets)?;
        debug!(
            "removal queue for {} target(s) has {} entries",
            targets.len(),
            queue.len()
        );
        Ok(queue)
    }

    fn resolve_reverse(
        &self,
        targets: &[PackageMatch],
        recursive: bool,
    ) -> Result<ActionQueue, ResolveError> {
        let installed = self.installed_records()?;
        let seeds = targets
            .iter()
            .map(|target| target.name().to_string())
            .collect::<BTreeSet<_>>();
        let mut names = Self::dependents(&installed, &seeds, recursive);
        names.retain(|name| !seeds.contains(name));
        self.removal_queue(&installed, &names, &[])
    }
}
