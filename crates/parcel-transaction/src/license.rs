use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use log::{debug, info};
use parcel_core::{ActionQueue, PackageMatch, TransactionEvent};
use parcel_registry::RepositoryRegistry;

/// License id to the queued packages that require it.
///
/// A license requires acceptance when the package's repository publishes a
/// text for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseObligation {
    required: BTreeMap<String, Vec<PackageMatch>>,
}

impl LicenseObligation {
    pub fn from_queue(queue: &ActionQueue) -> Result<Self> {
        let mut obligation = Self::default();
        for entry in queue {
            let record = entry.record()?;
            for license in record.licenses() {
                if entry.repository().license_text(license)?.is_some() {
                    obligation.insert(license, entry.clone());
                }
            }
        }
        Ok(obligation)
    }

    pub fn insert(&mut self, license: &str, package: PackageMatch) {
        let packages = self.required.entry(license.to_string()).or_default();
        if !packages.contains(&package) {
            packages.push(package);
        }
    }

    /// Drops obligations for `accepted` licenses and returns the ones dropped.
    pub fn accept(&mut self, accepted: &BTreeSet<String>) -> Vec<String> {
        let dropped = self
            .required
            .keys()
            .filter(|license| accepted.contains(*license))
            .cloned()
            .collect::<Vec<_>>();
        for license in &dropped {
            self.required.remove(license);
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn len(&self) -> usize {
        self.required.len()
    }

    pub fn licenses(&self) -> Vec<String> {
        self.required.keys().cloned().collect()
    }

    pub fn packages(&self, license: &str) -> &[PackageMatch] {
        self.required
            .get(license)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PackageMatch])> {
        self.required
            .iter()
            .map(|(license, packages)| (license.as_str(), packages.as_slice()))
    }
}

/// Obligations of `queue` left after stored and caller-supplied acceptance.
/// Caller-supplied licenses that cleared an obligation are persisted unless
/// `persist` is false.
pub(crate) fn pending_obligations(
    registry: &RepositoryRegistry,
    queue: &ActionQueue,
    pre_accepted: &BTreeSet<String>,
    persist: bool,
) -> Result<LicenseObligation> {
    let (obligation, newly_accepted) = {
        let _installed = registry.installed_lock().shared();
        let mut obligation = LicenseObligation::from_queue(queue)?;
        let stored = obligation.accept(&registry.installed().accepted_licenses()?);
        if !stored.is_empty() {
            debug!("licenses accepted earlier: {}", stored.join(" "));
        }
        let newly_accepted = obligation.accept(pre_accepted);
        (obligation, newly_accepted)
    };

    if persist && !newly_accepted.is_empty() {
        let _installed = registry.installed_lock().exclusive();
        for license in &newly_accepted {
            registry.installed().accept_license(license)?;
            info!("accepted license {license}");
        }
    }

    Ok(obligation)
}

/// One event per license, naming its first requiring package.
pub(crate) fn license_events(obligation: &LicenseObligation) -> Result<Vec<TransactionEvent>> {
    let mut events = Vec::with_capacity(obligation.len());
    for (license, packages) in obligation.iter() {
        let Some(package) = packages.first() else {
            continue;
        };
        let record = package.record()?;
        events.push(TransactionEvent::LicenseRequired {
            license: license.to_string(),
            package_id: package.package_id().to_string(),
            vendor: record.homepage.unwrap_or_default(),
            text: package
                .repository()
                .license_text(license)?
                .unwrap_or_default(),
        });
    }
    Ok(events)
}
