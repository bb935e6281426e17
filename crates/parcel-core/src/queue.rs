use serde::Serialize;

use crate::PackageMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Install,
    Remove,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
        }
    }
}

/// Dependency-ordered actions produced by the resolver. Install queues list
/// dependencies before dependents; removal queues list dependents first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionQueue {
    kind: ActionKind,
    entries: Vec<PackageMatch>,
}

impl ActionQueue {
    pub fn new(kind: ActionKind, entries: Vec<PackageMatch>) -> Self {
        Self { kind, entries }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn entries(&self) -> &[PackageMatch] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageMatch> {
        self.entries.iter()
    }

    /// Entries the resolver added on top of the requested targets.
    pub fn added_entries<'a>(&'a self, targets: &'a [PackageMatch]) -> Vec<&'a PackageMatch> {
        self.entries
            .iter()
            .filter(|entry| !targets.contains(entry))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ActionQueue {
    type Item = &'a PackageMatch;
    type IntoIter = std::slice::Iter<'a, PackageMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
