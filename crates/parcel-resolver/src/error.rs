use std::collections::BTreeSet;

use parcel_core::{ResolutionFailure, TransactionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot find the following dependencies: {}", join(.0))]
    DependenciesNotFound(BTreeSet<String>),

    #[error("dependencies collisions, cannot continue: {}", .0.join(", "))]
    DependenciesCollision(Vec<String>),

    #[error("these packages are vital: {}", join(.0))]
    DependenciesNotRemovable(BTreeSet<String>),

    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl From<ResolveError> for TransactionError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::DependenciesNotFound(missing) => {
                ResolutionFailure::DependenciesNotFound {
                    missing: missing.into_iter().collect(),
                }
                .into()
            }
            ResolveError::DependenciesCollision(packages) => {
                ResolutionFailure::DependenciesCollision { packages }.into()
            }
            ResolveError::DependenciesNotRemovable(vital) => TransactionError::NotRemovable {
                vital: vital.into_iter().collect(),
            },
            ResolveError::Repository(err) => TransactionError::internal(&err),
        }
    }
}
