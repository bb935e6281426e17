use anyhow::Result;
use parcel_core::{ActionKind, PackageMatch};

use crate::{ActionOptions, FetchOutcome};

/// Performs the fetch or apply of exactly one package.
///
/// A non-zero exit code and an `Err` both fail the action; the error text is
/// carried into the terminal `ActionFailed` as detail. `apply` is only called
/// while the installed-registry lock is held exclusively.
pub trait PackageActionFactory: Send + Sync {
    fn fetch(&self, package: &PackageMatch, options: &ActionOptions) -> Result<FetchOutcome>;

    fn apply(&self, kind: ActionKind, package: &PackageMatch, options: &ActionOptions)
        -> Result<i32>;
}
