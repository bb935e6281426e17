mod error;
mod graph;
mod order;
mod select;

pub use error::ResolveError;
pub use graph::GraphResolver;
pub use select::select_highest_compatible;

use parcel_core::{ActionQueue, PackageMatch};

/// Turns target matches into a dependency-ordered [`ActionQueue`].
///
/// Callers hold the installed-registry lock at least shared while a resolver
/// runs; resolvers never lock on their own.
pub trait DependencyResolver: Send + Sync {
    /// Install queue for `targets`, dependencies first. Without `recursive`
    /// only the direct dependencies of the targets are expanded.
    fn resolve_install(
        &self,
        targets: &[PackageMatch],
        recursive: bool,
    ) -> Result<ActionQueue, ResolveError>;

    /// Removal queue for installed `targets`, dependents first.
    fn resolve_removal(&self, targets: &[PackageMatch]) -> Result<ActionQueue, ResolveError>;

    /// Installed packages depending on `targets`, targets excluded.
    fn resolve_reverse(
        &self,
        targets: &[PackageMatch],
        recursive: bool,
    ) -> Result<ActionQueue, ResolveError>;
}

#[cfg(test)]
mod tests;
