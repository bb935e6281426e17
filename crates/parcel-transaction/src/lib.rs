mod backend;
mod context;
mod executor;
mod factory;
mod license;
mod local;
mod options;

pub use backend::PackageBackend;
pub use context::{TransactionContext, TransactionState};
pub use factory::PackageActionFactory;
pub use license::LicenseObligation;
pub use local::LocalActionFactory;
pub use options::{ActionOptions, FetchOutcome};
