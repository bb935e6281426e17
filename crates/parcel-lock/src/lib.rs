mod cancellation;
mod resource;

pub use cancellation::{global_token, CancellationToken};
pub use resource::{LockHandle, LockKind, LockSnapshot, ResourceLock};

#[cfg(test)]
mod tests;
