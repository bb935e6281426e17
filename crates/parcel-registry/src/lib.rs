mod config;
mod fs_ops;
mod fs_repository;
mod installed;
mod memory;
mod registry;

pub use config::RepositoryConfig;
pub use fs_repository::FsRepository;
pub use installed::FsInstalledRepository;
pub use memory::{MemoryInstalledRepository, MemoryRepository};
pub use registry::RepositoryRegistry;

#[cfg(test)]
mod tests;
