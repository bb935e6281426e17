use anyhow::Result;
use parcel_core::INSTALLED_REPOSITORY_ID;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    /// Source directory the repository snapshot is refreshed from.
    pub location: String,
    #[serde(default = "repository_enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: u32,
    pub public_key: Option<String>,
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<()> {
        validate_repository_name(&self.name)?;
        if let Some(key) = &self.public_key {
            if key.len() != 64 || !key.chars().all(|ch| ch.is_ascii_hexdigit()) {
                anyhow::bail!(
                    "invalid public key for repository '{}': expected 64 hex characters",
                    self.name
                );
            }
        }
        Ok(())
    }
}

pub(crate) fn sort_repositories(configs: &mut [RepositoryConfig]) {
    configs.sort_by(|left, right| {
        left.priority
            .cmp(&right.priority)
            .then_with(|| left.name.cmp(&right.name))
    });
}

fn validate_repository_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        anyhow::bail!("invalid repository name: must be 1-64 characters");
    }
    if name == INSTALLED_REPOSITORY_ID {
        anyhow::bail!("invalid repository name: '{name}' is reserved");
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        anyhow::bail!("invalid repository name: '{name}'");
    };
    let first_is_valid = first.is_ascii_lowercase() || first.is_ascii_digit();
    let rest_is_valid =
        chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !first_is_valid || !rest_is_valid {
        anyhow::bail!("invalid repository name: '{name}'");
    }

    Ok(())
}

fn repository_enabled_default() -> bool {
    true
}
