use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parcel_security::sha256_hex;

/// Relative paths of every regular file below `root`, sorted.
fn relative_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative_dir) = pending.pop() {
        let dir = root.join(&relative_dir);
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let relative = relative_dir.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(relative);
            } else if file_type.is_file() {
                files.push(relative);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Replaces `staging_root` with a copy of the regular files under
/// `source_root`.
pub(crate) fn copy_dir_recursive(source_root: &Path, staging_root: &Path) -> Result<()> {
    if !source_root.is_dir() {
        anyhow::bail!(
            "repository location is not a directory: {}",
            source_root.display()
        );
    }
    if staging_root.exists() {
        fs::remove_dir_all(staging_root)
            .with_context(|| format!("failed to clear {}", staging_root.display()))?;
    }
    fs::create_dir_all(staging_root)
        .with_context(|| format!("failed to create {}", staging_root.display()))?;

    for relative in relative_files(source_root)? {
        let from = source_root.join(&relative);
        let to = staging_root.join(&relative);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::copy(&from, &to)
            .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
    }
    Ok(())
}

/// Content digest of the files under `root`; top-level names in `skip`
/// are left out.
pub(crate) fn compute_snapshot_id(root: &Path, skip: &[&str]) -> Result<String> {
    let mut digest_input = Vec::new();
    for relative in relative_files(root)? {
        if skip.iter().any(|name| relative == Path::new(name)) {
            continue;
        }
        let path = root.join(&relative);
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let portable = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        digest_input.extend_from_slice(portable.as_bytes());
        digest_input.push(0);
        digest_input.extend_from_slice(sha256_hex(&bytes).as_bytes());
        digest_input.push(0);
    }
    Ok(format!("fs:{}", sha256_hex(&digest_input)))
}

/// Returns `value` if it can be used as a single file name inside a
/// repository or the installed registry.
pub(crate) fn checked_file_stem<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let escapes = value.contains("..")
        || value.contains(['/', '\\', '\0'])
        || value.trim().is_empty();
    if escapes {
        anyhow::bail!("invalid {what} '{value}': not usable as a file name");
    }
    Ok(value)
}

fn since_epoch() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

pub(crate) fn current_unix_timestamp() -> u64 {
    since_epoch().as_secs()
}

pub(crate) fn unique_suffix() -> u128 {
    since_epoch().as_nanos()
}
