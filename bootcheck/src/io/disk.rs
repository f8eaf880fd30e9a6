//! Raw disk image provisioning.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

const MIB: u64 = 1024 * 1024;

/// Create (or truncate) `path` as a zero-filled image of `size_mb` MiB.
///
/// The file is sparse; any previous contents are discarded.
pub fn provision_disk(path: &Path, size_mb: u64) -> Result<()> {
    let size_bytes = size_mb.checked_mul(MIB).ok_or_else(|| {
        anyhow!(
            "size disk image {}: {size_mb} MiB does not fit in 64 bits",
            path.display()
        )
    })?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create disk dir {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("create disk image {}", path.display()))?;
    file.set_len(size_bytes)
        .with_context(|| format!("size disk image {}", path.display()))?;
    debug!(path = %path.display(), size_mb, "disk image provisioned");
    Ok(())
}
