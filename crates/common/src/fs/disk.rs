use std::path::Path;

use super::entry::DiskUsage;
use super::error::FsError;

/// Usage of the filesystem that holds `root`.
#[cfg(unix)]
pub fn disk_usage(root: &Path) -> Result<DiskUsage, FsError> {
    use nix::sys::statvfs::statvfs;

    let v = statvfs(root).map_err(|errno| {
        FsError::from_io(root.display().to_string(), std::io::Error::from(errno))
    })?;
    let fragment = v.fragment_size() as u64;
    let total = v.blocks() as u64 * fragment;
    let free = v.blocks_available() as u64 * fragment;
    let used = total.saturating_sub(v.blocks_free() as u64 * fragment);
    Ok(DiskUsage::new(total, used, free))
}

#[cfg(not(unix))]
pub fn disk_usage(root: &Path) -> Result<DiskUsage, FsError> {
    Err(FsError::Io {
        path: root.display().to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "disk usage is only available on unix",
        ),
    })
}
