//! Disk usage via `statvfs`.

/// Disk usage for one mounted filesystem, in bytes.
#[derive(Debug, Clone)]
pub struct DiskInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
}

/// Read disk usage for the filesystem containing `path`.
///
/// Returns `None` when the syscall fails or on non-Unix targets.
pub fn disk_stats(path: &str) -> Option<DiskInfo> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::mem::MaybeUninit;

        let c_path = CString::new(path).ok()?;
        let mut stat = MaybeUninit::<libc::statvfs>::uninit();

        // Safety: libc::statvfs is well-defined for valid paths.
        let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
        if ret != 0 {
            tracing::warn!(path, "statvfs failed, skipping disk headroom check");
            return None;
        }

        let stat = unsafe { stat.assume_init() };
        let block_size = stat.f_frsize as u64;
        let total = stat.f_blocks as u64 * block_size;
        let free = stat.f_bavail as u64 * block_size;

        return Some(DiskInfo {
            total_bytes: total,
            free_bytes: free,
            used_bytes: total.saturating_sub(free),
        });
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}
