//! Container resource telemetry and headroom checks.
//!
//! A job is rejected before any upstream call when the container is short
//! on memory or disk. Gathering is best-effort: unreadable telemetry
//! sources yield `None` and the corresponding check is skipped -- a worker
//! with broken cgroup mounts should still take jobs.

mod disk;
mod memory;

pub use disk::{disk_stats, DiskInfo};
pub use memory::{read_memory_info, MemoryInfo};

/// Minimum headroom required before a job is accepted.
#[derive(Debug, Clone, Copy)]
pub struct ResourceFloors {
    pub min_available_memory_bytes: u64,
    pub min_free_disk_bytes: u64,
}

/// Point-in-time view of container memory and disk.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub memory: MemoryInfo,
    pub disk: Option<DiskInfo>,
}

/// The container is below a configured resource floor.
#[derive(Debug, thiserror::Error)]
#[error(
    "Insufficient {resource}: {} MiB available (minimum {} MiB required)",
    .available_bytes / (1024 * 1024),
    .required_bytes / (1024 * 1024)
)]
pub struct ResourceExhausted {
    pub resource: &'static str,
    pub available_bytes: u64,
    pub required_bytes: u64,
}

/// Gather a resource snapshot for the current container.
///
/// `disk_path` selects the mount whose free space is measured.
pub fn snapshot(disk_path: &str) -> ResourceSnapshot {
    let memory = read_memory_info();
    let disk = disk_stats(disk_path);

    tracing::debug!(
        memory_available_bytes = memory.effective_available(),
        memory_limit_bytes = memory.limit_bytes,
        disk_free_bytes = disk.as_ref().map(|d| d.free_bytes),
        "Container resource snapshot",
    );

    ResourceSnapshot { memory, disk }
}

/// Evaluate a snapshot against the configured floors.
///
/// Pure logic -- no I/O. Missing telemetry skips the corresponding check.
pub fn check_headroom(
    snapshot: &ResourceSnapshot,
    floors: &ResourceFloors,
) -> Result<(), ResourceExhausted> {
    if let Some(available) = snapshot.memory.effective_available() {
        if available < floors.min_available_memory_bytes {
            return Err(ResourceExhausted {
                resource: "available container memory",
                available_bytes: available,
                required_bytes: floors.min_available_memory_bytes,
            });
        }
    }

    if let Some(disk) = &snapshot.disk {
        if disk.free_bytes < floors.min_free_disk_bytes {
            return Err(ResourceExhausted {
                resource: "free container disk space",
                available_bytes: disk.free_bytes,
                required_bytes: floors.min_free_disk_bytes,
            });
        }
    }

    Ok(())
}
