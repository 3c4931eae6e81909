//! Container memory statistics from `/proc/meminfo` and cgroup files.
//!
//! Reads host figures first, then overlays the cgroup limit and usage so a
//! memory-limited container does not report the host's free memory as its
//! own. Tries cgroup v2 paths, then the v1 layout.

use std::path::Path;

/// Memory statistics in bytes. Any source that could not be read is `None`.
#[derive(Debug, Clone, Default)]
pub struct MemoryInfo {
    pub total_bytes: Option<u64>,
    pub available_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
    /// Cgroup memory limit, when one is imposed.
    pub limit_bytes: Option<u64>,
}

impl MemoryInfo {
    /// Memory actually available to this container.
    ///
    /// The host's `MemAvailable` figure, further capped by the cgroup
    /// limit minus current usage when both are known.
    pub fn effective_available(&self) -> Option<u64> {
        let cgroup_available = match (self.limit_bytes, self.used_bytes) {
            (Some(limit), Some(used)) => Some(limit.saturating_sub(used)),
            _ => None,
        };

        match (self.available_bytes, cgroup_available) {
            (Some(host), Some(cgroup)) => Some(host.min(cgroup)),
            (Some(host), None) => Some(host),
            (None, cgroup) => cgroup,
        }
    }
}

/// Read memory statistics for the current container.
pub fn read_memory_info() -> MemoryInfo {
    read_memory_info_from(Path::new("/proc/meminfo"), Path::new("/sys/fs/cgroup"))
}

/// Path-parameterized variant of [`read_memory_info`], used by tests.
pub(crate) fn read_memory_info_from(meminfo_path: &Path, cgroup_root: &Path) -> MemoryInfo {
    let mut info = match std::fs::read_to_string(meminfo_path) {
        Ok(contents) => parse_meminfo(&contents),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read host memory info");
            MemoryInfo::default()
        }
    };

    // Cgroup v2 layout: memory.max + memory.current at the root.
    let v2_max = cgroup_root.join("memory.max");
    if v2_max.exists() {
        if let Ok(raw) = std::fs::read_to_string(&v2_max) {
            let raw = raw.trim();
            if raw != "max" {
                info.limit_bytes = raw.parse().ok();
            }
        }
        if let Ok(raw) = std::fs::read_to_string(cgroup_root.join("memory.current")) {
            if let Ok(current) = raw.trim().parse() {
                info.used_bytes = Some(current);
            }
        }
        return info;
    }

    // Cgroup v1 layout: memory/memory.limit_in_bytes + memory.usage_in_bytes.
    // A limit of ~2^63 means "unlimited".
    let v1_dir = cgroup_root.join("memory");
    if let Ok(raw) = std::fs::read_to_string(v1_dir.join("memory.limit_in_bytes")) {
        if let Ok(limit) = raw.trim().parse::<u64>() {
            if limit < (1 << 62) {
                info.limit_bytes = Some(limit);
            }
        }
    }
    if let Ok(raw) = std::fs::read_to_string(v1_dir.join("memory.usage_in_bytes")) {
        if let Ok(usage) = raw.trim().parse() {
            info.used_bytes = Some(usage);
        }
    }

    info
}

/// Parse `/proc/meminfo` contents. Values there are kibibytes.
fn parse_meminfo(contents: &str) -> MemoryInfo {
    let mut info = MemoryInfo::default();
    let mut free_bytes = None;

    for line in contents.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        let bytes = kb * 1024;

        match key {
            "MemTotal" => info.total_bytes = Some(bytes),
            "MemAvailable" => info.available_bytes = Some(bytes),
            "MemFree" => free_bytes = Some(bytes),
            _ => {}
        }
    }

    if let (Some(total), Some(free)) = (info.total_bytes, free_bytes) {
        info.used_bytes = Some(total.saturating_sub(free));
    }

    info
}
