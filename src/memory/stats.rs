//! Best-effort process memory statistics.
//!
//! On Linux the figures come from procfs. Elsewhere, or when procfs cannot
//! be read, every helper reports zero.

use super::TrackingAllocator;

/// Resident set size of the current process, in bytes.
#[cfg(target_os = "linux")]
pub fn resident_set_size() -> usize {
    let Ok(stat) = std::fs::read_to_string("/proc/self/stat") else {
        return 0;
    };

    // The command name may contain spaces; fields are counted after it.
    // `rss` is field 24, the 22nd after the closing parenthesis.
    let Some((_, rest)) = stat.rsplit_once(')') else {
        return 0;
    };
    let Some(pages) = rest
        .split_whitespace()
        .nth(21)
        .and_then(|field| field.parse::<usize>().ok())
    else {
        return 0;
    };

    pages * page_size()
}

#[cfg(not(target_os = "linux"))]
pub fn resident_set_size() -> usize {
    0
}

/// Bytes of private dirty memory across every mapping of the process.
#[cfg(target_os = "linux")]
pub fn private_dirty() -> usize {
    let Ok(smaps) = std::fs::read_to_string("/proc/self/smaps") else {
        return 0;
    };

    smaps
        .lines()
        .filter_map(|line| line.strip_prefix("Private_Dirty:"))
        .filter_map(|rest| rest.trim().trim_end_matches("kB").trim().parse::<usize>().ok())
        .map(|kb| kb * 1024)
        .sum()
}

#[cfg(not(target_os = "linux"))]
pub fn private_dirty() -> usize {
    0
}

#[cfg(target_os = "linux")]
fn page_size() -> usize {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page > 0 { page as usize } else { 4096 }
}

impl TrackingAllocator {
    /// Resident set size divided by the bytes this allocator accounts.
    ///
    /// Returns `0.0` when nothing is accounted or the resident set size is
    /// unknown.
    pub fn fragmentation_ratio(&self) -> f32 {
        let used = self.used_memory();
        if used == 0 {
            return 0.0;
        }

        resident_set_size() as f32 / used as f32
    }
}
