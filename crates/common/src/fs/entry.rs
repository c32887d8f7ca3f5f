use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ONE_KB: u64 = 1024;
const ONE_MB: u64 = ONE_KB * 1024;
const ONE_GB: u64 = ONE_MB * 1024;

/// Descriptor of one filesystem entry as seen by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub modified: DateTime<Utc>,
    pub editable: bool,
    /// Logical directory holding the entry. Only set on search results.
    pub parent: Option<String>,
}

impl DirEntry {
    pub fn human_size(&self) -> String {
        human_size(self.size)
    }
}

/// Disk usage of the filesystem holding a node root, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

impl DiskUsage {
    /// `percent` is computed against the space usable by unprivileged
    /// callers (`used + free`), rounded to one decimal.
    pub fn new(total: u64, used: u64, free: u64) -> Self {
        let usable = used + free;
        let percent = if usable == 0 {
            0.0
        } else {
            (used as f64 / usable as f64 * 1000.0).round() / 10.0
        };
        Self {
            total,
            used,
            free,
            percent,
        }
    }
}

pub fn human_size(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes >= ONE_GB {
        format!("{:.2} GB", b / ONE_GB as f64)
    } else if bytes >= ONE_MB {
        format!("{:.2} MB", b / ONE_MB as f64)
    } else if bytes >= ONE_KB {
        format!("{:.2} KB", b / ONE_KB as f64)
    } else {
        format!("{:.2} B", b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0.00 B");
        assert_eq!(human_size(1023), "1023.00 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(5 * ONE_MB), "5.00 MB");
        assert_eq!(human_size(3 * ONE_GB / 2), "1.50 GB");
    }

    #[test]
    fn test_disk_usage_percent() {
        let usage = DiskUsage::new(1000, 250, 750);
        assert_eq!(usage.percent, 25.0);

        let empty = DiskUsage::new(0, 0, 0);
        assert_eq!(empty.percent, 0.0);
    }
}
