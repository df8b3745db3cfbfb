//! Archive safety limits.
//!
//! Defaults are sized for real vendor exports; the environment overrides
//! exist so a test rig can shrink them without rebuilding.

/// Bounds enforced by the ZIP pre-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipLimits {
    /// Maximum number of entries in one archive.
    pub max_entries: usize,
    /// Maximum declared uncompressed size of a single entry.
    pub max_single_file_bytes: u64,
    /// Maximum sum of declared uncompressed sizes.
    pub max_total_uncompressed_bytes: u64,
    /// Maximum uncompressed/compressed ratio per entry.
    pub max_ratio: u64,
}

impl Default for ZipLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_single_file_bytes: 100 * 1024 * 1024,
            max_total_uncompressed_bytes: 1024 * 1024 * 1024,
            max_ratio: 100,
        }
    }
}

impl ZipLimits {
    /// Defaults with environment overrides applied.
    ///
    /// `VAULT_ZIP_MAX_ENTRIES`, `VAULT_ZIP_MAX_SINGLE_FILE_BYTES`, and
    /// `VAULT_ZIP_MAX_TOTAL_BYTES` each replace their field when set to a
    /// parseable integer; anything else is ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut limits = Self::default();
        if let Some(value) = env_u64("VAULT_ZIP_MAX_ENTRIES") {
            limits.max_entries = value as usize;
        }
        if let Some(value) = env_u64("VAULT_ZIP_MAX_SINGLE_FILE_BYTES") {
            limits.max_single_file_bytes = value;
        }
        if let Some(value) = env_u64("VAULT_ZIP_MAX_TOTAL_BYTES") {
            limits.max_total_uncompressed_bytes = value;
        }
        limits
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}
