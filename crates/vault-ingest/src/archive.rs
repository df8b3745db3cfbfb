//! ZIP safety protocol.
//!
//! The pre-scan runs before any entry is extracted and rejects the whole
//! archive on the first violation: entry count, declared sizes from the
//! central directory, per-entry compression ratio, running uncompressed
//! total, and path traversal in raw entry names. The traversal check works
//! on the raw header name — normalizing first would resolve the `..`
//! components and defeat the check.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use vault_core::{Result, VaultError};

use crate::limits::ZipLimits;

/// Whether the bytes look like a ZIP archive (local-file or empty-archive
/// magic).
#[must_use]
pub fn looks_like_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06")
}

/// Validate an archive against the limits without extracting anything.
///
/// Atomic: a failure anywhere means no entry is extracted at all. Size and
/// ratio checks use the declared central-directory metadata only — the
/// point is to reject before decompression spends the resources.
pub fn pre_scan(bytes: &[u8], limits: &ZipLimits) -> Result<()> {
    let mut archive = open(bytes)?;

    if archive.len() > limits.max_entries {
        return Err(VaultError::ZipTooManyEntries {
            count: archive.len(),
            limit: limits.max_entries,
        });
    }

    let mut total: u64 = 0;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| VaultError::ZipCorrupt {
                message: format!("entry {index} unreadable: {e}"),
            })?;

        let raw_name = String::from_utf8_lossy(entry.name_raw()).into_owned();
        check_entry_name(&raw_name)?;

        if entry.is_dir() {
            continue;
        }

        let declared = entry.size();
        let compressed = entry.compressed_size();

        if declared > limits.max_single_file_bytes {
            return Err(VaultError::ZipEntryTooLarge {
                name: raw_name,
                declared,
                limit: limits.max_single_file_bytes,
            });
        }

        // A zero compressed size with declared payload is its own bomb class.
        let bomb = if compressed == 0 {
            declared > 0
        } else {
            declared / compressed > limits.max_ratio
        };
        if bomb {
            return Err(VaultError::ZipCorrupt {
                message: format!(
                    "entry '{raw_name}' declares {declared} bytes from {compressed} compressed \
                     (ratio limit {})",
                    limits.max_ratio
                ),
            });
        }

        total = total.saturating_add(declared);
        if total > limits.max_total_uncompressed_bytes {
            return Err(VaultError::ZipTotalTooLarge {
                limit: limits.max_total_uncompressed_bytes,
            });
        }
    }

    debug!(
        entries = archive.len(),
        declared_total = total,
        "archive pre-scan passed"
    );
    Ok(())
}

/// Open an archive over in-memory bytes.
pub fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| VaultError::ZipCorrupt {
        message: format!("unparseable archive: {e}"),
    })
}

/// Decompress one entry, bounded by the single-file limit.
///
/// The pre-scan validated the declared size; this bound catches archives
/// whose actual stream is larger than the header claims.
pub fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    index: usize,
    limits: &ZipLimits,
) -> Result<Vec<u8>> {
    let entry = archive.by_index(index).map_err(|e| VaultError::ZipCorrupt {
        message: format!("entry {index} unreadable: {e}"),
    })?;
    let name = entry.name().to_string();

    let mut bytes = Vec::new();
    let limit = limits.max_single_file_bytes;
    let read = entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| VaultError::ZipCorrupt {
            message: format!("entry '{name}' failed to decompress: {e}"),
        })?;
    if read as u64 > limit {
        return Err(VaultError::ZipEntryTooLarge {
            name,
            declared: read as u64,
            limit,
        });
    }
    Ok(bytes)
}

/// Reject raw entry names that could escape the extraction root.
///
/// Operates on the raw header name: split on both separators and look for
/// literal `..` components or an absolute prefix.
fn check_entry_name(raw_name: &str) -> Result<()> {
    let absolute = raw_name.starts_with('/')
        || raw_name.starts_with('\\')
        || is_windows_drive(raw_name);
    let dotdot = raw_name.split(['/', '\\']).any(|component| component == "..");

    if absolute || dotdot {
        return Err(VaultError::ZipSlipDetected {
            name: raw_name.to_string(),
        });
    }
    Ok(())
}

fn is_windows_drive(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vault_core::ErrorCode;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = ZipWriter::new(Cursor::new(&mut buf));
        for (name, bytes) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        buf
    }

    #[test]
    fn zip_magic_detection() {
        let archive = build_zip(&[("a.txt", b"hello")]);
        assert!(looks_like_zip(&archive));
        assert!(!looks_like_zip(b"[{\"id\": 1}]"));
        assert!(!looks_like_zip(b""));
    }

    #[test]
    fn benign_archive_passes() {
        let archive = build_zip(&[
            ("conversations.json", b"[]"),
            ("media/readme.txt", b"hello"),
        ]);
        pre_scan(&archive, &ZipLimits::default()).unwrap();
    }

    #[test]
    fn too_many_entries_rejected() {
        let archive = build_zip(&[("a.txt", b"1"), ("b.txt", b"2"), ("c.txt", b"3")]);
        let limits = ZipLimits {
            max_entries: 2,
            ..ZipLimits::default()
        };
        let err = pre_scan(&archive, &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipTooManyEntries);
    }

    #[test]
    fn oversized_entry_rejected() {
        let archive = build_zip(&[("big.json", &[b'x'; 4096])]);
        let limits = ZipLimits {
            max_single_file_bytes: 1024,
            // Keep the ratio check out of the way: 4 KiB of one repeated
            // byte deflates far past 100:1.
            max_ratio: u64::MAX,
            ..ZipLimits::default()
        };
        let err = pre_scan(&archive, &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipEntryTooLarge);
    }

    #[test]
    fn declared_total_rejected() {
        let archive = build_zip(&[
            ("a.json", &[b'a'; 800]),
            ("b.json", &[b'b'; 800]),
        ]);
        let limits = ZipLimits {
            max_total_uncompressed_bytes: 1000,
            max_ratio: u64::MAX,
            ..ZipLimits::default()
        };
        let err = pre_scan(&archive, &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipTotalTooLarge);
    }

    #[test]
    fn ratio_bomb_rejected() {
        // 1 MiB of zeros deflates to a few KiB — a genuine ratio bomb at
        // the default 100:1 limit.
        let payload = vec![0u8; 1024 * 1024];
        let archive = build_zip(&[("bomb.json", &payload)]);
        let err = pre_scan(&archive, &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipCorrupt);
        assert!(err.to_string().contains("ratio"));
    }

    #[test]
    fn traversal_entry_rejected() {
        let archive = build_zip(&[("../outside.txt", b"escape")]);
        let err = pre_scan(&archive, &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipSlipDetected);
    }

    #[test]
    fn nested_traversal_rejected() {
        let archive = build_zip(&[("data/../../outside.txt", b"escape")]);
        let err = pre_scan(&archive, &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipSlipDetected);
    }

    #[test]
    fn backslash_traversal_rejected() {
        let archive = build_zip(&[(r"data\..\outside.txt", b"escape")]);
        let err = pre_scan(&archive, &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipSlipDetected);
    }

    #[test]
    fn absolute_entry_rejected() {
        let archive = build_zip(&[("/etc/crontab", b"escape")]);
        let err = pre_scan(&archive, &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipSlipDetected);
    }

    #[test]
    fn windows_drive_entry_rejected() {
        let archive = build_zip(&[(r"C:\evil.txt", b"escape")]);
        let err = pre_scan(&archive, &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipSlipDetected);
    }

    #[test]
    fn dotted_filenames_are_not_traversal() {
        let archive = build_zip(&[("notes..txt", b"fine"), ("a/..b/c.txt", b"fine")]);
        pre_scan(&archive, &ZipLimits::default()).unwrap();
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        let err = pre_scan(b"PK\x03\x04 not really a zip", &ZipLimits::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipCorrupt);
    }

    #[test]
    fn read_entry_round_trips() {
        let archive_bytes = build_zip(&[("conversations.json", b"[1, 2, 3]")]);
        let mut archive = open(&archive_bytes).unwrap();
        let bytes = read_entry(&mut archive, 0, &ZipLimits::default()).unwrap();
        assert_eq!(bytes, b"[1, 2, 3]");
    }

    #[test]
    fn read_entry_enforces_byte_bound() {
        let archive_bytes = build_zip(&[("big.bin", &[b'x'; 2000])]);
        let mut archive = open(&archive_bytes).unwrap();
        let limits = ZipLimits {
            max_single_file_bytes: 1000,
            ..ZipLimits::default()
        };
        let err = read_entry(&mut archive, 0, &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZipEntryTooLarge);
    }
}
