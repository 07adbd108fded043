//! Size-based validators: a per-file cap and a directory quota.

use super::Validator;
use crate::error::{TransferError, UploadError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rejects uploads larger than `max_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxFileSize(pub u64);

impl Validator for MaxFileSize {
    fn validate(&self, file: &mut FileHandle, _: &mut Metadata) -> Result<bool, TransferError> {
        let len = file.len()?;
        if len > self.0 {
            return Err(UploadError::Message(format!(
                "{} exceeds the maximum upload size of {} bytes",
                file.name(),
                self.0
            ))
            .into());
        }
        Ok(true)
    }
}

impl fmt::Display for MaxFileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaxFileSize({})", self.0)
    }
}

/// Rejects uploads that would push the total size of the regular files
/// directly inside `dir` past `max_bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskQuota {
    dir: PathBuf,
    max_bytes: u64,
}

impl DiskQuota {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Bytes currently used in the quota directory. A missing directory uses none.
    pub fn current_usage(&self) -> io::Result<u64> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut total = 0u64;
        for entry in entries {
            let meta = entry?.metadata()?;
            if meta.is_file() {
                total = total.saturating_add(meta.len());
            }
        }
        Ok(total)
    }
}

impl Validator for DiskQuota {
    fn validate(&self, file: &mut FileHandle, _: &mut Metadata) -> Result<bool, TransferError> {
        let usage = self.current_usage()?;
        let incoming = file.len()?;
        debug!(
            "Quota check for '{}': {} used + {} incoming / {} allowed",
            file.name(),
            usage,
            incoming,
            self.max_bytes
        );
        if usage.saturating_add(incoming) > self.max_bytes {
            return Err(UploadError::new("Upload exceeds allotment.").into());
        }
        Ok(true)
    }
}

impl fmt::Display for DiskQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiskQuota({}, {})", self.dir.display(), self.max_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_file_size_boundary() {
        let mut meta = Metadata::new();
        let mut fh = FileHandle::from_bytes("a.bin", vec![0u8; 10]);
        assert!(MaxFileSize(10).validate(&mut fh, &mut meta).unwrap());
        let err = MaxFileSize(9).validate(&mut fh, &mut meta).unwrap_err();
        assert!(err.to_string().contains("a.bin exceeds"));
    }

    #[test]
    fn quota_counts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.txt"), vec![0u8; 15]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let quota = DiskQuota::new(dir.path(), 20);
        assert_eq!(quota.current_usage().unwrap(), 15);

        let mut meta = Metadata::new();
        let mut small = FileHandle::from_bytes("s.txt", vec![0u8; 5]);
        assert!(quota.validate(&mut small, &mut meta).unwrap());

        let mut big = FileHandle::from_bytes("b.txt", vec![0u8; 6]);
        let err = quota.validate(&mut big, &mut meta).unwrap_err();
        assert_eq!(err.to_string(), "Upload exceeds allotment.");
    }

    #[test]
    fn quota_on_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let quota = DiskQuota::new(dir.path().join("nope"), 4);
        assert_eq!(quota.current_usage().unwrap(), 0);
    }
}
