//! Filename extension allow/deny lists.
//!
//! Extensions are stored lowercased and without a leading dot, and compared
//! against the lowercased text after the last `.` of the handle name. A name
//! with no extension is compared as the empty string.

use super::Validator;
use crate::error::{TransferError, UploadError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use std::collections::BTreeSet;
use std::fmt;

fn normalise<I, S>(exts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
        .collect()
}

fn joined(exts: &BTreeSet<String>) -> String {
    exts.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Passes only files whose extension is in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedExts {
    exts: BTreeSet<String>,
}

impl AllowedExts {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { exts: normalise(exts) }
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.exts
    }

    /// The mirror validator over the same set.
    pub fn invert(&self) -> DeniedExts {
        DeniedExts {
            exts: self.exts.clone(),
        }
    }
}

impl Validator for AllowedExts {
    fn validate(&self, file: &mut FileHandle, _: &mut Metadata) -> Result<bool, TransferError> {
        let ext = file.extension().unwrap_or_default();
        if !self.exts.contains(&ext) {
            return Err(UploadError::Message(format!(
                "{} has an invalid extension. Extensions allowed: {}",
                file.name(),
                joined(&self.exts)
            ))
            .into());
        }
        Ok(true)
    }
}

impl fmt::Display for AllowedExts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllowedExts({})", joined(&self.exts))
    }
}

/// Rejects files whose extension is in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedExts {
    exts: BTreeSet<String>,
}

impl DeniedExts {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { exts: normalise(exts) }
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.exts
    }

    /// The mirror validator over the same set.
    pub fn invert(&self) -> AllowedExts {
        AllowedExts {
            exts: self.exts.clone(),
        }
    }
}

impl Validator for DeniedExts {
    fn validate(&self, file: &mut FileHandle, _: &mut Metadata) -> Result<bool, TransferError> {
        let ext = file.extension().unwrap_or_default();
        if self.exts.contains(&ext) {
            return Err(UploadError::Message(format!(
                "{} has an invalid extension. Extensions denied: {}",
                file.name(),
                joined(&self.exts)
            ))
            .into());
        }
        Ok(true)
    }
}

impl fmt::Display for DeniedExts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeniedExts({})", joined(&self.exts))
    }
}
