//! Built-in pre- and post-processors.
//!
//! | Processor             | Phase | Effect                                                   |
//! |-----------------------|-------|----------------------------------------------------------|
//! | [`SecureFilename`]    | pre   | reduce the name to `[A-Za-z0-9_.-]`                      |
//! | [`ChangeExtension`]   | pre   | swap the extension after a content conversion            |
//! | [`AvoidNameCollisions`] | pre | rename to `<stem>_<n>.<ext>` until no file is in the way |
//! | [`SuccessMessage`]    | post  | record a user-facing message under `"message"`           |
//!
//! The renaming processors record the name they started from under
//! `"original_filename"` the first time any of them runs, so a later step can
//! report what the upload was called when it arrived.

use crate::error::{TransferError, UploadError};
use crate::file::{plain_file_name, FileHandle};
use crate::metadata::{keys, Metadata};
use crate::pipeline::Processor;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// Reduce `name` to a flat, shell- and filesystem-safe filename.
///
/// Path separators and whitespace runs become `_`, any other character
/// outside `[A-Za-z0-9_.-]` is dropped, and leading/trailing `.` and `_` are
/// trimmed. Returns `"file"` when nothing is left.
///
/// ```rust
/// use upload_transfer::processors::secure_filename;
///
/// assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
/// assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
/// ```
pub fn secure_filename(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let stripped = RE_UNSAFE_CHARS.replace_all(&joined, "");
    let trimmed = stripped.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn record_original_name(file: &FileHandle, metadata: &mut Metadata) {
    if !metadata.contains_key(keys::ORIGINAL_FILENAME) {
        metadata.insert(keys::ORIGINAL_FILENAME, file.name());
    }
}

/// Renames the handle to a sanitised form of metadata `"filename"`, or of its
/// own name when the caller supplied none.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureFilename;

impl Processor for SecureFilename {
    fn process(&self, mut file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        let source = metadata
            .get_str(keys::FILENAME)
            .map(str::to_string)
            .unwrap_or_else(|| file.name().to_string());
        record_original_name(&file, metadata);
        let secured = secure_filename(&source);
        debug!("Secured filename '{}' → '{}'", source, secured);
        file.set_name(secured);
        Ok(file)
    }
}

/// Replaces the handle's extension, adding one if it has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeExtension {
    ext: String,
}

impl ChangeExtension {
    pub fn new(ext: impl AsRef<str>) -> Self {
        Self {
            ext: ext.as_ref().trim_start_matches('.').to_string(),
        }
    }
}

impl Processor for ChangeExtension {
    fn process(&self, mut file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        record_original_name(&file, metadata);
        let renamed = Path::new(file.name())
            .with_extension(&self.ext)
            .to_string_lossy()
            .into_owned();
        file.set_name(renamed);
        Ok(file)
    }
}

/// Renames the handle until `dir/<name>` does not exist.
///
/// Disabled for one execution by setting metadata
/// `"avoid_name_collision"` to `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvoidNameCollisions {
    dir: PathBuf,
}

impl AvoidNameCollisions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// First free name for `name` in the directory. Names that would
    /// resolve outside the directory are rejected.
    pub fn free_name(&self, name: &str) -> Result<String, UploadError> {
        let path = Path::new(plain_file_name(name)?);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = name.to_string();
        let mut counter = 0u64;
        while self.dir.join(&candidate).exists() {
            candidate = format!("{stem}_{counter}{ext}");
            counter += 1;
        }
        Ok(candidate)
    }
}

impl Processor for AvoidNameCollisions {
    fn process(&self, mut file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        if metadata.get_bool(keys::AVOID_NAME_COLLISION) == Some(false) {
            return Ok(file);
        }
        let free = self.free_name(file.name())?;
        if free != file.name() {
            record_original_name(&file, metadata);
            debug!("'{}' exists in {}, using '{}'", file.name(), self.dir.display(), free);
            file.set_name(free);
        }
        Ok(file)
    }
}

/// Records the outcome message for the end user under metadata `"message"`.
///
/// A message the caller already put there is kept. Otherwise it reads
/// `"Converted <original> to <name>"` when an earlier step renamed the
/// upload, or `"Uploaded <name>"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessMessage;

impl Processor for SuccessMessage {
    fn process(&self, file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        if !metadata.contains_key(keys::MESSAGE) {
            let message = match metadata.get_str(keys::ORIGINAL_FILENAME) {
                Some(original) if original != file.name() => {
                    format!("Converted {} to {}", original, file.name())
                }
                _ => format!("Uploaded {}", file.name()),
            };
            metadata.insert(keys::MESSAGE, message);
        }
        info!("{}", metadata.get_str(keys::MESSAGE).unwrap_or_default());
        Ok(file)
    }
}
