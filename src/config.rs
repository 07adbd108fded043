//! Configuration types for upload pipelines.
//!
//! Two layers:
//!
//! * [`ExecuteOptions`] — per-call switches for [`Pipeline::execute`]
//!   (destination override, validation on/off, catch-all aggregation).
//! * [`PipelineConfig`] — a declarative, serde-loadable description of a
//!   directory-backed pipeline built from the stock validators and processors.
//!   [`PipelineConfig::into_pipeline`] turns it into a [`Pipeline`].

use crate::destination::Destination;
use crate::error::{ConfigError, TransferError};
use crate::file::{plain_file_name, FileHandle, DEFAULT_BUFFER_SIZE};
use crate::metadata::{keys, Metadata};
use crate::pipeline::Pipeline;
use crate::processors::{AvoidNameCollisions, SecureFilename, SuccessMessage};
use crate::validators::{AllowedExts, DeniedExts, DiskQuota, MaxFileSize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-call options for [`Pipeline::execute`].
///
/// # Example
/// ```rust
/// use upload_transfer::ExecuteOptions;
///
/// let options = ExecuteOptions::builder().catch_all_errors(true).build();
/// assert!(options.validate);
/// ```
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Overrides the pipeline's default destination for this call.
    pub destination: Option<Destination>,

    /// Run the validation phase. Default: true.
    pub validate: bool,

    /// Run every validator and report all failures together instead of
    /// stopping at the first. Default: false.
    pub catch_all_errors: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            destination: None,
            validate: true,
            catch_all_errors: false,
        }
    }
}

impl ExecuteOptions {
    pub fn builder() -> ExecuteOptionsBuilder {
        ExecuteOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ExecuteOptions`].
#[derive(Debug)]
pub struct ExecuteOptionsBuilder {
    options: ExecuteOptions,
}

impl ExecuteOptionsBuilder {
    pub fn destination(mut self, destination: impl Into<Destination>) -> Self {
        self.options.destination = Some(destination.into());
        self
    }

    pub fn validate(mut self, v: bool) -> Self {
        self.options.validate = v;
        self
    }

    pub fn catch_all_errors(mut self, v: bool) -> Self {
        self.options.catch_all_errors = v;
        self
    }

    pub fn build(self) -> ExecuteOptions {
        self.options
    }
}

/// Declarative description of a pipeline that stores uploads in a directory.
///
/// Every field is optional in serialised form; missing fields take the
/// defaults below.
///
/// # Example
/// ```rust
/// use upload_transfer::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(r#"{
///     "destination": "uploads",
///     "allowed_extensions": ["jpg", "png"],
///     "max_file_size": 1048576
/// }"#).unwrap();
/// let pipeline = config.into_pipeline().unwrap();
/// assert_eq!(pipeline.validators().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory uploads are saved into, as `<destination>/<filename>`.
    /// Without it the pipeline has no default destination.
    pub destination: Option<PathBuf>,

    /// Only these extensions pass. Empty means no allow-list.
    pub allowed_extensions: BTreeSet<String>,

    /// These extensions are rejected. Empty means no deny-list.
    pub denied_extensions: BTreeSet<String>,

    /// Largest accepted upload in bytes.
    pub max_file_size: Option<u64>,

    /// Total bytes the destination directory may hold, including the upload.
    pub disk_quota: Option<u64>,

    /// Sanitise filenames before saving. Default: true.
    pub secure_filenames: bool,

    /// Rename uploads that would overwrite an existing file. Default: false.
    pub avoid_name_collisions: bool,

    /// Record a user-facing message under metadata `"message"`. Default: true.
    pub success_message: bool,

    /// Copy buffer for the save, in bytes. Default: 16384.
    pub buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destination: None,
            allowed_extensions: BTreeSet::new(),
            denied_extensions: BTreeSet::new(),
            max_file_size: None,
            disk_quota: None,
            secure_filenames: true,
            avoid_name_collisions: false,
            success_message: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::Invalid(format!("malformed JSON: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Reject combinations that cannot produce a working pipeline.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer size must be ≥ 1".into()));
        }
        let allowed = AllowedExts::new(&self.allowed_extensions);
        let denied = DeniedExts::new(&self.denied_extensions);
        if let Some(ext) = allowed.extensions().intersection(denied.extensions()).next() {
            return Err(ConfigError::Invalid(format!(
                "extension '{ext}' is both allowed and denied"
            )));
        }
        if self.disk_quota.is_some() && self.destination.is_none() {
            return Err(ConfigError::Invalid(
                "disk quota requires a destination directory".into(),
            ));
        }
        Ok(())
    }

    /// Assemble the pipeline this configuration describes.
    ///
    /// Validators run as extensions, then size, then quota. Preprocessors
    /// sanitise the name before checking it for collisions.
    pub fn into_pipeline(self) -> Result<Pipeline, ConfigError> {
        self.check()?;
        let mut pipeline = Pipeline::new();

        if !self.allowed_extensions.is_empty() {
            pipeline.add_validator(AllowedExts::new(&self.allowed_extensions));
        }
        if !self.denied_extensions.is_empty() {
            pipeline.add_validator(DeniedExts::new(&self.denied_extensions));
        }
        if let Some(max) = self.max_file_size {
            pipeline.add_validator(MaxFileSize(max));
        }
        if let (Some(quota), Some(dir)) = (self.disk_quota, &self.destination) {
            pipeline.add_validator(DiskQuota::new(dir, quota));
        }

        if self.secure_filenames {
            pipeline.add_preprocessor(SecureFilename);
        }
        if let (true, Some(dir)) = (self.avoid_name_collisions, &self.destination) {
            pipeline.add_preprocessor(AvoidNameCollisions::new(dir));
        }

        if self.success_message {
            pipeline.add_postprocessor(SuccessMessage);
        }

        if let Some(dir) = self.destination {
            pipeline.set_default_destination(directory_destination(dir, self.buffer_size))?;
        }
        debug!("Built pipeline from config: {}", pipeline);
        Ok(pipeline)
    }
}

/// Save each upload as `dir/<filehandle name>` and record the path under
/// metadata `"saved_to"`.
///
/// A name that is not a single plain path component is rejected with an
/// [`UploadError`](crate::error::UploadError) and nothing is written.
pub fn directory_destination(dir: impl Into<PathBuf>, buffer_size: usize) -> Destination {
    let dir = dir.into();
    Destination::callable(move |file: &mut FileHandle, metadata: &mut Metadata| {
        let target = dir.join(plain_file_name(file.name())?);
        file.save_as(&target, buffer_size)?;
        metadata.insert(keys::SAVED_TO, target.display().to_string());
        Ok::<(), TransferError>(())
    })
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn destination(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.destination = Some(dir.into());
        self
    }

    pub fn allow<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_extensions.extend(exts.into_iter().map(Into::into));
        self
    }

    pub fn deny<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.denied_extensions.extend(exts.into_iter().map(Into::into));
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = Some(bytes);
        self
    }

    pub fn disk_quota(mut self, bytes: u64) -> Self {
        self.config.disk_quota = Some(bytes);
        self
    }

    pub fn secure_filenames(mut self, v: bool) -> Self {
        self.config.secure_filenames = v;
        self
    }

    pub fn avoid_name_collisions(mut self, v: bool) -> Self {
        self.config.avoid_name_collisions = v;
        self
    }

    pub fn success_message(mut self, v: bool) -> Self {
        self.config.success_message = v;
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        self.config.check()?;
        Ok(self.config)
    }
}
