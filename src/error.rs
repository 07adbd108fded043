//! Error types for the upload-transfer library.
//!
//! Three layers reflect three distinct failure modes:
//!
//! * [`UploadError`] — **Recoverable**: the upload itself is unacceptable
//!   (wrong extension, too large, failed a custom check). Carries one message
//!   or an ordered list of messages and is meant to be shown to the end user.
//!
//! * [`ConfigError`] — **Programmer error**: the pipeline is wired wrong (no
//!   destination, unusable destination, invalid builder input). Request
//!   handling code should not catch it.
//!
//! * [`TransferError`] — what every fallible operation returns. Wraps the two
//!   above plus I/O failures and opaque step failures, which the pipeline
//!   propagates without reinterpreting them.

use thiserror::Error;

/// Boxed error produced by user-supplied steps.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A data-level rejection of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// A single failure reason.
    #[error("{0}")]
    Message(String),

    /// Several failure reasons, in the order they were collected.
    #[error("{}", .0.join("; "))]
    Aggregate(Vec<String>),
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        UploadError::Message(message.into())
    }

    /// Ordered list of every message carried by this error.
    pub fn messages(&self) -> Vec<String> {
        match self {
            UploadError::Message(m) => vec![m.clone()],
            UploadError::Aggregate(ms) => ms.clone(),
        }
    }
}

/// A wiring mistake in how a pipeline was built or invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Neither a per-call nor a default destination was available.
    #[error("Destination for filehandle must be provided.")]
    MissingDestination,

    /// The destination value cannot be turned into a delivery callable.
    #[error("Destination must be a path, writable or callable object: {reason}")]
    UnsupportedDestination { reason: String },

    /// A validator was asked to evaluate but has no implementation.
    #[error("Validator '{validator}' is not implemented")]
    Unimplemented { validator: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// All errors returned by pipeline and validator operations.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A processor, destination or validator failed with an error the
    /// pipeline does not classify. Propagated as-is.
    #[error(transparent)]
    Step(BoxError),
}

impl TransferError {
    /// Wrap an arbitrary step failure.
    pub fn step(err: impl Into<BoxError>) -> Self {
        TransferError::Step(err.into())
    }

    pub fn is_upload_failure(&self) -> bool {
        matches!(self, TransferError::Upload(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, TransferError::Config(_))
    }

    /// The upload failure carried by this error, if any.
    pub fn as_upload_failure(&self) -> Option<&UploadError> {
        match self {
            TransferError::Upload(e) => Some(e),
            _ => None,
        }
    }
}
