//! Validators: predicates over `(filehandle, metadata)` that compose.
//!
//! A [`Validator`] either returns `Ok(true)`, returns `Ok(false)` (an
//! implicit failure), or returns `Err(TransferError::Upload(..))` with a
//! message. Any other error is a defect and is never treated as a failed
//! check by the combinators or by the pipeline.
//!
//! ```text
//! leaves       AllowedExts  DeniedExts  FunctionValidator  MaxFileSize  DiskQuota
//! constants    AllowAll     DenyAll
//! combinators  And(v1..vn)  Or(v1..vn)  Not(v)
//! ```
//!
//! The [`ValidatorExt`] methods `and`, `or` and `negate` are shorthand for
//! building combinator nodes pairwise: `a.and(b).and(c)` nests as
//! `And(And(a, b), c)`, which evaluates identically to the flat
//! `And::new([a, b, c])`.

mod combinators;
mod extensions;
mod function;
mod limits;

pub use combinators::{And, Not, Or};
pub use extensions::{AllowedExts, DeniedExts};
pub use function::FunctionValidator;
pub use limits::{DiskQuota, MaxFileSize};

use crate::error::{ConfigError, TransferError, UploadError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use std::fmt;
use std::sync::Arc;

/// A check run against an upload before it is saved.
///
/// `Display` gives the validator its identity in failure messages.
pub trait Validator: fmt::Display + Send + Sync {
    /// Evaluate the check.
    ///
    /// The provided body reports [`ConfigError::Unimplemented`]: a validator
    /// that only declares itself (e.g. one whose backend is not compiled in)
    /// fails the whole execution as a wiring error instead of passing or
    /// rejecting the upload.
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        let _ = (file, metadata);
        Err(ConfigError::Unimplemented {
            validator: self.to_string(),
        }
        .into())
    }
}

/// Shared, type-erased validator node.
pub type SharedValidator = Arc<dyn Validator>;

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        (**self).validate(file, metadata)
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        (**self).validate(file, metadata)
    }
}

/// Named composition methods available on every validator.
pub trait ValidatorExt: Validator + Sized + 'static {
    /// Both `self` and `other` must pass.
    fn and<V: Validator + 'static>(self, other: V) -> And {
        And::new([Arc::new(self) as SharedValidator, Arc::new(other)])
    }

    /// Either `self` or `other` must pass.
    fn or<V: Validator + 'static>(self, other: V) -> Or {
        Or::new([Arc::new(self) as SharedValidator, Arc::new(other)])
    }

    /// Passes exactly when `self` fails.
    fn negate(self) -> Not {
        Not::new(self)
    }

    fn shared(self) -> SharedValidator {
        Arc::new(self)
    }
}

impl<T: Validator + Sized + 'static> ValidatorExt for T {}

/// Always passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowAll;

impl Validator for AllowAll {
    fn validate(&self, _: &mut FileHandle, _: &mut Metadata) -> Result<bool, TransferError> {
        Ok(true)
    }
}

impl fmt::Display for AllowAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("All")
    }
}

/// Always fails, by returning `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenyAll;

impl Validator for DenyAll {
    fn validate(&self, _: &mut FileHandle, _: &mut Metadata) -> Result<bool, TransferError> {
        Ok(false)
    }
}

impl fmt::Display for DenyAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deny")
    }
}

/// Failure synthesized for a validator that returned `false` without a message.
pub fn returned_false<V: fmt::Display + ?Sized>(
    validator: &V,
    file: &FileHandle,
    metadata: &Metadata,
) -> UploadError {
    UploadError::Message(format!("{validator}({file:?}, {metadata}) returned false"))
}

/// Run `validator` and fold both failure channels into `Err(Upload(..))`.
pub(crate) fn check(
    validator: &dyn Validator,
    file: &mut FileHandle,
    metadata: &mut Metadata,
) -> Result<(), TransferError> {
    if validator.validate(file, metadata)? {
        Ok(())
    } else {
        Err(returned_false(validator, file, metadata).into())
    }
}

/// Like [`check`], but separates upload failures from defects:
/// `Ok(Err(..))` is a failed check, `Err(..)` must propagate.
pub(crate) fn outcome(
    validator: &dyn Validator,
    file: &mut FileHandle,
    metadata: &mut Metadata,
) -> Result<Result<(), UploadError>, TransferError> {
    match check(validator, file, metadata) {
        Ok(()) => Ok(Ok(())),
        Err(TransferError::Upload(e)) => Ok(Err(e)),
        Err(other) => Err(other),
    }
}
