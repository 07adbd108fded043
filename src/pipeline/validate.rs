//! The validation phase: run every registered validator in order.
//!
//! Bail-on-first mode returns the first failure unchanged. Catch-all mode
//! runs every validator and merges the failures into one
//! [`UploadError::Aggregate`], one entry per failed validator.

use crate::error::{TransferError, UploadError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use crate::validators::{outcome, SharedValidator};
use tracing::warn;

pub(crate) fn run_validators(
    validators: &[SharedValidator],
    file: &mut FileHandle,
    metadata: &mut Metadata,
    catch_all_errors: bool,
) -> Result<(), TransferError> {
    let mut failures = Vec::new();
    for v in validators {
        if let Err(e) = outcome(v.as_ref(), file, metadata)? {
            warn!("Validation of '{}' failed: {}", file.name(), e);
            if !catch_all_errors {
                return Err(e.into());
            }
            failures.push(e.to_string());
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(UploadError::Aggregate(failures).into())
    }
}
