//! Pre- and post-processing steps.
//!
//! A [`Processor`] takes the handle by value and hands back the handle the
//! next step should see: the same one, mutated (renamed, stream replaced),
//! or a new one. Plain closures of the right shape are processors.

use crate::error::TransferError;
use crate::file::FileHandle;
use crate::metadata::Metadata;
use std::sync::Arc;
use tracing::debug;

/// A transformation step run before or after delivery.
pub trait Processor: Send + Sync {
    fn process(&self, file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError>;
}

impl<F> Processor for F
where
    F: Fn(FileHandle, &mut Metadata) -> Result<FileHandle, TransferError> + Send + Sync,
{
    fn process(&self, file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        self(file, metadata)
    }
}

/// Shared, type-erased processor.
pub type SharedProcessor = Arc<dyn Processor>;

/// Thread `file` through `steps` in order. The first error stops the chain.
pub(crate) fn run_chain(
    stage: &str,
    steps: &[SharedProcessor],
    mut file: FileHandle,
    metadata: &mut Metadata,
) -> Result<FileHandle, TransferError> {
    let total = steps.len();
    for (i, step) in steps.iter().enumerate() {
        debug!("{} step {}/{} on '{}'", stage, i + 1, total, file.name());
        file = step.process(file, metadata)?;
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(tag: &'static str) -> SharedProcessor {
        Arc::new(move |file: FileHandle, meta: &mut Metadata| -> Result<FileHandle, TransferError> {
            let mut order = meta.get_str("order").unwrap_or_default().to_string();
            order.push_str(tag);
            meta.insert("order", order);
            Ok(file)
        })
    }

    #[test]
    fn chain_runs_in_order() {
        let steps = vec![append("a"), append("b"), append("c")];
        let mut meta = Metadata::new();
        run_chain("pre", &steps, FileHandle::from_bytes("x", b""), &mut meta).unwrap();
        assert_eq!(meta.get_str("order"), Some("abc"));
    }

    #[test]
    fn output_feeds_next_step() {
        let rename: SharedProcessor = Arc::new(|mut file: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
            file.set_name(format!("{}.bak", file.name()));
            Ok(file)
        });
        let steps = vec![rename.clone(), rename];
        let out = run_chain("pre", &steps, FileHandle::from_bytes("x", b""), &mut Metadata::new()).unwrap();
        assert_eq!(out.name(), "x.bak.bak");
    }

    #[test]
    fn error_stops_chain() {
        let fail: SharedProcessor = Arc::new(|_: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
            Err(TransferError::step("convert failed"))
        });
        let steps = vec![fail, append("never")];
        let mut meta = Metadata::new();
        let err = run_chain("post", &steps, FileHandle::from_bytes("x", b""), &mut meta).unwrap_err();
        assert_eq!(err.to_string(), "convert failed");
        assert!(!meta.contains_key("order"));
    }
}
