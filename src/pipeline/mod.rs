//! The transfer pipeline: validate, preprocess, deliver, postprocess.
//!
//! ## Data Flow
//!
//! ```text
//! execute(file, metadata, options)
//!   │
//!   ├─ 0. Resolve   per-call destination, else the default; none ⇒ ConfigError
//!   ├─ 1. Validate  every validator, bail-on-first or catch-all (skippable)
//!   ├─ 2. Pre       preprocessors in registration order, each feeding the next
//!   ├─ 3. Deliver   the resolved destination, exactly once
//!   └─ 4. Post      postprocessors in registration order; the result is returned
//! ```
//!
//! A failed validation stops before anything is delivered. Nothing after
//! delivery is rolled back: if a postprocessor fails, the file stays where it
//! was saved and the error propagates.
//!
//! Submodules:
//! 1. [`process`]  — the [`Processor`] trait and step chaining
//! 2. [`validate`] — validation-phase error aggregation

pub mod process;
pub mod validate;

pub use process::{Processor, SharedProcessor};

use crate::config::ExecuteOptions;
use crate::destination::{Destination, ResolvedDestination};
use crate::error::{ConfigError, TransferError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use crate::validators::{SharedValidator, Validator};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// An ordered set of validation, processing and delivery steps.
///
/// Build it once at startup and reuse it for every upload; per-upload state
/// lives only in the [`Metadata`] passed to [`Pipeline::execute`].
///
/// # Example
/// ```rust
/// use upload_transfer::validators::AllowedExts;
/// use upload_transfer::{Destination, FileHandle, Metadata, Pipeline, TransferError};
/// use std::sync::{Arc, Mutex};
///
/// let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
/// let mut text = Pipeline::with_destination(Destination::writer(Arc::clone(&sink))).unwrap();
/// text.add_validator(AllowedExts::new(["txt"]));
/// text.add_preprocessor(|mut fh: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
///     let upper = fh.read_all()?.to_ascii_uppercase();
///     fh.replace_bytes(upper);
///     Ok(fh)
/// });
///
/// text.save(FileHandle::from_bytes("note.txt", "shout")).unwrap();
/// assert_eq!(*sink.lock().unwrap(), b"SHOUT");
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    destination: Option<ResolvedDestination>,
    validators: Vec<SharedValidator>,
    preprocessors: Vec<SharedProcessor>,
    postprocessors: Vec<SharedProcessor>,
}

impl Pipeline {
    /// An empty pipeline with no default destination.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// An empty pipeline delivering to `destination` by default.
    pub fn with_destination(destination: impl Into<Destination>) -> Result<Self, ConfigError> {
        let mut pipeline = Self::new();
        pipeline.set_default_destination(destination)?;
        Ok(pipeline)
    }

    /// Resolve and store the default destination, replacing any previous one.
    pub fn set_default_destination(&mut self, destination: impl Into<Destination>) -> Result<(), ConfigError> {
        self.destination = Some(destination.into().resolve()?);
        Ok(())
    }

    pub fn default_destination(&self) -> Option<&ResolvedDestination> {
        self.destination.as_ref()
    }

    /// Append a validator and hand it back for further use.
    pub fn add_validator<V: Validator + 'static>(&mut self, validator: V) -> Arc<V> {
        let validator = Arc::new(validator);
        self.validators.push(Arc::clone(&validator) as SharedValidator);
        validator
    }

    /// Append a preprocessor and hand it back for further use.
    pub fn add_preprocessor<P: Processor + 'static>(&mut self, processor: P) -> Arc<P> {
        let processor = Arc::new(processor);
        self.preprocessors.push(Arc::clone(&processor) as SharedProcessor);
        processor
    }

    /// Append a postprocessor and hand it back for further use.
    pub fn add_postprocessor<P: Processor + 'static>(&mut self, processor: P) -> Arc<P> {
        let processor = Arc::new(processor);
        self.postprocessors.push(Arc::clone(&processor) as SharedProcessor);
        processor
    }

    pub fn validators(&self) -> &[SharedValidator] {
        &self.validators
    }

    pub fn preprocessors(&self) -> &[SharedProcessor] {
        &self.preprocessors
    }

    pub fn postprocessors(&self) -> &[SharedProcessor] {
        &self.postprocessors
    }

    /// Run the validation phase on its own.
    pub fn validate(
        &self,
        file: &mut FileHandle,
        metadata: &mut Metadata,
        catch_all_errors: bool,
    ) -> Result<(), TransferError> {
        validate::run_validators(&self.validators, file, metadata, catch_all_errors)
    }

    /// Run the preprocessors on their own.
    pub fn preprocess(&self, file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        process::run_chain("preprocess", &self.preprocessors, file, metadata)
    }

    /// Run the postprocessors on their own.
    pub fn postprocess(&self, file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        process::run_chain("postprocess", &self.postprocessors, file, metadata)
    }

    /// Validate, preprocess, deliver and postprocess `file`.
    ///
    /// Returns the handle produced by the last postprocessor. Use
    /// [`Self::try_execute`] to get the handle back when the upload is
    /// rejected.
    ///
    /// # Errors
    /// - [`ConfigError::MissingDestination`] before any step runs when no
    ///   destination is available, or another [`ConfigError`] when the
    ///   per-call destination cannot be resolved
    /// - [`TransferError::Upload`] when validation fails; nothing is delivered
    /// - whatever a processor or the destination returned, unchanged
    pub fn execute(
        &self,
        file: FileHandle,
        metadata: &mut Metadata,
        options: &ExecuteOptions,
    ) -> Result<FileHandle, TransferError> {
        self.try_execute(file, metadata, options).map_err(|r| r.error)
    }

    /// Like [`Self::execute`], but a failure before preprocessing (no usable
    /// destination, failed validation) returns the caller's handle inside
    /// [`Rejected`] so it can be shown again or retried.
    pub fn try_execute(
        &self,
        mut file: FileHandle,
        metadata: &mut Metadata,
        options: &ExecuteOptions,
    ) -> Result<FileHandle, Rejected> {
        let resolved = match &options.destination {
            Some(per_call) => per_call.clone().resolve(),
            None => self.destination.clone().ok_or(ConfigError::MissingDestination),
        };
        let destination = match resolved {
            Ok(d) => d,
            Err(e) => return Err(Rejected::with_file(e.into(), file)),
        };

        info!("Starting transfer: '{}' → {} destination", file.name(), destination.kind());

        if options.validate {
            if let Err(e) = self.validate(&mut file, metadata, options.catch_all_errors) {
                return Err(Rejected::with_file(e, file));
            }
        } else {
            debug!("Validation skipped for '{}'", file.name());
        }

        let consumed = |error: TransferError| Rejected { error, file: None };
        let mut file = self.preprocess(file, metadata).map_err(consumed)?;
        destination.deliver(&mut file, metadata).map_err(consumed)?;
        debug!("Delivered '{}'", file.name());
        let file = self.postprocess(file, metadata).map_err(consumed)?;

        info!("Transfer complete: '{}'", file.name());
        Ok(file)
    }

    /// [`Self::execute`] with empty metadata and default options.
    pub fn save(&self, file: FileHandle) -> Result<FileHandle, TransferError> {
        self.execute(file, &mut Metadata::new(), &ExecuteOptions::default())
    }
}

/// A failed [`Pipeline::try_execute`].
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejected {
    pub error: TransferError,
    /// The handle as it was passed in, when no step had taken it yet.
    pub file: Option<FileHandle>,
}

impl Rejected {
    fn with_file(error: TransferError, file: FileHandle) -> Self {
        Self {
            error,
            file: Some(file),
        }
    }
}

/// A nested pipeline runs a full execution against its own default
/// destination, sharing the outer metadata.
impl Processor for Pipeline {
    fn process(&self, file: FileHandle, metadata: &mut Metadata) -> Result<FileHandle, TransferError> {
        self.execute(file, metadata, &ExecuteOptions::default())
    }
}

/// As a validator, a pipeline runs only its own validation phase.
impl Validator for Pipeline {
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        Pipeline::validate(self, file, metadata, false)?;
        Ok(true)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pipeline(validators=[")?;
        for (i, v) in self.validators.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(
            f,
            "], preprocessors={}, postprocessors={})",
            self.preprocessors.len(),
            self.postprocessors.len()
        )
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("destination", &self.destination)
            .field("validators", &self.validators.len())
            .field("preprocessors", &self.preprocessors.len())
            .field("postprocessors", &self.postprocessors.len())
            .finish()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    destination: Option<Destination>,
    validators: Vec<SharedValidator>,
    preprocessors: Vec<SharedProcessor>,
    postprocessors: Vec<SharedProcessor>,
}

impl PipelineBuilder {
    pub fn destination(mut self, destination: impl Into<Destination>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn validators<I: IntoIterator<Item = SharedValidator>>(mut self, validators: I) -> Self {
        self.validators.extend(validators);
        self
    }

    pub fn preprocessor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.preprocessors.push(Arc::new(processor));
        self
    }

    pub fn preprocessors<I: IntoIterator<Item = SharedProcessor>>(mut self, processors: I) -> Self {
        self.preprocessors.extend(processors);
        self
    }

    pub fn postprocessor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.postprocessors.push(Arc::new(processor));
        self
    }

    pub fn postprocessors<I: IntoIterator<Item = SharedProcessor>>(mut self, processors: I) -> Self {
        self.postprocessors.extend(processors);
        self
    }

    /// Build the pipeline, resolving the default destination if one was given.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let destination = self.destination.map(Destination::resolve).transpose()?;
        Ok(Pipeline {
            destination,
            validators: self.validators,
            preprocessors: self.preprocessors,
            postprocessors: self.postprocessors,
        })
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("destination", &self.destination)
            .field("validators", &self.validators.len())
            .field("preprocessors", &self.preprocessors.len())
            .field("postprocessors", &self.postprocessors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::validators::{AllowedExts, DenyAll, FunctionValidator, ValidatorExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop_destination() -> Destination {
        Destination::callable(|_, _| Ok(()))
    }

    #[test]
    fn blank_setup() {
        let p = Pipeline::new();
        assert!(p.default_destination().is_none());
        assert!(p.validators().is_empty());
        assert!(p.preprocessors().is_empty());
        assert!(p.postprocessors().is_empty());
    }

    #[test]
    fn setup_with_each_destination_shape() {
        let sink = Arc::new(std::sync::Mutex::new(Vec::<u8>::new()));
        for dest in [noop_destination(), Destination::writer(sink), Destination::from("dummy/path")] {
            let p = Pipeline::with_destination(dest).unwrap();
            assert!(p.default_destination().is_some());
        }
    }

    #[test]
    fn registration_returns_the_step() {
        let mut p = Pipeline::new();
        let allowed = p.add_validator(AllowedExts::new(["png"]));
        assert_eq!(allowed.to_string(), "AllowedExts(png)");
        p.add_preprocessor(|fh: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> { Ok(fh) });
        p.add_postprocessor(|fh: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> { Ok(fh) });
        assert_eq!(p.validators().len(), 1);
        assert_eq!(p.preprocessors().len(), 1);
        assert_eq!(p.postprocessors().len(), 1);
    }

    #[test]
    fn missing_destination_fails_before_any_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut p = Pipeline::new();
        let c = Arc::clone(&calls);
        p.add_validator(FunctionValidator::new("count", move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }));
        let c = Arc::clone(&calls);
        p.add_preprocessor(move |fh: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(fh)
        });

        let err = p.save(FileHandle::from_bytes("a.txt", b"")).unwrap_err();
        assert!(matches!(err, TransferError::Config(ConfigError::MissingDestination)));
        assert_eq!(err.to_string(), "Destination for filehandle must be provided.");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn falsy_validator_gets_a_message() {
        let mut p = Pipeline::with_destination(noop_destination()).unwrap();
        p.add_validator(DenyAll);
        let err = p.save(FileHandle::from_bytes("test.conf", b"")).unwrap_err();
        let expected = format!(
            "Deny({:?}, {{}}) returned false",
            FileHandle::from_bytes("test.conf", b"")
        );
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn failed_validation_skips_everything_after() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&delivered);
        let mut p = Pipeline::with_destination(Destination::callable(move |_, _| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
        p.add_validator(AllowedExts::new(["jpg"]));
        p.add_preprocessor(|_: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
            panic!("preprocessor must not run")
        });

        let err = p.save(FileHandle::from_bytes("a.png", b"")).unwrap_err();
        assert!(err.is_upload_failure());
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn validate_toggle_skips_validators() {
        let mut p = Pipeline::with_destination(noop_destination()).unwrap();
        p.add_validator(DenyAll);
        let options = ExecuteOptions::builder().validate(false).build();
        p.execute(FileHandle::from_bytes("a.txt", b""), &mut Metadata::new(), &options)
            .unwrap();
    }

    #[test]
    fn per_call_destination_overrides_default() {
        let default_hits = Arc::new(AtomicUsize::new(0));
        let call_hits = Arc::new(AtomicUsize::new(0));
        let (d, c) = (Arc::clone(&default_hits), Arc::clone(&call_hits));

        let p = Pipeline::with_destination(Destination::callable(move |_, _| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
        let options = ExecuteOptions::builder()
            .destination(Destination::callable(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .build();

        p.execute(FileHandle::from_bytes("a.txt", b""), &mut Metadata::new(), &options)
            .unwrap();
        assert_eq!(default_hits.load(Ordering::SeqCst), 0);
        assert_eq!(call_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolvable_per_call_destination_is_config_error() {
        let p = Pipeline::new();
        let options = ExecuteOptions::builder().destination(Destination::path("")).build();
        let err = p
            .execute(FileHandle::from_bytes("a.txt", b""), &mut Metadata::new(), &options)
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn postprocessor_failure_happens_after_delivery() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&delivered);
        let mut p = Pipeline::with_destination(Destination::callable(move |_, _| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
        p.add_postprocessor(|_: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
            Err(TransferError::step("thumbnail failed"))
        });

        let err = p.save(FileHandle::from_bytes("a.png", b"")).unwrap_err();
        assert_eq!(err.to_string(), "thumbnail failed");
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metadata_is_shared_across_phases() {
        let mut p = Pipeline::with_destination(Destination::callable(|_, meta| {
            assert_eq!(meta.get_str("seen_by"), Some("validator,pre"));
            meta.insert("seen_by", "validator,pre,dest");
            Ok(())
        }))
        .unwrap();
        p.add_validator(FunctionValidator::new("mark", |_, meta| {
            meta.insert("seen_by", "validator");
            Ok(true)
        }));
        p.add_preprocessor(|fh: FileHandle, meta: &mut Metadata| -> Result<FileHandle, TransferError> {
            let seen = format!("{},pre", meta.get_str("seen_by").unwrap_or_default());
            meta.insert("seen_by", seen);
            Ok(fh)
        });

        let mut meta = Metadata::new();
        p.execute(FileHandle::from_bytes("a.txt", b""), &mut meta, &ExecuteOptions::default())
            .unwrap();
        assert_eq!(meta.get_str("seen_by"), Some("validator,pre,dest"));
    }

    #[test]
    fn pipeline_as_validator() {
        let mut inner = Pipeline::new();
        inner.add_validator(AllowedExts::new(["txt"]));
        let outer = Pipeline::builder()
            .destination(noop_destination())
            .validator(inner.and(AllowedExts::new(["txt", "md"])))
            .build()
            .unwrap();

        outer.save(FileHandle::from_bytes("a.txt", b"")).unwrap();
        let err = outer.save(FileHandle::from_bytes("a.md", b"")).unwrap_err();
        assert!(matches!(err, TransferError::Upload(UploadError::Message(_))));
    }

    #[test]
    fn display_lists_validators() {
        let p = Pipeline::builder().validator(DenyAll).build().unwrap();
        assert_eq!(p.to_string(), "Pipeline(validators=[Deny], preprocessors=0, postprocessors=0)");
    }

    #[test]
    fn rejected_upload_hands_the_file_back() {
        let mut p = Pipeline::with_destination(noop_destination()).unwrap();
        p.add_validator(AllowedExts::new(["txt"]));

        let rejected = p
            .try_execute(
                FileHandle::from_bytes("photo.png", "pixels"),
                &mut Metadata::new(),
                &ExecuteOptions::default(),
            )
            .unwrap_err();
        assert!(rejected.error.is_upload_failure());
        let mut file = rejected.file.unwrap();
        assert_eq!(file.name(), "photo.png");
        assert_eq!(file.read_all().unwrap(), b"pixels");

        file.set_name("photo.txt");
        p.try_execute(file, &mut Metadata::new(), &ExecuteOptions::default())
            .unwrap();
    }

    #[test]
    fn missing_destination_hands_the_file_back() {
        let rejected = Pipeline::new()
            .try_execute(FileHandle::from_bytes("a.txt", "x"), &mut Metadata::new(), &ExecuteOptions::default())
            .unwrap_err();
        assert!(rejected.error.is_config_error());
        assert_eq!(rejected.file.unwrap().name(), "a.txt");
    }

    #[test]
    fn late_failure_has_no_file() {
        let mut p = Pipeline::with_destination(noop_destination()).unwrap();
        p.add_preprocessor(|_: FileHandle, _: &mut Metadata| -> Result<FileHandle, TransferError> {
            Err(TransferError::step("convert failed"))
        });
        let rejected = p
            .try_execute(FileHandle::from_bytes("a.txt", ""), &mut Metadata::new(), &ExecuteOptions::default())
            .unwrap_err();
        assert_eq!(rejected.to_string(), "convert failed");
        assert!(rejected.file.is_none());
    }
}
