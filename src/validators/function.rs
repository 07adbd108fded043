//! Lift a plain function into the validator algebra.
//!
//! The wrapped function returns `Result<bool, BoxError>`. Its errors are
//! sorted three ways:
//!
//! * an [`UploadError`] or [`TransferError`] passes through as-is;
//! * an error of a *checked* type becomes an upload failure carrying the
//!   error's message;
//! * anything else propagates as [`TransferError::Step`], a defect rather
//!   than a failed check.
//!
//! Checked by default: integer/float/bool parse errors, integer range
//! conversion errors, UTF-8 decoding errors, and I/O errors of kind
//! `InvalidData` / `InvalidInput`. More types can be registered with
//! [`FunctionValidator::add_checked_error`].

use super::Validator;
use crate::error::{BoxError, TransferError, UploadError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use std::any::type_name;
use std::error::Error;
use std::fmt;
use std::io;
use std::num::{ParseFloatError, ParseIntError, TryFromIntError};
use std::str::{ParseBoolError, Utf8Error};
use std::string::FromUtf8Error;
use tracing::debug;

type ErrorMatcher = fn(&(dyn Error + 'static)) -> bool;

#[derive(Clone, Copy)]
struct CheckedError {
    name: &'static str,
    matches: ErrorMatcher,
}

fn is<E: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<E>()
}

fn is_invalid_io(err: &(dyn Error + 'static)) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|e| matches!(e.kind(), io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput))
}

fn checked<E: Error + 'static>() -> CheckedError {
    let full = type_name::<E>();
    CheckedError {
        name: full.rsplit("::").next().unwrap_or(full),
        matches: is::<E>,
    }
}

fn default_checked() -> Vec<CheckedError> {
    vec![
        checked::<ParseIntError>(),
        checked::<ParseFloatError>(),
        checked::<ParseBoolError>(),
        checked::<TryFromIntError>(),
        checked::<Utf8Error>(),
        checked::<FromUtf8Error>(),
        CheckedError {
            name: "io::Error(InvalidData|InvalidInput)",
            matches: is_invalid_io,
        },
    ]
}

/// A named function participating in the validator algebra.
///
/// ```rust
/// use upload_transfer::validators::FunctionValidator;
///
/// let lowercase = FunctionValidator::new("filename_all_lower", |fh, _meta| {
///     Ok(fh.name().chars().all(|c| !c.is_uppercase()))
/// });
/// assert_eq!(lowercase.name(), "filename_all_lower");
/// ```
pub struct FunctionValidator<F> {
    name: String,
    func: F,
    checked: Vec<CheckedError>,
}

impl<F> FunctionValidator<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut FileHandle, &mut Metadata) -> Result<bool, BoxError> + Send + Sync,
    {
        Self {
            name: name.into(),
            func,
            checked: default_checked(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Treat errors of type `E` raised by the function as upload failures.
    pub fn add_checked_error<E: Error + 'static>(&mut self) -> &mut Self {
        self.checked.push(checked::<E>());
        self
    }

    /// Consuming form of [`Self::add_checked_error`].
    pub fn with_checked_error<E: Error + 'static>(mut self) -> Self {
        self.add_checked_error::<E>();
        self
    }

    pub fn is_checked(&self, err: &(dyn Error + 'static)) -> bool {
        self.checked.iter().any(|c| (c.matches)(err))
    }

    fn classify(&self, err: BoxError) -> TransferError {
        let err = match err.downcast::<UploadError>() {
            Ok(upload) => return TransferError::Upload(*upload),
            Err(err) => err,
        };
        let err = match err.downcast::<TransferError>() {
            Ok(transfer) => return *transfer,
            Err(err) => err,
        };
        if self.is_checked(err.as_ref()) {
            debug!("{} raised checked error: {}", self.name, err);
            UploadError::Message(err.to_string()).into()
        } else {
            TransferError::Step(err)
        }
    }
}

impl<F> Validator for FunctionValidator<F>
where
    F: Fn(&mut FileHandle, &mut Metadata) -> Result<bool, BoxError> + Send + Sync,
{
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        (self.func)(file, metadata).map_err(|e| self.classify(e))
    }
}

impl<F> fmt::Display for FunctionValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let catching: Vec<&str> = self.checked.iter().map(|c| c.name).collect();
        write!(f, "FunctionValidator({}, catching=[{}])", self.name, catching.join(", "))
    }
}

impl<F> fmt::Debug for FunctionValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValidator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Quota;

    impl fmt::Display for Quota {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("quota exceeded")
        }
    }

    impl Error for Quota {}

    fn run<F>(v: &FunctionValidator<F>) -> Result<bool, TransferError>
    where
        F: Fn(&mut FileHandle, &mut Metadata) -> Result<bool, BoxError> + Send + Sync,
    {
        v.validate(&mut FileHandle::from_bytes("awesome.jpg", b""), &mut Metadata::new())
    }

    #[test]
    fn passes_through_result() {
        let v = FunctionValidator::new("lower", |fh, _| Ok(fh.name() == fh.name().to_lowercase()));
        assert!(run(&v).unwrap());
    }

    #[test]
    fn parse_errors_become_upload_failures() {
        let v = FunctionValidator::new("width", |_, meta| {
            let width: u32 = meta.get_str("width").unwrap_or("wide").parse()?;
            Ok(width <= 1080)
        });
        let err = run(&v).unwrap_err();
        assert!(err.is_upload_failure());
        assert!(err.to_string().contains("invalid digit"));
    }

    #[test]
    fn upload_errors_keep_their_message() {
        let v = FunctionValidator::new("lower", |_, _| {
            Err(UploadError::new("require lowercase filename").into())
        });
        assert_eq!(run(&v).unwrap_err().to_string(), "require lowercase filename");
    }

    #[test]
    fn unchecked_errors_are_defects() {
        let v = FunctionValidator::new("quota", |_, _| Err(Box::new(Quota) as BoxError));
        let err = run(&v).unwrap_err();
        assert!(matches!(err, TransferError::Step(_)));
    }

    #[test]
    fn registered_errors_are_checked() {
        let mut v = FunctionValidator::new("quota", |_, _| Err(Box::new(Quota) as BoxError));
        v.add_checked_error::<Quota>();
        let err = run(&v).unwrap_err();
        assert!(err.is_upload_failure());
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(v.to_string().contains("Quota]"), "got: {v}");
    }

    #[test]
    fn invalid_data_io_errors_are_checked() {
        let v = FunctionValidator::new("decode", |_, _| {
            Err(io::Error::new(io::ErrorKind::InvalidData, "not an image").into())
        });
        assert!(run(&v).unwrap_err().is_upload_failure());

        let v = FunctionValidator::new("read", |_, _| Err(io::Error::other("disk gone").into()));
        assert!(!run(&v).unwrap_err().is_upload_failure());
    }

    #[test]
    fn display_lists_checked_errors() {
        let v = FunctionValidator::new("lower", |_, _| Ok(true));
        let shown = v.to_string();
        assert!(shown.starts_with("FunctionValidator(lower, catching=[ParseIntError, ParseFloatError"));
    }
}
