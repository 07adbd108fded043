//! Where a validated, preprocessed upload gets delivered.
//!
//! A [`Destination`] comes in three shapes, checked in this order when it is
//! resolved:
//!
//! 1. **Callable** — a function receiving `(filehandle, metadata)` that
//!    performs the save itself.
//! 2. **Writer** — a shared sink; the handle's content is copied into it.
//! 3. **Path** — a filesystem path; the handle is saved there atomically.
//!
//! Every shape resolves once into a [`ResolvedDestination`], a uniform
//! callable the pipeline invokes exactly once per successful execution.

use crate::error::{ConfigError, TransferError};
use crate::file::{FileHandle, DEFAULT_BUFFER_SIZE};
use crate::metadata::Metadata;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Signature shared by callable destinations and resolved ones.
pub type DeliverFn =
    dyn Fn(&mut FileHandle, &mut Metadata) -> Result<(), TransferError> + Send + Sync;

/// A shared writable sink.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// An unresolved delivery target.
#[derive(Clone)]
pub enum Destination {
    Callable(Arc<DeliverFn>),
    Writer {
        sink: SharedWriter,
        buffer_size: usize,
    },
    Path {
        path: PathBuf,
        buffer_size: usize,
    },
}

impl Destination {
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&mut FileHandle, &mut Metadata) -> Result<(), TransferError> + Send + Sync + 'static,
    {
        Destination::Callable(Arc::new(f))
    }

    /// Copy uploads into a shared sink. Keep a clone of the `Arc` to read
    /// the sink back afterwards.
    pub fn writer<W: Write + Send + 'static>(sink: Arc<Mutex<W>>) -> Self {
        Destination::Writer {
            sink,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Destination::Path {
            path: path.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Override the copy buffer for writer and path destinations.
    /// Callables do their own I/O and ignore it.
    pub fn buffer_size(mut self, size: usize) -> Self {
        match &mut self {
            Destination::Writer { buffer_size, .. } | Destination::Path { buffer_size, .. } => {
                *buffer_size = size;
            }
            Destination::Callable(_) => {}
        }
        self
    }

    /// Turn this destination into a uniform delivery callable.
    pub fn resolve(self) -> Result<ResolvedDestination, ConfigError> {
        match self {
            Destination::Callable(f) => Ok(ResolvedDestination {
                kind: "callable",
                deliver: f,
            }),
            Destination::Writer { sink, buffer_size } => {
                check_buffer_size(buffer_size)?;
                Ok(ResolvedDestination {
                    kind: "writer",
                    deliver: Arc::new(move |file: &mut FileHandle, _meta: &mut Metadata| {
                        let mut guard = sink.lock().map_err(|_| {
                            io::Error::other("destination writer lock poisoned")
                        })?;
                        file.save_to(&mut *guard, buffer_size)?;
                        Ok::<(), TransferError>(())
                    }),
                })
            }
            Destination::Path { path, buffer_size } => {
                check_buffer_size(buffer_size)?;
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::UnsupportedDestination {
                        reason: "path is empty".into(),
                    });
                }
                Ok(ResolvedDestination {
                    kind: "path",
                    deliver: Arc::new(move |file: &mut FileHandle, _meta: &mut Metadata| {
                        debug!("Saving '{}' to {}", file.name(), path.display());
                        file.save_as(&path, buffer_size)?;
                        Ok::<(), TransferError>(())
                    }),
                })
            }
        }
    }
}

fn check_buffer_size(size: usize) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::UnsupportedDestination {
            reason: "buffer size must be ≥ 1".into(),
        });
    }
    Ok(())
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Callable(_) => f.write_str("Destination::Callable(<fn>)"),
            Destination::Writer { buffer_size, .. } => f
                .debug_struct("Destination::Writer")
                .field("buffer_size", buffer_size)
                .finish_non_exhaustive(),
            Destination::Path { path, buffer_size } => f
                .debug_struct("Destination::Path")
                .field("path", path)
                .field("buffer_size", buffer_size)
                .finish(),
        }
    }
}

impl From<PathBuf> for Destination {
    fn from(path: PathBuf) -> Self {
        Destination::path(path)
    }
}

impl From<&str> for Destination {
    fn from(path: &str) -> Self {
        Destination::path(path)
    }
}

impl From<String> for Destination {
    fn from(path: String) -> Self {
        Destination::path(path)
    }
}

/// A destination reduced to a single delivery callable.
#[derive(Clone)]
pub struct ResolvedDestination {
    kind: &'static str,
    deliver: Arc<DeliverFn>,
}

impl ResolvedDestination {
    /// Which shape this destination was resolved from.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn deliver(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<(), TransferError> {
        (self.deliver)(file, metadata)
    }
}

impl fmt::Debug for ResolvedDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolvedDestination({})", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_shape_resolves() {
        let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let shapes = [
            Destination::callable(|_, _| Ok(())),
            Destination::writer(sink),
            Destination::path("dummy/path"),
        ];
        let kinds: Vec<_> = shapes
            .into_iter()
            .map(|d| d.resolve().unwrap().kind())
            .collect();
        assert_eq!(kinds, vec!["callable", "writer", "path"]);
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = Destination::path("").resolve().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDestination { .. }));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = Destination::path("out").buffer_size(0).resolve().unwrap_err();
        assert!(err.to_string().contains("buffer size"));
    }

    #[test]
    fn writer_receives_content() {
        let sink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let dest = Destination::writer(Arc::clone(&sink)).buffer_size(1).resolve().unwrap();
        let mut fh = FileHandle::from_bytes("a.txt", b"hello world");
        dest.deliver(&mut fh, &mut Metadata::new()).unwrap();
        assert_eq!(*sink.lock().unwrap(), b"hello world");
    }

    #[test]
    fn callable_sees_metadata() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let dest = Destination::callable(move |fh, meta| {
            seen.fetch_add(1, Ordering::SeqCst);
            meta.insert("saved_as", fh.name().to_string());
            Ok(())
        })
        .resolve()
        .unwrap();

        let mut meta = Metadata::new();
        dest.deliver(&mut FileHandle::from_bytes("x.png", b""), &mut meta).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(meta.get_str("saved_as"), Some("x.png"));
    }

    #[test]
    fn path_destination_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("test.png");
        let dest = Destination::from(target.clone()).resolve().unwrap();
        dest.deliver(&mut FileHandle::from_bytes("test.png", b"png"), &mut Metadata::new())
            .unwrap();
        assert_eq!(std::fs::read(target).unwrap(), b"png");
    }
}
