//! The upload handle that flows through a pipeline.
//!
//! A [`FileHandle`] pairs a mutable name with a readable, seekable byte
//! stream. Processors may rename it or swap its stream for transformed
//! content; the destination finally saves it with [`FileHandle::save_to`] or
//! [`FileHandle::save_as`].
//!
//! Saving and [`FileHandle::read_all`] rewind the stream before and after
//! touching it, so a postprocessor sees the full delivered content no matter
//! what ran before it.

use crate::error::UploadError;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path};
use tracing::debug;

/// Default copy buffer used when saving a handle.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Any readable, seekable byte source that can move between threads.
pub trait ByteStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteStream for T {}

/// Accept `name` only if it is a single normal path component, so joining it
/// onto a directory cannot leave that directory.
///
/// Absolute names, `..`, `.`, and anything containing `/` or `\` are rejected.
pub fn plain_file_name(name: &str) -> Result<&str, UploadError> {
    let mut parts = Path::new(name).components();
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(UploadError::new(format!("{name:?} is not a plain file name"))),
    }
}

/// An uploaded file: a name plus a byte stream.
pub struct FileHandle {
    name: String,
    content_type: Option<String>,
    stream: Box<dyn ByteStream>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, stream: impl ByteStream + 'static) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            stream: Box::new(stream),
        }
    }

    /// Build a handle over an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, Cursor::new(bytes.into()))
    }

    /// Open a file on disk; the handle is named after its final path component.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, File::open(path)?))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Lowercased extension of the name, without the leading dot.
    ///
    /// Dot-files such as `.bashrc` have no extension.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn stream_mut(&mut self) -> &mut dyn ByteStream {
        self.stream.as_mut()
    }

    /// Swap in a new stream, returning the old one.
    pub fn replace_stream(&mut self, stream: impl ByteStream + 'static) -> Box<dyn ByteStream> {
        std::mem::replace(&mut self.stream, Box::new(stream))
    }

    /// Replace the content with an in-memory buffer.
    pub fn replace_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
        self.replace_stream(Cursor::new(bytes.into()));
    }

    /// Total stream length in bytes. The current position is preserved.
    pub fn len(&mut self) -> io::Result<u64> {
        let pos = self.stream.stream_position()?;
        let len = self.stream.seek(SeekFrom::End(0))?;
        self.stream.seek(SeekFrom::Start(pos))?;
        Ok(len)
    }

    pub fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read the whole content, leaving the stream rewound.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.stream.rewind()?;
        let mut buf = Vec::new();
        self.stream.read_to_end(&mut buf)?;
        self.stream.rewind()?;
        Ok(buf)
    }

    /// Copy the whole content into `dst`, returning the number of bytes written.
    pub fn save_to<W: Write + ?Sized>(&mut self, dst: &mut W, buffer_size: usize) -> io::Result<u64> {
        self.stream.rewind()?;
        let mut writer = BufWriter::with_capacity(buffer_size.max(1), dst);
        let written = io::copy(&mut self.stream, &mut writer)?;
        writer.flush()?;
        self.stream.rewind()?;
        debug!("Saved '{}' → {} bytes", self.name, written);
        Ok(written)
    }

    /// Save to `path` atomically: the data lands in a temp file next to the
    /// target and is renamed over it once complete.
    pub fn save_as(&mut self, path: impl AsRef<Path>, buffer_size: usize) -> io::Result<u64> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        let written = self.save_to(tmp.as_file_mut(), buffer_size)?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("Persisted '{}' to {}", self.name, path.display());
        Ok(written)
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("stream", &"<dyn ByteStream>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_only() {
        assert_eq!(plain_file_name("report.pdf"), Ok("report.pdf"));
        assert_eq!(plain_file_name(".bashrc"), Ok(".bashrc"));
        for bad in ["", ".", "..", "../x.txt", "/etc/passwd", "a/b.txt", "a\\b.txt", "dir/"] {
            let err = plain_file_name(bad).unwrap_err();
            assert!(err.to_string().contains("not a plain file name"), "{bad}: {err}");
        }
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(FileHandle::from_bytes("photo.JPG", b"").extension().as_deref(), Some("jpg"));
        assert_eq!(FileHandle::from_bytes("a.tar.gz", b"").extension().as_deref(), Some("gz"));
        assert_eq!(FileHandle::from_bytes("README", b"").extension(), None);
        assert_eq!(FileHandle::from_bytes(".bashrc", b"").extension(), None);
    }

    #[test]
    fn len_preserves_position() {
        let mut fh = FileHandle::from_bytes("a.txt", b"hello");
        fh.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(fh.len().unwrap(), 5);
        assert_eq!(fh.stream_position().unwrap(), 2);
    }

    #[test]
    fn save_to_copies_everything_and_rewinds() {
        let mut fh = FileHandle::from_bytes("a.txt", b"hello world");
        let mut sink = Vec::new();
        fh.read_exact(&mut [0u8; 3]).unwrap();
        assert_eq!(fh.save_to(&mut sink, 1).unwrap(), 11);
        assert_eq!(sink, b"hello world");
        assert_eq!(fh.read_all().unwrap(), b"hello world");
    }

    #[test]
    fn save_as_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.txt");
        let mut fh = FileHandle::from_bytes("a.txt", b"data");
        fh.save_as(&target, DEFAULT_BUFFER_SIZE).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"data");
    }

    #[test]
    fn replace_bytes_swaps_content() {
        let mut fh = FileHandle::from_bytes("a.txt", b"old");
        fh.replace_bytes(b"new".to_vec());
        assert_eq!(fh.read_all().unwrap(), b"new");
    }
}
