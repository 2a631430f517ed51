use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::provider::{BusySnafu, FaultExt, ProviderError};

/// A scoped, shared read stream. Whatever the provider acquired to open it is
/// released when the stream is dropped.
pub struct InputStream {
    inner: Box<dyn Read + Send>,
}

impl InputStream {
    pub fn new(inner: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream").finish_non_exhaustive()
    }
}

/// A scoped, exclusive write stream. Content is committed on `flush` or drop;
/// the exclusive hold is released on drop.
pub struct OutputStream {
    inner: Box<dyn Write + Send>,
}

impl OutputStream {
    pub fn new(inner: impl Write + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}

/// A disk file holding an advisory `fs2` lock for as long as it lives.
struct LockedFile {
    file: File,
}

impl LockedFile {
    fn shared(path: &Path) -> Result<Self, ProviderError> {
        let file = File::open(path).fault(path)?;
        try_lock(&file, path, "writing", FileExt::try_lock_shared)?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> Result<Self, ProviderError> {
        // Truncating before the lock is held would clobber a concurrent reader.
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .fault(path)?;
        try_lock(&file, path, "reading or writing", FileExt::try_lock_exclusive)?;
        file.set_len(0).fault(path)?;
        Ok(Self { file })
    }
}

fn try_lock(
    file: &File,
    path: &Path,
    mode: &'static str,
    lock: fn(&File) -> io::Result<()>,
) -> Result<(), ProviderError> {
    match lock(file) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
            BusySnafu { path, mode }.fail()
        }
        Err(err) => Err(ProviderError::from_io(path, err)),
    }
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LockedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LockedFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("Failed to release file lock: {}", err);
        }
    }
}

pub(crate) fn open_disk_input(path: &Path) -> Result<InputStream, ProviderError> {
    Ok(InputStream::new(LockedFile::shared(path)?))
}

pub(crate) fn open_disk_output(path: &Path) -> Result<OutputStream, ProviderError> {
    Ok(OutputStream::new(LockedFile::exclusive(path)?))
}
