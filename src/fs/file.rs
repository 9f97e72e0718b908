use std::fs::{Metadata, OpenOptions};
use std::os::unix::prelude::*;
use std::path::Path;
use std::{fmt, io};

use crate::errors::SubmitError;
use crate::fs::{AioOpenMode, AioOpenOptionsExt};
use crate::{AioContextHandle, AlignedBuf, WriteCommand, WriteCompletion, WriteFlags};

/// File whose writes go through an [`AioContextHandle`]
///
/// [`AioContextHandle`]: struct.AioContextHandle.html
pub struct AioFile {
    pub(crate) inner: tokio::fs::File,
}

impl fmt::Debug for AioFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AioFile").field("inner", &self.inner).finish()
    }
}

impl AioFile {
    /// Create the file for writing, truncating it if it exists
    pub async fn create(path: impl AsRef<Path>, mode: AioOpenMode) -> io::Result<AioFile> {
        let mut open_options = OpenOptions::new();
        open_options.write(true).truncate(true).create(true);

        open_options
            .aio_open(path.as_ref().to_path_buf(), mode)
            .await
    }

    /// Set file length. See tokio [`set_len`]
    ///
    /// [`set_len`]: https://docs.rs/tokio/1/tokio/fs/struct.File.html#method.set_len
    pub async fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.inner.set_len(size).await
    }

    /// Retrieves file metadata
    pub async fn metadata(&self) -> io::Result<Metadata> {
        self.inner.metadata().await
    }

    /// Write the whole `buffer` at `offset` through AIO. Resolves to the
    /// number of bytes the kernel reports written.
    pub async fn write_at(
        &self,
        aio_handle: &AioContextHandle,
        offset: u64,
        buffer: &AlignedBuf,
        flags: WriteFlags,
    ) -> Result<u64, SubmitError> {
        aio_handle
            .submit(
                self,
                WriteCommand {
                    offset,
                    buffer,
                    flags,
                },
            )
            .await
    }

    /// Submit a write of the whole `buffer` at `offset` without waiting for
    /// it to complete. The file may be dropped while the write is in
    /// flight; the kernel keeps its own reference.
    pub async fn start_write_at(
        &self,
        aio_handle: &AioContextHandle,
        offset: u64,
        buffer: &AlignedBuf,
        flags: WriteFlags,
    ) -> Result<WriteCompletion, SubmitError> {
        aio_handle
            .start(
                self,
                WriteCommand {
                    offset,
                    buffer,
                    flags,
                },
            )
            .await
    }
}

impl AsRawFd for AioFile {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}
