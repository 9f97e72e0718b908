use std::fs::OpenOptions;
use std::io;
use std::os::unix::prelude::*;
use std::path::PathBuf;

use async_trait::async_trait;

/// Open mode flags relevant to AIO writes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AioOpenMode {
    /// Add `O_DIRECT`: writes bypass the page cache and are asynchronous
    /// in the kernel. Buffer, offset and length must be block-aligned.
    pub direct: bool,
    /// Add `O_SYNC`
    pub sync: bool,
}

impl AioOpenMode {
    fn custom_flags(&self) -> libc::c_int {
        let mut flags = 0;

        if self.direct {
            flags |= libc::O_DIRECT;
        }

        if self.sync {
            flags |= libc::O_SYNC;
        }

        flags
    }
}

/// Extension trait to [`OpenOptions`] to support opening files
/// for usage with AIO
///
/// [`OpenOptions`]: https://doc.rust-lang.org/std/fs/struct.OpenOptions.html
#[async_trait]
pub trait AioOpenOptionsExt {
    /// Opens a file at `path` with the options specified by `self`, adding
    /// the flags requested by `mode`
    ///
    /// # Errors
    /// Error codes are the same as in the tokio version
    async fn aio_open(self, path: PathBuf, mode: AioOpenMode) -> io::Result<crate::fs::AioFile>;
}

#[async_trait]
impl AioOpenOptionsExt for OpenOptions {
    async fn aio_open(mut self, path: PathBuf, mode: AioOpenMode) -> io::Result<crate::fs::AioFile> {
        self.custom_flags(mode.custom_flags());

        let tokio_file = tokio::fs::OpenOptions::from(self).open(path).await?;

        Ok(crate::fs::AioFile { inner: tokio_file })
    }
}
