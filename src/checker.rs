//! Chunked write-verify check.
//!
//! One check writes `chunk_count` copies of a pattern buffer into a fresh
//! temporary file through concurrent AIO writes at disjoint offsets, lets
//! the file settle, reads it back sequentially and compares every byte
//! against the pattern. The temporary file is removed on every exit path.

use std::os::unix::prelude::*;
use std::path::Path;
use std::{fmt, io};

use futures::future::try_join_all;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::config::{CheckConfig, ConfigError};
use crate::errors::{CheckError, IoOp};
use crate::fs::AioFile;
use crate::pattern::{expected_byte, fill_pattern};
use crate::{aio_context, AioContext, AioContextHandle, AlignedBuf};

/// Outcome of reading the target back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Every byte matched
    Success,
    /// First byte that differs from the pattern
    Mismatch {
        /// Pattern byte
        expected: u8,
        /// Byte read back
        actual: u8,
        /// Position in the file
        offset: u64,
    },
    /// The file ended before the expected size
    ShortRead {
        /// Bytes read back
        read: u64,
        /// Bytes written
        expected: u64,
    },
}

impl Verification {
    /// Whether the check passed
    pub fn is_success(&self) -> bool {
        *self == Verification::Success
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Verification::Success => write!(f, "passed"),
            Verification::Mismatch {
                expected,
                actual,
                offset,
            } => write!(f, "expected {} was {} at {}", expected, actual, offset),
            Verification::ShortRead { read, expected } => {
                write!(f, "read only {} bytes of {}", read, expected)
            }
        }
    }
}

/// Runs checks with one AIO context, reused across calls
pub struct Checker {
    config: CheckConfig,
    aio: AioContext,
    handle: AioContextHandle,
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Checker")
            .field("config", &self.config)
            .field("aio", &self.aio)
            .finish()
    }
}

impl Checker {
    /// Validate `config` and set up the AIO context. Must be called inside
    /// a tokio runtime.
    pub fn new(config: CheckConfig) -> Result<Checker, CheckError> {
        config.validate()?;

        let (aio, handle) = aio_context(config.slots())?;

        Ok(Checker {
            config,
            aio,
            handle,
        })
    }

    /// Parameters of every check
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// AIO slots not held by a write
    pub fn available_slots(&self) -> usize {
        self.aio.available_slots()
    }

    /// Run one check against a fresh temporary file in `dir`
    pub async fn run_check(&self, dir: &Path) -> Result<Verification, CheckError> {
        let target = tempfile::Builder::new()
            .prefix("tmp")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(CheckError::io(IoOp::CreateTemp, dir))?
            .into_temp_path();

        debug!(path = %target.display(), "target created");

        self.write_chunks(&target).await?;

        if !self.config.settle_delay.is_zero() {
            info!(delay = ?self.config.settle_delay, "waiting for the file to settle");
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let verification =
            verify_file(&target, self.config.chunk_len as u64, self.config.chunk_count as u64)
                .await?;

        let path = target.to_path_buf();
        target.close().map_err(CheckError::io(IoOp::Remove, path))?;

        Ok(verification)
    }

    /// Create `path`, pre-size it and write every chunk of the pattern
    /// through AIO. Every write is submitted before this returns; whether
    /// they are also complete depends on `await_completions`.
    pub async fn write_chunks(&self, path: &Path) -> Result<(), CheckError> {
        let config = &self.config;

        let mut buffer = if config.lock_buffer {
            AlignedBuf::locked(config.chunk_len)?
        } else {
            AlignedBuf::with_size(config.chunk_len)?
        };
        fill_pattern(buffer.as_mut());

        let mut file = AioFile::create(path, config.open_mode())
            .await
            .map_err(CheckError::io(IoOp::OpenWrite, path))?;

        file.set_len(config.total_len())
            .await
            .map_err(CheckError::io(IoOp::SetLen, path))?;

        if config.await_completions {
            let writes = config
                .plan()
                .chunks()
                .map(|chunk| self.write_chunk(&file, &buffer, chunk));

            try_join_all(writes).await?;

            debug!(chunks = config.chunk_count, "all writes completed");
        } else {
            for chunk in config.plan().chunks() {
                let completion = file
                    .start_write_at(&self.handle, chunk.offset, &buffer, config.write_flags)
                    .await
                    .map_err(|source| CheckError::Submit {
                        chunk: chunk.index,
                        source,
                    })?;

                tokio::spawn(async move {
                    match completion.await {
                        Ok(written) if written == chunk.len => {
                            debug!(chunk = chunk.index, "write completed");
                        }
                        Ok(written) => {
                            warn!(chunk = chunk.index, written, expected = chunk.len, "incomplete write");
                        }
                        Err(e) => {
                            warn!(chunk = chunk.index, "write failed: {}", e);
                        }
                    }
                });
            }

            debug!(chunks = config.chunk_count, "writes submitted without waiting");
        }

        Ok(())
    }

    async fn write_chunk(
        &self,
        file: &AioFile,
        buffer: &AlignedBuf,
        chunk: Chunk,
    ) -> Result<(), CheckError> {
        let written = file
            .write_at(&self.handle, chunk.offset, buffer, self.config.write_flags)
            .await
            .map_err(|source| CheckError::Submit {
                chunk: chunk.index,
                source,
            })?;

        if written != chunk.len {
            return Err(CheckError::IncompleteWrite {
                chunk: chunk.index,
                written,
                expected: chunk.len,
            });
        }

        debug!(chunk = chunk.index, offset = chunk.offset, "write completed");

        Ok(())
    }

    /// Wait for outstanding writes and shut the AIO context down
    pub async fn close(self) {
        self.aio.close().await
    }
}

/// Run a single check in `dir` with a dedicated AIO context
pub async fn run_check(dir: &Path, config: &CheckConfig) -> Result<Verification, CheckError> {
    let checker = Checker::new(config.clone())?;
    let result = checker.run_check(dir).await;
    checker.close().await;

    result
}

/// Read `path` and verify it holds `chunk_count` copies of the pattern
pub async fn verify_file(
    path: &Path,
    chunk_len: u64,
    chunk_count: u64,
) -> Result<Verification, CheckError> {
    let expected_total = chunk_len
        .checked_mul(chunk_count)
        .ok_or(ConfigError::TooLarge {
            chunk_len: chunk_len as usize,
            chunk_count: chunk_count as usize,
        })?;
    let data = read_back(path, expected_total).await?;

    Ok(verify(&data, chunk_len, expected_total))
}

/// Read `path` sequentially until end of file or `expected_total` bytes,
/// whichever comes first. The result is truncated to the bytes actually
/// read.
pub async fn read_back(path: &Path, expected_total: u64) -> Result<Vec<u8>, CheckError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(CheckError::io(IoOp::OpenRead, path))?;

    advise_sequential(&file).map_err(CheckError::io(IoOp::Advise, path))?;

    let mut data = vec![0u8; expected_total as usize];
    let mut pos = 0;

    while pos < data.len() {
        let read = file
            .read(&mut data[pos..])
            .await
            .map_err(CheckError::io(IoOp::Read, path))?;

        if read == 0 {
            break;
        }

        pos += read;
    }

    data.truncate(pos);

    Ok(data)
}

fn advise_sequential(file: &impl AsRawFd) -> io::Result<()> {
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL) };

    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }

    Ok(())
}

/// Compare `data` against the pattern of `chunk_len`-sized chunks
pub fn verify(data: &[u8], chunk_len: u64, expected_total: u64) -> Verification {
    if data.len() as u64 != expected_total {
        return Verification::ShortRead {
            read: data.len() as u64,
            expected: expected_total,
        };
    }

    let mismatch = data
        .iter()
        .enumerate()
        .map(|(offset, actual)| (offset as u64, *actual))
        .find(|&(offset, actual)| actual != expected_byte(offset, chunk_len));

    match mismatch {
        Some((offset, actual)) => Verification::Mismatch {
            expected: expected_byte(offset, chunk_len),
            actual,
            offset,
        },
        None => Verification::Success,
    }
}
