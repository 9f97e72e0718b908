use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::buffer::BufferError;
use crate::config::ConfigError;
use crate::eventfd::EventFdError;

/// Error of a single submitted write
#[derive(Error, Debug)]
pub enum SubmitError {
    /// AIO context was stopped
    #[error("AIO context stopped")]
    Stopped,

    /// Error from [`io_submit`]
    ///
    /// [`io_submit`]: https://manpages.debian.org/testing/manpages-dev/io_submit.2.en.html
    #[error("io_submit error: `{0}`")]
    IoSubmit(#[source] io::Error),

    /// The kernel completed the request with a negative result
    #[error("bad result: `{0}`")]
    BadResult(#[source] io::Error),
}

/// AIO context creation error
#[derive(Error, Debug)]
pub enum ContextError {
    /// Could not create [`EventFd`]
    ///
    /// [`EventFd`]: struct.EventFd.html
    #[error("eventfd error: `{0}`")]
    EventFd(#[from] EventFdError),

    /// Error from `io_setup`
    #[error("io_setup error: `{0}`")]
    IoSetup(#[from] io::Error),
}

/// Filesystem operation that failed during a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    /// Creating the temporary target file
    CreateTemp,
    /// Opening the target for asynchronous writes
    OpenWrite,
    /// Pre-sizing the target
    SetLen,
    /// Opening the target for read-back
    OpenRead,
    /// Sequential-scan hint
    Advise,
    /// Reading the target back
    Read,
    /// Removing the target after verification
    Remove,
    /// Creating the working directory
    CreateDir,
}

impl std::fmt::Display for IoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IoOp::CreateTemp => "create temp file",
            IoOp::OpenWrite => "open for write",
            IoOp::SetLen => "set length",
            IoOp::OpenRead => "open for read",
            IoOp::Advise => "fadvise",
            IoOp::Read => "read",
            IoOp::Remove => "remove",
            IoOp::CreateDir => "create directory",
        };
        f.write_str(name)
    }
}

/// Failure that prevented a check from producing a verification result
#[derive(Error, Debug)]
pub enum CheckError {
    /// Invalid check parameters
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Could not set up the AIO context
    #[error("AIO context: {0}")]
    Context(#[from] ContextError),

    /// Could not allocate the pattern buffer
    #[error("pattern buffer: {0}")]
    Buffer(#[from] BufferError),

    /// A filesystem call failed
    #[error("{op} failed for {}: {source}", .path.display())]
    Io {
        /// Failed operation
        op: IoOp,
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A chunk write failed to submit or complete
    #[error("chunk {chunk} write failed: {source}")]
    Submit {
        /// Chunk index
        chunk: u64,
        /// Underlying error
        #[source]
        source: SubmitError,
    },

    /// The kernel reported fewer bytes written than the chunk holds
    #[error("chunk {chunk} wrote only {written} bytes of {expected}")]
    IncompleteWrite {
        /// Chunk index
        chunk: u64,
        /// Bytes reported by the kernel
        written: u64,
        /// Chunk length
        expected: u64,
    },
}

impl CheckError {
    pub(crate) fn io(op: IoOp, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> CheckError {
        let path = path.into();
        move |source| CheckError::Io { op, path, source }
    }
}
