#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

//! Overlapped write checker on Linux kernel AIO
//!
//! Writes a deterministic pattern into a file as concurrent, positional
//! [Linux kernel-level AIO](http://lse.sourceforge.net/io/aio.html) writes,
//! then reads the file back sequentially and verifies every byte. Intended
//! for filesystems that acknowledge writes before the data is durable
//! (FUSE drivers backed by remote stores, network mounts), where a settle
//! delay may be needed between writing and reading back.
//!
//! Kernel AIO, unlike the [Posix AIO library](http://man7.org/linux/man-pages/man7/aio.7.html),
//! does not use a pool of userland threads: requests are queued by
//! `io_submit` and their completions are signalled through an eventfd,
//! which is driven by the tokio reactor.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use aio_write_verify::{run_check, CheckConfig, Verification};
//!
//! # async fn check() -> Result<(), aio_write_verify::CheckError> {
//! let verification = run_check(Path::new("/mnt/cloud"), &CheckConfig::default()).await?;
//! assert_eq!(Verification::Success, verification);
//! # Ok(())
//! # }
//! ```

pub use buffer::{AlignedBuf, BufferError};
pub use checker::{read_back, run_check, verify, verify_file, Checker, Verification};
pub use chunk::{Chunk, ChunkPlan};
pub use commands::WriteCommand;
pub use config::{
    CheckConfig, ConfigError, FailurePolicy, RunConfig, DEFAULT_MAX_IN_FLIGHT, DIRECT_IO_ALIGNMENT,
};
pub use context::{aio_context, AioContext, AioContextHandle};
pub use errors::{CheckError, ContextError, IoOp, SubmitError};
pub use eventfd::{EventFd, EventFdError};
pub use flags::WriteFlags;
pub use fs::{AioFile, AioOpenMode, AioOpenOptionsExt};
pub use runner::{run_iterations, run_iterations_with, RunReport};
pub use wait_future::WriteCompletion;

mod aio;
mod buffer;
mod checker;
mod chunk;
pub mod cli;
mod commands;
mod config;
mod context;
mod errors;
mod eventfd;
mod flags;
mod fs;
pub mod logging;
pub mod pattern;
mod runner;
mod slots;
mod wait_future;

type AioResult = i64;
