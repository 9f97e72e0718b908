//! Command-line arguments of the `aio-write-verify` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{CheckConfig, FailurePolicy, RunConfig};
use crate::WriteFlags;

/// Write a file through concurrent AIO chunks, then read it back and verify
/// every byte.
#[derive(Debug, Parser)]
#[command(name = "aio-write-verify", version, about)]
pub struct Cli {
    /// Working directory on the filesystem under test
    #[arg(default_value = "overlapped-tests")]
    pub dir: PathBuf,

    /// Number of checks to run
    #[arg(long, default_value_t = 10)]
    pub iterations: usize,

    /// Bytes per chunk
    #[arg(long, default_value_t = 1 << 20)]
    pub chunk_len: usize,

    /// Chunks written concurrently
    #[arg(long = "chunks", default_value_t = 8)]
    pub chunk_count: usize,

    /// Seconds to wait before reading the file back
    #[arg(long, default_value_t = 10)]
    pub settle_secs: u64,

    /// Don't wait for write completions; rely on the settle delay only
    #[arg(long)]
    pub fire_and_forget: bool,

    /// Open the target with O_DIRECT
    #[arg(long)]
    pub direct: bool,

    /// Complete every write with data integrity (RWF_DSYNC)
    #[arg(long)]
    pub dsync: bool,

    /// Complete every write with file integrity (RWF_SYNC)
    #[arg(long)]
    pub sync: bool,

    /// Open the target with O_SYNC
    #[arg(long)]
    pub open_sync: bool,

    /// Lock the pattern buffer to RAM
    #[arg(long)]
    pub lock_buffer: bool,

    /// Run every iteration even after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Don't remove the working directory afterwards
    #[arg(long)]
    pub keep_dir: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parameters of the run described by the arguments
    pub fn run_config(&self) -> RunConfig {
        let mut write_flags = WriteFlags::empty();
        write_flags.set(WriteFlags::DSYNC, self.dsync);
        write_flags.set(WriteFlags::SYNC, self.sync);

        RunConfig {
            dir: self.dir.clone(),
            iterations: self.iterations,
            check: CheckConfig {
                chunk_len: self.chunk_len,
                chunk_count: self.chunk_count,
                settle_delay: Duration::from_secs(self.settle_secs),
                await_completions: !self.fire_and_forget,
                direct_io: self.direct,
                sync_io: self.open_sync,
                lock_buffer: self.lock_buffer,
                write_flags,
                max_in_flight: None,
            },
            policy: if self.keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
            keep_dir: self.keep_dir,
        }
    }
}
