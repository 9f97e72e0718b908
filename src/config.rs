use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::chunk::ChunkPlan;
use crate::fs::AioOpenMode;
use crate::WriteFlags;

/// `O_DIRECT` transfers must be multiples of the logical block size; 512 is
/// the smallest one Linux supports
pub const DIRECT_IO_ALIGNMENT: usize = 512;

/// Slot count used when `max_in_flight` is unset and there are more chunks.
/// Each slot is one request in the kernel's `fs.aio-max-nr` budget.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 128;

/// Rejected [`CheckConfig`]
///
/// [`CheckConfig`]: struct.CheckConfig.html
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `chunk_len` is zero
    #[error("chunk length must be positive")]
    ZeroChunkLen,

    /// `chunk_count` is zero
    #[error("chunk count must be positive")]
    ZeroChunkCount,

    /// `chunk_len * chunk_count` overflows
    #[error("{chunk_count} chunks of {chunk_len} bytes overflow the file size")]
    TooLarge {
        /// Chunk length
        chunk_len: usize,
        /// Chunk count
        chunk_count: usize,
    },

    /// Direct I/O with an unaligned chunk length
    #[error("direct I/O needs chunk length aligned to 512 bytes, got {0}")]
    Unaligned(usize),

    /// `max_in_flight` of zero would never submit anything
    #[error("max in-flight writes must be positive")]
    ZeroInFlight,
}

/// Parameters of one write-verify check
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Length of every chunk, which is also the pattern buffer length
    pub chunk_len: usize,
    /// Number of chunks written concurrently
    pub chunk_count: usize,
    /// Wait between releasing the file and reading it back, for an external
    /// store to settle
    pub settle_delay: Duration,
    /// Join every write's completion before closing the file. When false,
    /// writes are fire-and-forget and only `settle_delay` separates them
    /// from the read-back.
    pub await_completions: bool,
    /// Open the target with `O_DIRECT`
    pub direct_io: bool,
    /// Open the target with `O_SYNC`
    pub sync_io: bool,
    /// Lock the pattern buffer to RAM
    pub lock_buffer: bool,
    /// Per-write flags
    pub write_flags: WriteFlags,
    /// AIO slots; defaults to `chunk_count`, capped at
    /// [`DEFAULT_MAX_IN_FLIGHT`]
    ///
    /// [`DEFAULT_MAX_IN_FLIGHT`]: constant.DEFAULT_MAX_IN_FLIGHT.html
    pub max_in_flight: Option<usize>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            chunk_len: 1 << 20,
            chunk_count: 8,
            settle_delay: Duration::from_secs(0),
            await_completions: true,
            direct_io: false,
            sync_io: false,
            lock_buffer: false,
            write_flags: WriteFlags::empty(),
            max_in_flight: None,
        }
    }
}

impl CheckConfig {
    /// Check parameter consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_len == 0 {
            return Err(ConfigError::ZeroChunkLen);
        }

        if self.chunk_count == 0 {
            return Err(ConfigError::ZeroChunkCount);
        }

        (self.chunk_len as u64)
            .checked_mul(self.chunk_count as u64)
            .filter(|total| *total <= i64::MAX as u64)
            .ok_or(ConfigError::TooLarge {
                chunk_len: self.chunk_len,
                chunk_count: self.chunk_count,
            })?;

        if self.direct_io && self.chunk_len % DIRECT_IO_ALIGNMENT != 0 {
            return Err(ConfigError::Unaligned(self.chunk_len));
        }

        if self.max_in_flight == Some(0) {
            return Err(ConfigError::ZeroInFlight);
        }

        Ok(())
    }

    /// Chunk layout of the target file
    pub fn plan(&self) -> ChunkPlan {
        ChunkPlan::new(self.chunk_len as u64, self.chunk_count as u64)
    }

    /// Expected size of the target file
    pub fn total_len(&self) -> u64 {
        self.plan().total_len()
    }

    /// Number of AIO slots to set up
    pub fn slots(&self) -> usize {
        self.max_in_flight
            .unwrap_or_else(|| self.chunk_count.min(DEFAULT_MAX_IN_FLIGHT))
    }

    pub(crate) fn open_mode(&self) -> AioOpenMode {
        AioOpenMode {
            direct: self.direct_io,
            sync: self.sync_io,
        }
    }
}

/// What the runner does after a failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure
    Abort,
    /// Run every iteration and report all failures
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Abort
    }
}

/// Parameters of a multi-iteration run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Working directory; created if missing, removed afterwards
    pub dir: PathBuf,
    /// Number of checks to run
    pub iterations: usize,
    /// Parameters of each check
    pub check: CheckConfig,
    /// Reaction to a failed check
    pub policy: FailurePolicy,
    /// Leave the working directory in place
    pub keep_dir: bool,
}

impl RunConfig {
    /// Ten iterations of the default check in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> RunConfig {
        RunConfig {
            dir: dir.into(),
            iterations: 10,
            check: CheckConfig::default(),
            policy: FailurePolicy::default(),
            keep_dir: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_is_reference_scenario() {
        let config = CheckConfig::default();

        assert_eq!(Ok(()), config.validate());
        assert_eq!(8_388_608, config.total_len());
        assert_eq!(8, config.slots());
    }

    #[test]
    fn rejects_bad_parameters() {
        let config = CheckConfig {
            chunk_len: 0,
            ..CheckConfig::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::ZeroChunkLen));

        let config = CheckConfig {
            chunk_count: 0,
            ..CheckConfig::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::ZeroChunkCount));

        let config = CheckConfig {
            chunk_len: usize::MAX,
            chunk_count: 2,
            ..CheckConfig::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::TooLarge { .. }));

        let config = CheckConfig {
            chunk_len: 1000,
            direct_io: true,
            ..CheckConfig::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::Unaligned(1000)));

        let config = CheckConfig {
            max_in_flight: Some(0),
            ..CheckConfig::default()
        };
        assert_matches!(config.validate(), Err(ConfigError::ZeroInFlight));
    }

    #[test]
    fn in_flight_override() {
        let config = CheckConfig {
            max_in_flight: Some(3),
            ..CheckConfig::default()
        };
        assert_eq!(3, config.slots());
    }

    #[test]
    fn default_slots_capped() {
        let config = CheckConfig {
            chunk_len: 1,
            chunk_count: 70_000,
            ..CheckConfig::default()
        };
        assert_eq!(DEFAULT_MAX_IN_FLIGHT, config.slots());

        let config = CheckConfig {
            max_in_flight: Some(1000),
            ..config
        };
        assert_eq!(1000, config.slots());
    }

    #[test]
    fn sync_open_mode() {
        let config = CheckConfig {
            sync_io: true,
            ..CheckConfig::default()
        };
        assert_eq!(
            AioOpenMode {
                direct: false,
                sync: true
            },
            config.open_mode()
        );
    }
}
