use std::cell::UnsafeCell;
use std::sync::Arc;
use std::{fmt, io};

use memmap::MmapMut;
use thiserror::Error;

/// Error during [`AlignedBuf`] creation
///
/// [`AlignedBuf`]: struct.AlignedBuf.html
#[derive(Error, Debug)]
pub enum BufferError {
    /// Zero-sized buffers can't be mapped
    #[error("buffer size must be positive")]
    Empty,

    /// Error in `mmap` invocation
    #[error("map_anon error: `{0}`")]
    MapAnon(#[from] io::Error),

    /// Error in `mlock` invocation
    #[error("mlock error: `{0}`")]
    MemLock(#[from] region::Error),
}

struct AlignedBufInner {
    // field order matters: unlock before unmapping
    _mlock_guard: Option<region::LockGuard>,
    bytes: MmapMut,
}

/// Page-aligned anonymous mapping used as the source of AIO writes.
///
/// Page alignment makes it valid for `O_DIRECT` files. The mapping stays
/// alive while any write referencing it is still in flight, even if the
/// `AlignedBuf` itself is dropped.
pub struct AlignedBuf {
    inner: Arc<UnsafeCell<AlignedBufInner>>,
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("size", &self.size())
            .field("locked", &self.is_locked())
            .finish()
    }
}

pub(crate) struct LifetimeExtender {
    _inner: Arc<UnsafeCell<AlignedBufInner>>,
}

impl fmt::Debug for LifetimeExtender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LifetimeExtender").finish()
    }
}

impl AlignedBuf {
    /// Map a zeroed buffer of `size` bytes
    pub fn with_size(size: usize) -> Result<AlignedBuf, BufferError> {
        Self::map(size, false)
    }

    /// Map a zeroed buffer of `size` bytes and lock it to RAM, so it can't
    /// be paged out while writes are in flight. Subject to `RLIMIT_MEMLOCK`.
    pub fn locked(size: usize) -> Result<AlignedBuf, BufferError> {
        Self::map(size, true)
    }

    fn map(size: usize, lock: bool) -> Result<AlignedBuf, BufferError> {
        if size == 0 {
            return Err(BufferError::Empty);
        }

        let bytes = MmapMut::map_anon(size)?;
        let mlock_guard = if lock {
            Some(region::lock(bytes.as_ptr(), size)?)
        } else {
            None
        };

        Ok(AlignedBuf {
            inner: Arc::new(UnsafeCell::new(AlignedBufInner {
                _mlock_guard: mlock_guard,
                bytes,
            })),
        })
    }

    /// Buffer length in bytes
    pub fn size(&self) -> usize {
        self.inner().bytes.len()
    }

    /// Whether the buffer is locked to RAM
    pub fn is_locked(&self) -> bool {
        self.inner()._mlock_guard.is_some()
    }

    fn inner(&self) -> &AlignedBufInner {
        unsafe { &*self.inner.get() }
    }

    pub(crate) fn aio_addr_and_len(&self) -> (u64, u64) {
        let bytes = &self.inner().bytes;
        (bytes.as_ptr() as usize as u64, bytes.len() as u64)
    }

    /// Handle, which prevents the mapping from being released while a
    /// request is in flight
    pub(crate) fn lifetime_extender(&self) -> LifetimeExtender {
        LifetimeExtender {
            _inner: self.inner.clone(),
        }
    }
}

impl AsRef<[u8]> for AlignedBuf {
    fn as_ref(&self) -> &[u8] {
        self.inner().bytes.as_ref()
    }
}

impl AsMut<[u8]> for AlignedBuf {
    fn as_mut(&mut self) -> &mut [u8] {
        let inner = unsafe { &mut *self.inner.get() };
        inner.bytes.as_mut()
    }
}

unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

unsafe impl Send for LifetimeExtender {}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn page_aligned_and_zeroed() {
        let buf = AlignedBuf::with_size(10_000).unwrap();
        let (addr, len) = buf.aio_addr_and_len();

        assert_eq!(0, addr % 4096);
        assert_eq!(10_000, len);
        assert!(buf.as_ref().iter().all(|b| *b == 0));
        assert!(!buf.is_locked());
    }

    #[test]
    fn locked_small_buffer() {
        let mut buf = AlignedBuf::locked(4096).unwrap();
        buf.as_mut()[4095] = 7;

        assert!(buf.is_locked());
        assert_eq!(7, buf.as_ref()[4095]);
    }

    #[test]
    fn empty_rejected() {
        assert_matches!(AlignedBuf::with_size(0), Err(BufferError::Empty));
    }
}
