use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::fmt;

use futures::{ready, Stream};
use thiserror::Error;
use tokio::io::unix::AsyncFd;

/// [`EventFd`] error
///
/// [`EventFd`]: struct.EventFd.html
#[derive(Error, Debug)]
pub enum EventFdError {
    /// `eventfd(2)` failed
    #[error("error creating EventFd: `{0}`")]
    Create(#[source] io::Error),
    /// Registration with the tokio reactor failed
    #[error("poll error: `{0}`")]
    Poll(#[source] io::Error),
    /// Reading the counter failed
    #[error("read error: `{0}`")]
    Read(#[source] io::Error),
}

/// Non-blocking eventfd the kernel bumps once per completed AIO request.
///
/// As a [`Stream`] it yields the counter value accumulated since the last
/// read, i.e. the number of completions ready to be collected.
///
/// [`Stream`]: ../futures/stream/trait.Stream.html
pub struct EventFd {
    evented: AsyncFd<File>,
}

impl fmt::Debug for EventFd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventFd")
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}

impl AsRawFd for EventFd {
    fn as_raw_fd(&self) -> RawFd {
        self.evented.get_ref().as_raw_fd()
    }
}

impl EventFd {
    /// Create a counting (non-semaphore) eventfd. Must be called inside a
    /// tokio runtime.
    pub fn new() -> Result<EventFd, EventFdError> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };

        if fd < 0 {
            return Err(EventFdError::Create(io::Error::last_os_error()));
        }

        Ok(EventFd {
            evented: AsyncFd::new(unsafe { File::from_raw_fd(fd) }).map_err(EventFdError::Poll)?,
        })
    }
}

impl Stream for EventFd {
    type Item = Result<u64, EventFdError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let mut read_ready =
                ready!(self.evented.poll_read_ready_mut(cx)).map_err(EventFdError::Poll)?;

            let mut counter = [0u8; 8];

            match read_ready.get_inner_mut().read(&mut counter) {
                Ok(8) => return Poll::Ready(Some(Ok(u64::from_ne_bytes(counter)))),
                Ok(n) => {
                    return Poll::Ready(Some(Err(EventFdError::Read(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("eventfd read transferred {} bytes instead of 8", n),
                    )))))
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    read_ready.clear_ready();
                }
                Err(e) => return Poll::Ready(Some(Err(EventFdError::Read(e)))),
            }
        }
    }
}
