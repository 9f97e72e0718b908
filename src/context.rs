use std::os::unix::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use std::{fmt, io, ptr};

use futures::channel::oneshot;
use futures::{pin_mut, select, FutureExt, StreamExt};
use futures_intrusive::sync::Semaphore;
use parking_lot::Mutex;
use tokio::task;
use tracing::{debug, error, trace};

use crate::errors::{ContextError, SubmitError};
use crate::eventfd::{EventFd, EventFdError};
use crate::slots::{Slot, SlotPool};
use crate::wait_future::{AioWaitFuture, WriteCompletion};
use crate::{aio, WriteCommand};

pub(crate) struct AioContextInner {
    context: aio::aio_context_t,
    eventfd: RawFd,
    num_slots: usize,
    pub(crate) capacity: Semaphore,
    pub(crate) slots: Mutex<SlotPool>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    closing: AtomicBool,
}

impl AioContextInner {
    fn new(
        eventfd: RawFd,
        nr: usize,
        stop_tx: oneshot::Sender<()>,
    ) -> Result<AioContextInner, ContextError> {
        let mut context: aio::aio_context_t = 0;

        if unsafe { aio::io_setup(nr as libc::c_long, &mut context) } != 0 {
            return Err(ContextError::IoSetup(io::Error::last_os_error()));
        }

        Ok(AioContextInner {
            context,
            slots: Mutex::new(SlotPool::new(nr)),
            capacity: Semaphore::new(true, nr),
            eventfd,
            stop_tx: Mutex::new(Some(stop_tx)),
            closing: AtomicBool::new(false),
            num_slots: nr,
        })
    }

    /// Return a slot whose waiter already consumed the result
    pub(crate) fn release_slot(&self, slot: Box<Slot>) {
        slot.release_buffer();
        self.slots.lock().put_back(slot);
        self.capacity.release(1);
    }
}

impl Drop for AioContextInner {
    fn drop(&mut self) {
        let result = unsafe { aio::io_destroy(self.context) };
        if result != 0 {
            error!("io_destroy failed: {}", io::Error::last_os_error());
        }
    }
}

/// Running kernel AIO context. Must be kept while AIO is in use.
///
/// Call [`close`] to shut it down gracefully: it waits until every
/// in-flight write, including the ones nobody awaits anymore, is completed
/// by the kernel. If the context is just dropped, the reaper is stopped
/// and pending futures never resolve.
///
/// [`close`]: struct.AioContext.html#method.close
pub struct AioContext {
    inner: Arc<AioContextInner>,
}

impl fmt::Debug for AioContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AioContext")
            .field("num_slots", &self.inner.num_slots)
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

/// Cloneable handle to [`AioContext`], required to submit writes
///
/// [`AioContext`]: struct.AioContext.html
#[derive(Clone)]
pub struct AioContextHandle {
    inner: Weak<AioContextInner>,
}

impl fmt::Debug for AioContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AioContextHandle")
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

impl AioContextHandle {
    /// Number of free slots, or `None` if the context is gone
    pub fn available_slots(&self) -> Option<usize> {
        self.inner.upgrade().map(|i| i.capacity.permits())
    }

    /// Submit a write and wait for the kernel to complete it. Resolves to
    /// the number of bytes written.
    ///
    /// The write is submitted on the first poll. Dropping the future after
    /// that doesn't cancel the write: the slot and the buffer stay
    /// reserved until the kernel reports completion.
    pub async fn submit(
        &self,
        fd: &impl AsRawFd,
        command: WriteCommand<'_>,
    ) -> Result<u64, SubmitError> {
        self.start(fd, command).await?.await
    }

    /// Submit a write and return as soon as the kernel accepted it. Waits
    /// only for a free slot. The returned [`WriteCompletion`] borrows
    /// neither `fd` nor the buffer, so it may be moved to another task.
    ///
    /// Fails with [`SubmitError::Stopped`] once the context is closing.
    ///
    /// [`WriteCompletion`]: struct.WriteCompletion.html
    /// [`SubmitError::Stopped`]: enum.SubmitError.html#variant.Stopped
    pub async fn start(
        &self,
        fd: &impl AsRawFd,
        command: WriteCommand<'_>,
    ) -> Result<WriteCompletion, SubmitError> {
        let inner_context = self.inner.upgrade().ok_or(SubmitError::Stopped)?;

        if inner_context.closing.load(Ordering::Acquire) {
            return Err(SubmitError::Stopped);
        }

        inner_context.capacity.acquire(1).await.disarm();

        if inner_context.closing.load(Ordering::Acquire) {
            inner_context.capacity.release(1);
            return Err(SubmitError::Stopped);
        }

        let slot = inner_context.slots.lock().take();
        let mut slot = match slot {
            Some(slot) => slot,
            None => {
                inner_context.capacity.release(1);
                return Err(SubmitError::Stopped);
            }
        };

        let (tx, rx) = oneshot::channel();

        let submitted = {
            let mut iocbs = [slot.prepare(inner_context.eventfd, fd.as_raw_fd(), &command, tx)];

            unsafe { aio::io_submit(inner_context.context, 1, iocbs.as_mut_ptr()) }
        };

        if submitted != 1 {
            let err = io::Error::last_os_error();
            inner_context.release_slot(slot);

            return Err(SubmitError::IoSubmit(err));
        }

        trace!(offset = command.offset, "write submitted");

        Ok(WriteCompletion::new(AioWaitFuture::new(
            &inner_context,
            rx,
            slot,
        )))
    }
}

/// Create a new AIO context with `nr` slots and spawn its reaper on the
/// current tokio runtime
pub fn aio_context(nr: usize) -> Result<(AioContext, AioContextHandle), ContextError> {
    let eventfd = EventFd::new()?;
    let (stop_tx, stop_rx) = oneshot::channel();

    let inner = Arc::new(AioContextInner::new(eventfd.as_raw_fd(), nr, stop_tx)?);

    let reaper = reap_completions(inner.clone(), eventfd).fuse();

    tokio::spawn(async move {
        pin_mut!(reaper);

        select! {
            res = reaper => {
                if let Err(e) = res {
                    error!("AIO reaper stopped: {}", e);
                }
            },
            _ = stop_rx.fuse() => {
                debug!("AIO reaper stopped by close");
            },
        }
    });

    let handle = AioContextHandle {
        inner: Arc::downgrade(&inner),
    };

    Ok((AioContext { inner }, handle))
}

async fn reap_completions(
    inner: Arc<AioContextInner>,
    mut eventfd: EventFd,
) -> Result<(), EventFdError> {
    let nr = inner.num_slots;
    let mut events: Vec<aio::io_event> = vec![aio::io_event::default(); nr];

    while let Some(available) = eventfd.next().await {
        let mut remaining = available? as usize;

        while remaining > 0 {
            let batch = remaining.min(nr);

            let received = unsafe {
                aio::io_getevents(
                    inner.context,
                    batch as libc::c_long,
                    batch as libc::c_long,
                    events.as_mut_ptr(),
                    ptr::null_mut(),
                )
            };

            if received < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(EventFdError::Read(err));
            }

            for event in &events[..received as usize] {
                let slot_ptr = event.data as usize as *const Slot;
                let slot = unsafe { &*slot_ptr };

                if !slot.send_to_waiter(event.res) {
                    // waiter dropped before completion; it left the slot
                    // in the orphaned list
                    slot.release_buffer();
                    let reclaimed = unsafe { inner.slots.lock().reclaim_orphan(slot_ptr) };
                    if reclaimed {
                        inner.capacity.release(1);
                    }
                }
            }

            remaining -= received as usize;
        }
    }

    Ok(())
}

impl Drop for AioContext {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.inner.stop_tx.lock().take() {
            let _ = stop_tx.send(());
        }
    }
}

impl AioContext {
    /// Number of free slots
    pub fn available_slots(&self) -> usize {
        self.inner.capacity.permits()
    }

    /// Total number of slots
    pub fn num_slots(&self) -> usize {
        self.inner.num_slots
    }

    /// New handle to this context
    pub fn handle(&self) -> AioContextHandle {
        AioContextHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Refuse new writes, wait for every in-flight write to complete, stop
    /// the reaper and wait for the remaining users of the context to finish.
    pub async fn close(self) {
        self.inner.closing.store(true, Ordering::Release);

        while self.available_slots() != self.inner.num_slots {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        if let Some(stop_tx) = self.inner.stop_tx.lock().take() {
            let _ = stop_tx.send(());
        }

        while Arc::strong_count(&self.inner) != 1 {
            task::yield_now().await;
        }
    }
}
