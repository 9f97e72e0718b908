use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::{ready, Future};

use crate::context::AioContextInner;
use crate::errors::SubmitError;
use crate::slots::Slot;
use crate::AioResult;

/// Completion of one submitted request. Owns the slot until the kernel
/// result is received.
pub(crate) struct AioWaitFuture {
    rx: oneshot::Receiver<AioResult>,
    inner_context: Arc<AioContextInner>,
    slot: Option<Box<Slot>>,
}

impl AioWaitFuture {
    pub fn new(
        inner_context: &Arc<AioContextInner>,
        rx: oneshot::Receiver<AioResult>,
        slot: Box<Slot>,
    ) -> Self {
        AioWaitFuture {
            rx,
            inner_context: inner_context.clone(),
            slot: Some(slot),
        }
    }
}

impl Future for AioWaitFuture {
    type Output = Result<AioResult, SubmitError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let res = ready!(Pin::new(&mut self.rx).poll(cx));

        match res {
            Ok(code) => {
                if let Some(slot) = self.slot.take() {
                    self.inner_context.release_slot(slot);
                }
                Poll::Ready(Ok(code))
            }
            // the sender lives in the slot, which we own; only a torn-down
            // context can drop it
            Err(oneshot::Canceled) => Poll::Ready(Err(SubmitError::Stopped)),
        }
    }
}

impl Drop for AioWaitFuture {
    fn drop(&mut self) {
        let slot = match self.slot.take() {
            Some(slot) => slot,
            None => return,
        };

        // Hold the pool lock while deciding, so the reaper can't look for
        // the slot in the orphaned list before it gets there.
        let mut slots = self.inner_context.slots.lock();

        self.rx.close();

        if let Ok(Some(_)) = self.rx.try_recv() {
            // completed, but nobody consumed the result
            slot.release_buffer();
            slots.put_back(slot);
            drop(slots);
            self.inner_context.capacity.release(1);
        } else {
            slots.orphan(slot);
        }
    }
}

/// Write accepted by the kernel. Resolves to the number of bytes written.
///
/// Dropping it doesn't cancel the write; the slot and the buffer stay
/// reserved until the kernel reports completion.
pub struct WriteCompletion {
    wait: AioWaitFuture,
}

impl WriteCompletion {
    pub(crate) fn new(wait: AioWaitFuture) -> Self {
        WriteCompletion { wait }
    }
}

impl fmt::Debug for WriteCompletion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WriteCompletion")
            .field("pending", &self.wait.slot.is_some())
            .finish()
    }
}

impl Future for WriteCompletion {
    type Output = Result<u64, SubmitError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let code = ready!(Pin::new(&mut self.wait).poll(cx))?;

        if code < 0 {
            Poll::Ready(Err(SubmitError::BadResult(io::Error::from_raw_os_error(
                -code as i32,
            ))))
        } else {
            Poll::Ready(Ok(code as u64))
        }
    }
}
