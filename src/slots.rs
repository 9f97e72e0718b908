use std::mem;
use std::os::unix::prelude::*;

use futures::channel::oneshot;
use intrusive_collections::linked_list::AtomicLink;
use intrusive_collections::{intrusive_adapter, LinkedList};
use parking_lot::Mutex;

use crate::buffer::LifetimeExtender;
use crate::{aio, AioResult, WriteCommand};

#[derive(Debug)]
pub(crate) struct SlotInner {
    pub iocb: aio::iocb,
    pub completed_tx: Option<oneshot::Sender<AioResult>>,
    pub buf_lifetime_extender: Option<LifetimeExtender>,
}

impl SlotInner {
    pub(crate) fn take_buf_lifetime_extender(&mut self) -> Option<LifetimeExtender> {
        self.buf_lifetime_extender.take()
    }
}

/// Pre-allocated kernel request. Its address is stored in `aio_data`,
/// so it must not move while the kernel owns it; hence always boxed.
#[derive(Debug)]
pub(crate) struct Slot {
    link: AtomicLink,
    pub(crate) inner: Mutex<SlotInner>,
}

impl Slot {
    fn new() -> Box<Slot> {
        Box::new(Slot {
            link: AtomicLink::new(),
            inner: Mutex::new(SlotInner {
                iocb: aio::iocb::default(),
                completed_tx: None,
                buf_lifetime_extender: None,
            }),
        })
    }

    pub fn aio_addr(&self) -> u64 {
        self as *const Slot as usize as u64
    }

    /// Hand the kernel result to the waiting future. Returns `false` if the
    /// future is gone.
    pub fn send_to_waiter(&self, res: AioResult) -> bool {
        match self.inner.lock().completed_tx.take() {
            Some(tx) => tx.send(res).is_ok(),
            None => false,
        }
    }

    /// Fill the iocb for `command` and return a pointer suitable for
    /// `io_submit`
    pub fn prepare(
        &mut self,
        eventfd: RawFd,
        fd: RawFd,
        command: &WriteCommand<'_>,
        tx: oneshot::Sender<AioResult>,
    ) -> *mut aio::iocb {
        let aio_data = self.aio_addr();
        let inner = self.inner.get_mut();

        let (addr, len) = command.buffer_addr();

        inner.iocb = aio::iocb {
            aio_data,
            aio_rw_flags: command.flags.bits(),
            aio_lio_opcode: command.opcode(),
            aio_fildes: fd as u32,
            aio_buf: addr,
            aio_nbytes: len,
            aio_offset: command.offset as i64,
            aio_flags: aio::IOCB_FLAG_RESFD,
            aio_resfd: eventfd as u32,
            ..aio::iocb::default()
        };

        inner.buf_lifetime_extender = Some(command.buffer_lifetime_extender());
        inner.completed_tx = Some(tx);

        &mut inner.iocb as *mut aio::iocb
    }

    /// Drop the buffer reference held for the kernel
    pub fn release_buffer(&self) {
        mem::drop(self.inner.lock().take_buf_lifetime_extender());
    }
}

intrusive_adapter!(SlotAdapter = Box<Slot>: Slot { link: AtomicLink });

/// Free slots plus the ones whose futures were dropped before the kernel
/// completed them ("orphans")
pub(crate) struct SlotPool {
    ready: LinkedList<SlotAdapter>,
    orphaned: LinkedList<SlotAdapter>,
}

impl SlotPool {
    pub fn new(nr: usize) -> SlotPool {
        let mut ready = LinkedList::new(SlotAdapter::new());

        for _ in 0..nr {
            ready.push_back(Slot::new());
        }

        SlotPool {
            ready,
            orphaned: LinkedList::new(SlotAdapter::new()),
        }
    }

    /// Take a free slot. Callers hold a capacity permit, so one is always
    /// available.
    pub fn take(&mut self) -> Option<Box<Slot>> {
        self.ready.pop_front()
    }

    pub fn put_back(&mut self, slot: Box<Slot>) {
        self.ready.push_back(slot);
    }

    pub fn orphan(&mut self, slot: Box<Slot>) {
        self.orphaned.push_back(slot);
    }

    /// Move an orphaned slot back to the free list once the kernel is done
    /// with it.
    ///
    /// # Safety
    ///
    /// `slot` must point to a slot currently in the orphaned list.
    pub unsafe fn reclaim_orphan(&mut self, slot: *const Slot) -> bool {
        match self.orphaned.cursor_mut_from_ptr(slot).remove() {
            Some(slot) => {
                self.ready.push_back(slot);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn ready_len(&self) -> usize {
        self.ready.iter().count()
    }
}
