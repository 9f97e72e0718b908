#![allow(non_camel_case_types)]
#![allow(dead_code)]

//! Kernel AIO ABI, as laid out in `include/uapi/linux/aio_abi.h`, and thin
//! wrappers over the raw syscalls. glibc doesn't export these, so they go
//! through `syscall(2)` directly.

pub type aio_context_t = libc::c_ulong;

pub const IOCB_CMD_PWRITE: u16 = 1;

/// `aio_resfd` is valid; the kernel signals it on completion
pub const IOCB_FLAG_RESFD: u32 = 1 << 0;

/* per-IO O_DSYNC */
pub const RWF_DSYNC: i32 = 0x2;

/* per-IO O_SYNC */
pub const RWF_SYNC: i32 = 0x4;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct iocb {
    pub aio_data: u64,

    #[cfg(target_endian = "little")]
    pub aio_key: u32,
    #[cfg(target_endian = "little")]
    pub aio_rw_flags: i32,

    #[cfg(target_endian = "big")]
    pub aio_rw_flags: i32,
    #[cfg(target_endian = "big")]
    pub aio_key: u32,

    pub aio_lio_opcode: u16,
    pub aio_reqprio: i16,
    pub aio_fildes: u32,

    pub aio_buf: u64,
    pub aio_nbytes: u64,
    pub aio_offset: i64,

    pub aio_reserved2: u64,

    pub aio_flags: u32,
    pub aio_resfd: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct io_event {
    pub data: u64,
    pub obj: u64,
    pub res: i64,
    pub res2: i64,
}

// See [io_setup(2)](http://man7.org/linux/man-pages/man2/io_setup.2.html)
#[inline(always)]
pub unsafe fn io_setup(nr: libc::c_long, ctxp: *mut aio_context_t) -> libc::c_long {
    libc::syscall(libc::SYS_io_setup, nr, ctxp)
}

// See [io_destroy(2)](http://man7.org/linux/man-pages/man2/io_destroy.2.html)
#[inline(always)]
pub unsafe fn io_destroy(ctx: aio_context_t) -> libc::c_long {
    libc::syscall(libc::SYS_io_destroy, ctx)
}

// See [io_submit(2)](http://man7.org/linux/man-pages/man2/io_submit.2.html)
#[inline(always)]
pub unsafe fn io_submit(
    ctx: aio_context_t,
    nr: libc::c_long,
    iocbpp: *mut *mut iocb,
) -> libc::c_long {
    libc::syscall(libc::SYS_io_submit, ctx, nr, iocbpp)
}

// See [io_getevents(2)](http://man7.org/linux/man-pages/man2/io_getevents.2.html)
#[inline(always)]
pub unsafe fn io_getevents(
    ctx: aio_context_t,
    min_nr: libc::c_long,
    max_nr: libc::c_long,
    events: *mut io_event,
    timeout: *mut libc::timespec,
) -> libc::c_long {
    libc::syscall(libc::SYS_io_getevents, ctx, min_nr, max_nr, events, timeout)
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    #[test]
    fn abi_sizes() {
        assert_eq!(64, mem::size_of::<iocb>());
        assert_eq!(32, mem::size_of::<io_event>());
    }
}
