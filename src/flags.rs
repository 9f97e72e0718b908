use bitflags::bitflags;

use crate::aio;

bitflags! {
    /// Per-write flags, passed to the kernel in `aio_rw_flags`.
    /// See [`io_submit`](http://man7.org/linux/man-pages/man2/io_submit.2.html)
    pub struct WriteFlags: i32 {
        /// Write operation complete according to requirement of
        /// synchronized I/O data integrity.  See the description
        /// of the flag of the same name in [`pwritev2(2)`] as well the
        /// description of `O_DSYNC` in [`open(2)`].
        ///
        /// [`pwritev2(2)`]: http://man7.org/linux/man-pages/man2/pwritev2.2.html
        /// [`open(2)`]: http://man7.org/linux/man-pages/man2/open.2.html
        const DSYNC = aio::RWF_DSYNC;

        /// Write operation complete according to requirement of
        /// synchronized I/O file integrity.  See the description
        /// of the flag of the same name in [`pwritev2(2)`] as well the
        /// description of `O_SYNC` in [`open(2)`].
        ///
        /// [`pwritev2(2)`]: http://man7.org/linux/man-pages/man2/pwritev2.2.html
        /// [`open(2)`]: http://man7.org/linux/man-pages/man2/open.2.html
        const SYNC = aio::RWF_SYNC;
    }
}

impl Default for WriteFlags {
    fn default() -> Self {
        WriteFlags::empty()
    }
}
