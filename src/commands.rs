use crate::buffer::LifetimeExtender;
use crate::flags::WriteFlags;
use crate::{aio, AlignedBuf};

/// Positional write of a whole [`AlignedBuf`] at `offset`
///
/// [`AlignedBuf`]: struct.AlignedBuf.html
#[derive(Debug)]
pub struct WriteCommand<'a> {
    /// Byte offset in the file
    pub offset: u64,
    /// Source bytes
    pub buffer: &'a AlignedBuf,
    /// Per-write flags
    pub flags: WriteFlags,
}

impl<'a> WriteCommand<'a> {
    pub(crate) fn opcode(&self) -> u16 {
        aio::IOCB_CMD_PWRITE
    }

    pub(crate) fn buffer_addr(&self) -> (u64, u64) {
        self.buffer.aio_addr_and_len()
    }

    pub(crate) fn buffer_lifetime_extender(&self) -> LifetimeExtender {
        self.buffer.lifetime_extender()
    }
}
