//! Byte-stream traits for the transfer engine.
//!
//! A transfer either drains a [`BlockSource`] (outgoing data) or fills a
//! [`BlockSink`] (incoming data). Blanket implementations cover anything
//! that is [`std::io::Read`] or [`std::io::Write`], so files, cursors and
//! in-memory buffers plug in unchanged.

use std::io;

/// Sequential source of outgoing payload bytes.
///
/// The engine reads one block at a time and never seeks backwards;
/// retransmission reuses the recorded wire bytes, not the source.
pub trait BlockSource {
    /// Fill `buf` with the next block of payload.
    ///
    /// Returns the number of bytes produced. Anything less than
    /// `buf.len()` marks the final block of the transfer.
    fn read_block(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Sequential sink for incoming payload bytes.
pub trait BlockSink {
    /// Append one received block to the destination.
    fn write_block(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<R: io::Read> BlockSource for R {
    fn read_block(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // A single read() may return short even when more bytes are
        // available, so loop until the block is full or the source ends.
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<W: io::Write> BlockSink for W {
    fn write_block(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }
}
