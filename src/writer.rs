//! Writing bytes through a caller-visible buffer window.

use crate::chain::Chain;

/// How far a [`Writer::flush`] must propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// Data leaves this writer's buffers and reaches its destination.
    FromObject,
    /// Data becomes visible outside the process.
    FromProcess,
    /// Data survives a machine crash.
    FromMachine,
}

/// A byte stream written through a cursor over a buffer window.
///
/// The free window is visible through [`space`](Writer::space): call
/// [`push`](Writer::push), write into `space()`, then
/// [`advance`](Writer::advance). The provided wrappers dispatch to the
/// `*_slow` methods only when the window is full.
///
/// Failures latch exactly as for [`Reader`](crate::Reader); `pos()` never
/// decreases.
pub trait Writer {
    /// Free portion of the buffer window. Bytes are written from its start.
    fn space(&mut self) -> &mut [u8];

    /// Commits `n` bytes written into `space()`. `n` must not exceed
    /// `available()`.
    fn advance(&mut self, n: usize);

    /// Length of `space()` without borrowing it.
    fn available(&self) -> usize;

    /// Absolute position of the next byte to write.
    fn pos(&self) -> u64;

    fn healthy(&self) -> bool;

    /// Reason the stream became unhealthy; empty while healthy.
    fn message(&self) -> &str;

    /// Makes at least one byte of space, committing the current window as
    /// needed.
    ///
    /// Precondition: `available() == 0`.
    fn push_slow(&mut self) -> bool;

    /// Writes all of `src` past the window.
    ///
    /// Precondition: `src.len() > available()`.
    fn write_slow(&mut self, src: &[u8]) -> bool;

    /// Pushes pending bytes toward the destination, as far as `kind` asks.
    fn flush(&mut self, kind: FlushKind) -> bool;

    /// Finalizes the stream; idempotent. Returns `false` if the stream is
    /// failed. Only status queries are defined afterwards.
    fn close(&mut self) -> bool;

    /// Writes an owned buffer. Destinations that can adopt the allocation
    /// override this to skip the copy.
    fn write_vec(&mut self, src: Vec<u8>) -> bool {
        self.write(&src)
    }

    /// Writes the contents of a chain.
    fn write_chain(&mut self, src: &Chain) -> bool {
        for block in src.blocks() {
            if !self.write(block) {
                return false;
            }
        }
        true
    }

    /// Writes an owned chain. Destinations that can adopt its blocks
    /// override this to skip the copy.
    fn write_chain_owned(&mut self, src: Chain) -> bool {
        self.write_chain(&src)
    }

    /// Absolute position just past the buffer window.
    #[inline]
    fn limit_pos(&self) -> u64 {
        self.pos() + self.available() as u64
    }

    /// Ensures at least one byte of space in `space()`.
    #[inline]
    fn push(&mut self) -> bool {
        self.available() > 0 || self.push_slow()
    }

    /// Writes all of `src`.
    #[inline]
    fn write(&mut self, src: &[u8]) -> bool {
        if src.len() <= self.available() {
            self.space()[..src.len()].copy_from_slice(src);
            self.advance(src.len());
            true
        } else {
            self.write_slow(src)
        }
    }
}
