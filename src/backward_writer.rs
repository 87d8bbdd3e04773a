//! Writing bytes in reverse through a caller-visible buffer window.

use crate::chain::Chain;
use crate::writer::FlushKind;

/// A byte stream written back to front.
///
/// The free window is visible through [`space`](BackwardWriter::space) and
/// fills from its *end*: the newest bytes land in front of everything
/// written before, so a sequence of writes reads back in reverse call
/// order. `pos()` still advances with every byte; only the cursor inside
/// the window moves toward the front.
///
/// Useful for serializers that compute tail-first, such as length-prefixed
/// framing where the payload length is known only after the payload.
pub trait BackwardWriter {
    /// Free portion of the buffer window. Bytes are written at its end.
    fn space(&mut self) -> &mut [u8];

    /// Commits `n` bytes written at the end of `space()`. `n` must not
    /// exceed `available()`.
    fn advance(&mut self, n: usize);

    /// Length of `space()` without borrowing it.
    fn available(&self) -> usize;

    /// Number of bytes written so far.
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

    /// Shrinks the stream back to `new_size` bytes. Fails (without marking
    /// the stream unhealthy) if `new_size > pos()`.
    fn truncate(&mut self, new_size: u64) -> bool;

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

    /// Writes the contents of a chain. Blocks go in back to front so the
    /// output preserves their order.
    fn write_chain(&mut self, src: &Chain) -> bool {
        for block in src.blocks().rev() {
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

    /// Writes all of `src` in front of everything written before.
    #[inline]
    fn write(&mut self, src: &[u8]) -> bool {
        if src.len() <= self.available() {
            let space = self.space();
            let at = space.len() - src.len();
            space[at..].copy_from_slice(src);
            self.advance(src.len());
            true
        } else {
            self.write_slow(src)
        }
    }
}
