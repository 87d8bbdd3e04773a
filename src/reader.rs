//! Reading bytes through a caller-visible buffer window.

use crate::MAX_BYTES_TO_COPY;
use crate::backward_writer::BackwardWriter;
use crate::writer::Writer;

/// A byte stream read through a cursor over a buffer window.
///
/// The window is `[pos, limit_pos)` and is visible through
/// [`chunk`](Reader::chunk). Inner loops work on it directly: call
/// [`pull`](Reader::pull), read from `chunk()`, then
/// [`advance`](Reader::advance). The provided wrappers dispatch to the
/// `*_slow` methods only when the window is exhausted, so a single slow-path
/// round trip can expose thousands of fresh bytes.
///
/// Failures latch: a slow path that fails records a message, turns the
/// stream unhealthy, and every later mutating call short-circuits to
/// `false`. End of stream is not a failure.
pub trait Reader {
    /// Unread portion of the buffer window.
    fn chunk(&self) -> &[u8];

    /// Consumes `n` buffered bytes. `n` must not exceed `available()`.
    fn advance(&mut self, n: usize);

    /// Absolute position of the next byte to read.
    fn pos(&self) -> u64;

    fn healthy(&self) -> bool;

    /// Reason the stream became unhealthy; empty while healthy.
    fn message(&self) -> &str;

    /// Refills the window with at least one byte, or returns `false` at end
    /// of stream or on failure.
    ///
    /// Precondition: `available() == 0`.
    fn pull_slow(&mut self) -> bool;

    /// Reads exactly `dst.len()` bytes. On a short read the prefix of `dst`
    /// holds the bytes that were available, `pos()` accounts for them, and
    /// the return is `false`.
    ///
    /// Precondition: `dst.len() > available()`.
    fn read_slow(&mut self, dst: &mut [u8]) -> bool;

    /// Repositions the stream outside the current window.
    ///
    /// Precondition: `new_pos < pos()` or `new_pos > limit_pos()`.
    fn seek_slow(&mut self, new_pos: u64) -> bool;

    /// Transfers `length` bytes into `dest`.
    ///
    /// Precondition: `length` exceeds what [`copy_to`](Reader::copy_to)
    /// handles in place.
    fn copy_to_slow(&mut self, dest: &mut dyn Writer, length: u64) -> bool {
        let mut remaining = length;
        while remaining > 0 {
            if !self.pull() {
                return false;
            }
            let n = (self.available() as u64).min(remaining) as usize;
            let ok = dest.write(&self.chunk()[..n]);
            self.advance(n);
            if !ok {
                return false;
            }
            remaining -= n as u64;
        }
        true
    }

    /// Transfers `length` bytes into a backward writer.
    ///
    /// A backward writer cannot take the bytes incrementally without
    /// reversing them, so the payload is staged in one piece.
    fn copy_to_backward_slow(&mut self, dest: &mut dyn BackwardWriter, length: usize) -> bool {
        let mut staged = vec![0; length];
        if !self.read(&mut staged) {
            return false;
        }
        dest.write_vec(staged)
    }

    /// Total length of the stream, when known.
    fn size(&mut self) -> Option<u64> {
        None
    }

    /// Whether [`seek`](Reader::seek) can move to arbitrary positions.
    fn supports_random_access(&self) -> bool {
        false
    }

    /// Finalizes the stream; idempotent. Returns `false` if the stream is
    /// failed. Only status queries are defined afterwards.
    fn close(&mut self) -> bool;

    #[inline]
    fn available(&self) -> usize {
        self.chunk().len()
    }

    /// Absolute position just past the buffer window.
    #[inline]
    fn limit_pos(&self) -> u64 {
        self.pos() + self.available() as u64
    }

    /// Ensures at least one byte is readable from `chunk()`.
    #[inline]
    fn pull(&mut self) -> bool {
        self.available() > 0 || self.pull_slow()
    }

    /// Reads exactly `dst.len()` bytes; see [`read_slow`](Reader::read_slow)
    /// for the short-read contract.
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> bool {
        if dst.len() <= self.available() {
            let n = dst.len();
            dst.copy_from_slice(&self.chunk()[..n]);
            self.advance(n);
            true
        } else {
            self.read_slow(dst)
        }
    }

    /// Moves to an absolute position. In-window targets are repositioned
    /// without touching the source.
    #[inline]
    fn seek(&mut self, new_pos: u64) -> bool {
        if new_pos >= self.pos() && new_pos <= self.limit_pos() {
            let n = (new_pos - self.pos()) as usize;
            self.advance(n);
            true
        } else {
            self.seek_slow(new_pos)
        }
    }

    /// Transfers `length` bytes into `dest` without staging them anywhere
    /// else on the way.
    fn copy_to(&mut self, dest: &mut dyn Writer, length: u64) -> bool {
        if length <= MAX_BYTES_TO_COPY as u64 && length as usize <= self.available() {
            let n = length as usize;
            let ok = dest.write(&self.chunk()[..n]);
            self.advance(n);
            ok
        } else {
            self.copy_to_slow(dest, length)
        }
    }

    /// Transfers `length` bytes into `dest`, preserving byte order in the
    /// backward writer's output.
    fn copy_to_backward(&mut self, dest: &mut dyn BackwardWriter, length: usize) -> bool {
        if length <= MAX_BYTES_TO_COPY && length <= self.available() {
            let ok = dest.write(&self.chunk()[..length]);
            self.advance(length);
            ok
        } else {
            self.copy_to_backward_slow(dest, length)
        }
    }
}
