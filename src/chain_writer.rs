//! Writer appending to the back of a [`Chain`].

use crate::MAX_BYTES_TO_COPY;
use crate::chain::Chain;
use crate::dependency::Dependency;
use crate::status::Status;
use crate::writer::{FlushKind, Writer};

/// Appends bytes to a chain. The buffer window is a span reserved at the
/// rope's back with [`Chain::append_buffer`]; the chain's length therefore
/// equals `limit_pos()` whenever a public call returns.
///
/// The destination must not be mutated behind the writer's back; that
/// breaks the length invariant and is undefined behavior (caught by a
/// debug assertion at every slow-path entry).
pub struct ChainWriter<'a> {
    dest: Dependency<'a, Chain>,
    /// Length of the reserved window at the back of the chain.
    reserved: usize,
    /// Bytes of the window already written.
    filled: usize,
    /// Position of the window start; equals the committed chain length.
    start_pos: u64,
    size_hint: Option<usize>,
    status: Status,
}

impl<'a> ChainWriter<'a> {
    /// Starts appending after the chain's existing contents.
    pub fn new(dest: impl Into<Dependency<'a, Chain>>) -> Self {
        let dest = dest.into();
        let start_pos = dest.get().size() as u64;
        Self {
            dest,
            reserved: 0,
            filled: 0,
            start_pos,
            size_hint: None,
            status: Status::new(),
        }
    }

    /// Declares the expected final size so the chain can size its blocks.
    pub fn with_size_hint(mut self, size_hint: usize) -> Self {
        self.size_hint = Some(size_hint);
        self
    }

    /// The destination, including any outstanding reservation. Call
    /// [`flush`](Writer::flush) or [`close`](Writer::close) first to see
    /// exactly the written bytes.
    pub fn dest(&self) -> &Chain {
        self.dest.get()
    }

    /// Closes the writer and returns the dependency on the destination.
    pub fn into_dest(mut self) -> Dependency<'a, Chain> {
        self.close();
        std::mem::replace(&mut self.dest, Dependency::Owned(Box::default()))
    }

    fn assert_dest_unchanged(&self) {
        debug_assert_eq!(
            self.start_pos + self.reserved as u64,
            self.dest.get().size() as u64,
            "chain destination changed unexpectedly"
        );
    }

    fn sync_buffer(&mut self) {
        self.start_pos += self.filled as u64;
        let unused = self.reserved - self.filled;
        self.dest.get_mut().remove_suffix(unused);
        self.reserved = 0;
        self.filled = 0;
    }

    fn make_buffer(&mut self, min_size: usize) {
        let hint = self.size_hint;
        let span = self.dest.get_mut().append_buffer(min_size, 0, hint);
        self.reserved = span.len();
        self.filled = 0;
    }
}

impl Writer for ChainWriter<'_> {
    fn space(&mut self) -> &mut [u8] {
        if self.reserved == 0 {
            return &mut [];
        }
        let reserved = self.reserved;
        let window = self.dest.get_mut().back_window_mut(reserved);
        &mut window[self.filled..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available(), "advance() past the buffer window");
        self.filled += n;
    }

    fn available(&self) -> usize {
        self.reserved - self.filled
    }

    fn pos(&self) -> u64 {
        self.start_pos + self.filled as u64
    }

    fn healthy(&self) -> bool {
        self.status.healthy()
    }

    fn message(&self) -> &str {
        self.status.message()
    }

    fn push_slow(&mut self) -> bool {
        debug_assert_eq!(
            self.available(),
            0,
            "push_slow() called with space available; use push()"
        );
        if !self.status.healthy() {
            return false;
        }
        self.assert_dest_unchanged();
        if self.dest.get().size() == usize::MAX {
            return self.status.fail_overflow();
        }
        // The window is fully written; commit it and reserve a fresh one.
        self.start_pos += self.filled as u64;
        self.reserved = 0;
        self.filled = 0;
        self.make_buffer(1);
        true
    }

    fn write_slow(&mut self, src: &[u8]) -> bool {
        debug_assert!(
            src.len() > self.available(),
            "write_slow() called with enough space; use write()"
        );
        if !self.status.healthy() {
            return false;
        }
        self.assert_dest_unchanged();
        if src.len() > usize::MAX - self.pos() as usize {
            return self.status.fail_overflow();
        }
        self.sync_buffer();
        self.start_pos += src.len() as u64;
        let hint = self.size_hint;
        self.dest.get_mut().append(src, hint);
        self.make_buffer(0);
        true
    }

    fn write_vec(&mut self, src: Vec<u8>) -> bool {
        if src.len() <= self.available().min(MAX_BYTES_TO_COPY) {
            return self.write(&src);
        }
        if !self.status.healthy() {
            return false;
        }
        self.assert_dest_unchanged();
        if src.len() > usize::MAX - self.pos() as usize {
            return self.status.fail_overflow();
        }
        self.sync_buffer();
        self.start_pos += src.len() as u64;
        self.dest.get_mut().append_vec(src);
        self.make_buffer(0);
        true
    }

    fn write_chain_owned(&mut self, src: Chain) -> bool {
        if src.size() <= self.available().min(MAX_BYTES_TO_COPY) {
            return self.write_chain(&src);
        }
        if !self.status.healthy() {
            return false;
        }
        self.assert_dest_unchanged();
        if src.size() > usize::MAX - self.pos() as usize {
            return self.status.fail_overflow();
        }
        self.sync_buffer();
        self.start_pos += src.size() as u64;
        self.dest.get_mut().append_chain(src);
        self.make_buffer(0);
        true
    }

    fn flush(&mut self, _kind: FlushKind) -> bool {
        if !self.status.healthy() {
            return false;
        }
        self.assert_dest_unchanged();
        self.sync_buffer();
        true
    }

    fn close(&mut self) -> bool {
        if self.status.is_closed() {
            return self.status.error().is_none();
        }
        if self.status.healthy() {
            self.assert_dest_unchanged();
            self.sync_buffer();
        }
        self.status.mark_closed();
        self.status.error().is_none()
    }
}

impl Drop for ChainWriter<'_> {
    fn drop(&mut self) {
        // Leave the chain holding exactly the written bytes.
        if self.status.healthy() && self.reserved > 0 {
            self.sync_buffer();
        }
    }
}
