//! Heap-buffered bases for streams that move raw byte runs.
//!
//! [`BufferedReader`] and [`BufferedWriter`] own a refillable buffer and
//! delegate only "read this many raw bytes" / "write this many raw bytes"
//! to a [`RawSource`] / [`RawSink`]. Adapters that cannot expose someone
//! else's buffer directly, codecs in particular, plug in here.

use crate::reader::Reader;
use crate::status::Status;
use crate::writer::{FlushKind, Writer};

/// Default capacity of the internal buffer.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Supplies raw bytes to a [`BufferedReader`].
pub trait RawSource {
    /// Reads up to `dst.len()` bytes, returning the count. Zero means end
    /// of stream, or failure when `status` was marked failed.
    fn read_raw(&mut self, dst: &mut [u8], status: &mut Status) -> usize;

    /// Releases the source, closing an owned downstream.
    fn close_raw(&mut self, status: &mut Status);

    /// Total stream length, when the source knows it.
    fn size_raw(&mut self) -> Option<u64> {
        None
    }
}

/// Accepts raw bytes from a [`BufferedWriter`].
pub trait RawSink {
    /// Writes all of `src`; `src` is never empty. On failure marks `status`
    /// failed and returns `false`.
    fn write_raw(&mut self, src: &[u8], status: &mut Status) -> bool;

    /// Drains pending state and flushes the downstream as far as `kind`
    /// asks.
    fn flush_raw(&mut self, kind: FlushKind, status: &mut Status) -> bool;

    /// Finalizes pending state iff `status` is healthy, then releases the
    /// downstream (closing it when owned) regardless of health.
    fn close_raw(&mut self, status: &mut Status);
}

/// Reader over a [`RawSource`], with a lazily allocated refill buffer.
pub struct BufferedReader<S: RawSource> {
    source: S,
    buf: Vec<u8>,
    cursor: usize,
    end: usize,
    /// Absolute position of `buf[0]`.
    window_pos: u64,
    buffer_size: usize,
    status: Status,
}

impl<S: RawSource> BufferedReader<S> {
    pub fn from_source(source: S, buffer_size: usize) -> Self {
        debug_assert!(buffer_size > 0, "buffered reader needs a nonempty buffer");
        Self {
            source,
            buf: Vec::new(),
            cursor: 0,
            end: 0,
            window_pos: 0,
            buffer_size,
            status: Status::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Starts a fresh window and fills it from the source.
    fn refill(&mut self) -> bool {
        self.window_pos += self.end as u64;
        self.cursor = 0;
        self.end = 0;
        if self.buf.is_empty() {
            self.buf = vec![0; self.buffer_size];
        }
        let writable = u64::MAX - self.window_pos;
        if writable == 0 {
            return self.status.fail_overflow();
        }
        let len = (self.buf.len() as u64).min(writable) as usize;
        let n = self.source.read_raw(&mut self.buf[..len], &mut self.status);
        self.end = n;
        n > 0 && self.status.healthy()
    }
}

impl<S: RawSource> Reader for BufferedReader<S> {
    fn chunk(&self) -> &[u8] {
        &self.buf[self.cursor..self.end]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available(), "advance() past the buffer window");
        self.cursor += n;
    }

    fn pos(&self) -> u64 {
        self.window_pos + self.cursor as u64
    }

    fn healthy(&self) -> bool {
        self.status.healthy()
    }

    fn message(&self) -> &str {
        self.status.message()
    }

    fn pull_slow(&mut self) -> bool {
        debug_assert_eq!(
            self.available(),
            0,
            "pull_slow() called with data available; use pull()"
        );
        if !self.status.healthy() {
            return false;
        }
        self.refill()
    }

    fn read_slow(&mut self, dst: &mut [u8]) -> bool {
        debug_assert!(
            dst.len() > self.available(),
            "read_slow() called with enough data buffered; use read()"
        );
        if !self.status.healthy() {
            return false;
        }
        let mut filled = 0;
        loop {
            let n = self.available().min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&self.chunk()[..n]);
            self.advance(n);
            filled += n;
            if filled == dst.len() {
                return true;
            }
            if dst.len() - filled >= self.buffer_size {
                // The remainder dwarfs the buffer; read into `dst` directly.
                self.window_pos += self.end as u64;
                self.cursor = 0;
                self.end = 0;
                let writable = u64::MAX - self.window_pos;
                if writable == 0 {
                    return self.status.fail_overflow();
                }
                let len = ((dst.len() - filled) as u64).min(writable) as usize;
                let n = self
                    .source
                    .read_raw(&mut dst[filled..filled + len], &mut self.status);
                if n == 0 {
                    return false;
                }
                self.window_pos += n as u64;
                filled += n;
                if filled == dst.len() {
                    return true;
                }
            } else if !self.refill() {
                return false;
            }
        }
    }

    fn seek_slow(&mut self, new_pos: u64) -> bool {
        debug_assert!(
            new_pos < self.pos() || new_pos > self.limit_pos(),
            "seek_slow() called with a position inside the window; use seek()"
        );
        if !self.status.healthy() {
            return false;
        }
        if new_pos < self.pos() {
            return self.status.fail("seeking backwards not supported");
        }
        // Skip forward by reading and discarding.
        while self.pos() < new_pos {
            if !self.pull() {
                return false;
            }
            let n = (self.available() as u64).min(new_pos - self.pos()) as usize;
            self.advance(n);
        }
        true
    }

    fn size(&mut self) -> Option<u64> {
        if !self.status.healthy() {
            return None;
        }
        self.source.size_raw()
    }

    fn close(&mut self) -> bool {
        if self.status.is_closed() {
            return self.status.error().is_none();
        }
        self.source.close_raw(&mut self.status);
        self.window_pos += self.end as u64;
        self.cursor = 0;
        self.end = 0;
        self.buf = Vec::new();
        self.status.mark_closed();
        self.status.error().is_none()
    }
}

/// Writer over a [`RawSink`], with a lazily allocated staging buffer.
pub struct BufferedWriter<S: RawSink> {
    sink: S,
    buf: Vec<u8>,
    cursor: usize,
    /// Absolute position of `buf[0]`.
    start_pos: u64,
    buffer_size: usize,
    status: Status,
}

impl<S: RawSink> BufferedWriter<S> {
    pub fn from_sink(sink: S, buffer_size: usize) -> Self {
        debug_assert!(buffer_size > 0, "buffered writer needs a nonempty buffer");
        Self {
            sink,
            buf: Vec::new(),
            cursor: 0,
            start_pos: 0,
            buffer_size,
            status: Status::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Hands the buffered bytes to the sink, emptying the window.
    fn push_internal(&mut self) -> bool {
        let n = self.cursor;
        if n == 0 {
            return true;
        }
        self.cursor = 0;
        let ok = self.sink.write_raw(&self.buf[..n], &mut self.status);
        if ok {
            self.start_pos += n as u64;
        }
        ok
    }
}

impl<S: RawSink> Writer for BufferedWriter<S> {
    fn space(&mut self) -> &mut [u8] {
        &mut self.buf[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available(), "advance() past the buffer window");
        self.cursor += n;
    }

    fn available(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn pos(&self) -> u64 {
        self.start_pos + self.cursor as u64
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
        if !self.push_internal() {
            return false;
        }
        if self.buf.is_empty() {
            self.buf = vec![0; self.buffer_size];
        }
        // Keep limit_pos within the position space.
        let writable = u64::MAX - self.start_pos;
        if writable == 0 {
            return self.status.fail_overflow();
        }
        if self.buf.len() as u64 > writable {
            self.buf.truncate(writable as usize);
        }
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
        if src.len() as u64 > u64::MAX - self.limit_pos() {
            return self.status.fail_overflow();
        }
        if src.len() >= self.buffer_size {
            // Skip the buffer for runs it could never batch.
            if !self.push_internal() {
                return false;
            }
            let ok = self.sink.write_raw(src, &mut self.status);
            if ok {
                self.start_pos += src.len() as u64;
            }
            return ok;
        }
        let mut rest = src;
        while !rest.is_empty() {
            if !self.push() {
                return false;
            }
            let n = rest.len().min(self.available());
            self.space()[..n].copy_from_slice(&rest[..n]);
            self.advance(n);
            rest = &rest[n..];
        }
        true
    }

    fn flush(&mut self, kind: FlushKind) -> bool {
        if !self.status.healthy() {
            return false;
        }
        if !self.push_internal() {
            return false;
        }
        self.sink.flush_raw(kind, &mut self.status)
    }

    fn close(&mut self) -> bool {
        if self.status.is_closed() {
            return self.status.error().is_none();
        }
        if self.status.healthy() {
            let _ = self.push_internal();
        }
        self.sink.close_raw(&mut self.status);
        self.cursor = 0;
        self.buf = Vec::new();
        self.status.mark_closed();
        self.status.error().is_none()
    }
}

impl<S: RawSink> Drop for BufferedWriter<S> {
    fn drop(&mut self) {
        if self.status.healthy() && (self.cursor > 0 || self.start_pos > 0) {
            tracing::warn!(
                pos = self.pos(),
                "buffered writer dropped without close(); pending data may be lost"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source delivering a canned byte run in fixed-size pieces.
    struct PieceSource {
        data: Vec<u8>,
        offset: usize,
        piece: usize,
    }

    impl RawSource for PieceSource {
        fn read_raw(&mut self, dst: &mut [u8], _status: &mut Status) -> usize {
            let n = dst
                .len()
                .min(self.piece)
                .min(self.data.len() - self.offset);
            dst[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
            self.offset += n;
            n
        }

        fn close_raw(&mut self, _status: &mut Status) {}

        fn size_raw(&mut self) -> Option<u64> {
            Some(self.data.len() as u64)
        }
    }

    /// Sink recording every run it receives.
    #[derive(Default)]
    struct RunSink {
        runs: Vec<Vec<u8>>,
        flushes: usize,
        closed: bool,
    }

    impl RawSink for RunSink {
        fn write_raw(&mut self, src: &[u8], _status: &mut Status) -> bool {
            assert!(!src.is_empty());
            self.runs.push(src.to_vec());
            true
        }

        fn flush_raw(&mut self, _kind: FlushKind, _status: &mut Status) -> bool {
            self.flushes += 1;
            true
        }

        fn close_raw(&mut self, _status: &mut Status) {
            self.closed = true;
        }
    }

    #[test]
    fn reader_refills_in_buffer_sized_windows() {
        let source = PieceSource {
            data: (0..=255u8).collect(),
            offset: 0,
            piece: 7,
        };
        let mut reader = BufferedReader::from_source(source, 16);
        let mut dst = [0u8; 256];
        assert!(reader.read(&mut dst));
        assert_eq!(dst[255], 255);
        assert!(!reader.pull());
        assert_eq!(reader.pos(), 256);
    }

    #[test]
    fn reader_bypasses_the_buffer_for_large_reads() {
        let source = PieceSource {
            data: vec![b'r'; 10_000],
            offset: 0,
            piece: 10_000,
        };
        let mut reader = BufferedReader::from_source(source, 16);
        assert!(reader.pull());
        let mut dst = vec![0u8; 9_000];
        assert!(reader.read(&mut dst));
        assert!(dst.iter().all(|&b| b == b'r'));
        assert_eq!(reader.pos(), 9_000);
    }

    #[test]
    fn reader_skips_forward_and_refuses_backward() {
        let source = PieceSource {
            data: (0..100u8).collect(),
            offset: 0,
            piece: 100,
        };
        let mut reader = BufferedReader::from_source(source, 8);
        assert!(reader.seek(50));
        assert_eq!(reader.pos(), 50);
        let mut dst = [0u8; 1];
        assert!(reader.read(&mut dst));
        assert_eq!(dst[0], 50);
        assert!(!reader.seek(0));
        assert_eq!(reader.message(), "seeking backwards not supported");
    }

    #[test]
    fn reader_size_comes_from_the_source() {
        let source = PieceSource {
            data: vec![0; 42],
            offset: 0,
            piece: 42,
        };
        let mut reader = BufferedReader::from_source(source, 8);
        assert_eq!(reader.size(), Some(42));
    }

    #[test]
    fn writer_batches_small_writes() {
        let mut writer = BufferedWriter::from_sink(RunSink::default(), 8);
        for _ in 0..4 {
            assert!(writer.write(b"abc"));
        }
        assert!(writer.close());
        let sink = writer.sink();
        assert!(sink.closed);
        let total: usize = sink.runs.iter().map(Vec::len).sum();
        assert_eq!(total, 12);
        // Runs arrive in buffer-sized batches, not per write.
        assert!(sink.runs.iter().all(|run| run.len() >= 3));
    }

    #[test]
    fn writer_bypasses_the_buffer_for_large_writes() {
        let mut writer = BufferedWriter::from_sink(RunSink::default(), 8);
        assert!(writer.write(b"ab"));
        let big = vec![b'z'; 100];
        assert!(writer.write(&big));
        assert_eq!(writer.pos(), 102);
        assert!(writer.close());
        // The staged prefix goes out first, then the big run unbroken.
        assert_eq!(writer.sink().runs[0], b"ab");
        assert_eq!(writer.sink().runs[1].len(), 100);
    }

    #[test]
    fn writer_flush_empties_the_window_first() {
        let mut writer = BufferedWriter::from_sink(RunSink::default(), 8);
        assert!(writer.write(b"abc"));
        assert!(writer.flush(FlushKind::FromObject));
        assert_eq!(writer.sink().runs, vec![b"abc".to_vec()]);
        assert_eq!(writer.sink().flushes, 1);
    }
}
