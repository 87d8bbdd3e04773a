//! Reader enforcing an upper bound on the absolute position.

use crate::MAX_BYTES_TO_COPY;
use crate::backward_writer::BackwardWriter;
use crate::dependency::Dependency;
use crate::reader::Reader;
use crate::status::Status;
use crate::writer::Writer;

/// Composes over a source reader and caps the position at `size_limit`,
/// fixed at construction. The position always equals the source's; the
/// buffer window is the source's window clamped to the limit.
///
/// Running into the limit is end of stream, not a failure: reads past it
/// return `false` with the stream healthy and the position parked at the
/// limit.
pub struct LimitingReader<'a, R: Reader> {
    src: Dependency<'a, R>,
    size_limit: u64,
    status: Status,
}

impl<'a, R: Reader> LimitingReader<'a, R> {
    /// `size_limit` must be at least `src.pos()`.
    pub fn new(src: impl Into<Dependency<'a, R>>, size_limit: u64) -> Self {
        let src = src.into();
        debug_assert!(
            size_limit >= src.get().pos(),
            "size limit below the source position"
        );
        Self {
            src,
            size_limit,
            status: Status::new(),
        }
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    /// Bytes left before the limit.
    fn remainder(&self) -> u64 {
        self.size_limit - self.src.get().pos()
    }
}

impl<R: Reader> Reader for LimitingReader<'_, R> {
    fn chunk(&self) -> &[u8] {
        if !self.status.healthy() {
            return &[];
        }
        let chunk = self.src.get().chunk();
        let clamp = (chunk.len() as u64).min(self.remainder()) as usize;
        &chunk[..clamp]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available(), "advance() past the buffer window");
        self.src.get_mut().advance(n);
    }

    fn pos(&self) -> u64 {
        self.src.get().pos()
    }

    fn healthy(&self) -> bool {
        self.status.healthy() && self.src.get().healthy()
    }

    fn message(&self) -> &str {
        if !self.status.healthy() {
            self.status.message()
        } else {
            self.src.get().message()
        }
    }

    fn pull_slow(&mut self) -> bool {
        debug_assert_eq!(
            self.available(),
            0,
            "pull_slow() called with data available; use pull()"
        );
        if !self.healthy() {
            return false;
        }
        if self.pos() == self.size_limit {
            // End of the limit, not a failure.
            return false;
        }
        self.src.get_mut().pull()
    }

    fn read_slow(&mut self, dst: &mut [u8]) -> bool {
        debug_assert!(
            dst.len() > self.available(),
            "read_slow() called with enough data buffered; use read()"
        );
        if !self.healthy() {
            return false;
        }
        let n = (dst.len() as u64).min(self.remainder()) as usize;
        let ok = self.src.get_mut().read(&mut dst[..n]);
        ok && n == dst.len()
    }

    fn copy_to_slow(&mut self, dest: &mut dyn Writer, length: u64) -> bool {
        debug_assert!(
            length > MAX_BYTES_TO_COPY as u64 || length as usize > self.available(),
            "copy_to_slow() called with a short in-window copy; use copy_to()"
        );
        if !self.healthy() {
            return false;
        }
        let n = length.min(self.remainder());
        let ok = self.src.get_mut().copy_to(dest, n);
        ok && n == length
    }

    fn copy_to_backward_slow(&mut self, dest: &mut dyn BackwardWriter, length: usize) -> bool {
        debug_assert!(
            length > MAX_BYTES_TO_COPY || length > self.available(),
            "copy_to_backward_slow() called with a short in-window copy; use copy_to_backward()"
        );
        if !self.healthy() {
            return false;
        }
        if length as u64 > self.remainder() {
            // The writer gets nothing; leave the source at the boundary.
            self.src.get_mut().seek(self.size_limit);
            return false;
        }
        self.src.get_mut().copy_to_backward(dest, length)
    }

    fn seek_slow(&mut self, new_pos: u64) -> bool {
        debug_assert!(
            new_pos < self.pos() || new_pos > self.limit_pos(),
            "seek_slow() called with a position inside the window; use seek()"
        );
        if !self.healthy() {
            return false;
        }
        let target = new_pos.min(self.size_limit);
        let ok = self.src.get_mut().seek(target);
        ok && target == new_pos
    }

    fn size(&mut self) -> Option<u64> {
        if !self.healthy() {
            return None;
        }
        let size = self.src.get_mut().size()?;
        Some(size.min(self.size_limit))
    }

    fn supports_random_access(&self) -> bool {
        self.src.get().supports_random_access()
    }

    fn close(&mut self) -> bool {
        if self.status.is_closed() {
            return self.status.error().is_none();
        }
        if self.src.is_owning() {
            let src = self.src.get_mut();
            if !src.close() {
                self.status.fail(src.message());
            }
        }
        self.status.mark_closed();
        self.status.error().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::chain_backward_writer::ChainBackwardWriter;
    use crate::slice_reader::SliceReader;
    use crate::vec_writer::VecWriter;

    #[test]
    fn read_stops_at_the_limit() {
        let data = vec![b'A'; 100];
        let mut src = SliceReader::new(&data);
        let mut reader = LimitingReader::new(&mut src, 30);
        let mut dst = [0u8; 50];
        assert!(!reader.read(&mut dst));
        assert!(dst[..30].iter().all(|&b| b == b'A'));
        assert!(reader.healthy());
        assert_eq!(reader.pos(), 30);
        assert!(!reader.pull());
        assert!(reader.healthy());
    }

    #[test]
    fn seek_clamps_to_the_limit() {
        let data = vec![b'A'; 100];
        let mut src = SliceReader::new(&data);
        let mut reader = LimitingReader::new(&mut src, 30);
        assert!(reader.supports_random_access());
        assert!(!reader.seek(1000));
        assert_eq!(reader.pos(), 30);
        assert!(reader.healthy());
    }

    #[test]
    fn window_is_clamped() {
        let mut src = SliceReader::new(b"0123456789");
        let reader = LimitingReader::new(&mut src, 4);
        assert_eq!(reader.chunk(), b"0123");
        assert_eq!(reader.available(), 4);
        assert_eq!(reader.limit_pos(), 4);
    }

    #[test]
    fn position_tracks_the_source() {
        let mut src = SliceReader::new(b"0123456789");
        src.advance(2);
        let mut reader = LimitingReader::new(&mut src, 6);
        assert_eq!(reader.pos(), 2);
        let mut dst = [0u8; 3];
        assert!(reader.read(&mut dst));
        assert_eq!(&dst, b"234");
        assert_eq!(reader.pos(), 5);
    }

    #[test]
    fn size_is_clamped() {
        let data = vec![b'A'; 100];
        let mut src = SliceReader::new(&data);
        let mut reader = LimitingReader::new(&mut src, 30);
        assert_eq!(reader.size(), Some(30));

        let mut short = SliceReader::new(b"ab");
        let mut reader = LimitingReader::new(&mut short, 30);
        assert_eq!(reader.size(), Some(2));
    }

    #[test]
    fn copy_to_truncates_at_the_limit() {
        let data = vec![b'A'; 100];
        let mut src = SliceReader::new(&data);
        let mut reader = LimitingReader::new(&mut src, 30);
        let mut dest = VecWriter::new();
        assert!(!reader.copy_to(&mut dest, 50));
        assert_eq!(dest.as_slice().len(), 30);
        assert_eq!(reader.pos(), 30);
        assert!(reader.healthy());
    }

    #[test]
    fn copy_to_backward_past_the_limit_emits_nothing() {
        let data = vec![b'A'; 100];
        let mut src = SliceReader::new(&data);
        let mut reader = LimitingReader::new(&mut src, 30);
        let mut chain = Chain::new();
        {
            let mut dest = ChainBackwardWriter::new(&mut chain);
            assert!(!reader.copy_to_backward(&mut dest, 50));
            assert!(dest.close());
        }
        assert_eq!(reader.pos(), 30);
        assert!(reader.healthy());
        assert!(chain.is_empty());
    }

    #[test]
    fn copy_to_backward_within_the_limit() {
        let mut src = SliceReader::new(b"hello world");
        let mut reader = LimitingReader::new(&mut src, 5);
        let mut chain = Chain::new();
        {
            let mut dest = ChainBackwardWriter::new(&mut chain);
            assert!(reader.copy_to_backward(&mut dest, 5));
            assert!(dest.close());
        }
        assert_eq!(chain.to_vec(), b"hello");
    }

    #[test]
    fn owned_source_is_closed() {
        let data = b"abc".to_vec();
        let data: &'static [u8] = data.leak();
        let mut reader = LimitingReader::new(Box::new(SliceReader::new(data)), 2);
        assert!(reader.close());
        assert!(reader.close());
        assert!(!reader.healthy());
    }
}
