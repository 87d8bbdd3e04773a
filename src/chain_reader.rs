//! Reader over the blocks of a [`Chain`].

use crate::chain::Chain;
use crate::dependency::Dependency;
use crate::reader::Reader;
use crate::status::Status;

/// Reads a chain block by block; each block is a buffer window in turn.
pub struct ChainReader<'a> {
    src: Dependency<'a, Chain>,
    block: usize,
    /// Offset of the window start inside the current block.
    offset: usize,
    position: u64,
    status: Status,
}

impl<'a> ChainReader<'a> {
    pub fn new(src: impl Into<Dependency<'a, Chain>>) -> Self {
        Self {
            src: src.into(),
            block: 0,
            offset: 0,
            position: 0,
            status: Status::new(),
        }
    }
}

impl Reader for ChainReader<'_> {
    fn chunk(&self) -> &[u8] {
        let chain = self.src.get();
        if self.block >= chain.block_count() {
            return &[];
        }
        &chain.block(self.block)[self.offset..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available(), "advance() past the buffer window");
        self.offset += n;
        self.position += n as u64;
    }

    fn pos(&self) -> u64 {
        self.position
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
        let chain = self.src.get();
        while self.block < chain.block_count() {
            if self.offset < chain.block(self.block).len() {
                return true;
            }
            self.block += 1;
            self.offset = 0;
        }
        false
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
            if !self.pull() {
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
        let chain = self.src.get();
        let size = chain.size() as u64;
        let target = new_pos.min(size);
        let mut remaining = target;
        let mut block = 0;
        while block < chain.block_count() {
            let len = chain.block(block).len() as u64;
            if remaining < len {
                break;
            }
            remaining -= len;
            block += 1;
        }
        self.block = block;
        self.offset = remaining as usize;
        self.position = target;
        new_pos <= size
    }

    fn size(&mut self) -> Option<u64> {
        if !self.status.healthy() {
            return None;
        }
        Some(self.src.get().size() as u64)
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn close(&mut self) -> bool {
        if self.status.is_closed() {
            return self.status.error().is_none();
        }
        self.block = self.src.get().block_count();
        self.offset = 0;
        self.status.mark_closed();
        self.status.error().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec_writer::VecWriter;
    use crate::writer::Writer;

    fn sample_chain() -> Chain {
        let mut chain = Chain::new();
        chain.append_vec(b"hello ".to_vec());
        chain.append_vec(b"".to_vec());
        chain.append_vec(b"cruel ".to_vec());
        chain.append(b"world", None);
        chain
    }

    #[test]
    fn reads_across_blocks() {
        let mut chain = sample_chain();
        let mut reader = ChainReader::new(&mut chain);
        let mut dst = [0u8; 17];
        assert!(reader.read(&mut dst));
        assert_eq!(&dst, b"hello cruel world");
        assert!(!reader.pull());
        assert!(reader.healthy());
    }

    #[test]
    fn window_is_one_block() {
        let mut chain = sample_chain();
        let mut reader = ChainReader::new(&mut chain);
        assert!(reader.pull());
        assert_eq!(reader.chunk(), b"hello ");
    }

    #[test]
    fn seeks_to_any_block() {
        let mut chain = sample_chain();
        let mut reader = ChainReader::new(&mut chain);
        assert!(reader.seek(12));
        let mut dst = [0u8; 5];
        assert!(reader.read(&mut dst));
        assert_eq!(&dst, b"world");
        assert!(reader.seek(6));
        assert_eq!(reader.pos(), 6);
        assert!(!reader.seek(1_000));
        assert_eq!(reader.pos(), 17);
        assert!(reader.healthy());
    }

    #[test]
    fn copies_into_a_writer() {
        let mut chain = sample_chain();
        let mut reader = ChainReader::new(&mut chain);
        let mut dest = VecWriter::new();
        assert!(reader.copy_to(&mut dest, 11));
        assert_eq!(dest.as_slice(), b"hello cruel");
        assert_eq!(reader.pos(), 11);
    }

    #[test]
    fn size_reports_the_chain() {
        let mut chain = sample_chain();
        let mut reader = ChainReader::new(&mut chain);
        assert_eq!(reader.size(), Some(17));
    }

    #[test]
    fn owned_chain_dependency() {
        let mut reader = ChainReader::new(Box::new(sample_chain()));
        let mut dst = [0u8; 6];
        assert!(reader.read(&mut dst));
        assert_eq!(&dst, b"hello ");
        assert!(reader.close());
    }
}
