//! Cursor-based byte stream I/O with rope buffers and streaming
//! compression.
//!
//! Readers and writers expose a direct buffer window to their callers:
//! inner loops call [`Reader::pull`] / [`Writer::push`], work on
//! [`Reader::chunk`] / [`Writer::space`] directly, and fall into a virtual
//! refill/commit slow path only when the window is exhausted. Position,
//! health, and ownership invariants hold across arbitrary composition of
//! layers, and failures latch: once a stream is unhealthy every further
//! mutating call short-circuits.
//!
//! Concrete adapters: in-memory ([`SliceReader`], [`VecWriter`]),
//! rope-backed ([`ChainReader`], [`ChainWriter`], [`ChainBackwardWriter`]),
//! limited sub-streams ([`LimitingReader`]), and streaming Zstandard codecs
//! ([`ZstdReader`], [`ZstdWriter`]). [`BufferedReader`] and
//! [`BufferedWriter`] are the bases for adapters that stage bytes through
//! their own heap buffer.
//!
//! ```
//! use ropestream::{Reader, SliceReader, VecWriter, Writer};
//!
//! let mut reader = SliceReader::new(b"hello world");
//! let mut writer = VecWriter::new();
//! assert!(reader.copy_to(&mut writer, 11));
//! assert!(writer.close());
//! assert_eq!(writer.as_slice(), b"hello world");
//! ```

mod backward_writer;
mod buffered;
mod chain;
mod chain_backward_writer;
mod chain_reader;
mod chain_writer;
mod dependency;
mod limiting_reader;
mod reader;
mod slice_reader;
mod status;
mod vec_writer;
mod writer;
pub mod zstd;

pub use backward_writer::BackwardWriter;
pub use buffered::{BufferedReader, BufferedWriter, RawSink, RawSource};
pub use chain::Chain;
pub use chain_backward_writer::ChainBackwardWriter;
pub use chain_reader::ChainReader;
pub use chain_writer::ChainWriter;
pub use dependency::Dependency;
pub use limiting_reader::LimitingReader;
pub use reader::Reader;
pub use slice_reader::SliceReader;
pub use status::{Status, StreamError};
pub use vec_writer::VecWriter;
pub use writer::{FlushKind, Writer};
pub use zstd::{ZstdOptions, ZstdReader, ZstdWriter};

/// Longest run the copy and value-consuming operations move through the
/// buffer window before taking their bulk paths.
pub(crate) const MAX_BYTES_TO_COPY: usize = 255;
