//! Streaming Zstandard adapters.
//!
//! [`ZstdWriter`] compresses everything written to it and forwards the
//! result to a downstream [`Writer`](crate::Writer); [`ZstdReader`] is the
//! paired decompressor over a source [`Reader`](crate::Reader). Codec
//! contexts are created lazily on the first byte of data, so construction
//! cannot fail; codec failures surface as stream failures naming the codec
//! call and its error string.

mod reader;
mod writer;

pub use reader::{ZstdReader, ZstdSource};
pub use writer::{
    DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL, MAX_WINDOW_LOG, MIN_COMPRESSION_LEVEL,
    MIN_WINDOW_LOG, ZstdOptions, ZstdSink, ZstdWriter,
};

/// Failure message naming the codec call that produced `code`.
fn codec_message(call: &str, code: usize) -> String {
    format!("{} failed: {}", call, zstd_safe::get_error_name(code))
}
