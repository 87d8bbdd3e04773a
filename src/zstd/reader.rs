//! Streaming decompression from a source reader.

use zstd_safe::{DCtx, InBuffer, OutBuffer};

use super::codec_message;
use crate::buffered::{BufferedReader, DEFAULT_BUFFER_SIZE, RawSource};
use crate::dependency::Dependency;
use crate::reader::Reader;
use crate::status::Status;

/// Source half of [`ZstdReader`]: the codec state and the compressed
/// source.
pub struct ZstdSource<'a, R: Reader> {
    src: Dependency<'a, R>,
    decompressor: Option<DCtx<'static>>,
    /// Whether the current frame has been fully decoded. Starts true so an
    /// empty source reads as an empty stream.
    frame_complete: bool,
}

impl<'a, R: Reader> ZstdSource<'a, R> {
    pub fn src(&self) -> &R {
        self.src.get()
    }

    fn ensure_created(&mut self, status: &mut Status) -> bool {
        if self.decompressor.is_some() {
            return true;
        }
        let Some(mut decompressor) = DCtx::try_create() else {
            return status.fail("ZSTD_createDStream() failed");
        };
        tracing::trace!("initializing zstd decompression stream");
        if let Err(code) = decompressor.init() {
            return status.fail(codec_message("ZSTD_initDStream()", code));
        }
        self.decompressor = Some(decompressor);
        true
    }
}

impl<'a, R: Reader> RawSource for ZstdSource<'a, R> {
    fn read_raw(&mut self, dst: &mut [u8], status: &mut Status) -> usize {
        if !self.ensure_created(status) {
            return 0;
        }
        let mut out_pos = 0;
        loop {
            let src = self.src.get_mut();
            if !src.pull() {
                if !src.healthy() {
                    status.fail(src.message());
                } else if !self.frame_complete {
                    status.fail("truncated Zstd-compressed stream");
                }
                return out_pos;
            }
            let Some(decompressor) = self.decompressor.as_mut() else {
                return out_pos;
            };
            let (produced, consumed, result) = {
                let chunk = src.chunk();
                let mut input = InBuffer::around(chunk);
                let mut output = OutBuffer::around(&mut dst[out_pos..]);
                let result = decompressor.decompress_stream(&mut output, &mut input);
                (output.pos(), input.pos(), result)
            };
            src.advance(consumed);
            out_pos += produced;
            match result {
                Err(code) => {
                    status.fail(codec_message("ZSTD_decompressStream()", code));
                    return out_pos;
                }
                Ok(hint) => {
                    self.frame_complete = hint == 0;
                    if hint == 0 {
                        // End of the frame; anything further is a new frame.
                        return out_pos;
                    }
                }
            }
            if out_pos == dst.len() {
                return out_pos;
            }
        }
    }

    fn close_raw(&mut self, status: &mut Status) {
        self.decompressor = None;
        if self.src.is_owning() {
            let src = self.src.get_mut();
            if !src.close() {
                status.fail(src.message());
            }
        }
    }
}

/// Reader decompressing a Zstandard stream pulled from a source reader.
///
/// Stops at the end of the frame; a source that ends mid-frame fails the
/// stream with `"truncated Zstd-compressed stream"`. For an owned source,
/// closing the reader closes it too.
pub type ZstdReader<'a, R> = BufferedReader<ZstdSource<'a, R>>;

impl<'a, R: Reader> BufferedReader<ZstdSource<'a, R>> {
    pub fn new(src: impl Into<Dependency<'a, R>>) -> Self {
        Self::with_buffer_size(src, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(src: impl Into<Dependency<'a, R>>, buffer_size: usize) -> Self {
        BufferedReader::from_source(
            ZstdSource {
                src: src.into(),
                decompressor: None,
                frame_complete: true,
            },
            buffer_size,
        )
    }

    /// The compressed source.
    pub fn src(&self) -> &R {
        self.source().src()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice_reader::SliceReader;
    use crate::vec_writer::VecWriter;
    use crate::writer::Writer;
    use crate::zstd::ZstdWriter;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut dest = VecWriter::new();
        {
            let mut writer = ZstdWriter::new(&mut dest);
            assert!(writer.write(data));
            assert!(writer.close());
        }
        dest.into_vec()
    }

    #[test]
    fn round_trips_own_output() {
        let data = b"abcabcabc";
        let compressed = compress(data);
        let mut src = SliceReader::new(&compressed);
        let mut reader = ZstdReader::new(&mut src);
        let mut dst = [0u8; 9];
        assert!(reader.read(&mut dst));
        assert_eq!(&dst, data);
        assert!(!reader.pull());
        assert!(reader.healthy());
    }

    #[test]
    fn decodes_an_independent_encoder() {
        let data = b"independent encoder output".repeat(100);
        let compressed = zstd::encode_all(&data[..], 3).unwrap();
        let mut src = SliceReader::new(&compressed);
        let mut reader = ZstdReader::new(&mut src);
        let mut dst = vec![0u8; data.len()];
        assert!(reader.read(&mut dst));
        assert_eq!(dst, data);
    }

    #[test]
    fn truncated_stream_fails() {
        let data = b"0123456789".repeat(1000);
        let compressed = compress(&data);
        let cut = &compressed[..compressed.len() / 2];
        let mut src = SliceReader::new(cut);
        let mut reader = ZstdReader::new(&mut src);
        let mut dst = vec![0u8; data.len()];
        assert!(!reader.read(&mut dst));
        assert!(!reader.healthy());
        assert_eq!(reader.message(), "truncated Zstd-compressed stream");
    }

    #[test]
    fn corrupt_stream_names_the_codec_call() {
        let mut compressed = compress(b"valid data");
        compressed[0] ^= 0xff;
        let mut src = SliceReader::new(&compressed);
        let mut reader = ZstdReader::new(&mut src);
        let mut dst = [0u8; 10];
        assert!(!reader.read(&mut dst));
        assert!(
            reader
                .message()
                .starts_with("ZSTD_decompressStream() failed: ")
        );
    }

    #[test]
    fn empty_source_reads_as_empty() {
        let mut src = SliceReader::new(b"");
        let mut reader = ZstdReader::new(&mut src);
        assert!(!reader.pull());
        assert!(reader.healthy());
    }

    #[test]
    fn seeks_forward_by_decoding() {
        let data = b"abcdefghij";
        let compressed = compress(data);
        let mut src = SliceReader::new(&compressed);
        let mut reader = ZstdReader::new(&mut src);
        assert!(!reader.supports_random_access());
        assert!(reader.seek(6));
        let mut dst = [0u8; 4];
        assert!(reader.read(&mut dst));
        assert_eq!(&dst, b"ghij");
    }

    #[test]
    fn seeking_backwards_fails() {
        let compressed = compress(b"abcdefghij");
        let mut src = SliceReader::new(&compressed);
        let mut reader = ZstdReader::new(&mut src);
        let mut dst = [0u8; 4];
        assert!(reader.read(&mut dst));
        assert!(!reader.seek(0));
        assert!(!reader.healthy());
        assert_eq!(reader.message(), "seeking backwards not supported");
    }
}
