//! Streaming compression onto a downstream writer.

use zstd_safe::{CCtx, CParameter, InBuffer, OutBuffer};

use super::codec_message;
use crate::buffered::{BufferedWriter, DEFAULT_BUFFER_SIZE, RawSink};
use crate::dependency::Dependency;
use crate::status::Status;
use crate::writer::{FlushKind, Writer};

/// Smallest accepted compression level.
pub const MIN_COMPRESSION_LEVEL: i32 = 1;
/// Largest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: i32 = 22;
/// Level used when none is configured.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = zstd::DEFAULT_COMPRESSION_LEVEL;
/// Smallest accepted window log.
pub const MIN_WINDOW_LOG: u32 = 10;
/// Largest accepted window log.
pub const MAX_WINDOW_LOG: u32 = 31;

/// Configuration for [`ZstdWriter`].
#[derive(Debug, Clone)]
pub struct ZstdOptions {
    compression_level: i32,
    window_log: Option<u32>,
    size_hint: Option<u64>,
    buffer_size: usize,
}

impl Default for ZstdOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            window_log: None,
            size_hint: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ZstdOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tunes the compression level, between [`MIN_COMPRESSION_LEVEL`] and
    /// [`MAX_COMPRESSION_LEVEL`].
    pub fn compression_level(mut self, level: i32) -> Self {
        debug_assert!(
            (MIN_COMPRESSION_LEVEL..=MAX_COMPRESSION_LEVEL).contains(&level),
            "compression level out of range"
        );
        self.compression_level = level;
        self
    }

    /// Overrides the codec's window log, between [`MIN_WINDOW_LOG`] and
    /// [`MAX_WINDOW_LOG`]. Unset, the codec derives it from the level.
    pub fn window_log(mut self, window_log: u32) -> Self {
        debug_assert!(
            (MIN_WINDOW_LOG..=MAX_WINDOW_LOG).contains(&window_log),
            "window log out of range"
        );
        self.window_log = Some(window_log);
        self
    }

    /// Declares the exact uncompressed size; pledged to the codec, which
    /// records it in the frame header and checks it at the end of the
    /// stream.
    pub fn size_hint(mut self, size_hint: u64) -> Self {
        self.size_hint = Some(size_hint);
        self
    }

    /// Capacity of the staging buffer in front of the codec.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        debug_assert!(buffer_size > 0, "buffer size must be positive");
        self.buffer_size = buffer_size;
        self
    }
}

/// Which codec drain to run until it reports nothing pending.
#[derive(Clone, Copy)]
enum Drain {
    Flush,
    End,
}

impl Drain {
    fn name(self) -> &'static str {
        match self {
            Drain::Flush => "ZSTD_flushStream()",
            Drain::End => "ZSTD_endStream()",
        }
    }
}

/// Sink half of [`ZstdWriter`]: the codec state and the downstream writer.
pub struct ZstdSink<'a, W: Writer> {
    dest: Dependency<'a, W>,
    compressor: Option<CCtx<'static>>,
    options: ZstdOptions,
}

impl<'a, W: Writer> ZstdSink<'a, W> {
    pub fn dest(&self) -> &W {
        self.dest.get()
    }

    fn ensure_created(&mut self, status: &mut Status) -> bool {
        if self.compressor.is_some() {
            return true;
        }
        let Some(mut compressor) = CCtx::try_create() else {
            return status.fail("ZSTD_createCStream() failed");
        };
        tracing::trace!(
            level = self.options.compression_level,
            window_log = self.options.window_log,
            pledged = self.options.size_hint,
            "initializing zstd compression stream"
        );
        if let Err(code) =
            compressor.set_parameter(CParameter::CompressionLevel(self.options.compression_level))
        {
            return status.fail(codec_message("ZSTD_initCStream_advanced()", code));
        }
        if let Some(window_log) = self.options.window_log
            && let Err(code) = compressor.set_parameter(CParameter::WindowLog(window_log))
        {
            return status.fail(codec_message("ZSTD_initCStream_advanced()", code));
        }
        if let Err(code) = compressor.set_pledged_src_size(self.options.size_hint) {
            return status.fail(codec_message("ZSTD_initCStream_advanced()", code));
        }
        self.compressor = Some(compressor);
        true
    }

    /// Runs `op` until the codec reports zero bytes pending, pushing the
    /// downstream writer for more space as often as it takes.
    fn drain(&mut self, op: Drain, status: &mut Status) -> bool {
        if !self.ensure_created(status) {
            return false;
        }
        loop {
            let Some(compressor) = self.compressor.as_mut() else {
                return false;
            };
            let dest = self.dest.get_mut();
            let (produced, space_len, result) = {
                let space = dest.space();
                let space_len = space.len();
                let mut output = OutBuffer::around(space);
                let result = match op {
                    Drain::Flush => compressor.flush_stream(&mut output),
                    Drain::End => compressor.end_stream(&mut output),
                };
                (output.pos(), space_len, result)
            };
            dest.advance(produced);
            match result {
                Ok(0) => return true,
                Ok(_) => {}
                Err(code) => return status.fail(codec_message(op.name(), code)),
            }
            debug_assert_eq!(
                produced,
                space_len,
                "codec left output space with bytes still pending"
            );
            if !dest.push() {
                return status.fail(dest.message());
            }
        }
    }
}

impl<'a, W: Writer> RawSink for ZstdSink<'a, W> {
    fn write_raw(&mut self, src: &[u8], status: &mut Status) -> bool {
        debug_assert!(!src.is_empty(), "write_raw() with nothing to write");
        if !self.ensure_created(status) {
            return false;
        }
        let mut input = InBuffer::around(src);
        loop {
            let Some(compressor) = self.compressor.as_mut() else {
                return false;
            };
            let dest = self.dest.get_mut();
            let (produced, space_len, result) = {
                let space = dest.space();
                let space_len = space.len();
                let mut output = OutBuffer::around(space);
                let result = compressor.compress_stream(&mut output, &mut input);
                (output.pos(), space_len, result)
            };
            dest.advance(produced);
            if let Err(code) = result {
                return status.fail(codec_message("ZSTD_compressStream()", code));
            }
            if produced < space_len {
                // Output not filled: the codec took all the input.
                debug_assert_eq!(
                    input.pos(),
                    src.len(),
                    "codec left input with output space remaining"
                );
                return true;
            }
            if !dest.push() {
                return status.fail(dest.message());
            }
        }
    }

    fn flush_raw(&mut self, kind: FlushKind, status: &mut Status) -> bool {
        if !self.drain(Drain::Flush, status) {
            return false;
        }
        let dest = self.dest.get_mut();
        if !dest.flush(kind) {
            return status.fail(dest.message());
        }
        true
    }

    fn close_raw(&mut self, status: &mut Status) {
        if status.healthy() {
            self.drain(Drain::End, status);
        }
        self.compressor = None;
        if self.dest.is_owning() {
            let dest = self.dest.get_mut();
            if !dest.close() {
                status.fail(dest.message());
            }
        }
    }
}

/// Writer compressing everything written to it into a downstream writer.
///
/// Every byte accepted through the [`Writer`] interface is fed to the
/// codec, whose output goes straight into the downstream writer's buffer
/// window. Closing ends the frame and, for an owned downstream, closes it
/// too.
pub type ZstdWriter<'a, W> = BufferedWriter<ZstdSink<'a, W>>;

impl<'a, W: Writer> BufferedWriter<ZstdSink<'a, W>> {
    pub fn new(dest: impl Into<Dependency<'a, W>>) -> Self {
        Self::with_options(dest, ZstdOptions::default())
    }

    pub fn with_options(dest: impl Into<Dependency<'a, W>>, options: ZstdOptions) -> Self {
        let buffer_size = options.buffer_size;
        BufferedWriter::from_sink(
            ZstdSink {
                dest: dest.into(),
                compressor: None,
                options,
            },
            buffer_size,
        )
    }

    /// The downstream writer.
    pub fn dest(&self) -> &W {
        self.sink().dest()
    }
}
