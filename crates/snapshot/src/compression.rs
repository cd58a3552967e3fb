//! Optional gzip wrapping for snapshot streams
//!
//! Compressed snapshots keep the historical `.7z` suffix in their names but
//! are plain gzip streams. The codec and framing never see compression: the
//! writer is handed a [`SnapshotSink`], the reader a decoded [`BufRead`].

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, BufRead, BufReader, Read, Write};

/// Suffix of an uncompressed snapshot
pub const PLAIN_SUFFIX: &str = ".txt";

/// Suffix of a compressed snapshot
pub const COMPRESSED_SUFFIX: &str = ".7z";

/// True if a snapshot name denotes a compressed stream
pub fn is_compressed_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(COMPRESSED_SUFFIX)
}

/// File suffix for the given compression setting
pub fn suffix(compress: bool) -> &'static str {
    if compress {
        COMPRESSED_SUFFIX
    } else {
        PLAIN_SUFFIX
    }
}

/// Byte sink for a snapshot, gzip-wrapped or not
pub enum SnapshotSink<W: Write> {
    /// Bytes pass straight through
    Plain(W),
    /// Bytes are gzip-compressed
    Gzip(GzEncoder<W>),
}

impl<W: Write> SnapshotSink<W> {
    /// Wrap `inner`, compressing when asked
    pub fn new(inner: W, compress: bool) -> Self {
        if compress {
            SnapshotSink::Gzip(GzEncoder::new(inner, Compression::default()))
        } else {
            SnapshotSink::Plain(inner)
        }
    }

    /// Write the gzip trailer (if any), flush, and return the inner sink
    pub fn finish(self) -> io::Result<W> {
        match self {
            SnapshotSink::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            SnapshotSink::Gzip(encoder) => {
                let mut w = encoder.finish()?;
                w.flush()?;
                Ok(w)
            }
        }
    }
}

impl<W: Write> Write for SnapshotSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SnapshotSink::Plain(w) => w.write(buf),
            SnapshotSink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SnapshotSink::Plain(w) => w.flush(),
            SnapshotSink::Gzip(w) => w.flush(),
        }
    }
}

/// Buffered line source, gunzipping when `compressed`
pub fn open_source<'a, R: Read + 'a>(inner: R, compressed: bool) -> Box<dyn BufRead + 'a> {
    if compressed {
        Box::new(BufReader::new(MultiGzDecoder::new(inner)))
    } else {
        Box::new(BufReader::new(inner))
    }
}
