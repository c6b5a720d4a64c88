//! Input opening with transparent gzip/bgzip decompression.

use crate::streaming::buffers::DEFAULT_INPUT_BUFFER;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Wrap a reader, decompressing it if it starts with the gzip magic bytes.
///
/// `MultiGzDecoder` reads every member, so BGZF files decode as a whole.
pub fn maybe_decompress<R: Read + 'static>(reader: R) -> io::Result<Box<dyn BufRead>> {
    let mut buffered = BufReader::with_capacity(DEFAULT_INPUT_BUFFER, reader);
    let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(
            DEFAULT_INPUT_BUFFER,
            MultiGzDecoder::new(buffered),
        )))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Open a plain or compressed text file; `-` reads stdin.
pub fn open_input<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        return maybe_decompress(io::stdin());
    }
    maybe_decompress(File::open(path)?)
}
