//! Byte stream compression on top of [`CodeTree`].
//!
//! A compressed stream comes in two parts: the bit stream holding the codes of
//! every input byte followed by the end-of-stream code, and the codebook text
//! that describes the tree.

use crate::bitio::{BitReader, BitWriter};
use crate::code_tree::{BuildError, ByteSink, CodeTree, DecodeError, DecodeStatus};
use crate::codebook::{Codebook, CodebookError};
use crate::encoder::{EncodeError, Encoder};
use crate::frequency;
use crate::{Symbol, EOF_SYMBOL};
use crc::{Crc, Digest, CRC_32_ISO_HDLC};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to build the code tree")]
    Build(#[from] BuildError),
    #[error("invalid codebook")]
    Codebook(#[from] CodebookError),
    #[error("failed to encode")]
    Encode(#[from] EncodeError),
    #[error("failed to decode")]
    Decode(#[from] DecodeError),
    #[error(
        "compressed stream ends before the end-of-stream code \
         ({output_bytes} bytes decoded, {pending_bits} bits into an unfinished code)"
    )]
    Truncated { pending_bits: usize, output_bytes: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressSummary {
    pub input_bytes: u64,
    /// Bits of the compressed stream, without the padding of the last byte.
    pub output_bits: u64,
    pub codebook_entries: usize,
    /// CRC-32 of the input.
    pub crc32: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressSummary {
    pub status: DecodeStatus,
    pub output_bytes: u64,
    /// CRC-32 of the output.
    pub crc32: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DecompressOptions {
    /// Reject codebooks that are not a prefix code made of `0` and `1`.
    pub validate_codebook: bool,
    /// Treat a stream that runs out before the end-of-stream code as a
    /// success. Otherwise it fails with [`CodecError::Truncated`].
    pub allow_truncated: bool,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            validate_codebook: true,
            allow_truncated: false,
        }
    }
}

struct ChecksumReader<R: Read> {
    reader: R,
    digest: Digest<'static, u32>,
    length: u64,
}

impl<R: Read> ChecksumReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            digest: CRC32.digest(),
            length: 0,
        }
    }

    fn finalize(self) -> (u32, u64) {
        (self.digest.finalize(), self.length)
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read_bytes = self.reader.read(buf)?;
        self.digest.update(&buf[0..read_bytes]);
        self.length += read_bytes as u64;
        Ok(read_bytes)
    }
}

struct ChecksumWriter<W: Write> {
    writer: W,
    digest: Digest<'static, u32>,
}

impl<W: Write> ChecksumWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            digest: CRC32.digest(),
        }
    }

    fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.digest.update(&buf[0..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Compresses `reader` into `writer` and writes the codebook to
/// `codebook_writer`. The input is read twice: once to count the bytes, once
/// to encode them.
pub fn compress(
    mut reader: impl Read + Seek,
    writer: impl Write,
    codebook_writer: impl Write,
) -> Result<CompressSummary, CodecError> {
    let mut checksum_reader = ChecksumReader::new(&mut reader);
    let stats = frequency::count_bytes(&mut checksum_reader)?;
    let (crc32, input_bytes) = checksum_reader.finalize();
    reader.rewind()?;

    let tree = CodeTree::build(&stats, EOF_SYMBOL)?;
    let codebook = tree.codebook();
    codebook.write_to(codebook_writer)?;

    let encoder = Encoder::new(&codebook, EOF_SYMBOL)?;
    let mut bit_writer = BitWriter::new(writer);

    let mut buffer = [0; 4096];
    loop {
        let num_read_bytes = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        for byte in &buffer[0..num_read_bytes] {
            encoder.encode_symbol(*byte as Symbol, &mut bit_writer)?;
        }
    }
    encoder.finish(&mut bit_writer)?;
    bit_writer.finish()?;

    let summary = CompressSummary {
        input_bytes,
        output_bits: bit_writer.bits_written(),
        codebook_entries: codebook.len(),
        crc32,
    };
    debug!(?summary, "compressed stream");

    Ok(summary)
}

/// Rebuilds the tree from the codebook in `codebook_reader` and decodes the
/// bit stream of `reader` into `writer`. Symbols are written as they are
/// decoded, so on [`CodecError::Truncated`] `writer` already holds the
/// partial output.
pub fn decompress(
    reader: impl Read,
    codebook_reader: impl io::BufRead,
    writer: impl Write,
    options: DecompressOptions,
) -> Result<DecompressSummary, CodecError> {
    let codebook = Codebook::read_from(codebook_reader)?;
    let tree = if options.validate_codebook {
        CodeTree::from_codebook_checked(&codebook)?
    } else {
        CodeTree::from_codebook(&codebook)
    };

    let mut bit_reader = BitReader::new(reader);
    let mut sink = ByteSink::new(ChecksumWriter::new(writer));
    let status = tree.decode(&mut bit_reader, &mut sink, EOF_SYMBOL)?;

    let output_bytes = sink.written();
    let mut checksum_writer = sink.into_inner();
    checksum_writer.flush()?;

    if let DecodeStatus::Truncated { pending_bits } = status {
        if !options.allow_truncated {
            return Err(CodecError::Truncated {
                pending_bits,
                output_bytes,
            });
        }
    }

    let summary = DecompressSummary {
        status,
        output_bytes,
        crc32: checksum_writer.finalize(),
    };
    debug!(?summary, "decompressed stream");

    Ok(summary)
}

/// Default location of the codebook belonging to `compressed`: the same path
/// with `.code` appended.
pub fn codebook_path_for(compressed: &Path) -> PathBuf {
    let mut path = OsString::from(compressed.as_os_str());
    path.push(".code");
    PathBuf::from(path)
}

pub fn compress_file(
    input_path: &Path,
    output_path: &Path,
    codebook_path: &Path,
) -> Result<CompressSummary, CodecError> {
    let input_file = File::open(input_path)?;
    let output_file = File::create(output_path)?;
    let codebook_file = File::create(codebook_path)?;

    let buf_reader = BufReader::new(input_file);
    let buf_writer = BufWriter::new(output_file);

    compress(buf_reader, buf_writer, BufWriter::new(codebook_file))
}

/// Like [`decompress`], but the output file is removed again when
/// decompression fails, truncation included.
pub fn decompress_file(
    input_path: &Path,
    codebook_path: &Path,
    output_path: &Path,
    options: DecompressOptions,
) -> Result<DecompressSummary, CodecError> {
    let input_file = File::open(input_path)?;
    let codebook_file = File::open(codebook_path)?;
    let output_file = File::create(output_path)?;

    let result = decompress(
        BufReader::new(input_file),
        BufReader::new(codebook_file),
        BufWriter::new(output_file),
        options,
    );

    if let Err(e) = &result {
        debug!(error = %e, path = %output_path.display(), "removing partial output");
        if let Err(remove_error) = fs::remove_file(output_path) {
            warn!(
                error = %remove_error,
                path = %output_path.display(),
                "could not remove partial output"
            );
        }
    }

    result
}
