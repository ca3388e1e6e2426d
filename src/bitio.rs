use std::io::{self, Read, Write};

/// Source of single bits. `Ok(None)` means the stream has no more bits.
pub trait BitSource {
    fn read_bit(&mut self) -> io::Result<Option<bool>>;
}

/// Sink of single bits.
pub trait BitSink {
    fn write_bit(&mut self, bit: bool) -> io::Result<()>;
}

/// Packs bits MSB-first into bytes. The last byte is padded with zero bits.
pub struct BitWriter<W: Write> {
    writer: W,
    buffer: u8,
    buffer_length: u8,
    bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(writer: W) -> Self {
        BitWriter {
            writer,
            buffer: 0,
            buffer_length: 0,
            bits_written: 0,
        }
    }

    /// Number of bits written so far, excluding padding.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer_length > 0 {
            self.buffer <<= 8 - self.buffer_length;
            self.writer.write_all(&[self.buffer])?;
            self.buffer = 0;
            self.buffer_length = 0;
        }

        Ok(())
    }

    /// Writes out the partially filled byte and flushes the inner writer.
    pub fn finish(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.writer.flush()
    }
}

impl<W: Write> BitSink for BitWriter<W> {
    fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.buffer = (self.buffer << 1) | bit as u8;
        self.buffer_length += 1;
        self.bits_written += 1;

        if self.buffer_length == 8 {
            self.flush_buffer()?;
        }

        Ok(())
    }
}

impl<W: Write> Drop for BitWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush_buffer();
    }
}

/// Reads bits MSB-first from a byte stream.
pub struct BitReader<R: Read> {
    reader: R,
    buffer: u8,
    buffer_length: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(reader: R) -> Self {
        BitReader {
            reader,
            buffer: 0,
            buffer_length: 0,
        }
    }
}

impl<R: Read> BitSource for BitReader<R> {
    fn read_bit(&mut self) -> io::Result<Option<bool>> {
        if self.buffer_length == 0 {
            let mut byte = [0];
            let bytes_read = loop {
                match self.reader.read(&mut byte) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other?,
                }
            };

            if bytes_read == 0 {
                return Ok(None);
            }

            self.buffer = byte[0];
            self.buffer_length = 8;
        }

        self.buffer_length -= 1;

        Ok(Some((self.buffer >> self.buffer_length) & 1 == 1))
    }
}

/// Bits held in memory, mostly useful for tests and for short codes.
impl BitSource for std::collections::VecDeque<bool> {
    fn read_bit(&mut self) -> io::Result<Option<bool>> {
        Ok(self.pop_front())
    }
}

impl BitSink for Vec<bool> {
    fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.push(bit);
        Ok(())
    }
}
