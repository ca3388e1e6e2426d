use crate::Symbol;
use std::io::{self, Read};

/// Number of distinct byte values. Byte streams use this value as their
/// end-of-stream symbol.
pub const BYTE_ALPHABET: usize = 256;

/// Counts how often every byte value occurs in `reader`. The returned table
/// has [`BYTE_ALPHABET`] entries.
pub fn count_bytes(reader: &mut impl Read) -> io::Result<Vec<u64>> {
    let mut stats = vec![0; BYTE_ALPHABET];
    let mut buffer = [0; 4096];

    loop {
        let num_read_bytes = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        for byte in &buffer[0..num_read_bytes] {
            stats[*byte as usize] += 1;
        }
    }

    Ok(stats)
}

pub fn count_bytes_in(data: &[u8]) -> Vec<u64> {
    let mut stats = vec![0; BYTE_ALPHABET];
    for byte in data {
        stats[*byte as usize] += 1;
    }
    stats
}

/// Counts symbols from an arbitrary alphabet. The table grows to fit the
/// largest symbol seen.
pub fn count_symbols(symbols: impl IntoIterator<Item = Symbol>) -> Vec<u64> {
    let mut stats = Vec::new();

    for symbol in symbols {
        let idx = symbol as usize;
        if idx >= stats.len() {
            stats.resize(idx + 1, 0);
        }
        stats[idx] += 1;
    }

    stats
}
