use crate::bitio::BitSink;
use crate::codebook::Codebook;
use crate::Symbol;
use std::collections::HashMap;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("symbol {symbol} has no code in the codebook")]
    UnknownSymbol { symbol: Symbol },
    #[error("end-of-stream symbol {eof} has no code in the codebook")]
    MissingEndOfStream { eof: Symbol },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Writes symbols as the bit patterns of a codebook, terminated by the code of
/// the end-of-stream symbol.
#[derive(Debug, Clone)]
pub struct Encoder {
    codes: HashMap<Symbol, Vec<bool>>,
    eof: Symbol,
}

impl Encoder {
    /// Code strings are read the same way a tree is rebuilt from them: `0` is
    /// a zero bit and anything else a one bit. The first entry of a symbol
    /// wins.
    pub fn new(codebook: &Codebook, eof: Symbol) -> Result<Self, EncodeError> {
        let mut codes = HashMap::with_capacity(codebook.len());

        for entry in codebook {
            codes
                .entry(entry.symbol)
                .or_insert_with(|| entry.code.chars().map(|c| c != '0').collect());
        }

        if !codes.contains_key(&eof) {
            return Err(EncodeError::MissingEndOfStream { eof });
        }

        Ok(Encoder { codes, eof })
    }

    pub fn code(&self, symbol: Symbol) -> Option<&[bool]> {
        self.codes.get(&symbol).map(Vec::as_slice)
    }

    pub fn encode_symbol(
        &self,
        symbol: Symbol,
        sink: &mut (impl BitSink + ?Sized),
    ) -> Result<(), EncodeError> {
        let code = self
            .codes
            .get(&symbol)
            .ok_or(EncodeError::UnknownSymbol { symbol })?;

        for &bit in code {
            sink.write_bit(bit)?;
        }

        Ok(())
    }

    pub fn encode_all(
        &self,
        symbols: impl IntoIterator<Item = Symbol>,
        sink: &mut (impl BitSink + ?Sized),
    ) -> Result<(), EncodeError> {
        for symbol in symbols {
            self.encode_symbol(symbol, sink)?;
        }

        Ok(())
    }

    /// Writes the end-of-stream code.
    pub fn finish(&self, sink: &mut (impl BitSink + ?Sized)) -> Result<(), EncodeError> {
        self.encode_symbol(self.eof, sink)
    }
}
