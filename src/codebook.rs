//! The codebook: an ordered list of (symbol, code) pairs that fully describes a
//! code tree.
//!
//! Text format: for every entry, one line with the decimal symbol followed by
//! one line with the code, written as a string of `0` and `1` characters.

use crate::Symbol;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodebookError {
    #[error("line {line}: invalid symbol {text:?}")]
    InvalidSymbol { line: usize, text: String },
    #[error("symbol {symbol} has no code line")]
    MissingCode { symbol: Symbol },
    #[error("code for symbol {symbol} contains {character:?}, expected '0' or '1'")]
    InvalidCodeChar { symbol: Symbol, character: char },
    #[error("symbol {symbol} appears more than once")]
    DuplicateSymbol { symbol: Symbol },
    #[error("symbols {first} and {second} share the code {code:?}")]
    DuplicateCode {
        first: Symbol,
        second: Symbol,
        code: String,
    },
    #[error("code of symbol {prefix} is a prefix of the code of symbol {symbol}")]
    PrefixConflict { prefix: Symbol, symbol: Symbol },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodebookEntry {
    pub symbol: Symbol,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    entries: Vec<CodebookEntry>,
}

impl Codebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: Symbol, code: impl Into<String>) {
        self.entries.push(CodebookEntry {
            symbol,
            code: code.into(),
        });
    }

    pub fn entries(&self) -> &[CodebookEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodebookEntry> + '_ {
        self.entries.iter()
    }

    /// Returns the code of the first entry for `symbol`.
    pub fn code_of(&self, symbol: Symbol) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.symbol == symbol)
            .map(|entry| entry.code.as_str())
    }

    /// Sum of `frequencies[symbol] * code length` over all entries, or `None`
    /// if it does not fit in a `u64`. Symbols outside `frequencies` count as
    /// zero.
    pub fn weighted_length(&self, frequencies: &[u64]) -> Option<u64> {
        self.entries.iter().try_fold(0u64, |total, entry| {
            let freq = frequencies.get(entry.symbol as usize).copied().unwrap_or(0);
            let len = u64::try_from(entry.code.len()).ok()?;
            total.checked_add(freq.checked_mul(len)?)
        })
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(writer, "{}", entry.symbol)?;
            writeln!(writer, "{}", entry.code)?;
        }

        writer.flush()
    }

    /// Parses the text format. Code lines are taken verbatim; use
    /// [`Codebook::validate`] to check them.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self, CodebookError> {
        let mut codebook = Codebook::new();
        let mut lines = reader.lines().enumerate();

        while let Some((idx, line)) = lines.next() {
            let line = line?;
            let text = line.trim_end_matches('\r');
            let symbol = text
                .trim()
                .parse::<Symbol>()
                .map_err(|_| CodebookError::InvalidSymbol {
                    line: idx + 1,
                    text: text.to_string(),
                })?;

            let code = match lines.next() {
                Some((_, code)) => code?,
                None => return Err(CodebookError::MissingCode { symbol }),
            };

            codebook.push(symbol, code.trim_end_matches('\r'));
        }

        Ok(codebook)
    }

    /// Checks that every code is binary, that symbols and codes are unique and
    /// that no code is a prefix of another.
    pub fn validate(&self) -> Result<(), CodebookError> {
        let mut symbols = HashSet::new();

        for entry in &self.entries {
            if let Some(character) = entry.code.chars().find(|c| *c != '0' && *c != '1') {
                return Err(CodebookError::InvalidCodeChar {
                    symbol: entry.symbol,
                    character,
                });
            }

            if !symbols.insert(entry.symbol) {
                return Err(CodebookError::DuplicateSymbol {
                    symbol: entry.symbol,
                });
            }
        }

        // In lexicographic order a prefix sorts directly before the codes that
        // extend it, so checking neighbours is enough.
        let mut sorted = self.entries.iter().collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.code.cmp(&b.code));

        for pair in sorted.windows(2) {
            let (first, second) = (pair[0], pair[1]);

            if first.code == second.code {
                return Err(CodebookError::DuplicateCode {
                    first: first.symbol,
                    second: second.symbol,
                    code: first.code.clone(),
                });
            }

            if second.code.starts_with(&first.code) {
                return Err(CodebookError::PrefixConflict {
                    prefix: first.symbol,
                    symbol: second.symbol,
                });
            }
        }

        Ok(())
    }
}

impl FromIterator<(Symbol, String)> for Codebook {
    fn from_iter<I: IntoIterator<Item = (Symbol, String)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(symbol, code)| CodebookEntry { symbol, code })
            .collect();

        Codebook { entries }
    }
}

impl<'a> IntoIterator for &'a Codebook {
    type Item = &'a CodebookEntry;
    type IntoIter = std::slice::Iter<'a, CodebookEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
