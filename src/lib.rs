//! Huffman coding of symbol streams.
//!
//! A [`CodeTree`] is built from symbol frequencies, written out as a
//! [`Codebook`], rebuilt from that codebook on the other side, and used to
//! decode a bit stream back into symbols. The [`codec`] module wires this up
//! for byte streams and files.

pub mod bitio;
pub mod code_tree;
pub mod codebook;
pub mod codec;
pub mod encoder;
pub mod frequency;

pub use code_tree::{CodeTree, DecodeStatus, Node};
pub use codebook::Codebook;
pub use encoder::Encoder;

/// A symbol of the input alphabet. Bytes use the values 0 to 255.
pub type Symbol = u32;

/// End-of-stream symbol used for byte streams, one past the last byte value.
pub const EOF_SYMBOL: Symbol = frequency::BYTE_ALPHABET as Symbol;
