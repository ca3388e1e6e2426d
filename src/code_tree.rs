//! The code tree: leaves are symbols and the path from the root to a leaf is
//! the leaf's code (`0` = left, `1` = right).

use crate::bitio::BitSource;
use crate::codebook::{Codebook, CodebookError};
use crate::frequency;
use crate::{Symbol, EOF_SYMBOL};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("total weight overflows a 64-bit counter")]
    WeightOverflow,
    #[error("frequency table has {0} entries, more than the symbol type can index")]
    TooManySymbols(usize),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bit stream is not empty but the code tree has no symbols")]
    EmptyTree,
    #[error("code tree is a single leaf for symbol {symbol}, which is not the end-of-stream symbol")]
    DegenerateTree { symbol: Symbol },
    #[error("no symbol is assigned to the code read so far ({depth} bits)")]
    UnassignedCode { depth: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The end-of-stream symbol was decoded.
    Complete,
    /// The bits ran out first. `pending_bits` is how far into an unfinished
    /// code the stream ended, 0 when it ended between two symbols.
    Truncated { pending_bits: usize },
}

/// Receiver of decoded symbols.
pub trait SymbolSink {
    fn write_symbol(&mut self, symbol: Symbol) -> io::Result<()>;
}

impl SymbolSink for Vec<Symbol> {
    fn write_symbol(&mut self, symbol: Symbol) -> io::Result<()> {
        self.push(symbol);
        Ok(())
    }
}

/// Writes each symbol as one byte.
pub struct ByteSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> ByteSink<W> {
    pub fn new(writer: W) -> Self {
        ByteSink { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SymbolSink for ByteSink<W> {
    fn write_symbol(&mut self, symbol: Symbol) -> io::Result<()> {
        let byte = u8::try_from(symbol).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("decoded symbol {symbol} does not fit in a byte"),
            )
        })?;

        self.writer.write_all(&[byte])?;
        self.written += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Symbol),
    /// Trees built from frequencies always have both children. Trees rebuilt
    /// from a codebook that does not describe a full tree may miss one.
    Internal {
        left: Option<Box<Node>>,
        right: Option<Box<Node>>,
    },
}

impl Node {
    fn branch(left: Node, right: Node) -> Node {
        Node::Internal {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Child slot for `bit`, turning a leaf into an empty internal node first.
    fn child_mut(&mut self, bit: bool) -> &mut Option<Box<Node>> {
        if self.is_leaf() {
            *self = Node::Internal {
                left: None,
                right: None,
            };
        }

        match self {
            Node::Internal { left, right } => {
                if bit {
                    right
                } else {
                    left
                }
            }
            Node::Leaf(_) => unreachable!("leaf was replaced above"),
        }
    }

    fn children(&self) -> impl Iterator<Item = &Node> + '_ {
        let (left, right) = match self {
            Node::Leaf(_) => (None, None),
            Node::Internal { left, right } => (left.as_deref(), right.as_deref()),
        };

        left.into_iter().chain(right)
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    weight: u64,
    // Insertion order, breaks ties between equal weights.
    idx: usize,
}

fn push_candidate(
    nodes: &mut Vec<Option<Node>>,
    heap: &mut BinaryHeap<Reverse<HeapEntry>>,
    node: Node,
    weight: u64,
) {
    heap.push(Reverse(HeapEntry {
        weight,
        idx: nodes.len(),
    }));
    nodes.push(Some(node));
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTree {
    root: Option<Box<Node>>,
}

impl CodeTree {
    /// A tree without any symbol. It can only decode a stream with no bits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a Huffman tree where `frequencies[s]` is the number of
    /// occurrences of symbol `s`. Symbols with a count of 0 are left out. The
    /// `eof` symbol is always part of the tree, with a weight of 1 unless it
    /// has a positive count of its own.
    pub fn build(frequencies: &[u64], eof: Symbol) -> Result<CodeTree, BuildError> {
        if Symbol::try_from(frequencies.len()).is_err() {
            return Err(BuildError::TooManySymbols(frequencies.len()));
        }

        // Nodes are parked here while the heap orders their indices.
        let mut nodes = Vec::<Option<Node>>::with_capacity(2 * frequencies.len() + 1);
        let mut heap = BinaryHeap::<Reverse<HeapEntry>>::new();

        for (symbol, &freq) in frequencies.iter().enumerate() {
            if freq != 0 {
                push_candidate(&mut nodes, &mut heap, Node::Leaf(symbol as Symbol), freq);
            }
        }

        let eof_counted = frequencies.get(eof as usize).is_some_and(|&freq| freq != 0);
        if !eof_counted {
            push_candidate(&mut nodes, &mut heap, Node::Leaf(eof), 1);
        }

        let num_leaves = heap.len();

        while heap.len() > 1 {
            let (Some(Reverse(first)), Some(Reverse(second))) = (heap.pop(), heap.pop()) else {
                break;
            };

            let weight = first
                .weight
                .checked_add(second.weight)
                .ok_or(BuildError::WeightOverflow)?;

            let (Some(left), Some(right)) = (nodes[first.idx].take(), nodes[second.idx].take())
            else {
                unreachable!("every heap entry owns a parked node");
            };

            push_candidate(&mut nodes, &mut heap, Node::branch(left, right), weight);
        }

        let root = heap
            .pop()
            .and_then(|Reverse(entry)| nodes[entry.idx].take())
            .map(Box::new);

        let tree = CodeTree { root };
        debug!(leaves = num_leaves, depth = tree.depth(), "built code tree");

        Ok(tree)
    }

    /// Counts the bytes of `data` and builds a tree over them, with
    /// [`EOF_SYMBOL`] as the end-of-stream symbol.
    pub fn from_bytes(data: &[u8]) -> Result<CodeTree, BuildError> {
        Self::build(&frequency::count_bytes_in(data), EOF_SYMBOL)
    }

    /// Rebuilds a tree from a codebook without checking it. For every entry
    /// the path is walked from the root, creating nodes as needed; `0` goes
    /// left and any other character goes right. The node at the end of the
    /// path becomes a leaf for the entry's symbol, replacing what was there.
    pub fn from_codebook(codebook: &Codebook) -> CodeTree {
        let mut root: Option<Box<Node>> = None;

        for entry in codebook {
            let mut slot = &mut root;

            for character in entry.code.chars() {
                let node = slot.get_or_insert_with(|| {
                    Box::new(Node::Internal {
                        left: None,
                        right: None,
                    })
                });
                slot = node.child_mut(character != '0');
            }

            *slot = Some(Box::new(Node::Leaf(entry.symbol)));
        }

        let tree = CodeTree { root };
        trace!(entries = codebook.len(), leaves = tree.leaf_count(), "rebuilt code tree");
        tree
    }

    /// Like [`CodeTree::from_codebook`], but rejects codebooks that are not a
    /// valid prefix code first.
    pub fn from_codebook_checked(codebook: &Codebook) -> Result<CodeTree, CodebookError> {
        codebook.validate()?;
        Ok(Self::from_codebook(codebook))
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = self.root.as_deref().into_iter().collect::<Vec<_>>();

        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                count += 1;
            }
            stack.extend(node.children());
        }

        count
    }

    /// Length of the longest code.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut stack = self
            .root
            .as_deref()
            .map(|node| (node, 0))
            .into_iter()
            .collect::<Vec<_>>();

        while let Some((node, level)) = stack.pop() {
            depth = depth.max(level);
            stack.extend(node.children().map(|child| (child, level + 1)));
        }

        depth
    }

    /// True when every internal node has two children.
    pub fn is_complete(&self) -> bool {
        let mut stack = self.root.as_deref().into_iter().collect::<Vec<_>>();

        while let Some(node) = stack.pop() {
            if let Node::Internal { left, right } = node {
                match (left, right) {
                    (Some(left), Some(right)) => {
                        stack.push(left);
                        stack.push(right);
                    }
                    _ => return false,
                }
            }
        }

        true
    }

    /// Lists the leaves in preorder, left before right, each with its path.
    pub fn codebook(&self) -> Codebook {
        fn walk(node: &Node, path: &mut String, codebook: &mut Codebook) {
            match node {
                Node::Leaf(symbol) => codebook.push(*symbol, path.as_str()),
                Node::Internal { left, right } => {
                    if let Some(left) = left {
                        path.push('0');
                        walk(left, path, codebook);
                        path.pop();
                    }
                    if let Some(right) = right {
                        path.push('1');
                        walk(right, path, codebook);
                        path.pop();
                    }
                }
            }
        }

        let mut codebook = Codebook::new();
        if let Some(root) = self.root.as_deref() {
            walk(root, &mut String::new(), &mut codebook);
        }

        codebook
    }

    /// Walks the tree bit by bit, emitting a symbol and restarting at the root
    /// every time a leaf is reached, until the `eof` leaf is reached or the
    /// bits run out.
    pub fn decode<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        eof: Symbol,
    ) -> Result<DecodeStatus, DecodeError>
    where
        S: BitSource + ?Sized,
        K: SymbolSink + ?Sized,
    {
        let Some(root) = self.root.as_deref() else {
            return match source.read_bit()? {
                None => Ok(DecodeStatus::Truncated { pending_bits: 0 }),
                Some(_) => Err(DecodeError::EmptyTree),
            };
        };

        let (root_left, root_right) = match root {
            Node::Leaf(symbol) if *symbol == eof => return Ok(DecodeStatus::Complete),
            Node::Leaf(symbol) => return Err(DecodeError::DegenerateTree { symbol: *symbol }),
            Node::Internal { left, right } => (left, right),
        };

        let (mut left, mut right) = (root_left, root_right);
        let mut depth = 0;

        loop {
            let Some(bit) = source.read_bit()? else {
                return Ok(DecodeStatus::Truncated {
                    pending_bits: depth,
                });
            };
            depth += 1;

            let next = if bit { right } else { left };

            match next.as_deref() {
                None => return Err(DecodeError::UnassignedCode { depth }),
                Some(Node::Internal {
                    left: next_left,
                    right: next_right,
                }) => {
                    left = next_left;
                    right = next_right;
                }
                Some(Node::Leaf(symbol)) => {
                    if *symbol == eof {
                        return Ok(DecodeStatus::Complete);
                    }

                    sink.write_symbol(*symbol)?;
                    left = root_left;
                    right = root_right;
                    depth = 0;
                }
            }
        }
    }
}
