//! # Bit-Pattern Tables
//!
//! The declarative input of the decode graph. Each [`DecodePattern`] names
//! a node, lists the bits it samples and maps patterns over those bits to
//! the next node (another table, or a [`Category`](super::Category) name).
//!
//! ```text
//! DecodePattern {
//!     name: "DataProcessingImmediate",
//!     sampled_bits: &[25, 24, 23],
//!     mapping: &[
//!         ("00x", "PcRelAddressing"),   // bit 25 = 0, bit 24 = 0, bit 23 = any
//!         ("010", "AddSubImmediate"),
//!         ...
//!         ("otherwise", "Unallocated"),
//!     ],
//! }
//! ```
//!
//! Pattern character *i* describes `sampled_bits[i]`: `1` set, `0` clear,
//! `x` don't care. The literal `otherwise` is the catch-all entry: it must
//! come last and can never be the first (primary) entry of a table.

use thiserror::Error;

/// The catch-all pattern.
pub const OTHERWISE: &str = "otherwise";

/// Upper bound on sampled bits per node; a compiled node has `2^n` slots.
pub const MAX_SAMPLED_BITS: usize = 16;

/// Upper bound on explicit patterns per node.
pub const MAX_PATTERNS: usize = 100;

/// Width of an instruction word.
pub const WORD_BITS: u8 = 32;

/// One static bit-pattern table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodePattern {
    pub name: &'static str,
    pub sampled_bits: &'static [u8],
    pub mapping: &'static [(&'static str, &'static str)],
}

/// Defects found while building a decode graph. All of them are
/// construction-time errors: a graph that builds never reports one later.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("node `{node}` samples no bits")]
    NoSampledBits { node: &'static str },

    #[error("node `{node}` samples {count} bits, at most {MAX_SAMPLED_BITS} are supported")]
    TooManySampledBits { node: &'static str, count: usize },

    #[error("node `{node}` samples bit {bit}, outside of the instruction word")]
    BitOutOfRange { node: &'static str, bit: u8 },

    #[error("node `{node}` samples bit {bit} more than once")]
    DuplicateSampledBit { node: &'static str, bit: u8 },

    #[error("node `{node}` has no patterns")]
    NoPatterns { node: &'static str },

    #[error("node `{node}` has {count} patterns, at most {MAX_PATTERNS} are supported")]
    TooManyPatterns { node: &'static str, count: usize },

    #[error("pattern `{pattern}` of node `{node}` has {len} symbols, expected {expected}")]
    PatternLength {
        node: &'static str,
        pattern: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("pattern `{pattern}` of node `{node}` contains invalid symbol `{symbol}`")]
    InvalidSymbol {
        node: &'static str,
        pattern: &'static str,
        symbol: char,
    },

    #[error("node `{node}` uses `otherwise` as its primary pattern")]
    OtherwiseFirst { node: &'static str },

    #[error("node `{node}` has patterns after its `otherwise` entry")]
    OtherwiseNotLast { node: &'static str },

    #[error("node `{node}` is defined more than once")]
    DuplicateNode { node: &'static str },

    #[error("node `{node}` refers to unknown node `{target}`")]
    UnknownTarget {
        node: &'static str,
        target: &'static str,
    },

    #[error("node `{node}` leaves index {index:#b} unmapped and has no `otherwise` entry")]
    UnmappedSlot { node: &'static str, index: usize },

    #[error("node `{node}` is part of a cycle")]
    Cycle { node: &'static str },

    #[error("root node `{node}` is not defined")]
    UnknownRoot { node: &'static str },

    #[error("no root is registered for the base instruction set")]
    MissingBaseRoot,
}

impl DecodePattern {
    /// Checks every invariant that can be decided from this entry alone.
    pub fn validate(&self) -> Result<(), TableError> {
        let node = self.name;
        let count = self.sampled_bits.len();

        if count == 0 {
            return Err(TableError::NoSampledBits { node });
        }
        if count > MAX_SAMPLED_BITS {
            return Err(TableError::TooManySampledBits { node, count });
        }

        let mut seen = 0_u32;
        for &bit in self.sampled_bits {
            if bit >= WORD_BITS {
                return Err(TableError::BitOutOfRange { node, bit });
            }
            if seen & (1 << bit) != 0 {
                return Err(TableError::DuplicateSampledBit { node, bit });
            }
            seen |= 1 << bit;
        }

        if self.mapping.is_empty() {
            return Err(TableError::NoPatterns { node });
        }
        if self.mapping.len() > MAX_PATTERNS {
            return Err(TableError::TooManyPatterns {
                node,
                count: self.mapping.len(),
            });
        }

        for (position, &(pattern, _)) in self.mapping.iter().enumerate() {
            if pattern == OTHERWISE {
                if position == 0 {
                    return Err(TableError::OtherwiseFirst { node });
                }
                if position != self.mapping.len() - 1 {
                    return Err(TableError::OtherwiseNotLast { node });
                }
                continue;
            }

            let len = pattern.chars().count();
            if len != count {
                return Err(TableError::PatternLength {
                    node,
                    pattern,
                    len,
                    expected: count,
                });
            }
            if let Some(symbol) = pattern.chars().find(|c| !matches!(c, '0' | '1' | 'x')) {
                return Err(TableError::InvalidSymbol {
                    node,
                    pattern,
                    symbol,
                });
            }
        }

        Ok(())
    }

    /// Target of the `otherwise` entry, if the table has one.
    #[must_use]
    pub fn otherwise(&self) -> Option<&'static str> {
        self.mapping
            .last()
            .filter(|(pattern, _)| *pattern == OTHERWISE)
            .map(|&(_, target)| target)
    }

    /// The explicit (non-`otherwise`) entries in priority order.
    pub fn explicit_patterns(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.mapping
            .iter()
            .copied()
            .filter(|(pattern, _)| *pattern != OTHERWISE)
    }
}
