//! # Decode Nodes
//!
//! A [`DecodeNode`] is the parsed, validated form of one table entry (or of
//! a category leaf). Patterns are rewritten from *table order* (character
//! *i* describes `sampled_bits[i]`) into *index order*, where the pattern
//! read left to right is the binary form of the compressed slot index:
//!
//! ```text
//! sampled_bits   [24, 4, 31]          pattern "10x"
//!
//! sorted desc    [31, 24, 4]          ordered "x10"
//! index bit       2   1   0           mask 0b011, value 0b010
//! ```
//!
//! The index of a word is `word.compress(sampled_mask)`: bit 0 of the index
//! is the lowest sampled bit of the word.

use crate::bitwise::Bits;

use super::category::Category;
use super::table::{DecodePattern, TableError};

/// Reorders `pattern` so that its rightmost character describes the lowest
/// sampled bit.
#[must_use]
pub fn generate_ordered_pattern(pattern: &str, sampled_bits: &[u8]) -> String {
    debug_assert_eq!(pattern.chars().count(), sampled_bits.len());
    let mut pairs: Vec<(u8, char)> = sampled_bits.iter().copied().zip(pattern.chars()).collect();
    pairs.sort_by(|a, b| b.0.cmp(&a.0));
    pairs.into_iter().map(|(_, symbol)| symbol).collect()
}

/// Turns an ordered pattern into its `(mask, value)` pair over the slot
/// index: a slot `i` matches when `i & mask == value`.
#[must_use]
pub fn generate_mask_value_pair(ordered: &str) -> (u32, u32) {
    ordered.chars().fold((0, 0), |(mask, value), symbol| {
        let (mask, value) = (mask << 1, value << 1);
        match symbol {
            '1' => (mask | 1, value | 1),
            '0' => (mask | 1, value),
            _ => (mask, value),
        }
    })
}

/// Every slot index of a `width`-bit table matched by `(mask, value)`, in
/// increasing order. Enumerates the subsets of the don't-care bits.
pub fn matching_slots(mask: u32, value: u32, width: usize) -> impl Iterator<Item = usize> {
    let full = if width >= 32 { u32::MAX } else { (1 << width) - 1 };
    let dont_care = !mask & full;
    let mut subset = Some(0_u32);

    std::iter::from_fn(move || {
        let current = subset?;
        subset = if current == dont_care {
            None
        } else {
            Some(current.wrapping_sub(dont_care) & dont_care)
        };
        Some((value | current) as usize)
    })
}

/// One pattern of an interior node, already in index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    pub mask: u32,
    pub value: u32,
    pub target: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Interior {
        sampled_mask: u32,
        width: usize,
        patterns: Vec<NodePattern>,
        otherwise: Option<&'static str>,
    },
    Leaf(Category),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeNode {
    pub name: &'static str,
    pub kind: NodeKind,
}

impl DecodeNode {
    /// Parses a table entry, validating it first.
    pub fn from_pattern(entry: &DecodePattern) -> Result<Self, TableError> {
        entry.validate()?;

        let sampled_mask = entry.sampled_bits.iter().fold(0_u32, |m, &bit| m | (1 << bit));
        let patterns = entry
            .explicit_patterns()
            .map(|(pattern, target)| {
                let ordered = generate_ordered_pattern(pattern, entry.sampled_bits);
                let (mask, value) = generate_mask_value_pair(&ordered);
                NodePattern {
                    mask,
                    value,
                    target,
                }
            })
            .collect();

        Ok(Self {
            name: entry.name,
            kind: NodeKind::Interior {
                sampled_mask,
                width: entry.sampled_bits.len(),
                patterns,
                otherwise: entry.otherwise(),
            },
        })
    }

    #[must_use]
    pub const fn leaf(category: Category) -> Self {
        Self {
            name: category.name(),
            kind: NodeKind::Leaf(category),
        }
    }

    /// Names of every node this one can dispatch to.
    pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        let (patterns, otherwise): (&[NodePattern], _) = match &self.kind {
            NodeKind::Interior {
                patterns,
                otherwise,
                ..
            } => (patterns.as_slice(), *otherwise),
            NodeKind::Leaf(_) => (&[], None),
        };
        patterns.iter().map(|p| p.target).chain(otherwise)
    }

    /// Slot index of `word` for an interior node.
    #[must_use]
    pub fn index_of(&self, word: u32) -> Option<usize> {
        match self.kind {
            NodeKind::Interior { sampled_mask, .. } => Some(word.compress(sampled_mask) as usize),
            NodeKind::Leaf(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ordered_pattern_follows_bit_significance() {
        assert_eq!(generate_ordered_pattern("10x", &[24, 4, 31]), "x10");
        assert_eq!(generate_ordered_pattern("1x0", &[31, 30, 29]), "1x0");
        assert_eq!(generate_ordered_pattern("01", &[0, 5]), "10");
    }

    #[test]
    fn mask_value_pairs() {
        assert_eq!(generate_mask_value_pair("x10"), (0b011, 0b010));
        assert_eq!(generate_mask_value_pair("xxx"), (0, 0));
        assert_eq!(generate_mask_value_pair("1x01"), (0b1011, 0b1001));
    }

    #[test]
    fn slot_enumeration() {
        let (mask, value) = generate_mask_value_pair("x1x0");
        let slots: Vec<usize> = matching_slots(mask, value, 4).collect();
        assert_eq!(slots, vec![0b0100, 0b0110, 0b1100, 0b1110]);

        let slots: Vec<usize> = matching_slots(0b111, 0b101, 3).collect();
        assert_eq!(slots, vec![0b101]);
        assert_eq!(matching_slots(0, 0, 2).count(), 4);
    }

    #[test]
    fn index_matches_pattern() {
        let entry = DecodePattern {
            name: "CondBranch",
            sampled_bits: &[24, 4],
            mapping: &[("00", "ConditionalBranch"), ("otherwise", "Unallocated")],
        };
        let node = DecodeNode::from_pattern(&entry).unwrap();
        let NodeKind::Interior { patterns, otherwise, .. } = &node.kind else {
            panic!("expected an interior node");
        };
        assert_eq!(patterns[0], NodePattern { mask: 0b11, value: 0, target: "ConditionalBranch" });
        assert_eq!(*otherwise, Some("Unallocated"));

        assert_eq!(node.index_of(0x5400_0000), Some(0));
        assert_eq!(node.index_of(0x5400_0010), Some(0b01));
        assert_eq!(node.index_of(0x5500_0000), Some(0b10));
        assert_eq!(node.targets().collect::<Vec<_>>(), vec!["ConditionalBranch", "Unallocated"]);
    }

    #[test]
    fn leaves_are_named_after_their_category() {
        let leaf = DecodeNode::leaf(Category::MoveWide);
        assert_eq!(leaf.name, "MoveWide");
        assert_eq!(leaf.index_of(0), None);
        assert_eq!(leaf.targets().count(), 0);
    }
}
