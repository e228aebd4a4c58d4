//! # Compiled Decode Nodes
//!
//! The arena entries walked at decode time. Every entry is one of:
//!
//! | Variant | Dispatch                                                  |
//! |---------|-----------------------------------------------------------|
//! | `Table` | sample the word, index `children` with the result         |
//! | `Test`  | `word & mask == value` picks `matched` or `unmatched`     |
//! | `Leaf`  | stop, the word belongs to `Category`                      |
//!
//! `Test` entries are only produced by the optimizer from two-child tables.

use crate::bitwise::Bits;

use super::category::Category;

/// Index of a compiled node inside its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or_else(|_| panic!("decode graph arena overflow")))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bit-extraction strategy of a table, picked from the shape of its sampled
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// A single sampled bit.
    Bit(u8),
    /// Contiguous sampled bits.
    Field { shift: u8, mask: u32 },
    /// Scattered sampled bits, gathered in significance order.
    Gather { mask: u32 },
}

impl Sampler {
    #[must_use]
    pub const fn for_mask(mask: u32) -> Self {
        debug_assert!(mask != 0);
        let shift = mask.trailing_zeros();
        let shifted = mask >> shift;
        if mask.count_ones() == 1 {
            Self::Bit(shift as u8)
        } else if shifted & (shifted + 1) == 0 {
            Self::Field {
                shift: shift as u8,
                mask: shifted,
            }
        } else {
            Self::Gather { mask }
        }
    }

    #[inline]
    #[must_use]
    pub fn sample(self, word: u32) -> usize {
        match self {
            Self::Bit(bit) => usize::from(word.is_bit_on(bit)),
            Self::Field { shift, mask } => ((word >> shift) & mask) as usize,
            Self::Gather { mask } => word.compress(mask) as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledNode {
    Table {
        sampler: Sampler,
        children: Box<[NodeId]>,
    },
    Test {
        mask: u32,
        value: u32,
        matched: NodeId,
        unmatched: NodeId,
    },
    Leaf(Category),
}

/// What lowering a filled table produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lowered {
    /// The table dispatches every word to one child: use it directly.
    Forward(NodeId),
    Node(CompiledNode),
}

impl CompiledNode {
    /// The next node for `word`, or `None` at a leaf.
    #[inline]
    #[must_use]
    pub fn next(&self, word: u32) -> Option<NodeId> {
        match self {
            Self::Table { sampler, children } => Some(children[sampler.sample(word)]),
            Self::Test {
                mask,
                value,
                matched,
                unmatched,
            } => Some(if word & mask == *value {
                *matched
            } else {
                *unmatched
            }),
            Self::Leaf(_) => None,
        }
    }

    #[must_use]
    pub const fn category(&self) -> Option<Category> {
        match self {
            Self::Leaf(category) => Some(*category),
            _ => None,
        }
    }

    /// Lowers a fully mapped table. With `optimize` set, single-child tables
    /// are forwarded and two-child tables whose slot sets split along a
    /// sub-cube become a mask/compare test.
    #[must_use]
    pub fn lower(sampled_mask: u32, children: Vec<NodeId>, optimize: bool) -> Lowered {
        if optimize {
            let first = children[0];
            let second = children.iter().copied().find(|&c| c != first);

            match second {
                None => return Lowered::Forward(first),
                Some(second) if children.iter().all(|&c| c == first || c == second) => {
                    for (matched, unmatched) in [(first, second), (second, first)] {
                        if let Some((mask, value)) = sub_cube(&children, matched) {
                            return Lowered::Node(Self::Test {
                                mask: mask.deposit(sampled_mask),
                                value: value.deposit(sampled_mask),
                                matched,
                                unmatched,
                            });
                        }
                    }
                }
                Some(_) => {}
            }
        }

        Lowered::Node(Self::Table {
            sampler: Sampler::for_mask(sampled_mask),
            children: children.into_boxed_slice(),
        })
    }
}

/// `(mask, value)` in index space when the slots holding `child` are exactly
/// `{ i : i & mask == value }`.
fn sub_cube(children: &[NodeId], child: NodeId) -> Option<(u32, u32)> {
    let full = (children.len() - 1) as u32;
    let (mut all, mut any, mut count) = (full, 0_u32, 0_u32);

    for (index, _) in children.iter().enumerate().filter(|(_, c)| **c == child) {
        let index = index as u32;
        all &= index;
        any |= index;
        count += 1;
    }

    let varying = all ^ any;
    (count == 1 << varying.count_ones()).then(|| {
        let mask = !varying & full;
        (mask, all & mask)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sampler_shapes() {
        assert_eq!(Sampler::for_mask(1 << 31), Sampler::Bit(31));
        assert_eq!(
            Sampler::for_mask(0b1111 << 25),
            Sampler::Field {
                shift: 25,
                mask: 0b1111
            }
        );
        assert_eq!(
            Sampler::for_mask((1 << 24) | (1 << 4)),
            Sampler::Gather {
                mask: (1 << 24) | (1 << 4)
            }
        );
    }

    #[test]
    fn samplers_agree_with_compress() {
        let word = 0xD61F_0120_u32;
        for mask in [1 << 29, 0b1111 << 25, (1 << 31) | (1 << 22) | (1 << 5)] {
            assert_eq!(Sampler::for_mask(mask).sample(word), word.compress(mask) as usize);
        }
    }

    #[test]
    fn single_child_tables_forward() {
        let a = NodeId::new(3);
        assert_eq!(CompiledNode::lower(0b11, vec![a; 4], true), Lowered::Forward(a));
        assert!(matches!(
            CompiledNode::lower(0b11, vec![a; 4], false),
            Lowered::Node(CompiledNode::Table { .. })
        ));
    }

    #[test]
    fn two_child_tables_become_tests() {
        let (a, b) = (NodeId::new(0), NodeId::new(1));
        // Sampled bits 24 and 4, `a` only at index 0b00.
        let sampled = (1 << 24) | (1 << 4);
        let Lowered::Node(node) = CompiledNode::lower(sampled, vec![a, b, b, b], true) else {
            panic!("expected a node");
        };
        assert_eq!(
            node,
            CompiledNode::Test {
                mask: sampled,
                value: 0,
                matched: a,
                unmatched: b,
            }
        );
        assert_eq!(node.next(0x5400_0000), Some(a));
        assert_eq!(node.next(0x5400_0010), Some(b));

        // `b` occupies the cube `1x`, `a` does not form one together with it.
        let Lowered::Node(node) = CompiledNode::lower(0b11, vec![a, a, b, b], true) else {
            panic!("expected a node");
        };
        assert_eq!(node.next(0b10), Some(b));
        assert_eq!(node.next(0b01), Some(a));
    }

    #[test]
    fn checkerboards_stay_tables() {
        let (a, b) = (NodeId::new(0), NodeId::new(1));
        let lowered = CompiledNode::lower(0b11, vec![a, b, b, a], true);
        assert!(matches!(lowered, Lowered::Node(CompiledNode::Table { .. })));
    }
}
