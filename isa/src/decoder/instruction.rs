//! # Decoded Instructions
//!
//! The single value handed to every observer. It carries the raw word, the
//! category the graph classified it as, the instruction-set variant it was
//! decoded for and its byte offset in the decoded stream.
//!
//! Field accessors return `None` when the category has no such field, so an
//! observer can call them without matching on the category first.
//!
//! ```text
//! ADD X0, X1, #16
//!
//!  31 30 29 28-23    22  21-10          9-5    4-0
//! [1][0][0][100010][0][000000010000][00001][00000]
//!  ↑  ↑  ↑           ↑       ↑          ↑      ↑
//!  │  │  │           │       │          │      └─ Rd = X0
//!  │  │  │           │       │          └──────── Rn = X1
//!  │  │  │           │       └─────────────────── imm12 = 16
//!  │  │  │           └─────────────────────────── sh = 0 (no LSL #12)
//!  │  │  └─────────────────────────────────────── S = 0 (no flags)
//!  │  └────────────────────────────────────────── op = 0 (add)
//!  └───────────────────────────────────────────── sf = 1 (64 bit)
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::emitter::{Extend, Shift};
use crate::immediates::decode_logical_immediate;

use super::category::{Category, Isa};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub word: u32,
    pub category: Category,
    pub isa: Isa,
    pub offset: usize,
}

impl Instruction {
    #[must_use]
    pub const fn new(word: u32, category: Category, isa: Isa, offset: usize) -> Self {
        Self {
            word,
            category,
            isa,
            offset,
        }
    }

    #[must_use]
    pub fn rd(&self) -> u8 {
        self.word.get_bits(0..=4) as u8
    }

    /// Transfer register of loads and stores, same field as `rd`.
    #[must_use]
    pub fn rt(&self) -> u8 {
        self.rd()
    }

    #[must_use]
    pub fn rn(&self) -> u8 {
        self.word.get_bits(5..=9) as u8
    }

    #[must_use]
    pub fn rm(&self) -> u8 {
        self.word.get_bits(16..=20) as u8
    }

    /// `sf`: the data-processing operation is 64 bits wide.
    #[must_use]
    pub fn is_64bit(&self) -> bool {
        self.word.get_bit(31)
    }

    #[must_use]
    pub const fn is_add_sub(&self) -> bool {
        matches!(
            self.category,
            Category::AddSubImmediate | Category::AddSubShifted | Category::AddSubExtended
        )
    }

    #[must_use]
    pub fn is_subtract(&self) -> bool {
        self.is_add_sub() && self.word.get_bit(30)
    }

    #[must_use]
    pub fn sets_flags(&self) -> bool {
        self.is_add_sub() && self.word.get_bit(29)
    }

    /// Signed immediate of an add/sub (immediate): negative for `SUB`.
    #[must_use]
    pub fn add_sub_immediate(&self) -> Option<i64> {
        if self.category != Category::AddSubImmediate {
            return None;
        }
        let shift = if self.word.get_bit(22) { 12 } else { 0 };
        let imm = i64::from(self.word.get_bits(10..=21)) << shift;
        Some(if self.is_subtract() { -imm } else { imm })
    }

    /// Value of a bitmask immediate, at the operation width.
    #[must_use]
    pub fn logical_immediate(&self) -> Option<u64> {
        if self.category != Category::LogicalImmediate {
            return None;
        }
        let width = if self.is_64bit() { 64 } else { 32 };
        decode_logical_immediate(
            self.word.get_bits(22..=22),
            self.word.get_bits(16..=21),
            self.word.get_bits(10..=15),
            width,
        )
    }

    /// `(imm16, shift)` of a move wide.
    #[must_use]
    pub fn move_wide(&self) -> Option<(u16, u8)> {
        (self.category == Category::MoveWide).then(|| {
            let imm16 = self.word.get_bits(5..=20) as u16;
            (imm16, self.word.get_bits(21..=22) as u8 * 16)
        })
    }

    /// `(immr, imms)` of a bitfield move or `EXTR` (`imms` is the lsb there).
    #[must_use]
    pub fn bitfield(&self) -> Option<(u8, u8)> {
        match self.category {
            Category::Bitfield => Some((
                self.word.get_bits(16..=21) as u8,
                self.word.get_bits(10..=15) as u8,
            )),
            Category::Extract => Some((0, self.word.get_bits(10..=15) as u8)),
            _ => None,
        }
    }

    /// Shift applied to `rm` by the shifted-register forms.
    #[must_use]
    pub fn shift(&self) -> Option<(Shift, u8)> {
        matches!(
            self.category,
            Category::LogicalShifted | Category::AddSubShifted
        )
        .then(|| {
            (
                Shift::from_bits(self.word.get_bits(22..=23)),
                self.word.get_bits(10..=15) as u8,
            )
        })
    }

    /// Extend applied to `rm` by the extended-register forms. For register
    /// offset loads the amount is either 0 or the access size.
    #[must_use]
    pub fn extend(&self) -> Option<(Extend, u8)> {
        let extend = Extend::from_bits(self.word.get_bits(13..=15));
        match self.category {
            Category::AddSubExtended => Some((extend, self.word.get_bits(10..=12) as u8)),
            Category::LoadStoreRegisterOffset => {
                let amount = if self.word.get_bit(12) {
                    self.access_size_log2()?
                } else {
                    0
                };
                Some((extend, amount))
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_load_store(&self) -> bool {
        matches!(
            self.category,
            Category::LoadStoreUnsignedOffset
                | Category::LoadStoreUnscaledOffset
                | Category::LoadStorePreIndex
                | Category::LoadStorePostIndex
                | Category::LoadStoreRegisterOffset
                | Category::LoadStoreUnprivileged
        )
    }

    /// log2 of the access size in bytes of a single-register load or store.
    #[must_use]
    pub fn access_size_log2(&self) -> Option<u8> {
        self.is_load_store().then(|| self.word.get_bits(30..=31) as u8)
    }

    /// `opc != 00`: loads and sign-extending loads.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.is_load_store() && self.word.get_bits(22..=23) != 0
    }

    /// Byte offset of an immediate-offset load or store.
    #[must_use]
    pub fn load_store_offset(&self) -> Option<i64> {
        match self.category {
            Category::LoadStoreUnsignedOffset => {
                let size = self.access_size_log2()?;
                Some(i64::from(self.word.get_bits(10..=21)) << size)
            }
            Category::LoadStoreUnscaledOffset
            | Category::LoadStorePreIndex
            | Category::LoadStorePostIndex
            | Category::LoadStoreUnprivileged => Some(self.word.get_bits(12..=20).sign_extended(9)),
            _ => None,
        }
    }

    /// Byte offset of a PC-relative branch, or the capability offset of a
    /// branch through memory.
    #[must_use]
    pub fn branch_offset(&self) -> Option<i64> {
        let w = self.word;
        match self.category {
            Category::UnconditionalBranchImmediate => Some(w.get_bits(0..=25).sign_extended(26) * 4),
            Category::ConditionalBranch | Category::CompareBranch => {
                Some(w.get_bits(5..=23).sign_extended(19) * 4)
            }
            Category::TestBranch => Some(w.get_bits(5..=18).sign_extended(14) * 4),
            Category::CapabilityBranchMemory => Some(w.get_bits(15..=21).sign_extended(7) * 16),
            _ => None,
        }
    }

    /// The branch writes the return address (`BL`, `BLR`).
    #[must_use]
    pub fn is_link(&self) -> bool {
        match self.category {
            Category::UnconditionalBranchImmediate => self.word.get_bit(31),
            Category::UnconditionalBranchRegister | Category::CapabilityBranchRegister => {
                self.word.get_bits(21..=24) == 0b0001
            }
            Category::CapabilityBranchMemory => self.word.get_bit(0),
            _ => false,
        }
    }

    /// Condition code of `B.cond`.
    #[must_use]
    pub fn condition(&self) -> Option<u8> {
        (self.category == Category::ConditionalBranch).then(|| self.word.get_bits(0..=3) as u8)
    }
}
