//! Abstract operands handed to the macro assembler.

use serde::{Deserialize, Serialize};

use super::registers::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shift {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl Shift {
    /// From the 2-bit `shift` field.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => Self::Lsl,
            0b01 => Self::Lsr,
            0b10 => Self::Asr,
            _ => Self::Ror,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extend {
    Uxtb,
    Uxth,
    Uxtw,
    Uxtx,
    Sxtb,
    Sxth,
    Sxtw,
    Sxtx,
}

impl Extend {
    /// From the 3-bit `option` field.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0 => Self::Uxtb,
            1 => Self::Uxth,
            2 => Self::Uxtw,
            3 => Self::Uxtx,
            4 => Self::Sxtb,
            5 => Self::Sxth,
            6 => Self::Sxtw,
            _ => Self::Sxtx,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Sxtb | Self::Sxth | Self::Sxtw | Self::Sxtx)
    }

    /// Number of source bits the extend keeps.
    #[must_use]
    pub const fn source_bits(self) -> u32 {
        match self {
            Self::Uxtb | Self::Sxtb => 8,
            Self::Uxth | Self::Sxth => 16,
            Self::Uxtw | Self::Sxtw => 32,
            Self::Uxtx | Self::Sxtx => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Immediate(i64),
    Register(Register),
    Shifted {
        reg: Register,
        shift: Shift,
        amount: u8,
    },
    Extended {
        reg: Register,
        extend: Extend,
        amount: u8,
    },
}

impl Operand {
    #[must_use]
    pub const fn imm(value: i64) -> Self {
        Self::Immediate(value)
    }

    #[must_use]
    pub const fn shifted(reg: Register, shift: Shift, amount: u8) -> Self {
        Self::Shifted { reg, shift, amount }
    }

    #[must_use]
    pub const fn extended(reg: Register, extend: Extend, amount: u8) -> Self {
        Self::Extended {
            reg,
            extend,
            amount,
        }
    }

    /// The register the operand reads, if any.
    #[must_use]
    pub const fn register(&self) -> Option<Register> {
        match self {
            Self::Immediate(_) => None,
            Self::Register(reg) | Self::Shifted { reg, .. } | Self::Extended { reg, .. } => Some(*reg),
        }
    }

    #[must_use]
    pub const fn immediate(&self) -> Option<i64> {
        match self {
            Self::Immediate(value) => Some(*value),
            _ => None,
        }
    }

    /// A plain register, or one shifted left by zero.
    #[must_use]
    pub const fn is_plain_register(&self) -> bool {
        matches!(
            self,
            Self::Register(_)
                | Self::Shifted {
                    shift: Shift::Lsl,
                    amount: 0,
                    ..
                }
        )
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Self::Register(reg)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Immediate(value)
    }
}

/// Addressing modes of single-register loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemOperand {
    /// `[base, #offset]`
    Offset { base: Register, offset: i64 },
    /// `[base, #offset]!`
    PreIndex { base: Register, offset: i64 },
    /// `[base], #offset`
    PostIndex { base: Register, offset: i64 },
    /// `[base, index, extend #amount]`
    RegisterOffset {
        base: Register,
        index: Register,
        extend: Extend,
        amount: u8,
    },
}

impl MemOperand {
    #[must_use]
    pub const fn base(base: Register) -> Self {
        Self::Offset { base, offset: 0 }
    }

    #[must_use]
    pub const fn offset(base: Register, offset: i64) -> Self {
        Self::Offset { base, offset }
    }

    #[must_use]
    pub const fn pre_index(base: Register, offset: i64) -> Self {
        Self::PreIndex { base, offset }
    }

    #[must_use]
    pub const fn post_index(base: Register, offset: i64) -> Self {
        Self::PostIndex { base, offset }
    }

    /// `[base, index, LSL #amount]`
    #[must_use]
    pub const fn register(base: Register, index: Register, amount: u8) -> Self {
        Self::RegisterOffset {
            base,
            index,
            extend: Extend::Uxtx,
            amount,
        }
    }

    #[must_use]
    pub const fn base_register(&self) -> Register {
        match self {
            Self::Offset { base, .. }
            | Self::PreIndex { base, .. }
            | Self::PostIndex { base, .. }
            | Self::RegisterOffset { base, .. } => *base,
        }
    }

    #[must_use]
    pub const fn writes_back(&self) -> bool {
        matches!(self, Self::PreIndex { .. } | Self::PostIndex { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_round_trip() {
        for bits in 0..4 {
            assert_eq!(Shift::from_bits(bits).bits(), bits);
        }
        for bits in 0..8 {
            assert_eq!(Extend::from_bits(bits).bits(), bits);
        }
        assert!(Extend::Sxtw.is_signed());
        assert_eq!(Extend::Uxth.source_bits(), 16);
    }

    #[test]
    fn operand_views() {
        let x1 = Register::x(1);
        assert_eq!(Operand::from(x1).register(), Some(x1));
        assert_eq!(Operand::from(5_i64).immediate(), Some(5));
        assert!(Operand::shifted(x1, Shift::Lsl, 0).is_plain_register());
        assert!(!Operand::shifted(x1, Shift::Lsr, 0).is_plain_register());
        assert!(!Operand::extended(x1, Extend::Uxtx, 0).is_plain_register());
    }

    #[test]
    fn memory_operand_views() {
        let mem = MemOperand::pre_index(Register::x(3), 16);
        assert_eq!(mem.base_register(), Register::x(3));
        assert!(mem.writes_back());
        assert!(!MemOperand::register(Register::sp(), Register::x(2), 3).writes_back());
    }
}
