//! # A64 Registers
//!
//! General-purpose registers in their 32-bit (`w`), 64-bit (`x`) and
//! capability (`c`) views.
//!
//! | Code    | Meaning                                            |
//! |---------|----------------------------------------------------|
//! | 0..=30  | general-purpose register                           |
//! | 31      | zero register (`xzr`, `wzr`, `czr`)                |
//! | 63      | stack pointer (`sp`, `wsp`, `csp`), encoded as 31  |
//!
//! Register 31 means either the zero register or the stack pointer
//! depending on the instruction; the code keeps them apart so the emitter
//! can pick a form that accepts the register it was given.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub const ZR_CODE: u8 = 31;
pub const SP_CODE: u8 = 63;

/// Number of general-purpose registers, excluding register 31.
pub const GP_REGISTERS: u8 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegSize {
    W,
    X,
    /// Capability view; 64-bit for integer arithmetic.
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    code: u8,
    size: RegSize,
}

impl Register {
    const fn general(code: u8, size: RegSize) -> Self {
        assert!(code < GP_REGISTERS, "register number out of range");
        Self { code, size }
    }

    #[must_use]
    pub const fn x(code: u8) -> Self {
        Self::general(code, RegSize::X)
    }

    #[must_use]
    pub const fn w(code: u8) -> Self {
        Self::general(code, RegSize::W)
    }

    #[must_use]
    pub const fn c(code: u8) -> Self {
        Self::general(code, RegSize::C)
    }

    #[must_use]
    pub const fn sp() -> Self {
        Self {
            code: SP_CODE,
            size: RegSize::X,
        }
    }

    #[must_use]
    pub const fn wsp() -> Self {
        Self {
            code: SP_CODE,
            size: RegSize::W,
        }
    }

    #[must_use]
    pub const fn csp() -> Self {
        Self {
            code: SP_CODE,
            size: RegSize::C,
        }
    }

    #[must_use]
    pub const fn xzr() -> Self {
        Self {
            code: ZR_CODE,
            size: RegSize::X,
        }
    }

    #[must_use]
    pub const fn wzr() -> Self {
        Self {
            code: ZR_CODE,
            size: RegSize::W,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self.code
    }

    #[must_use]
    pub const fn size(self) -> RegSize {
        self.size
    }

    /// The 5-bit register field.
    #[must_use]
    pub const fn encoding(self) -> u32 {
        (self.code & 0x1F) as u32
    }

    #[must_use]
    pub const fn is_sp(self) -> bool {
        self.code == SP_CODE
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.code == ZR_CODE
    }

    #[must_use]
    pub const fn is_capability(self) -> bool {
        matches!(self.size, RegSize::C)
    }

    #[must_use]
    pub const fn is_64bit(self) -> bool {
        !matches!(self.size, RegSize::W)
    }

    /// Operation width in bits.
    #[must_use]
    pub const fn width(self) -> u32 {
        if self.is_64bit() { 64 } else { 32 }
    }

    /// The `sf` bit of data-processing encodings.
    #[must_use]
    pub const fn sf(self) -> u32 {
        self.is_64bit() as u32
    }

    /// Same register number, other view.
    #[must_use]
    pub const fn with_size(self, size: RegSize) -> Self {
        Self {
            code: self.code,
            size,
        }
    }

    #[must_use]
    pub const fn as_x(self) -> Self {
        self.with_size(RegSize::X)
    }

    #[must_use]
    pub const fn as_w(self) -> Self {
        self.with_size(RegSize::W)
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.size {
            RegSize::W => "w",
            RegSize::X => "x",
            RegSize::C => "c",
        };
        match (self.code, self.size) {
            (SP_CODE, RegSize::X) => f.write_str("sp"),
            (SP_CODE, _) => write!(f, "{prefix}sp"),
            (ZR_CODE, _) => write!(f, "{prefix}zr"),
            (code, _) => write!(f, "{prefix}{code}"),
        }
    }
}

/// Set of general-purpose register numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegList(u32);

impl RegList {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn of(registers: &[Register]) -> Self {
        let mut list = Self::empty();
        for &register in registers {
            list.insert(register);
        }
        list
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Registers 31 (zero register and stack pointer) are never members.
    #[must_use]
    pub const fn contains(self, register: Register) -> bool {
        register.code < GP_REGISTERS && self.0 & (1 << register.code) != 0
    }

    pub const fn insert(&mut self, register: Register) {
        if register.code < GP_REGISTERS {
            self.0 |= 1 << register.code;
        }
    }

    pub const fn remove(&mut self, register: Register) {
        if register.code < GP_REGISTERS {
            self.0 &= !(1 << register.code);
        }
    }

    /// Lowest register number in the set.
    #[must_use]
    pub const fn first(self) -> Option<u8> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as u8)
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn register_31_views() {
        assert_eq!(Register::sp().encoding(), 31);
        assert_eq!(Register::xzr().encoding(), 31);
        assert_ne!(Register::sp(), Register::xzr());
        assert!(Register::wsp().is_sp());
        assert!(!Register::wsp().is_64bit());
        assert!(Register::c(3).is_64bit());
    }

    #[test]
    fn names() {
        let names: Vec<String> = [
            Register::x(0),
            Register::w(17),
            Register::c(2),
            Register::sp(),
            Register::wsp(),
            Register::csp(),
            Register::xzr(),
            Register::wzr(),
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(names, vec!["x0", "w17", "c2", "sp", "wsp", "csp", "xzr", "wzr"]);
    }

    #[test]
    #[should_panic(expected = "register number out of range")]
    fn x31_is_not_a_general_register() {
        let _ = Register::x(31);
    }

    #[test]
    fn lists() {
        let mut list = RegList::of(&[Register::x(16), Register::w(17), Register::sp()]);
        assert_eq!(list.len(), 2);
        assert!(list.contains(Register::x(17)));
        assert!(!list.contains(Register::xzr()));
        assert_eq!(list.first(), Some(16));

        list.remove(Register::x(16));
        assert_eq!(list.first(), Some(17));
        list.remove(Register::c(17));
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
    }
}
