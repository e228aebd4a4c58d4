//! # Raw A64 Encoder
//!
//! One method per encoding form. Every method emits exactly one word and
//! asserts that its arguments fit the form; choosing a form that fits is
//! the job of the [`MacroAssembler`](super::MacroAssembler).
//!
//! ```text
//! add/sub (immediate)        sf op S 100010 sh imm12 Rn Rd
//! add/sub (shifted)          sf op S 01011 shift 0 Rm imm6 Rn Rd
//! add/sub (extended)         sf op S 01011 00 1 Rm option imm3 Rn Rd
//! logical (immediate)        sf opc 100100 N immr imms Rn Rd
//! logical (shifted)          sf opc 01010 shift N Rm imm6 Rn Rd
//! move wide                  sf opc 100101 hw imm16 Rd
//! bitfield                   sf opc 100110 N immr imms Rn Rd
//! extract                    sf 00 100111 N 0 Rm imms Rn Rd
//! load/store (unsigned imm)  size 111 0 01 opc imm12 Rn Rt
//! load/store (imm9)          size 111 0 00 opc 0 imm9 mode Rn Rt
//! load/store (register)      size 111 0 00 opc 1 Rm option S 10 Rn Rt
//! branch (register)          1101011 opc 11111 000000 Rn 00000
//! ```
//!
//! The capability forms use the capability opcode space (op1 = `0001`):
//!
//! ```text
//! add/sub cap (immediate)    0000 0010 op sh imm12 Cn Cd
//! add cap (extended)         1100 0010 101 Rm option imm3 Cn Cd
//! branch cap (memory)        1100 0010 01 0 imm7 000000 Cn 0000 L
//! ```

use super::buffer::CodeBuffer;
use super::operand::{Extend, Shift};
use super::registers::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddSubOp {
    Add,
    Adds,
    Sub,
    Subs,
}

impl AddSubOp {
    #[must_use]
    pub const fn is_sub(self) -> bool {
        matches!(self, Self::Sub | Self::Subs)
    }

    #[must_use]
    pub const fn sets_flags(self) -> bool {
        matches!(self, Self::Adds | Self::Subs)
    }

    /// The operation computing the same result with the operand negated.
    #[must_use]
    pub const fn dual(self) -> Self {
        match self {
            Self::Add => Self::Sub,
            Self::Adds => Self::Subs,
            Self::Sub => Self::Add,
            Self::Subs => Self::Adds,
        }
    }

    const fn bits(self) -> u32 {
        ((self.is_sub() as u32) << 30) | ((self.sets_flags() as u32) << 29)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Orr,
    Eor,
    Ands,
}

impl LogicalOp {
    const fn opc(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveWideOp {
    Movn = 0b00,
    Movz = 0b10,
    Movk = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitfieldOp {
    Sbfm = 0b00,
    Bfm = 0b01,
    Ubfm = 0b10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Unscaled = 0b00,
    PostIndex = 0b01,
    PreIndex = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchRegisterOp {
    Br = 0b0000,
    Blr = 0b0001,
    Ret = 0b0010,
}

/// Single-register integer loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStoreOp {
    Ldr,
    Str,
    Ldrb,
    Strb,
    Ldrh,
    Strh,
    Ldrsb,
    Ldrsh,
    Ldrsw,
}

impl LoadStoreOp {
    /// log2 of the access size in bytes when transferring `rt`.
    #[must_use]
    pub const fn size_log2(self, rt: Register) -> u32 {
        match self {
            Self::Ldr | Self::Str => {
                if rt.is_64bit() {
                    3
                } else {
                    2
                }
            }
            Self::Ldrb | Self::Strb | Self::Ldrsb => 0,
            Self::Ldrh | Self::Strh | Self::Ldrsh => 1,
            Self::Ldrsw => 2,
        }
    }

    #[must_use]
    pub const fn is_load(self) -> bool {
        !matches!(self, Self::Str | Self::Strb | Self::Strh)
    }

    const fn opc(self, rt: Register) -> u32 {
        match self {
            Self::Str | Self::Strb | Self::Strh => 0b00,
            Self::Ldr | Self::Ldrb | Self::Ldrh => 0b01,
            Self::Ldrsw => 0b10,
            Self::Ldrsb | Self::Ldrsh => {
                if rt.is_64bit() {
                    0b10
                } else {
                    0b11
                }
            }
        }
    }

    const fn check(self, rt: Register) {
        assert!(!rt.is_sp(), "the transfer register cannot be the stack pointer");
        match self {
            Self::Ldrb | Self::Strb | Self::Ldrh | Self::Strh => {
                assert!(!rt.is_64bit(), "byte and halfword transfers use a w register");
            }
            Self::Ldrsw => assert!(rt.is_64bit(), "ldrsw needs an x register"),
            _ => {}
        }
    }
}

const fn reg(register: Register) -> u32 {
    register.encoding()
}

fn same_width(a: Register, b: Register) {
    assert_eq!(a.is_64bit(), b.is_64bit(), "mixed register widths: {a}, {b}");
}

#[derive(Debug, Default)]
pub struct Assembler {
    buffer: CodeBuffer,
}

impl Assembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: CodeBuffer::new(),
        }
    }

    #[must_use]
    pub const fn buffer(&self) -> &CodeBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn into_buffer(self) -> CodeBuffer {
        self.buffer
    }

    /// Number of emitted instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn emit(&mut self, word: u32) {
        self.buffer.emit(word);
    }

    /// `rd` is the stack pointer unless flags are set, `rn` is always the
    /// stack pointer when register 31.
    pub fn add_sub_immediate(&mut self, op: AddSubOp, rd: Register, rn: Register, imm12: u32, shift12: bool) {
        assert!(imm12 < 4096, "add/sub immediate out of range: {imm12}");
        assert!(!rn.is_zero(), "add/sub immediate cannot read the zero register");
        if op.sets_flags() {
            assert!(!rd.is_sp(), "flag-setting add/sub cannot write the stack pointer");
        } else {
            assert!(!rd.is_zero(), "add/sub immediate cannot write the zero register");
        }
        same_width(rd, rn);

        self.emit(
            (rd.sf() << 31)
                | op.bits()
                | (0b10_0010 << 23)
                | (u32::from(shift12) << 22)
                | (imm12 << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    pub fn add_sub_shifted(
        &mut self,
        op: AddSubOp,
        rd: Register,
        rn: Register,
        rm: Register,
        shift: Shift,
        amount: u8,
    ) {
        assert!(shift != Shift::Ror, "add/sub cannot rotate its operand");
        assert!(u32::from(amount) < rd.width(), "shift amount out of range: {amount}");
        assert!(
            !rd.is_sp() && !rn.is_sp() && !rm.is_sp(),
            "shifted add/sub cannot use the stack pointer"
        );
        same_width(rd, rn);
        same_width(rd, rm);

        self.emit(
            (rd.sf() << 31)
                | op.bits()
                | (0b01011 << 24)
                | (shift.bits() << 22)
                | (reg(rm) << 16)
                | (u32::from(amount) << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    pub fn add_sub_extended(
        &mut self,
        op: AddSubOp,
        rd: Register,
        rn: Register,
        rm: Register,
        extend: Extend,
        amount: u8,
    ) {
        assert!(amount <= 4, "extend shift out of range: {amount}");
        assert!(!rn.is_zero() && !rm.is_sp(), "extended add/sub register 31 misuse");
        if op.sets_flags() {
            assert!(!rd.is_sp(), "flag-setting add/sub cannot write the stack pointer");
        } else {
            assert!(!rd.is_zero(), "extended add/sub cannot write the zero register");
        }
        same_width(rd, rn);

        self.emit(
            (rd.sf() << 31)
                | op.bits()
                | (0b01011 << 24)
                | (1 << 21)
                | (reg(rm) << 16)
                | (extend.bits() << 13)
                | (u32::from(amount) << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    pub fn logical_immediate(&mut self, op: LogicalOp, rd: Register, rn: Register, (n, immr, imms): (u32, u32, u32)) {
        assert!(n <= 1 && immr < 64 && imms < 64, "malformed bitmask immediate");
        assert!(rd.is_64bit() || n == 0, "64-bit element in a 32-bit operation");
        assert!(!rn.is_sp(), "logical immediate cannot read the stack pointer");
        if op == LogicalOp::Ands {
            assert!(!rd.is_sp(), "ands cannot write the stack pointer");
        } else {
            assert!(!rd.is_zero(), "logical immediate cannot write the zero register");
        }
        same_width(rd, rn);

        self.emit(
            (rd.sf() << 31)
                | (op.opc() << 29)
                | (0b10_0100 << 23)
                | (n << 22)
                | (immr << 16)
                | (imms << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    /// `invert` selects the `BIC`/`ORN`/`EON`/`BICS` forms.
    pub fn logical_shifted(
        &mut self,
        op: LogicalOp,
        invert: bool,
        rd: Register,
        rn: Register,
        rm: Register,
        (shift, amount): (Shift, u8),
    ) {
        assert!(u32::from(amount) < rd.width(), "shift amount out of range: {amount}");
        assert!(
            !rd.is_sp() && !rn.is_sp() && !rm.is_sp(),
            "shifted logical operations cannot use the stack pointer"
        );
        same_width(rd, rn);
        same_width(rd, rm);

        self.emit(
            (rd.sf() << 31)
                | (op.opc() << 29)
                | (0b01010 << 24)
                | (shift.bits() << 22)
                | (u32::from(invert) << 21)
                | (reg(rm) << 16)
                | (u32::from(amount) << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    pub fn move_wide(&mut self, op: MoveWideOp, rd: Register, imm16: u32, hw: u32) {
        assert!(imm16 <= 0xFFFF, "move wide immediate out of range: {imm16:#x}");
        assert!(hw < rd.width() / 16, "halfword {hw} out of range for {rd}");
        assert!(!rd.is_sp(), "move wide cannot write the stack pointer");

        self.emit((rd.sf() << 31) | ((op as u32) << 29) | (0b10_0101 << 23) | (hw << 21) | (imm16 << 5) | reg(rd));
    }

    pub fn bitfield(&mut self, op: BitfieldOp, rd: Register, rn: Register, immr: u32, imms: u32) {
        assert!(immr < rd.width() && imms < rd.width(), "bitfield positions out of range");
        assert!(!rd.is_sp() && !rn.is_sp(), "bitfield moves cannot use the stack pointer");
        same_width(rd, rn);

        self.emit(
            (rd.sf() << 31)
                | ((op as u32) << 29)
                | (0b10_0110 << 23)
                | (rd.sf() << 22)
                | (immr << 16)
                | (imms << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    pub fn extr(&mut self, rd: Register, rn: Register, rm: Register, lsb: u32) {
        assert!(lsb < rd.width(), "extract position out of range: {lsb}");
        assert!(
            !rd.is_sp() && !rn.is_sp() && !rm.is_sp(),
            "extract cannot use the stack pointer"
        );
        same_width(rd, rn);
        same_width(rd, rm);

        self.emit(
            (rd.sf() << 31)
                | (0b0010_0111 << 23)
                | (rd.sf() << 22)
                | (reg(rm) << 16)
                | (lsb << 10)
                | (reg(rn) << 5)
                | reg(rd),
        );
    }

    /// `imm12` is the offset already divided by the access size.
    pub fn load_store_unsigned(&mut self, op: LoadStoreOp, rt: Register, base: Register, imm12: u32) {
        op.check(rt);
        assert!(imm12 < 4096, "scaled offset out of range: {imm12}");
        assert!(!base.is_zero(), "the base register cannot be the zero register");

        self.emit(
            (op.size_log2(rt) << 30)
                | (0b11_1001 << 24)
                | (op.opc(rt) << 22)
                | (imm12 << 10)
                | (reg(base) << 5)
                | reg(rt),
        );
    }

    pub fn load_store_indexed(&mut self, op: LoadStoreOp, rt: Register, base: Register, offset: i64, mode: IndexMode) {
        op.check(rt);
        assert!((-256..=255).contains(&offset), "unscaled offset out of range: {offset}");
        assert!(!base.is_zero(), "the base register cannot be the zero register");
        if mode != IndexMode::Unscaled {
            assert!(
                rt.code() != base.code(),
                "writeback with the transfer register as base is unpredictable"
            );
        }

        #[allow(clippy::cast_sign_loss)]
        let imm9 = (offset as u32) & 0x1FF;
        self.emit(
            (op.size_log2(rt) << 30)
                | (0b11_1000 << 24)
                | (op.opc(rt) << 22)
                | (imm9 << 12)
                | ((mode as u32) << 10)
                | (reg(base) << 5)
                | reg(rt),
        );
    }

    /// `shifted` scales the index by the access size.
    pub fn load_store_register(
        &mut self,
        op: LoadStoreOp,
        rt: Register,
        base: Register,
        index: Register,
        extend: Extend,
        shifted: bool,
    ) {
        op.check(rt);
        assert!(
            matches!(extend, Extend::Uxtw | Extend::Uxtx | Extend::Sxtw | Extend::Sxtx),
            "register offsets only extend words and doublewords"
        );
        assert!(!base.is_zero() && !index.is_sp(), "register offset register 31 misuse");

        self.emit(
            (op.size_log2(rt) << 30)
                | (0b11_1000 << 24)
                | (op.opc(rt) << 22)
                | (1 << 21)
                | (reg(index) << 16)
                | (extend.bits() << 13)
                | (u32::from(shifted) << 12)
                | (0b10 << 10)
                | (reg(base) << 5)
                | reg(rt),
        );
    }

    pub fn branch_register(&mut self, op: BranchRegisterOp, rn: Register) {
        assert!(!rn.is_sp(), "cannot branch to the stack pointer");
        self.emit(0xD61F_0000 | ((op as u32) << 21) | (reg(rn) << 5));
    }

    pub fn capability_add_immediate(&mut self, sub: bool, cd: Register, cn: Register, imm12: u32, shift12: bool) {
        assert!(cd.is_capability() && cn.is_capability(), "capability add needs c registers");
        assert!(imm12 < 4096, "add/sub immediate out of range: {imm12}");
        assert!(!cd.is_zero() && !cn.is_zero(), "capability add/sub register 31 is csp");

        self.emit(
            0x0200_0000
                | (u32::from(sub) << 23)
                | (u32::from(shift12) << 22)
                | (imm12 << 10)
                | (reg(cn) << 5)
                | reg(cd),
        );
    }

    pub fn capability_add_extended(&mut self, cd: Register, cn: Register, rm: Register, extend: Extend, amount: u8) {
        assert!(cd.is_capability() && cn.is_capability(), "capability add needs c registers");
        assert!(!rm.is_capability() && !rm.is_sp(), "the offset must be an integer register");
        assert!(amount <= 4, "extend shift out of range: {amount}");
        assert!(!cd.is_zero() && !cn.is_zero(), "capability add register 31 is csp");

        self.emit(
            0xC2A0_0000
                | (reg(rm) << 16)
                | (extend.bits() << 13)
                | (u32::from(amount) << 10)
                | (reg(cn) << 5)
                | reg(cd),
        );
    }

    /// Branch to the capability loaded from `[cn, #offset]`.
    pub fn capability_branch(&mut self, cn: Register, offset: i64, link: bool) {
        assert!(cn.is_capability(), "capability branches use a c register base");
        assert!(
            offset % 16 == 0 && (-1024..=1008).contains(&offset),
            "capability branch offset out of range: {offset}"
        );

        #[allow(clippy::cast_sign_loss)]
        let imm7 = ((offset / 16) as u32) & 0x7F;
        self.emit(0xC240_0000 | (imm7 << 15) | (reg(cn) << 5) | u32::from(link));
    }
}
