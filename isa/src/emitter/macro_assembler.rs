//! # Operand and Encoding Selection
//!
//! The [`MacroAssembler`] lowers abstract operations to the raw forms of the
//! [`Assembler`]. Each operation tries the cheapest form first and falls
//! back to sequences that go through scratch registers.
//!
//! ## Add and subtract
//!
//! `add`, `adds`, `sub`, `subs`, `cmp`, `cmn` and `neg` pick the first
//! form that fits:
//!
//! ```text
//! 1. immediate          imm12, optionally LSL #12      add x0, x1, #4096
//! 2. negated immediate  dual operation                 add x0, x1, #-8  => sub x0, x1, #8
//! 3. register           shifted, or extended when      add sp, sp, x1   => add sp, sp, x1, uxtx
//!                       rd or rn is the stack pointer
//! 4. scratch            materialize the operand        add x0, x1, #0x12345
//!                                                      => mov x0, #0x2345
//!                                                         movk x0, #0x1, lsl #16
//!                                                         add x0, x1, x0
//! ```
//!
//! Step 2 is skipped for the most negative value of the operation width,
//! whose negation does not exist. In step 4 the scratch scope excludes the
//! sources and includes the destination when it is not a source, so the
//! destination itself can hold the temporary.
//!
//! Every terminal path emits exactly one instruction, which is checked.
//!
//! ## Loads and stores
//!
//! | Mode            | Direct form             | Fallback                            |
//! |-----------------|-------------------------|-------------------------------------|
//! | offset          | scaled imm12, imm9      | `add tmp, base, #off`; `[tmp]`      |
//! | pre-index       | imm9                    | `add base, base, #off`; `[base]`    |
//! | post-index      | imm9                    | `[base]`; `add base, base, #off`    |
//! | register offset | shift 0 or access size  | `add tmp, base, index`; `[tmp]`     |

use crate::decoder::Isa;
use crate::immediates::{
    encode_add_sub_immediate, encode_logical_immediate, encode_move_wide, is_scaled_offset, is_unscaled_offset,
};

use super::assembler::{AddSubOp, Assembler, BitfieldOp, BranchRegisterOp, IndexMode, LoadStoreOp, LogicalOp, MoveWideOp};
use super::buffer::CodeBuffer;
use super::operand::{Extend, MemOperand, Operand, Shift};
use super::registers::{RegList, Register};
use super::scratch::ScratchScope;

/// The intra procedure-call registers.
pub const DEFAULT_SCRATCH: [Register; 2] = [Register::x(16), Register::x(17)];

const LINK_REGISTER: u8 = 30;

/// Register forms of add/sub, after the stack-pointer rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterForm {
    Shifted(Register, Shift, u8),
    Extended(Register, Extend, u8),
}

impl RegisterForm {
    fn emit(self, asm: &mut Assembler, op: AddSubOp, rd: Register, rn: Register) {
        match self {
            Self::Shifted(rm, shift, amount) => asm.add_sub_shifted(op, rd, rn, rm, shift, amount),
            Self::Extended(rm, extend, amount) => asm.add_sub_extended(op, rd, rn, rm, extend, amount),
        }
    }
}

const fn width_mask(width: u32) -> u64 {
    if width == 64 { u64::MAX } else { (1 << width) - 1 }
}

/// Reads `imm` at the operation width, sign-extended back to 64 bits.
/// A 32-bit operation takes values that fit either `i32` or `u32`.
fn at_width(imm: i64, width: u32) -> i64 {
    if width == 64 {
        return imm;
    }
    assert!(
        i32::try_from(imm).is_ok() || u32::try_from(imm).is_ok(),
        "immediate {imm:#x} does not fit a 32-bit operation"
    );
    #[allow(clippy::cast_possible_truncation)]
    let low = imm as i32;
    i64::from(low)
}

const fn zero_register(like: Register) -> Register {
    Register::xzr().with_size(like.size())
}

#[derive(Debug)]
pub struct MacroAssembler {
    asm: Assembler,
    pub(super) scratch: RegList,
    isa: Isa,
}

impl Default for MacroAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_isa(Isa::A64)
    }

    #[must_use]
    pub fn with_isa(isa: Isa) -> Self {
        Self {
            asm: Assembler::new(),
            scratch: RegList::of(&DEFAULT_SCRATCH),
            isa,
        }
    }

    #[must_use]
    pub const fn isa(&self) -> Isa {
        self.isa
    }

    pub fn set_isa(&mut self, isa: Isa) {
        tracing::debug!(%isa, "emitting for instruction set");
        self.isa = isa;
    }

    #[must_use]
    pub const fn buffer(&self) -> &CodeBuffer {
        self.asm.buffer()
    }

    #[must_use]
    pub fn into_buffer(self) -> CodeBuffer {
        self.asm.into_buffer()
    }

    #[must_use]
    pub fn words(&self) -> &[u32] {
        self.asm.buffer().words()
    }

    /// Number of emitted instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.asm.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.asm.is_empty()
    }

    /// Raw encoder, for forms the macro layer does not cover.
    pub const fn assembler(&mut self) -> &mut Assembler {
        &mut self.asm
    }

    #[must_use]
    pub const fn scratch_available(&self) -> RegList {
        self.scratch
    }

    /// Replaces the scratch pool outside of any scope.
    pub const fn set_scratch_available(&mut self, registers: RegList) {
        self.scratch = registers;
    }

    pub fn scratch_scope(&mut self) -> ScratchScope<'_> {
        ScratchScope::new(self)
    }

    fn single_emission(&mut self, emit: impl FnOnce(&mut Assembler)) {
        let before = self.asm.len();
        emit(&mut self.asm);
        assert_eq!(
            self.asm.len(),
            before + 1,
            "a terminal path must emit exactly one instruction"
        );
    }

    /// A scope where `sources` are reserved and `rd`, unless it is one of
    /// them, may hold a temporary.
    fn scope_for(&mut self, rd: Register, sources: &[Register]) -> ScratchScope<'_> {
        let mut scope = self.scratch_scope();
        scope.exclude(sources);
        if sources.iter().all(|source| source.code() != rd.code()) {
            scope.include(&[rd]);
        }
        scope
    }

    // Add and subtract.

    pub fn add(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Add, rd, rn, operand.into());
    }

    pub fn adds(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Adds, rd, rn, operand.into());
    }

    pub fn sub(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Sub, rd, rn, operand.into());
    }

    pub fn subs(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Subs, rd, rn, operand.into());
    }

    pub fn cmp(&mut self, rn: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Subs, zero_register(rn), rn, operand.into());
    }

    pub fn cmn(&mut self, rn: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Adds, zero_register(rn), rn, operand.into());
    }

    pub fn neg(&mut self, rd: Register, operand: impl Into<Operand>) {
        self.add_sub_macro(AddSubOp::Sub, rd, zero_register(rd), operand.into());
    }

    fn add_sub_macro(&mut self, op: AddSubOp, rd: Register, rn: Register, operand: Operand) {
        assert!(
            !rd.is_capability() && !rn.is_capability(),
            "integer arithmetic on a capability register"
        );
        assert!(
            !(op.sets_flags() && rd.is_sp()),
            "flag-setting add/sub cannot write the stack pointer"
        );
        assert_eq!(rd.is_64bit(), rn.is_64bit(), "mixed register widths: {rd}, {rn}");

        if let Operand::Immediate(imm) = operand {
            let imm = at_width(imm, rd.width());
            if !rn.is_zero() && (op.sets_flags() || !rd.is_zero()) {
                if let Some((imm12, shift12)) = encode_add_sub_immediate(imm) {
                    tracing::trace!(?op, %rd, %rn, imm, "add/sub immediate");
                    self.single_emission(|asm| asm.add_sub_immediate(op, rd, rn, imm12, shift12));
                    return;
                }

                let most_negative = if rd.is_64bit() { i64::MIN } else { i64::from(i32::MIN) };
                if imm != most_negative {
                    if let Some((imm12, shift12)) = encode_add_sub_immediate(-imm) {
                        let dual = op.dual();
                        tracing::trace!(?op, ?dual, %rd, %rn, imm, "add/sub negated immediate");
                        self.single_emission(|asm| asm.add_sub_immediate(dual, rd, rn, imm12, shift12));
                        return;
                    }
                }
            }
        } else if let Some(form) = Self::register_form(op, rd, rn, operand) {
            tracing::trace!(?op, %rd, %rn, ?form, "add/sub register");
            self.single_emission(|asm| form.emit(asm, op, rd, rn));
            return;
        }

        tracing::trace!(?op, %rd, %rn, ?operand, "add/sub through scratch");
        let sources: Vec<Register> = std::iter::once(rn).chain(operand.register()).collect();
        let mut scope = self.scope_for(rd, &sources);
        let temp = scope.acquire_same_size_as(rd);
        scope.mov(temp, operand);

        let form = Self::register_form(op, rd, rn, Operand::Register(temp))
            .unwrap_or_else(|| panic!("no add/sub form accepts {rd}, {rn} after materializing the operand"));
        scope.single_emission(|asm| form.emit(asm, op, rd, rn));
    }

    /// The register form encoding `operand` directly, if any. Plain and
    /// `LSL #0..=4` registers combined with the stack pointer are rewritten
    /// to the extended form.
    fn register_form(op: AddSubOp, rd: Register, rn: Register, operand: Operand) -> Option<RegisterForm> {
        // In the extended form register 31 is the stack pointer for `rn`,
        // and for `rd` unless flags are set.
        let extended_ok = !rn.is_zero() && (op.sets_flags() || !rd.is_zero());

        let (rm, shift, amount) = match operand {
            Operand::Immediate(_) => return None,
            Operand::Register(rm) => (rm, Shift::Lsl, 0),
            Operand::Shifted { reg, shift, amount } => (reg, shift, amount),
            Operand::Extended { reg, extend, amount } => {
                return (extended_ok && amount <= 4 && !reg.is_sp())
                    .then_some(RegisterForm::Extended(reg, extend, amount));
            }
        };
        if rm.is_sp() {
            return None;
        }

        if rd.is_sp() || rn.is_sp() {
            let extend = if rd.is_64bit() { Extend::Uxtx } else { Extend::Uxtw };
            return (extended_ok && shift == Shift::Lsl && amount <= 4)
                .then_some(RegisterForm::Extended(rm, extend, amount));
        }

        (shift != Shift::Ror && u32::from(amount) < rd.width()).then_some(RegisterForm::Shifted(rm, shift, amount))
    }

    // Logical operations.

    pub fn and(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::And, false, rd, rn, operand.into());
    }

    pub fn ands(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Ands, false, rd, rn, operand.into());
    }

    pub fn orr(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Orr, false, rd, rn, operand.into());
    }

    pub fn eor(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Eor, false, rd, rn, operand.into());
    }

    pub fn bic(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::And, true, rd, rn, operand.into());
    }

    pub fn bics(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Ands, true, rd, rn, operand.into());
    }

    pub fn orn(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Orr, true, rd, rn, operand.into());
    }

    pub fn eon(&mut self, rd: Register, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Eor, true, rd, rn, operand.into());
    }

    pub fn tst(&mut self, rn: Register, operand: impl Into<Operand>) {
        self.logical_macro(LogicalOp::Ands, false, zero_register(rn), rn, operand.into());
    }

    fn logical_macro(&mut self, op: LogicalOp, invert: bool, rd: Register, rn: Register, operand: Operand) {
        assert!(
            !rd.is_capability() && !rn.is_capability(),
            "integer arithmetic on a capability register"
        );
        assert_eq!(rd.is_64bit(), rn.is_64bit(), "mixed register widths: {rd}, {rn}");

        match operand {
            Operand::Immediate(imm) => {
                let width = rd.width();
                let mask = width_mask(width);
                let imm = at_width(imm, width);
                #[allow(clippy::cast_sign_loss)]
                let value = (if invert { !imm } else { imm }) as u64 & mask;
                let rd_ok = if op == LogicalOp::Ands { !rd.is_sp() } else { !rd.is_zero() };

                if !rn.is_sp() && rd_ok {
                    if let Some(bitmask) = encode_logical_immediate(value, width) {
                        tracing::trace!(?op, %rd, %rn, value, "logical immediate");
                        self.single_emission(|asm| asm.logical_immediate(op, rd, rn, bitmask));
                        return;
                    }
                }
            }
            Operand::Register(rm) | Operand::Shifted { reg: rm, .. } => {
                let (shift, amount) = match operand {
                    Operand::Shifted { shift, amount, .. } => (shift, amount),
                    _ => (Shift::Lsl, 0),
                };
                if !rd.is_sp() && !rn.is_sp() && !rm.is_sp() && u32::from(amount) < rd.width() {
                    self.single_emission(|asm| asm.logical_shifted(op, invert, rd, rn, rm, (shift, amount)));
                    return;
                }
            }
            Operand::Extended { .. } => {}
        }

        tracing::trace!(?op, %rd, %rn, ?operand, "logical through scratch");
        let sources: Vec<Register> = std::iter::once(rn).chain(operand.register()).collect();
        let mut scope = self.scope_for(rd, &sources);
        let temp = scope.acquire_same_size_as(rd);
        scope.mov(temp, operand);
        // The shifted form has no stack pointer operand: copy `rn` out and
        // compute into the temporary when `rd` is the stack pointer.
        let rn = if rn.is_sp() {
            let copy = scope.acquire_same_size_as(rn);
            scope.mov(copy, rn);
            copy
        } else {
            rn
        };
        if rd.is_sp() {
            scope.single_emission(|asm| asm.logical_shifted(op, invert, temp, rn, temp, (Shift::Lsl, 0)));
            scope.mov(rd, temp);
        } else {
            scope.single_emission(|asm| asm.logical_shifted(op, invert, rd, rn, temp, (Shift::Lsl, 0)));
        }
    }

    // Moves.

    pub fn mov(&mut self, rd: Register, operand: impl Into<Operand>) {
        match operand.into() {
            Operand::Immediate(imm) => self.mov_imm(rd, imm),
            Operand::Register(rm) => self.mov_register(rd, rm),
            Operand::Shifted { reg, shift, amount } => self.mov_shifted(rd, reg, shift, amount),
            Operand::Extended { reg, extend, amount } => self.mov_extended(rd, reg, extend, amount),
        }
    }

    fn mov_register(&mut self, rd: Register, rm: Register) {
        if rm.is_zero() {
            self.mov_imm(rd, 0);
        } else if rd.is_sp() || rm.is_sp() {
            let rm = rm.with_size(rd.size());
            self.single_emission(|asm| asm.add_sub_immediate(AddSubOp::Add, rd, rm, 0, false));
        } else {
            let rm = rm.with_size(rd.size());
            self.single_emission(|asm| {
                asm.logical_shifted(LogicalOp::Orr, false, rd, zero_register(rd), rm, (Shift::Lsl, 0));
            });
        }
    }

    fn mov_shifted(&mut self, rd: Register, rn: Register, shift: Shift, amount: u8) {
        let width = rd.width();
        let amount = u32::from(amount);
        assert!(amount < width, "shift amount out of range: {amount}");
        assert!(!rn.is_sp(), "cannot shift the stack pointer");
        let rn = rn.with_size(rd.size());

        match shift {
            Shift::Lsl => self.lsl(rd, rn, amount),
            Shift::Lsr => self.single_emission(|asm| asm.bitfield(BitfieldOp::Ubfm, rd, rn, amount, width - 1)),
            Shift::Asr => self.single_emission(|asm| asm.bitfield(BitfieldOp::Sbfm, rd, rn, amount, width - 1)),
            Shift::Ror => self.single_emission(|asm| asm.extr(rd, rn, rn, amount)),
        }
    }

    fn lsl(&mut self, rd: Register, rn: Register, amount: u32) {
        let width = rd.width();
        self.single_emission(|asm| {
            asm.bitfield(BitfieldOp::Ubfm, rd, rn, (width - amount) % width, width - 1 - amount);
        });
    }

    /// Extends the low bits of `rn` and shifts the result left by `amount`.
    fn mov_extended(&mut self, rd: Register, rn: Register, extend: Extend, amount: u8) {
        let width = rd.width();
        let amount = u32::from(amount);
        assert!(amount < width, "extend shift out of range: {amount}");
        assert!(!rn.is_sp(), "cannot extend the stack pointer");
        let rn = rn.with_size(rd.size());

        let high_bit = extend.source_bits() - 1;
        let kept = (width - amount) & (width - 1);
        if extend.source_bits() == 64 || (kept != 0 && kept <= high_bit) {
            // Nothing to extend, or the extended bits are shifted out.
            self.lsl(rd, rn, amount);
        } else {
            let op = if extend.is_signed() { BitfieldOp::Sbfm } else { BitfieldOp::Ubfm };
            self.single_emission(|asm| asm.bitfield(op, rd, rn, kept, high_bit.min(width - 1)));
        }
    }

    /// Materialises `imm` with the shortest of `movz`, `movn`, an `orr`
    /// bitmask, or a `movz`/`movn` + `movk` sequence.
    fn mov_imm(&mut self, rd: Register, imm: i64) {
        if rd.is_sp() {
            let mut scope = self.scratch_scope();
            let temp = scope.acquire_same_size_as(rd);
            scope.mov_imm(temp, imm);
            scope.single_emission(|asm| asm.add_sub_immediate(AddSubOp::Add, rd, temp, 0, false));
            return;
        }

        let width = rd.width();
        let mask = width_mask(width);
        #[allow(clippy::cast_sign_loss)]
        let value = at_width(imm, width) as u64 & mask;

        if let Some((imm16, hw)) = encode_move_wide(value, width) {
            self.single_emission(|asm| asm.move_wide(MoveWideOp::Movz, rd, imm16, hw));
        } else if let Some((imm16, hw)) = encode_move_wide(!value & mask, width) {
            self.single_emission(|asm| asm.move_wide(MoveWideOp::Movn, rd, imm16, hw));
        } else if let Some(bitmask) = encode_logical_immediate(value, width).filter(|_| !rd.is_zero()) {
            self.single_emission(|asm| asm.logical_immediate(LogicalOp::Orr, rd, zero_register(rd), bitmask));
        } else {
            self.mov_imm_sequence(rd, value, width);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn mov_imm_sequence(&mut self, rd: Register, value: u64, width: u32) {
        let halfword = |hw: u32| ((value >> (hw * 16)) & 0xFFFF) as u32;
        let halfwords = width / 16;
        let ones = (0..halfwords).filter(|&hw| halfword(hw) == 0xFFFF).count();
        let zeros = (0..halfwords).filter(|&hw| halfword(hw) == 0).count();
        let inverted = ones > zeros;
        let skipped = if inverted { 0xFFFF } else { 0 };

        tracing::trace!(%rd, value, inverted, "move wide sequence");
        let mut first = true;
        for hw in (0..halfwords).filter(|&hw| halfword(hw) != skipped) {
            let imm16 = halfword(hw);
            if first {
                if inverted {
                    self.asm.move_wide(MoveWideOp::Movn, rd, !imm16 & 0xFFFF, hw);
                } else {
                    self.asm.move_wide(MoveWideOp::Movz, rd, imm16, hw);
                }
                first = false;
            } else {
                self.asm.move_wide(MoveWideOp::Movk, rd, imm16, hw);
            }
        }
    }

    // Loads and stores.

    pub fn ldr(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Ldr, rt, mem);
    }

    pub fn str(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Str, rt, mem);
    }

    pub fn ldrb(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Ldrb, rt, mem);
    }

    pub fn strb(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Strb, rt, mem);
    }

    pub fn ldrh(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Ldrh, rt, mem);
    }

    pub fn strh(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Strh, rt, mem);
    }

    pub fn ldrsb(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Ldrsb, rt, mem);
    }

    pub fn ldrsh(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Ldrsh, rt, mem);
    }

    pub fn ldrsw(&mut self, rt: Register, mem: MemOperand) {
        self.load_store_macro(LoadStoreOp::Ldrsw, rt, mem);
    }

    fn load_store_macro(&mut self, op: LoadStoreOp, rt: Register, mem: MemOperand) {
        let size = op.size_log2(rt);
        let base = mem.base_register();
        assert!(base.is_64bit(), "the base register must be 64 bits wide");
        if mem.writes_back() {
            assert!(
                rt.code() != base.code(),
                "writeback with the transfer register as base is unpredictable"
            );
        }

        match mem {
            MemOperand::Offset { offset, .. } => {
                if is_scaled_offset(offset, size) {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let imm12 = (offset >> size) as u32;
                    self.single_emission(|asm| asm.load_store_unsigned(op, rt, base, imm12));
                } else if is_unscaled_offset(offset) {
                    self.single_emission(|asm| asm.load_store_indexed(op, rt, base, offset, IndexMode::Unscaled));
                } else {
                    tracing::trace!(?op, %rt, %base, offset, "offset through scratch");
                    let mut scope = self.scratch_scope();
                    scope.exclude(&[base, rt]);
                    let temp = scope.acquire_x();
                    scope.add(temp, base, offset);
                    scope.single_emission(|asm| asm.load_store_unsigned(op, rt, temp, 0));
                }
            }
            MemOperand::PreIndex { offset, .. } => {
                if is_unscaled_offset(offset) {
                    self.single_emission(|asm| asm.load_store_indexed(op, rt, base, offset, IndexMode::PreIndex));
                } else {
                    tracing::trace!(?op, %rt, %base, offset, "pre-index through base update");
                    self.update_base(rt, base, offset);
                    self.single_emission(|asm| asm.load_store_unsigned(op, rt, base, 0));
                }
            }
            MemOperand::PostIndex { offset, .. } => {
                if is_unscaled_offset(offset) {
                    self.single_emission(|asm| asm.load_store_indexed(op, rt, base, offset, IndexMode::PostIndex));
                } else {
                    tracing::trace!(?op, %rt, %base, offset, "post-index through base update");
                    self.single_emission(|asm| asm.load_store_unsigned(op, rt, base, 0));
                    self.update_base(rt, base, offset);
                }
            }
            MemOperand::RegisterOffset {
                index, extend, amount, ..
            } => {
                let legal_extend = matches!(extend, Extend::Uxtw | Extend::Uxtx | Extend::Sxtw | Extend::Sxtx);
                if legal_extend && (amount == 0 || u32::from(amount) == size) {
                    let index = if matches!(extend, Extend::Uxtw | Extend::Sxtw) {
                        index.as_w()
                    } else {
                        index.as_x()
                    };
                    self.single_emission(|asm| asm.load_store_register(op, rt, base, index, extend, amount != 0));
                } else {
                    tracing::trace!(?op, %rt, %base, %index, ?extend, amount, "register offset through scratch");
                    let operand = if extend == Extend::Uxtx {
                        Operand::shifted(index.as_x(), Shift::Lsl, amount)
                    } else {
                        Operand::extended(index, extend, amount)
                    };
                    let mut scope = self.scratch_scope();
                    scope.exclude(&[base, index, rt]);
                    let temp = scope.acquire_x();
                    scope.add(temp, base, operand);
                    scope.single_emission(|asm| asm.load_store_unsigned(op, rt, temp, 0));
                }
            }
        }
    }

    /// `base += offset` for a writeback access, keeping `rt` out of the
    /// scratch pool.
    fn update_base(&mut self, rt: Register, base: Register, offset: i64) {
        let mut scope = self.scratch_scope();
        scope.exclude(&[rt]);
        scope.add(base, base, offset);
    }

    // Branches.

    pub fn br(&mut self, rn: Register) {
        self.branch_register(BranchRegisterOp::Br, rn);
    }

    pub fn blr(&mut self, rn: Register) {
        self.branch_register(BranchRegisterOp::Blr, rn);
    }

    /// Returns through the link register of the current instruction set.
    pub fn ret(&mut self) {
        let lr = match self.isa {
            Isa::A64 => Register::x(LINK_REGISTER),
            Isa::C64 => Register::c(LINK_REGISTER),
        };
        self.branch_register(BranchRegisterOp::Ret, lr);
    }

    fn branch_register(&mut self, op: BranchRegisterOp, rn: Register) {
        match self.isa {
            Isa::A64 => assert!(rn.is_64bit() && !rn.is_capability(), "A64 branches take an x register"),
            Isa::C64 => assert!(rn.is_capability(), "C64 branches take a c register"),
        }
        self.single_emission(|asm| asm.branch_register(op, rn));
    }

    /// Branches to the capability stored at `mem`, an offset from a
    /// capability base.
    pub fn br_capability(&mut self, mem: MemOperand) {
        self.capability_branch_macro(mem, false);
    }

    pub fn blr_capability(&mut self, mem: MemOperand) {
        self.capability_branch_macro(mem, true);
    }

    fn capability_branch_macro(&mut self, mem: MemOperand, link: bool) {
        assert_eq!(self.isa, Isa::C64, "capability branches need the C64 instruction set");
        let MemOperand::Offset { base, offset } = mem else {
            panic!("capability branches take a [cn, #offset] operand");
        };
        assert!(base.is_capability(), "capability branches use a c register base");

        if offset % 16 == 0 && (-1024..=1008).contains(&offset) {
            self.single_emission(|asm| asm.capability_branch(base, offset, link));
            return;
        }

        tracing::trace!(%base, offset, link, "capability branch through scratch");
        let mut scope = self.scratch_scope();
        scope.exclude(&[base]);
        let temp = scope.acquire_c();
        scope.capability_add(temp, base, offset);
        scope.single_emission(|asm| asm.capability_branch(temp, 0, link));
    }

    /// `cd = cn + offset` on capabilities.
    pub fn capability_add(&mut self, cd: Register, cn: Register, offset: i64) {
        let magnitude = i64::try_from(offset.unsigned_abs())
            .ok()
            .and_then(encode_add_sub_immediate);
        if let Some((imm12, shift12)) = magnitude {
            self.single_emission(|asm| asm.capability_add_immediate(offset < 0, cd, cn, imm12, shift12));
            return;
        }

        let mut scope = self.scratch_scope();
        scope.exclude(&[cd, cn]);
        let temp = scope.acquire_x();
        scope.mov_imm(temp, offset);
        scope.single_emission(|asm| asm.capability_add_extended(cd, cn, temp, Extend::Sxtx, 0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Category, DecodeGraph};
    use pretty_assertions::assert_eq;

    const X0: Register = Register::x(0);
    const X1: Register = Register::x(1);
    const X2: Register = Register::x(2);
    const W0: Register = Register::w(0);
    const W1: Register = Register::w(1);

    fn emitted(f: impl FnOnce(&mut MacroAssembler)) -> Vec<u32> {
        let mut masm = MacroAssembler::new();
        let pool = masm.scratch_available();
        f(&mut masm);
        assert_eq!(masm.scratch_available(), pool, "scratch pool leaked");
        masm.words().to_vec()
    }

    fn categories(words: &[u32], isa: Isa) -> Vec<Category> {
        let graph = DecodeGraph::shared();
        words.iter().map(|&w| graph.classify(w, isa)).collect()
    }

    #[test]
    fn add_immediate_forms() {
        // add x0, x1, #1
        assert_eq!(emitted(|m| m.add(X0, X1, 1_i64)), vec![0x9100_0420]);
        // add x0, x1, #1, lsl #12
        assert_eq!(emitted(|m| m.add(X0, X1, 4096_i64)), vec![0x9140_0420]);
        // add x0, x1, #-8 => sub x0, x1, #8
        assert_eq!(emitted(|m| m.add(X0, X1, -8_i64)), vec![0xD100_2020]);
        // cmp x1, #-1 => cmn x1, #1
        assert_eq!(emitted(|m| m.cmp(X1, -1_i64)), vec![0xB100_043F]);
    }

    #[test]
    fn add_through_scratch_uses_the_destination() {
        // mov x0, #0x2345; movk x0, #0x1, lsl #16; add x0, x1, x0
        assert_eq!(
            emitted(|m| m.add(X0, X1, 0x1_2345_i64)),
            vec![0xD284_68A0, 0xF2A0_0020, 0x8B00_0020]
        );
        // The destination is a source: x16 holds the value.
        assert_eq!(
            emitted(|m| m.add(X1, X1, 0x1_2345_i64)),
            vec![0xD284_68B0, 0xF2A0_0030, 0x8B10_0021]
        );
    }

    #[test]
    fn most_negative_immediate_is_not_negated() {
        let words = emitted(|m| m.add(X0, X1, i64::MIN));
        // movz x0, #0x8000, lsl #48; add x0, x1, x0
        assert_eq!(words, vec![0xD2F0_0000, 0x8B00_0020]);

        let words = emitted(|m| m.sub(W0, W1, i64::from(i32::MIN)));
        // mov w0, #0x80000000; sub w0, w1, w0
        assert_eq!(words, vec![0x52B0_0000, 0x4B00_0020]);
    }

    #[test]
    fn stack_pointer_uses_extended_form() {
        // add sp, sp, x1 => add sp, sp, x1, uxtx
        assert_eq!(emitted(|m| m.add(Register::sp(), Register::sp(), X1)), vec![0x8B21_63FF]);
        // add x0, sp, x1, lsl #2 => add x0, sp, x1, uxtx #2
        assert_eq!(
            emitted(|m| m.add(X0, Register::sp(), Operand::shifted(X1, Shift::Lsl, 2))),
            vec![0x8B21_6BE0]
        );
        // lsl #5 does not fit the extended form.
        let words = emitted(|m| m.add(X0, Register::sp(), Operand::shifted(X1, Shift::Lsl, 5)));
        assert_eq!(words.len(), 2);
        assert_eq!(
            categories(&words, Isa::A64),
            vec![Category::Bitfield, Category::AddSubExtended]
        );
    }

    #[test]
    fn neg_and_register_forms() {
        // neg x0, x1 => sub x0, xzr, x1
        assert_eq!(emitted(|m| m.neg(X0, X1)), vec![0xCB01_03E0]);
        // sub x0, x1, x2, asr #3
        assert_eq!(
            emitted(|m| m.sub(X0, X1, Operand::shifted(X2, Shift::Asr, 3))),
            vec![0xCB82_0C20]
        );
        // ror is not an add/sub shift.
        let words = emitted(|m| m.add(X0, X1, Operand::shifted(X2, Shift::Ror, 8)));
        assert_eq!(categories(&words, Isa::A64), vec![Category::Extract, Category::AddSubShifted]);
    }

    #[test]
    fn logical_forms() {
        // and x0, x1, #0xff
        assert_eq!(emitted(|m| m.and(X0, X1, 0xFF_i64)), vec![0x9240_1C20]);
        // bic x0, x1, #0xff => and x0, x1, #~0xff
        assert_eq!(emitted(|m| m.bic(X0, X1, 0xFF_i64)), vec![0x9278_DC20]);
        // tst x1, x2
        assert_eq!(emitted(|m| m.tst(X1, X2)), vec![0xEA02_003F]);

        let words = emitted(|m| m.orr(X0, X1, 0x1234_i64));
        assert_eq!(
            categories(&words, Isa::A64),
            vec![Category::MoveWide, Category::LogicalShifted]
        );
    }

    #[test]
    fn logical_into_stack_pointer_goes_through_a_temporary() {
        // mov x16, #0x2345; movk x16, #0x1, lsl #16; and x16, x1, x16; mov sp, x16
        assert_eq!(
            emitted(|m| m.and(Register::sp(), X1, 0x1_2345_i64)),
            vec![0xD284_68B0, 0xF2A0_0030, 0x8A10_0030, 0x9100_021F]
        );
        // mov x0, x1; mov x16, sp; eor x0, x16, x0
        assert_eq!(
            emitted(|m| m.eor(X0, Register::sp(), X1)),
            vec![0xAA01_03E0, 0x9100_03F0, 0xCA00_0200]
        );
    }

    #[test]
    #[should_panic(expected = "does not fit a 32-bit operation")]
    fn wide_immediate_on_w_register_panics() {
        let mut masm = MacroAssembler::new();
        masm.add(W0, W1, 0x1_0000_0001_i64);
    }

    #[test]
    #[should_panic(expected = "does not fit a 32-bit operation")]
    fn wide_logical_immediate_on_w_register_panics() {
        let mut masm = MacroAssembler::new();
        masm.and(W0, W1, 0x1_0000_00FF_i64);
    }

    #[test]
    #[should_panic(expected = "does not fit a 32-bit operation")]
    fn wide_move_on_w_register_panics() {
        let mut masm = MacroAssembler::new();
        masm.mov(W0, -0x8000_0001_i64);
    }

    #[test]
    fn move_immediates() {
        assert_eq!(emitted(|m| m.mov(X0, 0_i64)), vec![0xD280_0000]);
        // movn x0, #0
        assert_eq!(emitted(|m| m.mov(X0, -1_i64)), vec![0x9280_0000]);
        // movn w0, #0x1234 for 0xffffedcb
        assert_eq!(emitted(|m| m.mov(W0, 0xFFFF_EDCB_i64)), vec![0x1282_4680]);
        // orr x0, xzr, #0x5555555555555555
        assert_eq!(emitted(|m| m.mov(X0, 0x5555_5555_5555_5555_i64)), vec![0xB200_F3E0]);
        // Mostly ones: movn then movk.
        let words = emitted(|m| m.mov(X0, 0xFFFF_1234_FFFF_5678_u64 as i64));
        assert_eq!(words, vec![0x9295_30E0, 0xF2C2_4680]);
    }

    #[test]
    fn move_registers() {
        assert_eq!(emitted(|m| m.mov(X0, X1)), vec![0xAA01_03E0]);
        // mov sp, x1 => add sp, x1, #0
        assert_eq!(emitted(|m| m.mov(Register::sp(), X1)), vec![0x9100_003F]);
        // lsr x0, x1, #4 => ubfm x0, x1, #4, #63
        assert_eq!(
            emitted(|m| m.mov(X0, Operand::shifted(X1, Shift::Lsr, 4))),
            vec![0xD344_FC20]
        );
        // uxtb w0, w1 => ubfm w0, w1, #0, #7
        assert_eq!(
            emitted(|m| m.mov(W0, Operand::extended(W1, Extend::Uxtb, 0))),
            vec![0x5300_1C20]
        );
        // sxtw x0, w1 => sbfm x0, x1, #0, #31
        assert_eq!(
            emitted(|m| m.mov(X0, Operand::extended(W1, Extend::Sxtw, 0))),
            vec![0x9340_7C20]
        );
    }

    #[test]
    fn load_store_offsets() {
        // ldr x0, [x1]
        assert_eq!(emitted(|m| m.ldr(X0, MemOperand::base(X1))), vec![0xF940_0020]);
        // ldr x0, [x1, #32760]
        assert_eq!(emitted(|m| m.ldr(X0, MemOperand::offset(X1, 32760))), vec![0xF97F_FC20]);
        // ldur x0, [x1, #-8]
        assert_eq!(emitted(|m| m.ldr(X0, MemOperand::offset(X1, -8))), vec![0xF85F_8020]);
        // add x16, x1, #9, lsl #12; ldr x0, [x16]
        assert_eq!(
            emitted(|m| m.ldr(X0, MemOperand::offset(X1, 36864))),
            vec![0x9140_2430, 0xF940_0200]
        );
    }

    #[test]
    fn load_store_writeback() {
        // ldr x0, [x1, #4096]! => add x1, x1, #1, lsl #12; ldr x0, [x1]
        assert_eq!(
            emitted(|m| m.ldr(X0, MemOperand::pre_index(X1, 4096))),
            vec![0x9140_0421, 0xF940_0020]
        );
        // str x0, [x1, #-16]!
        assert_eq!(emitted(|m| m.str(X0, MemOperand::pre_index(X1, -16))), vec![0xF81F_0C20]);

        // ldr x0, [x1], #4096 => ldr x0, [x1]; add x1, x1, #1, lsl #12
        assert_eq!(
            emitted(|m| m.ldr(X0, MemOperand::post_index(X1, 4096))),
            vec![0xF940_0020, 0x9140_0421]
        );
    }

    #[test]
    fn writeback_keeps_the_transfer_register_out_of_scratch() {
        let x16 = Register::x(16);
        // mov x17, #0x2345; movk x17, #0x1, lsl #16; add x1, x1, x17; str x16, [x1]
        assert_eq!(
            emitted(|m| m.str(x16, MemOperand::pre_index(X1, 0x1_2345))),
            vec![0xD284_68B1, 0xF2A0_0031, 0x8B11_0021, 0xF900_0030]
        );
        // ldr x16, [x1]; mov x17, #0x2345; movk x17, #0x1, lsl #16; add x1, x1, x17
        assert_eq!(
            emitted(|m| m.ldr(x16, MemOperand::post_index(X1, 0x1_2345))),
            vec![0xF940_0030, 0xD284_68B1, 0xF2A0_0031, 0x8B11_0021]
        );
    }

    #[test]
    fn custom_scratch_pool() {
        let mut masm = MacroAssembler::new();
        masm.set_scratch_available(RegList::of(&[Register::x(9)]));
        masm.add(X1, X1, 0x1_2345_i64);
        assert_eq!(masm.scratch_available(), RegList::of(&[Register::x(9)]));
        // mov x9, #0x2345; movk x9, #0x1, lsl #16; add x1, x1, x9
        assert_eq!(masm.words(), &[0xD284_68A9, 0xF2A0_0029, 0x8B09_0021]);
    }

    #[test]
    #[should_panic(expected = "unpredictable")]
    fn writeback_into_base_panics() {
        let mut masm = MacroAssembler::new();
        masm.ldr(X1, MemOperand::pre_index(X1, 8));
    }

    #[test]
    fn load_store_register_offsets() {
        // ldr x0, [x1, x2, lsl #3]
        assert_eq!(emitted(|m| m.ldr(X0, MemOperand::register(X1, X2, 3))), vec![0xF862_7820]);
        // ldr w0, [x1, w2, sxtw]
        assert_eq!(
            emitted(|m| m.ldr(
                W0,
                MemOperand::RegisterOffset {
                    base: X1,
                    index: X2,
                    extend: Extend::Sxtw,
                    amount: 0,
                }
            )),
            vec![0xB862_C820]
        );
        // lsl #1 is not the access size of an x load.
        let words = emitted(|m| m.ldr(X0, MemOperand::register(X1, X2, 1)));
        assert_eq!(
            categories(&words, Isa::A64),
            vec![Category::AddSubShifted, Category::LoadStoreUnsignedOffset]
        );
    }

    #[test]
    fn branches() {
        let mut masm = MacroAssembler::new();
        masm.br(X1);
        masm.blr(X2);
        masm.ret();
        assert_eq!(masm.words(), &[0xD61F_0020, 0xD63F_0040, 0xD65F_03C0]);
    }

    #[test]
    fn capability_branches() {
        let c1 = Register::c(1);
        let mut masm = MacroAssembler::with_isa(Isa::C64);
        masm.br_capability(MemOperand::offset(c1, 32));
        masm.blr_capability(MemOperand::offset(c1, 4096));
        masm.blr_capability(MemOperand::offset(c1, 8));
        masm.br(Register::c(2));

        assert_eq!(
            categories(masm.words(), Isa::C64),
            vec![
                Category::CapabilityBranchMemory,
                Category::CapabilityArithmetic,
                Category::CapabilityBranchMemory,
                Category::CapabilityArithmetic,
                Category::CapabilityBranchMemory,
                Category::CapabilityBranchRegister,
            ]
        );
        assert_eq!(masm.words()[0], 0xC240_0020 | (2 << 15));
        // add c16, c1, #1, lsl #12; blr [c16]
        assert_eq!(&masm.words()[1..3], &[0x0240_0430, 0xC240_0201]);
    }

    #[test]
    fn huge_capability_offsets_go_through_an_integer_register() {
        let mut masm = MacroAssembler::with_isa(Isa::C64);
        masm.br_capability(MemOperand::offset(Register::c(1), 0x1234_5678));
        let categories = categories(masm.words(), Isa::C64);
        assert_eq!(categories.first(), Some(&Category::MoveWide));
        assert_eq!(
            &categories[categories.len() - 2..],
            &[Category::CapabilityArithmetic, Category::CapabilityBranchMemory]
        );
    }

    #[test]
    #[should_panic(expected = "C64")]
    fn capability_branches_need_c64() {
        let mut masm = MacroAssembler::new();
        masm.br_capability(MemOperand::offset(Register::c(1), 0));
    }
}
