//! # Instruction Emitter
//!
//! Two layers over a [`CodeBuffer`]:
//!
//! - [`Assembler`] encodes one instruction per call and rejects operands
//!   its form cannot hold.
//! - [`MacroAssembler`] takes abstract [`Operand`]s and [`MemOperand`]s and
//!   picks the shortest legal sequence, borrowing temporaries through a
//!   [`ScratchScope`].

#[allow(clippy::module_name_repetitions)]
mod assembler;
mod buffer;
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::unreadable_literal)]
mod macro_assembler;
mod operand;
#[allow(clippy::cast_possible_truncation)]
mod registers;
mod scratch;

pub use assembler::{AddSubOp, Assembler, BitfieldOp, BranchRegisterOp, IndexMode, LoadStoreOp, LogicalOp, MoveWideOp};
pub use buffer::CodeBuffer;
pub use macro_assembler::{DEFAULT_SCRATCH, MacroAssembler};
pub use operand::{Extend, MemOperand, Operand, Shift};
pub use registers::{GP_REGISTERS, RegList, RegSize, Register, SP_CODE, ZR_CODE};
pub use scratch::ScratchScope;
