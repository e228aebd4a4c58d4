//! # Scratch Register Scopes
//!
//! The macro assembler owns a pool of registers it may clobber when an
//! operation needs a temporary (`x16` and `x17` by default, the intra
//! procedure-call registers). A [`ScratchScope`] borrows the macro
//! assembler, hands out registers from the pool and puts the pool back
//! exactly as it found it when dropped:
//!
//! ```text
//! let mut scope = masm.scratch_scope();   pool {x16, x17}
//! let a = scope.acquire_x();              pool {x17}       a = x16
//! {
//!     let mut inner = scope.scratch_scope();
//!     let b = inner.acquire_x();          pool {}          b = x17
//! }                                       pool {x17}
//! drop(scope);                            pool {x16, x17}
//! ```
//!
//! A scope dereferences to the [`MacroAssembler`], so code inside a scope
//! keeps emitting through it, and nested scopes are opened from it.
//! Running out of registers and releasing a register twice are
//! programming errors and panic.

use std::ops::{Deref, DerefMut};

use super::macro_assembler::MacroAssembler;
use super::registers::{RegList, RegSize, Register};

pub struct ScratchScope<'a> {
    masm: &'a mut MacroAssembler,
    saved: RegList,
}

impl<'a> ScratchScope<'a> {
    pub(super) fn new(masm: &'a mut MacroAssembler) -> Self {
        let saved = masm.scratch;
        Self { masm, saved }
    }

    /// Registers that can still be acquired.
    #[must_use]
    pub fn available(&self) -> RegList {
        self.masm.scratch
    }

    #[must_use]
    pub fn is_available(&self, register: Register) -> bool {
        self.masm.scratch.contains(register)
    }

    /// # Panics
    /// When the pool is empty.
    pub fn acquire_x(&mut self) -> Register {
        self.acquire(RegSize::X)
    }

    /// # Panics
    /// When the pool is empty.
    pub fn acquire_w(&mut self) -> Register {
        self.acquire(RegSize::W)
    }

    /// # Panics
    /// When the pool is empty.
    pub fn acquire_c(&mut self) -> Register {
        self.acquire(RegSize::C)
    }

    /// A scratch register with the same view as `register`.
    ///
    /// # Panics
    /// When the pool is empty.
    pub fn acquire_same_size_as(&mut self, register: Register) -> Register {
        self.acquire(register.size())
    }

    fn acquire(&mut self, size: RegSize) -> Register {
        let code = self
            .masm
            .scratch
            .first()
            .unwrap_or_else(|| panic!("scratch register pool exhausted"));
        let register = Register::x(code).with_size(size);
        self.masm.scratch.remove(register);
        tracing::trace!(%register, "scratch acquired");
        register
    }

    /// Returns an acquired register to the pool before the scope ends.
    ///
    /// # Panics
    /// When `register` is already available.
    pub fn release(&mut self, register: Register) {
        assert!(
            !self.masm.scratch.contains(register),
            "{register} released while already available"
        );
        self.masm.scratch.insert(register);
    }

    /// Makes `registers` available for the rest of this scope.
    pub fn include(&mut self, registers: &[Register]) {
        for &register in registers {
            self.masm.scratch.insert(register);
        }
    }

    /// Withdraws `registers` for the rest of this scope.
    pub fn exclude(&mut self, registers: &[Register]) {
        for &register in registers {
            self.masm.scratch.remove(register);
        }
    }
}

impl Deref for ScratchScope<'_> {
    type Target = MacroAssembler;

    fn deref(&self) -> &Self::Target {
        self.masm
    }
}

impl DerefMut for ScratchScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.masm
    }
}

impl Drop for ScratchScope<'_> {
    fn drop(&mut self) {
        self.masm.scratch = self.saved;
    }
}
