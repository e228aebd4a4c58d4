//! # Terminal Categories and Instruction-Set Variants
//!
//! Every leaf of the decode graph is bound to exactly one [`Category`]. The
//! categories follow the A64 encoding index: each names one encoding class
//! (for example "add/subtract (immediate)"), not one mnemonic.
//!
//! Two categories are special:
//!
//! - [`Category::Unallocated`]: the encoding is reserved by the architecture.
//! - [`Category::Unimplemented`]: the encoding is allocated, but this toolkit
//!   does not classify it further (SVE, Advanced SIMD, ...).
//!
//! Both are ordinary data for observers, never decoder faults.
//!
//! ## Instruction-set variants
//!
//! | Variant | Meaning                                                 |
//! |---------|---------------------------------------------------------|
//! | `A64`   | Base AArch64 state                                      |
//! | `C64`   | Capability state: branches and PC-relative addressing   |
//! |         | operate on capabilities, and the capability opcode      |
//! |         | space (op1 = `0001`) is allocated                       |

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Instruction-set variant the decode graph is traversed for.
#[derive(Debug, Default, Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum Isa {
    #[default]
    A64,
    C64,
}

impl Isa {
    pub const ALL: [Self; 2] = [Self::A64, Self::C64];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl Display for Isa {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A64 => f.write_str("a64"),
            Self::C64 => f.write_str("c64"),
        }
    }
}

impl FromStr for Isa {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a64" => Ok(Self::A64),
            "c64" => Ok(Self::C64),
            _ => Err(format!("unknown instruction set `{s}` (expected a64 or c64)")),
        }
    }
}

macro_rules! categories {
    ($($(#[$doc:meta])* $variant:ident,)*) => {
        /// Encoding class reached at a leaf of the decode graph.
        #[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Category {
            $($(#[$doc])* $variant,)*
        }

        impl Category {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];
            pub const COUNT: usize = Self::ALL.len();

            /// Name used for this category by the decode tables.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

categories! {
    /// Reserved encoding.
    Unallocated,
    /// Allocated encoding this toolkit does not classify.
    Unimplemented,

    // Data processing (immediate)
    PcRelAddressing,
    AddSubImmediate,
    LogicalImmediate,
    MoveWide,
    Bitfield,
    Extract,

    // Branches, exception generation and system instructions
    ConditionalBranch,
    ExceptionGeneration,
    System,
    UnconditionalBranchRegister,
    UnconditionalBranchImmediate,
    CompareBranch,
    TestBranch,

    // Loads and stores
    LoadStoreExclusive,
    LoadLiteral,
    LoadStorePairNonTemporal,
    LoadStorePairPostIndex,
    LoadStorePairOffset,
    LoadStorePairPreIndex,
    LoadStoreUnscaledOffset,
    LoadStorePostIndex,
    LoadStoreUnprivileged,
    LoadStorePreIndex,
    AtomicMemory,
    LoadStoreRegisterOffset,
    LoadStorePac,
    LoadStoreUnsignedOffset,

    // Data processing (register)
    LogicalShifted,
    AddSubShifted,
    AddSubExtended,
    AddSubWithCarry,
    ConditionalCompareRegister,
    ConditionalCompareImmediate,
    ConditionalSelect,
    DataProcessing1Source,
    DataProcessing2Source,
    DataProcessing3Source,

    // Capability state only
    /// `BR`/`BLR`/`RET` through a capability register.
    CapabilityBranchRegister,
    /// `ADR`/`ADRP` producing a capability.
    CapabilityPcRelAddressing,
    /// Branch through a capability loaded from `[Cn, #imm]`.
    CapabilityBranchMemory,
    /// `ADD`/`SUB` on a capability, immediate or extended register.
    CapabilityArithmetic,
}

impl Category {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Reserved or unclassified encodings.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unallocated | Self::Unimplemented)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown category `{s}`"))
    }
}
