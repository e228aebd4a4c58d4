//! Bootstrap decode tables for A64 and its capability variant C64.
//!
//! The tables follow the top-level A64 encoding index down to encoding
//! classes, plus the unallocated checks of the classes the emitter
//! produces. Advanced SIMD, floating point and SVE are left unimplemented.
//!
//! ```text
//!  31  28    25                                                 0
//! +---+-------+-------------------------------------------------+
//! |op0| op1   |                                                 |
//! +---+-------+-------------------------------------------------+
//!       0000  reserved            100x  data processing (imm)
//!       0001  reserved / C64 cap  101x  branch, exception, system
//!       0010  SVE                 x1x0  loads and stores
//!       0011  reserved            x101  data processing (reg)
//!                                 x111  SIMD and FP
//! ```

use super::table::{DecodePattern, OTHERWISE};

pub const A64_ROOT: &str = "Root";
pub const C64_ROOT: &str = "RootC64";

pub static TABLES: &[DecodePattern] = &[
    DecodePattern {
        name: A64_ROOT,
        sampled_bits: &[28, 27, 26, 25],
        mapping: &[
            ("0000", "Unallocated"),
            ("0001", "Unallocated"),
            ("0011", "Unallocated"),
            ("0010", "Unimplemented"),
            ("100x", "DataProcessingImmediate"),
            ("101x", "BranchesExceptionSystem"),
            ("x1x0", "LoadsStores"),
            ("x101", "DataProcessingRegister"),
            ("x111", "Unimplemented"),
        ],
    },
    DecodePattern {
        name: C64_ROOT,
        sampled_bits: &[28, 27, 26, 25],
        mapping: &[
            ("0000", "Unallocated"),
            ("0001", "Capability"),
            ("0011", "Unallocated"),
            ("0010", "Unimplemented"),
            ("100x", "DataProcessingImmediateC64"),
            ("101x", "BranchesExceptionSystemC64"),
            ("x1x0", "LoadsStores"),
            ("x101", "DataProcessingRegister"),
            ("x111", "Unimplemented"),
        ],
    },
    // Capability opcode space, op1 = 0001.
    DecodePattern {
        name: "Capability",
        sampled_bits: &[31, 30, 29, 24, 23, 22],
        mapping: &[
            ("110001", "CapabilityBranchMemory"),
            ("0000xx", "CapabilityArithmetic"),
            ("110010", "CapabilityArithmetic"),
            (OTHERWISE, "Unimplemented"),
        ],
    },
    DecodePattern {
        name: "DataProcessingImmediate",
        sampled_bits: &[25, 24, 23],
        mapping: &[
            ("00x", "PcRelAddressing"),
            ("010", "AddSubImmediate"),
            ("011", "Unimplemented"),
            ("100", "LogicalImmediateClass"),
            ("101", "MoveWideClass"),
            ("110", "BitfieldClass"),
            ("111", "ExtractClass"),
        ],
    },
    DecodePattern {
        name: "DataProcessingImmediateC64",
        sampled_bits: &[25, 24, 23],
        mapping: &[
            ("00x", "CapabilityPcRelAddressing"),
            ("010", "AddSubImmediate"),
            ("011", "Unimplemented"),
            ("100", "LogicalImmediateClass"),
            ("101", "MoveWideClass"),
            ("110", "BitfieldClass"),
            ("111", "ExtractClass"),
        ],
    },
    // sf, N
    DecodePattern {
        name: "LogicalImmediateClass",
        sampled_bits: &[31, 22],
        mapping: &[("01", "Unallocated"), (OTHERWISE, "LogicalImmediate")],
    },
    // sf, opc, hw<1>
    DecodePattern {
        name: "MoveWideClass",
        sampled_bits: &[31, 30, 29, 22],
        mapping: &[
            ("x01x", "Unallocated"),
            ("0xx1", "Unallocated"),
            (OTHERWISE, "MoveWide"),
        ],
    },
    // sf, opc, N
    DecodePattern {
        name: "BitfieldClass",
        sampled_bits: &[31, 30, 29, 22],
        mapping: &[
            ("x11x", "Unallocated"),
            ("0xx1", "Unallocated"),
            ("1xx0", "Unallocated"),
            (OTHERWISE, "Bitfield"),
        ],
    },
    // sf, op21, N, o0
    DecodePattern {
        name: "ExtractClass",
        sampled_bits: &[31, 30, 29, 22, 21],
        mapping: &[
            ("xxxx1", "Unallocated"),
            ("x1xxx", "Unallocated"),
            ("xx1xx", "Unallocated"),
            ("0xx1x", "Unallocated"),
            ("1xx0x", "Unallocated"),
            (OTHERWISE, "Extract"),
        ],
    },
    DecodePattern {
        name: "BranchesExceptionSystem",
        sampled_bits: &[31, 30, 29, 25, 24, 23, 22],
        mapping: &[
            ("0100xxx", "ConditionalBranchClass"),
            ("11000xx", "ExceptionGeneration"),
            ("1100100", "System"),
            ("1101xxx", "UnconditionalBranchRegister"),
            ("x00xxxx", "UnconditionalBranchImmediate"),
            ("x010xxx", "CompareBranch"),
            ("x011xxx", "TestBranch"),
            (OTHERWISE, "Unallocated"),
        ],
    },
    DecodePattern {
        name: "BranchesExceptionSystemC64",
        sampled_bits: &[31, 30, 29, 25, 24, 23, 22],
        mapping: &[
            ("0100xxx", "ConditionalBranchClass"),
            ("11000xx", "ExceptionGeneration"),
            ("1100100", "System"),
            ("1101xxx", "CapabilityBranchRegister"),
            ("x00xxxx", "UnconditionalBranchImmediate"),
            ("x010xxx", "CompareBranch"),
            ("x011xxx", "TestBranch"),
            (OTHERWISE, "Unallocated"),
        ],
    },
    // o1, o0
    DecodePattern {
        name: "ConditionalBranchClass",
        sampled_bits: &[24, 4],
        mapping: &[("00", "ConditionalBranch"), (OTHERWISE, "Unallocated")],
    },
    DecodePattern {
        name: "LoadsStores",
        sampled_bits: &[29, 28, 26, 24, 23],
        mapping: &[
            ("0000x", "LoadStoreExclusive"),
            ("001xx", "Unimplemented"),
            ("0001x", "Unimplemented"),
            ("01x0x", "LoadLiteral"),
            ("01x1x", "Unallocated"),
            ("10x00", "LoadStorePairNonTemporal"),
            ("10x01", "LoadStorePairPostIndex"),
            ("10x10", "LoadStorePairOffset"),
            ("10x11", "LoadStorePairPreIndex"),
            ("11x0x", "LoadStoreRegisterClass"),
            ("11x1x", "LoadStoreUnsignedOffsetClass"),
        ],
    },
    // bit 21, op4
    DecodePattern {
        name: "LoadStoreRegisterClass",
        sampled_bits: &[21, 11, 10],
        mapping: &[
            ("000", "LoadStoreUnscaledOffset"),
            ("001", "LoadStorePostIndex"),
            ("010", "LoadStoreUnprivileged"),
            ("011", "LoadStorePreIndex"),
            ("100", "AtomicMemory"),
            ("110", "LoadStoreRegisterOffsetClass"),
            ("1x1", "LoadStorePac"),
        ],
    },
    // option<1>
    DecodePattern {
        name: "LoadStoreRegisterOffsetClass",
        sampled_bits: &[14],
        mapping: &[("0", "Unallocated"), ("1", "LoadStoreRegisterOffset")],
    },
    // size, V, opc
    DecodePattern {
        name: "LoadStoreUnsignedOffsetClass",
        sampled_bits: &[31, 30, 26, 23, 22],
        mapping: &[
            ("1x011", "Unallocated"),
            (OTHERWISE, "LoadStoreUnsignedOffset"),
        ],
    },
    DecodePattern {
        name: "DataProcessingRegister",
        sampled_bits: &[30, 28, 24, 23, 22, 21],
        mapping: &[
            ("x00xxx", "LogicalShiftedClass"),
            ("x01xx0", "AddSubShiftedClass"),
            ("x01xx1", "AddSubExtendedClass"),
            ("x10000", "AddSubWithCarryClass"),
            ("x10010", "ConditionalCompareClass"),
            ("x10100", "ConditionalSelect"),
            ("010110", "DataProcessing2Source"),
            ("110110", "DataProcessing1Source"),
            ("x11xxx", "DataProcessing3Source"),
            (OTHERWISE, "Unallocated"),
        ],
    },
    // sf, imm6<5>
    DecodePattern {
        name: "LogicalShiftedClass",
        sampled_bits: &[31, 15],
        mapping: &[("01", "Unallocated"), (OTHERWISE, "LogicalShifted")],
    },
    // sf, shift, imm6<5>
    DecodePattern {
        name: "AddSubShiftedClass",
        sampled_bits: &[31, 23, 22, 15],
        mapping: &[
            ("x11x", "Unallocated"),
            ("0xx1", "Unallocated"),
            (OTHERWISE, "AddSubShifted"),
        ],
    },
    // opt, imm3
    DecodePattern {
        name: "AddSubExtendedClass",
        sampled_bits: &[23, 22, 12, 11, 10],
        mapping: &[
            ("1xxxx", "Unallocated"),
            ("x1xxx", "Unallocated"),
            ("xx101", "Unallocated"),
            ("xx11x", "Unallocated"),
            (OTHERWISE, "AddSubExtended"),
        ],
    },
    // op3; the flag-manipulation forms are not classified.
    DecodePattern {
        name: "AddSubWithCarryClass",
        sampled_bits: &[15, 14, 13, 12, 11, 10],
        mapping: &[("000000", "AddSubWithCarry"), (OTHERWISE, "Unimplemented")],
    },
    DecodePattern {
        name: "ConditionalCompareClass",
        sampled_bits: &[11],
        mapping: &[
            ("0", "ConditionalCompareRegister"),
            ("1", "ConditionalCompareImmediate"),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Category, DecodeNode};
    use pretty_assertions::assert_eq;

    #[test]
    fn every_entry_is_well_formed() {
        for entry in TABLES {
            assert_eq!(entry.validate(), Ok(()), "{}", entry.name);
            assert!(DecodeNode::from_pattern(entry).is_ok());
        }
    }

    #[test]
    fn table_names_do_not_shadow_categories() {
        for entry in TABLES {
            assert_eq!(Category::from_name(entry.name), None, "{}", entry.name);
        }
    }
}
