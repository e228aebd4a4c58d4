//! # A64 Immediate Fields
//!
//! Range checks and codecs for the immediate fields the emitter selects
//! between. The decoder reuses [`decode_logical_immediate`] to rebuild
//! bitmask immediates from `(N, immr, imms)`.
//!
//! | Field            | Width | Range                                  |
//! |------------------|-------|----------------------------------------|
//! | add/sub `imm12`  | 12    | `0..=4095`, optionally `LSL #12`       |
//! | bitmask          | 13    | rotated runs of ones, replicated       |
//! | move wide        | 16    | one halfword at `hw * 16`              |
//! | load/store scaled| 12    | `0..=4095 * access size`               |
//! | unscaled / index | 9     | `-256..=255`                           |

/// Returns the `(imm12, shift12)` pair for an add/sub immediate, if any.
#[must_use]
pub const fn encode_add_sub_immediate(imm: i64) -> Option<(u32, bool)> {
    if imm < 0 {
        return None;
    }
    if imm >> 12 == 0 {
        Some((imm as u32, false))
    } else if imm & 0xFFF == 0 && imm >> 24 == 0 {
        Some(((imm >> 12) as u32, true))
    } else {
        None
    }
}

/// Scaled unsigned 12-bit offset used by `LDR Xt, [Xn, #imm]`.
/// `size_log2` is the log2 of the access size in bytes.
#[must_use]
pub const fn is_scaled_offset(offset: i64, size_log2: u32) -> bool {
    offset >= 0 && offset & ((1 << size_log2) - 1) == 0 && (offset >> size_log2) < 4096
}

/// Signed 9-bit offset used by unscaled, pre-index and post-index accesses.
#[must_use]
pub const fn is_unscaled_offset(offset: i64) -> bool {
    offset >= -256 && offset <= 255
}

/// Returns `(imm16, hw)` when `value` has at most one non-zero halfword
/// inside `width` bits.
#[must_use]
pub fn encode_move_wide(value: u64, width: u32) -> Option<(u32, u32)> {
    let halfwords = width / 16;
    let mut found = None;
    for hw in 0..halfwords {
        let half = (value >> (hw * 16)) & 0xFFFF;
        if half != 0 {
            if found.is_some() {
                return None;
            }
            found = Some((half as u32, hw));
        }
    }
    Some(found.unwrap_or((0, 0)))
}

/// Encodes a bitmask immediate for AND/ORR/EOR/ANDS.
///
/// Returns `(n, immr, imms)`. All-zero and all-one values have no encoding.
#[must_use]
pub fn encode_logical_immediate(value: u64, width: u32) -> Option<(u32, u32, u32)> {
    debug_assert!(width == 32 || width == 64);
    let value = if width == 32 {
        let w = value & 0xFFFF_FFFF;
        w | (w << 32)
    } else {
        value
    };
    if value == 0 || value == u64::MAX {
        return None;
    }

    // Smallest repeating element.
    let mut size = 64_u32;
    let mut elem = value;
    while size > 2 {
        let half = size / 2;
        let mask = (1_u64 << half) - 1;
        if elem & mask != (elem >> half) & mask {
            break;
        }
        size = half;
        elem &= mask;
    }
    if width == 32 && size == 64 {
        return None;
    }

    let ones = elem.count_ones();
    let elem_mask = if size == 64 { u64::MAX } else { (1_u64 << size) - 1 };
    let run = if ones == 64 { u64::MAX } else { (1_u64 << ones) - 1 };

    // The element is `ROR(run, immr)`: find the rotation that brings the run
    // of ones down to bit 0.
    let rotated = |r: u32| -> u64 {
        if r == 0 {
            elem
        } else {
            ((elem >> r) | (elem << (size - r))) & elem_mask
        }
    };
    let r = (0..size).find(|&r| rotated(r) == run)?;
    let immr = (size - r) % size;

    let n = u32::from(size == 64);
    let imms = ((!(size * 2 - 1)) & 0x3F) | (ones - 1);

    Some((n, immr, imms))
}

/// Rebuilds the value of a bitmask immediate. `None` for reserved encodings.
#[must_use]
pub fn decode_logical_immediate(n: u32, immr: u32, imms: u32, width: u32) -> Option<u64> {
    let combined = (n << 6) | (!imms & 0x3F);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    if len < 1 {
        return None;
    }
    let size = 1_u32 << len;
    if size > width {
        return None;
    }
    let levels = size - 1;
    let s = imms & levels;
    let r = immr & levels;
    if s == levels {
        return None;
    }

    let elem_mask = if size == 64 { u64::MAX } else { (1_u64 << size) - 1 };
    let run = (1_u64 << (s + 1)) - 1;
    let elem = if r == 0 {
        run
    } else {
        ((run >> r) | (run << (size - r))) & elem_mask
    };

    let mut value = elem;
    let mut filled = size;
    while filled < width {
        value |= value << filled;
        filled *= 2;
    }
    if width == 32 {
        value &= 0xFFFF_FFFF;
    }
    Some(value)
}
