use std::fmt::Debug;
use std::mem::size_of;
use std::ops::RangeInclusive;

/// Contains some helper methods to sample bits out of instruction words,
/// the index (`bit_idx`) is supposed to be from lsb to msb (right to left)
pub trait Bits
where
    Self: Copy + Sized + Into<u128> + TryFrom<u128>,
    <Self as TryFrom<u128>>::Error: Debug,
{
    fn is_bit_on(&self, bit_idx: u8) -> bool {
        debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
        let bitwise: u128 = (*self).into();
        let mask: u128 = 0b1 << bit_idx;
        (bitwise & mask) != 0
    }

    fn is_bit_off(&self, bit_idx: u8) -> bool {
        !self.is_bit_on(bit_idx)
    }

    fn get_bit(&self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    fn get_bits(&self, bits_range: RangeInclusive<u8>) -> Self {
        let start = *bits_range.start();
        let length = bits_range.len() as u32;
        debug_assert!(*bits_range.end() < (size_of::<Self>() * 8) as u8);

        // `length` ones, moved to the first bit of the range.
        let mask = ((1_u128 << length) - 1) << start;
        let value: u128 = (*self).into();

        <Self as TryFrom<u128>>::try_from((value & mask) >> start).unwrap()
    }

    /// Returns a sign-extended copy of the value as an `i64`.
    /// `number_of_bits` is the width of the two's complement field.
    fn sign_extended(&self, number_of_bits: u8) -> i64 {
        debug_assert!(number_of_bits > 0 && number_of_bits <= 64);
        let value: u128 = (*self).into();
        let mask = 1_i128 << (number_of_bits - 1);
        let field = (value & ((1_u128 << number_of_bits) - 1)) as i128;

        // `field ^ mask` clears the sign bit when it is set (and sets it when it is
        // clear), so subtracting the mask borrows through the upper bits exactly
        // when the field was negative.
        ((field ^ mask) - mask) as i64
    }

    /// Gathers the bits selected by `mask` into the low bits of the result,
    /// preserving their order. The lowest selected bit lands in bit 0.
    fn compress(&self, mask: Self) -> Self {
        let value: u128 = (*self).into();
        let mut mask: u128 = mask.into();
        let mut result = 0_u128;
        let mut out = 0;

        while mask != 0 {
            let bit = mask.trailing_zeros();
            result |= ((value >> bit) & 1) << out;
            out += 1;
            mask &= mask - 1;
        }

        <Self as TryFrom<u128>>::try_from(result).unwrap()
    }

    /// Inverse of [`Bits::compress`]: scatters the low bits of the value to
    /// the positions selected by `mask`.
    fn deposit(&self, mask: Self) -> Self {
        let value: u128 = (*self).into();
        let mut mask: u128 = mask.into();
        let mut result = 0_u128;
        let mut input = 0;

        while mask != 0 {
            let bit = mask.trailing_zeros();
            result |= ((value >> input) & 1) << bit;
            input += 1;
            mask &= mask - 1;
        }

        <Self as TryFrom<u128>>::try_from(result).unwrap()
    }
}

impl Bits for u64 {}
impl Bits for u32 {}
impl Bits for u16 {}
impl Bits for u8 {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{RngCore, SeedableRng, rngs::StdRng};

    #[test]
    fn test_is_on() {
        let b = 0b110011101_u32;
        assert!(b.is_bit_on(0));
        assert!(!b.is_bit_on(1));
        assert!(b.is_bit_on(2));
        assert!(b.is_bit_on(8));
        assert!(!b.is_bit_on(31));
        assert!(b.is_bit_off(1));
    }

    #[test]
    #[should_panic]
    fn invalid_index() {
        let b = 0u32;
        b.is_bit_on(32);
    }

    #[test]
    fn get_bits() {
        let b = 0b1011001110_u32;
        assert_eq!(b.get_bits(0..=3), 0b1110);
        assert_eq!(b.get_bits(1..=1), 0b1);
        assert_eq!(b.get_bits(4..=7), 0b1100);
        assert_eq!(b.get_bits(0..=31), 0b10_1100_1110);
        assert_eq!(0xD61F_0100_u32.get_bits(5..=9), 8);
    }

    #[test]
    fn check_sign_extended() {
        assert_eq!(0b1001_u32.sign_extended(4), -7);
        assert_eq!(0b0111_u32.sign_extended(4), 7);
        assert_eq!(0x1FF_u32.sign_extended(9), -1);
        assert_eq!(0x100_u32.sign_extended(9), -256);
        assert_eq!(u64::MAX.sign_extended(64), -1);
    }

    #[test]
    fn compress_gathers_in_order() {
        let word = 0b1010_0000_0000_0000_0000_0000_0000_0001_u32;
        let mask = (1 << 31) | (1 << 29) | (1 << 0);
        assert_eq!(word.compress(mask), 0b111);

        let mask = (1 << 30) | (1 << 29) | (1 << 28);
        assert_eq!(word.compress(mask), 0b010);
    }

    #[test]
    fn deposit_undoes_compress() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            let word = rng.next_u32();
            let mask = rng.next_u32();
            assert_eq!(word.compress(mask).deposit(mask), word & mask);
        }
    }
}
