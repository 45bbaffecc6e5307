use crate::word::Word;

/// Number of significant bits in a single word, 0 for 0.
#[inline]
pub fn significant_bit_count<T: Word>(value: T) -> u32 {
    if value == T::ZERO {
        0
    } else {
        T::BITS - value.leading_zeros()
    }
}

/// Number of significant bits of a little-endian multi-limb value.
#[inline]
pub fn significant_bit_count_wide<T: Word>(limbs: &[T]) -> u32 {
    debug_assert!(!limbs.is_empty());
    let mut idx = limbs.len() - 1;
    while limbs[idx] == T::ZERO && idx > 0 {
        idx -= 1;
    }
    idx as u32 * T::BITS + significant_bit_count(limbs[idx])
}

#[inline(always)]
fn add_carry<T: Word>(a: T, b: T, carry: bool) -> (T, bool) {
    let s = a.wrapping_add(b);
    let r = s.wrapping_add(if carry { T::ONE } else { T::ZERO });
    (r, (s < b) || (carry && s == !T::ZERO))
}

#[inline(always)]
fn sub_borrow<T: Word>(a: T, b: T, borrow: bool) -> (T, bool) {
    let d = a.wrapping_sub(b);
    let r = d.wrapping_sub(if borrow { T::ONE } else { T::ZERO });
    (r, (d > a) || (borrow && d == T::ZERO))
}

/// Limb-wise addition of the low `count` limbs, returning the carry out.
pub fn add_wide<T: Word>(a: &[T], b: &[T], count: usize, out: &mut [T]) -> bool {
    let mut carry = false;
    for i in 0..count {
        let (r, c) = add_carry(a[i], b[i], carry);
        out[i] = r;
        carry = c;
    }
    carry
}

/// Limb-wise subtraction of the low `count` limbs, returning the borrow out.
pub fn sub_wide<T: Word>(a: &[T], b: &[T], count: usize, out: &mut [T]) -> bool {
    let mut borrow = false;
    for i in 0..count {
        let (r, c) = sub_borrow(a[i], b[i], borrow);
        out[i] = r;
        borrow = c;
    }
    borrow
}

/// Left shift of a three-limb value by up to `3 * BITS - 1` bits.
pub fn shift_left_wide<T: Word>(operand: &[T; 3], shift: u32) -> [T; 3] {
    let bits = T::BITS;
    let mut r = if shift & (bits * 2) != 0 {
        [T::ZERO, T::ZERO, operand[0]]
    } else if shift & bits != 0 {
        [T::ZERO, operand[0], operand[1]]
    } else {
        *operand
    };

    let bit_shift = shift & (bits - 1);
    if bit_shift != 0 {
        let neg = bits - bit_shift;
        r[2] = (r[2] << bit_shift) | (r[1] >> neg);
        r[1] = (r[1] << bit_shift) | (r[0] >> neg);
        r[0] = r[0] << bit_shift;
    }
    r
}

/// Right shift of a three-limb value by up to `3 * BITS - 1` bits.
pub fn shift_right_wide<T: Word>(operand: &[T; 3], shift: u32) -> [T; 3] {
    let bits = T::BITS;
    let mut r = if shift & (bits * 2) != 0 {
        [operand[2], T::ZERO, T::ZERO]
    } else if shift & bits != 0 {
        [operand[1], operand[2], T::ZERO]
    } else {
        *operand
    };

    let bit_shift = shift & (bits - 1);
    if bit_shift != 0 {
        let neg = bits - bit_shift;
        r[0] = (r[0] >> bit_shift) | (r[1] << neg);
        r[1] = (r[1] >> bit_shift) | (r[2] << neg);
        r[2] = r[2] >> bit_shift;
    }
    r
}

/// Three-limb by one-limb long division.
///
/// On return `quotient` holds the quotient and `numerator` the remainder.
/// The schoolbook shift-and-subtract sequence is kept exactly as is; the
/// Barrett precomputation depends on its bit-level behavior.
pub fn divide_wide_inplace<T: Word>(numerator: &mut [T; 3], denominator: T, quotient: &mut [T; 3]) {
    debug_assert!(denominator != T::ZERO);

    *quotient = [T::ZERO; 3];

    let mut numerator_bits = significant_bit_count_wide(&numerator[..]);
    let denominator_bits = significant_bit_count(denominator);
    if numerator_bits < denominator_bits {
        return;
    }

    let uint_count = numerator_bits.div_ceil(T::BITS) as usize;
    if uint_count == 1 {
        quotient[0] = numerator[0].div(denominator);
        numerator[0] = numerator[0].wrapping_sub(quotient[0].wrapping_mul(denominator));
        return;
    }

    let mut shifted_denominator = [T::ZERO; 3];
    shifted_denominator[0] = denominator;
    let mut difference = [T::ZERO; 3];

    let denominator_shift = numerator_bits - denominator_bits;
    shifted_denominator = shift_left_wide(&shifted_denominator, denominator_shift);
    let denominator_bits = denominator_bits + denominator_shift;
    let mut remaining_shifts = denominator_shift;

    while numerator_bits == denominator_bits {
        if sub_wide(
            &numerator[..],
            &shifted_denominator[..],
            uint_count,
            &mut difference,
        ) {
            // Numerator was smaller: undo, and shift a zero into the quotient.
            if remaining_shifts == 0 {
                break;
            }
            let undone = difference;
            add_wide(&undone[..], &numerator[..], uint_count, &mut difference);
            *quotient = shift_left_wide(quotient, 1);
            remaining_shifts -= 1;
        }
        quotient[0] |= T::ONE;

        numerator_bits = significant_bit_count_wide(&difference[..uint_count]);
        let numerator_shift = (denominator_bits - numerator_bits).min(remaining_shifts);
        if numerator_bits > 0 {
            *numerator = shift_left_wide(&difference, numerator_shift);
            numerator_bits += numerator_shift;
        } else {
            *numerator = [T::ZERO; 3];
        }
        *quotient = shift_left_wide(quotient, numerator_shift);
        remaining_shifts -= numerator_shift;
    }

    if numerator_bits > 0 {
        *numerator = shift_right_wide(numerator, denominator_shift);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_counts() {
        assert_eq!(significant_bit_count(0u32), 0);
        assert_eq!(significant_bit_count(1u32), 1);
        assert_eq!(significant_bit_count(u32::MAX), 32);
        assert_eq!(significant_bit_count(1u64 << 63), 64);
        assert_eq!(significant_bit_count_wide(&[0u32, 0, 1]), 65);
        assert_eq!(significant_bit_count_wide(&[7u32, 0, 0]), 3);
    }

    #[test]
    fn shifts_move_across_limbs() {
        let v = [1u32, 0, 0];
        assert_eq!(shift_left_wide(&v, 32), [0, 1, 0]);
        assert_eq!(shift_left_wide(&v, 64), [0, 0, 1]);
        assert_eq!(shift_left_wide(&v, 33), [0, 2, 0]);
        let w = [0u32, 0, 1];
        assert_eq!(shift_right_wide(&w, 64), [1, 0, 0]);
        assert_eq!(shift_right_wide(&w, 63), [2, 0, 0]);
    }

    #[test]
    fn divide_two_to_the_64_by_small_modulus() {
        // floor(2^64 / 3) = 0x5555_5555_5555_5555, remainder 1.
        let mut numerator = [0u32, 0, 1];
        let mut quotient = [0u32; 3];
        divide_wide_inplace(&mut numerator, 3, &mut quotient);
        assert_eq!(quotient, [0x5555_5555, 0x5555_5555, 0]);
        assert_eq!(numerator, [1, 0, 0]);
    }

    #[test]
    fn divide_single_limb_path() {
        let mut numerator = [100u32, 0, 0];
        let mut quotient = [0u32; 3];
        divide_wide_inplace(&mut numerator, 7, &mut quotient);
        assert_eq!(quotient, [14, 0, 0]);
        assert_eq!(numerator, [2, 0, 0]);
    }

    #[test]
    fn divide_numerator_smaller_than_denominator() {
        let mut numerator = [5u32, 0, 0];
        let mut quotient = [1u32; 3];
        divide_wide_inplace(&mut numerator, 9, &mut quotient);
        assert_eq!(quotient, [0, 0, 0]);
        assert_eq!(numerator, [5, 0, 0]);
    }
}
