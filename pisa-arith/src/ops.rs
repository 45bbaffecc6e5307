use crate::error::ArithError;
use crate::wide::divide_wide_inplace;
use crate::word::Word;

/// `(a + b) mod m`, assuming `a < m` and `b < m`.
#[inline]
pub fn add_mod<T: Word>(a: T, b: T, m: T) -> T {
    debug_assert!(a < m && b < m);
    let r = a.wrapping_add(b);
    if r >= m {
        r.wrapping_sub(m)
    } else {
        r
    }
}

/// `(a - b) mod m`, assuming `a < m` and `b < m`.
#[inline]
pub fn sub_mod<T: Word>(a: T, b: T, m: T) -> T {
    debug_assert!(a < m && b < m);
    let r = a.wrapping_add(m.wrapping_sub(b));
    if r >= m {
        r.wrapping_sub(m)
    } else {
        r
    }
}

/// `(-a) mod m`, assuming `a < m`. Branch-free: `neg_mod(0, m) == 0`.
#[inline]
pub fn neg_mod<T: Word>(a: T, m: T) -> T {
    debug_assert!(a < m);
    let non_zero = if a == T::ZERO { T::ZERO } else { T::ONE };
    m.wrapping_sub(a) & T::ZERO.wrapping_sub(non_zero)
}

/// Precomputed Barrett ratio `floor(2^(2w) / m)` for a fixed modulus.
///
/// The single-correction reduction below is exact for moduli below
/// `2^(w-1)`; RNS primes are at most 31 bits, so every modulus this crate
/// handles qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrettRatio<T> {
    lo: T,
    hi: T,
}

impl<T: Word> BarrettRatio<T> {
    pub fn new(modulus: T) -> Result<Self, ArithError> {
        if modulus == T::ZERO {
            return Err(ArithError::InvalidModulus);
        }
        // 2^(2w) as a three-limb value.
        let mut numerator = [T::ZERO, T::ZERO, T::ONE];
        let mut quotient = [T::ZERO; 3];
        divide_wide_inplace(&mut numerator, modulus, &mut quotient);
        Ok(Self {
            lo: quotient[0],
            hi: quotient[1],
        })
    }
}

/// `(a * b) mod m` by Barrett reduction with a caller-held ratio.
/// `m` must stay below `2^(w-1)`.
#[inline]
pub fn mul_mod_with<T: Word>(a: T, b: T, m: T, ratio: &BarrettRatio<T>) -> T {
    debug_assert!(m >> (T::BITS - 1) == T::ZERO);
    let (prod_lo, prod_hi) = a.mul_wide(b);

    let (_, carry_hi) = prod_lo.mul_wide(ratio.lo);

    let (t_lo, t_hi) = prod_lo.mul_wide(ratio.hi);
    let (tmp1, c) = t_lo.overflowing_add(carry_hi);
    let tmp3 = t_hi.wrapping_add(if c { T::ONE } else { T::ZERO });

    let (t_lo, t_hi) = prod_hi.mul_wide(ratio.lo);
    let (tmp1, c) = tmp1.overflowing_add(t_lo);
    let carry = t_hi.wrapping_add(if c { T::ONE } else { T::ZERO });

    let tmp1 = prod_hi
        .wrapping_mul(ratio.hi)
        .wrapping_add(tmp3)
        .wrapping_add(carry);
    let tmp3 = prod_lo.wrapping_sub(tmp1.wrapping_mul(m));

    if tmp3 >= m {
        tmp3.wrapping_sub(m)
    } else {
        tmp3
    }
}

/// `(a * b) mod m`. Fails with [`ArithError::InvalidModulus`] iff `m == 0`.
pub fn mul_mod<T: Word>(a: T, b: T, m: T) -> Result<T, ArithError> {
    let ratio = BarrettRatio::new(m)?;
    Ok(mul_mod_with(a, b, m, &ratio))
}

/// `base^exponent mod m` by square-and-multiply. `pow_mod(_, 0, _) == 1`.
pub fn pow_mod<T: Word>(base: T, mut exponent: T, m: T) -> Result<T, ArithError> {
    if exponent == T::ZERO {
        return Ok(T::ONE);
    }
    if exponent == T::ONE {
        return Ok(base);
    }

    let ratio = BarrettRatio::new(m)?;
    let mut power = base;
    let mut intermediate = T::ONE;
    loop {
        if (exponent & T::ONE) == T::ONE {
            intermediate = mul_mod_with(power, intermediate, m, &ratio);
        }
        exponent = exponent >> 1u32;
        if exponent == T::ZERO {
            break;
        }
        power = mul_mod_with(power, power, m, &ratio);
    }
    Ok(intermediate)
}

/// Extended Euclidean algorithm: returns `(gcd, s, t)` with `s*x + t*y == gcd`.
pub fn xgcd<T: Word>(mut x: T, mut y: T) -> (T, T::Signed, T::Signed) {
    let mut prev_a = T::signed_one();
    let mut a = T::signed_zero();
    let mut prev_b = T::signed_zero();
    let mut b = T::signed_one();

    while y != T::ZERO {
        let q = x.div(y).to_signed();
        let r = x.rem(y);
        x = y;
        y = r;

        let tmp = a;
        a = T::signed_sub_mul(prev_a, a, q);
        prev_a = tmp;

        let tmp = b;
        b = T::signed_sub_mul(prev_b, b, q);
        prev_b = tmp;
    }
    (x, prev_a, prev_b)
}

/// Modular inverse of `v` under `m`, or `None` if `v == 0` or `gcd(v, m) != 1`.
pub fn try_inv_mod<T: Word>(v: T, m: T) -> Option<T> {
    if v == T::ZERO {
        return None;
    }
    let (gcd, s, _) = xgcd(v, m);
    if gcd != T::ONE {
        return None;
    }
    if T::signed_is_negative(s) {
        Some(T::from_signed(s).wrapping_add(m))
    } else {
        Some(T::from_signed(s))
    }
}

/// Modular inverse of `v` under `m`, failing with [`ArithError::GcdNotOne`].
pub fn inv_mod<T: Word>(v: T, m: T) -> Result<T, ArithError> {
    try_inv_mod(v, m).ok_or(ArithError::GcdNotOne)
}

/// Reverses the low `bit_count` bits of `operand`. `bit_count == 0` yields 0.
#[inline]
pub fn reverse_bits(operand: u32, bit_count: u32) -> u32 {
    debug_assert!(bit_count <= 32);
    if bit_count == 0 {
        return 0;
    }
    operand.reverse_bits() >> (32 - bit_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_mod_wraps_at_modulus() {
        assert_eq!(add_mod(652_921_500u32, 652_921_501, 1_305_843_001), 0);
        assert_eq!(add_mod(1u32, 1, 3), 2);
        assert_eq!(add_mod(2u64, 2, 3), 1);
    }

    #[test]
    fn sub_and_neg() {
        assert_eq!(sub_mod(1u32, 2, 7), 6);
        assert_eq!(neg_mod(0u32, 7), 0);
        assert_eq!(neg_mod(3u32, 7), 4);
        assert_eq!(neg_mod(0u64, 97), 0);
    }

    #[test]
    fn mul_mod_reference_vector() {
        assert_eq!(
            mul_mod(652_921_501u32, 652_921_500, 1_305_843_001).unwrap(),
            326_460_750
        );
        assert_eq!(
            mul_mod(652_921_501u64, 652_921_500, 1_305_843_001).unwrap(),
            326_460_750
        );
    }

    #[test]
    fn mul_mod_zero_modulus_is_an_error() {
        assert_eq!(mul_mod(1u32, 1, 0), Err(ArithError::InvalidModulus));
        assert_eq!(mul_mod(1u64, 1, 0), Err(ArithError::InvalidModulus));
    }

    #[test]
    fn pow_mod_power_of_two_modulus() {
        assert_eq!(pow_mod(2u32, 59, 0x1000_0000).unwrap(), 0);
        assert_eq!(pow_mod(2u32, 30, 0x1000_0000).unwrap(), 0);
        assert_eq!(pow_mod(2u32, 10, 0x1000_0000).unwrap(), 1024);
        assert_eq!(pow_mod(7u32, 0, 13).unwrap(), 1);
        assert_eq!(pow_mod(7u32, 1, 13).unwrap(), 7);
    }

    #[test]
    fn xgcd_reference_vector() {
        assert_eq!(xgcd(13u32, 19), (1, 3, -2));
        assert_eq!(xgcd(13u64, 19), (1, 3, -2));
    }

    #[test]
    fn inverse_reference_vector() {
        assert_eq!(
            try_inv_mod(331_975_426u32, 1_351_315_121),
            Some(1_052_541_512)
        );
        assert_eq!(try_inv_mod(0u32, 17), None);
        assert_eq!(try_inv_mod(6u32, 9), None);
        assert_eq!(inv_mod(6u32, 9), Err(ArithError::GcdNotOne));
    }

    #[test]
    fn inverse_law() {
        let m = 1_351_315_121u32;
        for v in [2u32, 3, 331_975_426, 1_000_000_007] {
            let inv = try_inv_mod(v, m).unwrap();
            assert_eq!(mul_mod(v, inv, m).unwrap(), 1);
        }
    }

    #[test]
    fn reverse_bits_reference_vectors() {
        assert_eq!(reverse_bits(1, 32), 0x8000_0000);
        assert_eq!(reverse_bits(1, 16), 0x0000_8000);
        assert_eq!(reverse_bits(0xFFFF_FFFF, 16), 0x0000_FFFF);
        assert_eq!(reverse_bits(0xDEAD_BEEF, 0), 0);
    }

    #[test]
    fn reverse_bits_involution() {
        for b in [1u32, 4, 13, 16, 32] {
            for x in [0u32, 1, 2, 0x1234_5678, u32::MAX] {
                let mask = if b == 32 { u32::MAX } else { (1 << b) - 1 };
                assert_eq!(reverse_bits(reverse_bits(x, b), b), x & mask);
            }
        }
    }
}
