use crate::error::ArithError;
use crate::ops::{mul_mod, try_inv_mod};
use crate::word::Word;

pub const MONT_R_BITS: u32 = 32;
/// The Montgomery radix `R = 2^32`, held as a `u64` since it does not fit a word.
pub const MONT_R: u64 = 1 << MONT_R_BITS;

/// `(x * R) mod m` with `R = 2^32`. The modulus must be non-zero.
#[inline]
pub fn to_montgomery(x: u32, m: u32) -> u32 {
    debug_assert!(m != 0);
    (((x as u64) << MONT_R_BITS) % m as u64) as u32
}

/// `(x * R^-1) mod m`, leaving the Montgomery domain.
pub fn from_montgomery(x: u32, m: u32) -> Result<u32, ArithError> {
    let inv_r = try_inv_mod(MONT_R, m as u64).ok_or(ArithError::GcdNotOne)?;
    mul_mod(x, inv_r as u32, m)
}

/// Montgomery product of two values already in the Montgomery domain.
///
/// The reduction uses `k = m - 2` as the modular multiplier, which matches
/// the hardware tables this crate feeds: the moduli involved satisfy
/// `-m^-1 = m - 2 (mod 2^32)`. The 65th bit of `u + z` is discarded.
#[inline]
pub fn mont_mul(a: u32, b: u32, m: u32) -> u32 {
    let u = a as u64 * b as u64;

    let k = m.wrapping_sub(2);
    let m_lo = (u as u32).wrapping_mul(k);
    let z = m_lo as u64 * m as u64;

    let r = (u.wrapping_add(z) >> 32) as u32;
    if r < m {
        r
    } else {
        r - m
    }
}
