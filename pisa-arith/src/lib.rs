//! Unsigned modular arithmetic for P-ISA metadata generation.
//!
//! Everything in this crate operates on plain `u32`/`u64` words through the
//! [`Word`] trait. The routines are deliberately branch-light and reproduce
//! the exact reduction sequences expected by the hardware tables downstream:
//! Barrett reduction with a precomputed `floor(2^(2w) / m)` ratio for general
//! modular multiplication, and a 32-bit Montgomery domain with `R = 2^32` for
//! the precomputed polynomial material.
//!
//! The multiprecision helpers work on three-limb values. They
//! exist solely to drive the Barrett precomputation and are deliberately
//! plain schoolbook long division.

mod error;
mod montgomery;
mod ops;
mod wide;
mod word;

pub use error::ArithError;
pub use montgomery::{from_montgomery, mont_mul, to_montgomery, MONT_R, MONT_R_BITS};
pub use ops::{
    add_mod, inv_mod, mul_mod, mul_mod_with, neg_mod, pow_mod, reverse_bits, sub_mod, try_inv_mod,
    xgcd, BarrettRatio,
};
pub use wide::{
    add_wide, divide_wide_inplace, shift_left_wide, shift_right_wide, significant_bit_count,
    significant_bit_count_wide, sub_wide,
};
pub use word::Word;
