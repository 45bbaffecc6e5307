use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not, Shl, Shr};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// An unsigned machine word the arithmetic routines are generic over.
///
/// Implemented for `u32` and `u64` only. `Signed` is the same-width signed
/// type used by the extended Euclidean algorithm.
pub trait Word:
    sealed::Sealed
    + Copy
    + Eq
    + Ord
    + fmt::Debug
    + fmt::Display
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitOrAssign
    + Not<Output = Self>
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
{
    type Signed: Copy + Eq + Ord + fmt::Debug;

    const BITS: u32;
    const ZERO: Self;
    const ONE: Self;

    /// Full-width multiply, returning `(lo, hi)`.
    fn mul_wide(self, rhs: Self) -> (Self, Self);

    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn wrapping_mul(self, rhs: Self) -> Self;
    fn overflowing_add(self, rhs: Self) -> (Self, bool);

    fn div(self, rhs: Self) -> Self;
    fn rem(self, rhs: Self) -> Self;

    fn leading_zeros(self) -> u32;

    fn signed_zero() -> Self::Signed;
    fn signed_one() -> Self::Signed;
    fn to_signed(self) -> Self::Signed;
    fn from_signed(v: Self::Signed) -> Self;
    fn signed_sub_mul(a: Self::Signed, b: Self::Signed, q: Self::Signed) -> Self::Signed;
    fn signed_is_negative(v: Self::Signed) -> bool;
}

macro_rules! impl_word {
    ($uint:ty, $int:ty, $wide:ty) => {
        impl Word for $uint {
            type Signed = $int;

            const BITS: u32 = <$uint>::BITS;
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline(always)]
            fn mul_wide(self, rhs: Self) -> (Self, Self) {
                let wide = (self as $wide) * (rhs as $wide);
                (wide as Self, (wide >> Self::BITS) as Self)
            }

            #[inline(always)]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$uint>::wrapping_add(self, rhs)
            }

            #[inline(always)]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$uint>::wrapping_sub(self, rhs)
            }

            #[inline(always)]
            fn wrapping_mul(self, rhs: Self) -> Self {
                <$uint>::wrapping_mul(self, rhs)
            }

            #[inline(always)]
            fn overflowing_add(self, rhs: Self) -> (Self, bool) {
                <$uint>::overflowing_add(self, rhs)
            }

            #[inline(always)]
            fn div(self, rhs: Self) -> Self {
                self / rhs
            }

            #[inline(always)]
            fn rem(self, rhs: Self) -> Self {
                self % rhs
            }

            #[inline(always)]
            fn leading_zeros(self) -> u32 {
                <$uint>::leading_zeros(self)
            }

            #[inline(always)]
            fn signed_zero() -> Self::Signed {
                0
            }

            #[inline(always)]
            fn signed_one() -> Self::Signed {
                1
            }

            #[inline(always)]
            fn to_signed(self) -> Self::Signed {
                self as $int
            }

            #[inline(always)]
            fn from_signed(v: Self::Signed) -> Self {
                v as $uint
            }

            #[inline(always)]
            fn signed_sub_mul(a: Self::Signed, b: Self::Signed, q: Self::Signed) -> Self::Signed {
                a.wrapping_sub(b.wrapping_mul(q))
            }

            #[inline(always)]
            fn signed_is_negative(v: Self::Signed) -> bool {
                v < 0
            }
        }
    };
}

impl_word!(u32, i32, u64);
impl_word!(u64, i64, u128);
