use num_bigint::BigUint;
use pisa_arith::{
    divide_wide_inplace, from_montgomery, mont_mul, mul_mod, pow_mod, to_montgomery, try_inv_mod,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// NTT-friendly 31-bit primes with high two-adic valuation of p - 1.
const PRIMES: [u32; 4] = [1_070_727_169, 1_071_513_601, 1_072_496_641, 998_244_353];

// Barrett with a single correction is exact for moduli below 2^(w-1).

#[test]
fn mul_mod_agrees_with_wide_reference() {
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9);
    for _ in 0..2_000 {
        let m = rng.gen_range(1u32..1 << 31);
        let a = rng.gen_range(0..m);
        let b = rng.gen_range(0..m);
        let expected = (a as u64 * b as u64 % m as u64) as u32;
        assert_eq!(mul_mod(a, b, m).unwrap(), expected);
    }
}

#[test]
fn mul_mod_u64_agrees_with_wide_reference() {
    let mut rng = StdRng::seed_from_u64(0x517C_C1B7);
    for _ in 0..2_000 {
        let m = rng.gen_range(1u64..1 << 63);
        let a = rng.gen_range(0..m);
        let b = rng.gen_range(0..m);
        let expected = (a as u128 * b as u128 % m as u128) as u64;
        assert_eq!(mul_mod(a, b, m).unwrap(), expected);
    }
}

#[test]
fn divide_wide_agrees_with_biguint() {
    let mut rng = StdRng::seed_from_u64(0xB504_F333);
    for _ in 0..500 {
        let limbs: [u32; 3] = [rng.gen(), rng.gen(), rng.gen()];
        let d = rng.gen_range(1u32..=u32::MAX);

        let value = BigUint::from(limbs[0])
            + (BigUint::from(limbs[1]) << 32u32)
            + (BigUint::from(limbs[2]) << 64u32);
        let expected_q = &value / d;
        let expected_r = &value % d;

        let mut numerator = limbs;
        let mut quotient = [0u32; 3];
        divide_wide_inplace(&mut numerator, d, &mut quotient);

        let got_q = BigUint::from(quotient[0])
            + (BigUint::from(quotient[1]) << 32u32)
            + (BigUint::from(quotient[2]) << 64u32);
        let got_r = BigUint::from(numerator[0])
            + (BigUint::from(numerator[1]) << 32u32)
            + (BigUint::from(numerator[2]) << 64u32);
        assert_eq!(got_q, expected_q);
        assert_eq!(got_r, expected_r);
    }
}

#[test]
fn montgomery_round_trip_random() {
    let mut rng = StdRng::seed_from_u64(0x6A09_E667);
    for &m in &PRIMES {
        for _ in 0..200 {
            let x = rng.gen_range(0..m);
            assert_eq!(from_montgomery(to_montgomery(x, m), m).unwrap(), x);
        }
    }
}

#[test]
fn mont_mul_matches_plain_multiplication() {
    let mut rng = StdRng::seed_from_u64(0x3C6E_F372);
    for &m in &PRIMES {
        for _ in 0..200 {
            let a = rng.gen_range(0..m);
            let b = rng.gen_range(0..m);
            let got = mont_mul(to_montgomery(a, m), to_montgomery(b, m), m);
            let expected = (a as u64 * b as u64 % m as u64) as u32;
            assert_eq!(from_montgomery(got, m).unwrap(), expected);
        }
    }
}

#[test]
fn inverse_law_random() {
    let mut rng = StdRng::seed_from_u64(0xBB67_AE85);
    for &m in &PRIMES {
        for _ in 0..200 {
            let v = rng.gen_range(1..m);
            let inv = try_inv_mod(v, m).expect("prime modulus");
            assert_eq!(mul_mod(v, inv, m).unwrap(), 1);
        }
    }
}

#[test]
fn pow_mod_agrees_with_repeated_multiplication() {
    let m = 998_244_353u32;
    let mut acc = 1u64;
    for e in 0..40u32 {
        assert_eq!(pow_mod(3u32, e, m).unwrap() as u64, acc);
        acc = acc * 3 % m as u64;
    }
}
