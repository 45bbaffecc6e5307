use pisa_arith::{inv_mod, mul_mod, reverse_bits, to_montgomery, MONT_R};
use rayon::prelude::*;

use crate::error::DataError;
use crate::layouts::{Ciphertext, KeySwitch, Polynomial, RnsPolynomial};
use crate::metadata::PolySymbols;

/// Converts every coefficient to Montgomery form.
pub fn to_montgomery_vec(coeffs: &[u32], modulus: u32) -> Vec<u32> {
    coeffs
        .par_iter()
        .map(|&c| to_montgomery(c, modulus))
        .collect()
}

/// Shuffles a power-of-two-sized coefficient vector by bit-reversed index.
pub fn bit_reverse_vec(src: &[u32]) -> Result<Vec<u32>, DataError> {
    let degree = src.len();
    if !degree.is_power_of_two() {
        return Err(DataError::NonPowerOfTwoDegree(degree));
    }
    let log_degree = degree.trailing_zeros();
    Ok((0..degree as u32)
        .into_par_iter()
        .map(|i| src[reverse_bits(i, log_degree) as usize])
        .collect())
}

/// Montgomery-converts, bit-reverses and registers one residue polynomial
/// per RNS term of `poly`, under `prefix_r` names.
pub(crate) fn flatten_polynomial(
    symbols: &mut PolySymbols,
    prefix: &str,
    poly: &Polynomial,
) -> Result<(), DataError> {
    for (r, rns) in poly.rns_polys.iter().enumerate() {
        let converted = to_montgomery_vec(&rns.coeffs, rns.modulus);
        let reversed = bit_reverse_vec(&converted)?;
        symbols.insert(
            format!("{prefix}_{r}"),
            RnsPolynomial::new(reversed, rns.modulus),
        );
    }
    Ok(())
}

/// Flattens a ciphertext as `prefix_p_r`.
pub fn flatten_ciphertext(
    symbols: &mut PolySymbols,
    prefix: &str,
    data: &Ciphertext,
) -> Result<(), DataError> {
    for (p, poly) in data.polys.iter().enumerate() {
        flatten_polynomial(symbols, &format!("{prefix}_{p}"), poly)?;
    }
    Ok(())
}

/// Flattens a key-switching key as `prefix_p_d_r`.
pub fn flatten_key_switch(
    symbols: &mut PolySymbols,
    prefix: &str,
    data: &KeySwitch,
) -> Result<(), DataError> {
    for (d, digit) in data.digits.iter().enumerate() {
        for (p, poly) in digit.polys.iter().enumerate() {
            flatten_polynomial(symbols, &format!("{prefix}_{p}_{d}"), poly)?;
        }
    }
    Ok(())
}

/// Undoes the Montgomery bit-reversed flattening for one residue:
/// bit-reverse back and leave the Montgomery domain.
pub fn from_montgomery_rns(rns: &RnsPolynomial) -> Result<RnsPolynomial, DataError> {
    let modulus = rns.modulus;
    let inv_r = inv_mod(MONT_R, modulus as u64)?;
    let converted: Result<Vec<u32>, _> = rns
        .coeffs
        .par_iter()
        .map(|&c| mul_mod(c, inv_r as u32, modulus))
        .collect();
    Ok(RnsPolynomial::new(bit_reverse_vec(&converted?)?, modulus))
}

/// Splits `root_order_rns` from the right, so roots may contain underscores.
pub fn split_symbol_name(sym: &str) -> Result<(&str, u32, u32), DataError> {
    let mut it = sym.rsplitn(3, '_');
    let rns = it.next();
    let order = it.next();
    let root = it.next();
    match (root, order, rns) {
        (Some(root), Some(order), Some(rns)) if !root.is_empty() => {
            let order = order
                .parse()
                .map_err(|_| DataError::MalformedSymbol(sym.to_owned()))?;
            let rns = rns
                .parse()
                .map_err(|_| DataError::MalformedSymbol(sym.to_owned()))?;
            Ok((root, order, rns))
        }
        _ => Err(DataError::MalformedSymbol(sym.to_owned())),
    }
}

/// Joins indices with underscores: `index_key(&[1, 2, 3]) == "1_2_3"`.
pub fn index_key(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reverse_rejects_non_power_of_two() {
        assert!(bit_reverse_vec(&[1, 2, 3]).is_err());
        assert_eq!(bit_reverse_vec(&[1, 2, 3, 4]).unwrap(), vec![1, 3, 2, 4]);
    }

    #[test]
    fn flatten_then_restore_is_identity() {
        let rns = RnsPolynomial::new((0..16).collect(), 97);
        let converted = to_montgomery_vec(&rns.coeffs, rns.modulus);
        let flattened = RnsPolynomial::new(bit_reverse_vec(&converted).unwrap(), 97);
        let restored = from_montgomery_rns(&flattened).unwrap();
        assert_eq!(restored, rns);
    }

    #[test]
    fn symbol_names_split_from_the_right() {
        assert_eq!(split_symbol_name("out_0_1").unwrap(), ("out", 0, 1));
        assert_eq!(split_symbol_name("a_b_2_3").unwrap(), ("a_b", 2, 3));
        assert!(split_symbol_name("short").is_err());
        assert!(split_symbol_name("a_x_y").is_err());
    }

    #[test]
    fn index_keys() {
        assert_eq!(index_key(&[4]), "4");
        assert_eq!(index_key(&[1, 2, 3]), "1_2_3");
    }
}
