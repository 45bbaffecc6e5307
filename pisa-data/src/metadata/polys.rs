use std::collections::BTreeMap;

use itertools::izip;
use pisa_arith::{inv_mod, pow_mod, to_montgomery, ArithError};
use rayon::prelude::*;

use crate::context::{FheContext, Scheme, SchemeInfo};
use crate::error::DataError;
use crate::layouts::{Ciphertext, Polynomial, RnsPolynomial, TestVector};
use crate::metadata::flatten::{
    bit_reverse_vec, flatten_ciphertext, flatten_key_switch, from_montgomery_rns, index_key,
    split_symbol_name,
};
use crate::metadata::PolySymbols;

/// Montgomery-form powers `base^(scale * j) mod q` for `j in [0, count)`.
/// The exponent product wraps at 2^32; the base has power-of-two order, so
/// wrapping cannot change the value.
fn montgomery_power_table(
    base: u32,
    scale: u32,
    q: u32,
    count: usize,
) -> Result<Vec<u32>, ArithError> {
    (0..count as u32)
        .into_par_iter()
        .map(|j| Ok(to_montgomery(pow_mod(base, scale.wrapping_mul(j), q)?, q)))
        .collect()
}

/// Per-prime tables of powers of the 2N-th roots of unity, in bit-reversed
/// Montgomery form, plus the flattened key-switching material.
pub fn extract_polys(context: &FheContext) -> Result<PolySymbols, DataError> {
    let mut symbols = PolySymbols::default();
    let n = context.n as usize;

    let psi_inv: Vec<u32> = izip!(&context.psi, &context.q_i)
        .map(|(&psi, &q)| inv_mod(psi, q))
        .collect::<Result<_, _>>()?;

    let galois_elts = context.galois_elements();

    for i in 0..context.key_rns_num() {
        let q = context.q(i);

        let vpsi = montgomery_power_table(context.psi[i], 1, q, n)?;
        let vipsi = montgomery_power_table(psi_inv[i], 1, q, n)?;
        symbols.insert(
            format!("psi_default_{i}"),
            RnsPolynomial::new(bit_reverse_vec(&vpsi)?, q),
        );
        symbols.insert(
            format!("ipsi_default_{i}"),
            RnsPolynomial::new(bit_reverse_vec(&vipsi)?, q),
        );

        // Rescale divides by the top prime's half, mod-raise by the bottom
        // two; the constant vectors cover both index patterns.
        if context.scheme == Scheme::Ckks && (i as u32) < context.q_size {
            let ql_half = q >> 1;
            symbols.insert(
                format!("qlHalf_{}", index_key(&[i as u32])),
                RnsPolynomial::constant(ql_half, n, q),
            );

            let j_max = if i <= 1 { context.q_size as usize } else { i };
            for j in 0..j_max {
                let qj = context.q(j);
                symbols.insert(
                    format!("qlHalfModq_{}", index_key(&[i as u32, j as u32])),
                    RnsPolynomial::constant(ql_half % qj, n, qj),
                );
            }
        }

        for &galois_elt in &galois_elts {
            let exp_scale = inv_mod(galois_elt, 2 * context.n)?;
            let table = montgomery_power_table(psi_inv[i], exp_scale, q, n)?;
            symbols.insert(
                format!("ipsi_{galois_elt}_{i}"),
                RnsPolynomial::new(bit_reverse_vec(&table)?, q),
            );
        }
    }

    match &context.info {
        SchemeInfo::Bgv(info) => {
            for (pt, plaintext) in info.plaintext_specific.iter().enumerate() {
                flatten_key_switch(&mut symbols, &format!("rlk_{pt}"), &plaintext.keys.relin_key)?;
                for (galois_elt, key) in &plaintext.keys.rotation_keys {
                    flatten_key_switch(&mut symbols, &format!("gk_{pt}_{galois_elt}"), key)?;
                }
            }
            if let Some(recrypt_key) = &info.recrypt_key {
                flatten_ciphertext(&mut symbols, "bk", recrypt_key)?;
            }
        }
        SchemeInfo::Ckks(info) => {
            flatten_key_switch(&mut symbols, "rlk", &info.keys.relin_key)?;
            for (galois_elt, key) in &info.keys.rotation_keys {
                flatten_key_switch(&mut symbols, &format!("gk_{galois_elt}"), key)?;
            }
            symbols.insert("zero", RnsPolynomial::new(vec![0; n], 0));
        }
        SchemeInfo::Bfv => {}
    }

    Ok(symbols)
}

/// Flattens every test-vector symbol as `sym_p_r` polynomial tables.
pub fn extract_testvector_polys(testvector: &TestVector) -> Result<PolySymbols, DataError> {
    let mut symbols = PolySymbols::default();
    for (sym, data) in &testvector.sym_data_map {
        flatten_ciphertext(&mut symbols, sym, data)?;
    }
    Ok(symbols)
}

/// Regroups flattened `sym_p_r` tables back into per-symbol ciphertexts,
/// leaving the Montgomery bit-reversed domain.
pub fn convert_polys_to_testvector(symbols: &PolySymbols) -> Result<TestVector, DataError> {
    let mut shapes: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for sym in symbols.sym_poly_map.keys() {
        let (root, order, rns) = split_symbol_name(sym)?;
        let entry = shapes.entry(root).or_insert((0, 0));
        entry.0 = entry.0.max(order + 1);
        entry.1 = entry.1.max(rns + 1);
    }

    let mut testvector = TestVector::default();
    for (root, (order_count, rns_count)) in shapes {
        let mut data = Ciphertext::default();
        for p in 0..order_count {
            let mut poly = Polynomial::default();
            for r in 0..rns_count {
                let name = format!("{root}_{p}_{r}");
                let rns = symbols
                    .get(&name)
                    .ok_or_else(|| DataError::MissingSymbol(name.clone()))?;
                poly.rns_polys.push(from_montgomery_rns(rns)?);
            }
            data.polys.push(poly);
        }
        testvector.sym_data_map.insert(root.to_owned(), data);
    }
    Ok(testvector)
}
