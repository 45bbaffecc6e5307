use pisa_arith::{inv_mod, pow_mod, to_montgomery};
use rayon::prelude::*;

use crate::context::FheContext;
use crate::error::DataError;
use crate::layouts::{Polynomial, RnsPolynomial};
use crate::metadata::MetadataTwiddles;

fn twiddle_table(omega: u32, scale: u32, q: u32, count: usize) -> Result<Vec<u32>, DataError> {
    let table: Result<Vec<u32>, _> = (0..count as u32)
        .into_par_iter()
        .map(|j| pow_mod(omega, scale.wrapping_mul(j), q).map(|v| to_montgomery(v, q)))
        .collect();
    Ok(table?)
}

/// Length-N/2 twiddle tables per RNS prime: powers of `omega = psi^2` in
/// Montgomery form, natural order. Inverse tables additionally exist per
/// Galois element, with the exponent scaled by the element's inverse
/// modulo 2N.
pub fn extract_twiddles(context: &FheContext) -> Result<MetadataTwiddles, DataError> {
    let mut twiddles = MetadataTwiddles {
        only_power_of_two: false,
        ..Default::default()
    };
    let half_n = context.n as usize / 2;

    let mut omega = Vec::with_capacity(context.key_rns_num());
    let mut omega_inv = Vec::with_capacity(context.key_rns_num());
    for i in 0..context.key_rns_num() {
        let q = context.q(i);
        let w = pow_mod(context.psi[i], 2u32, q)?;
        omega.push(w);
        omega_inv.push(inv_mod(w, q)?);
    }

    let default_ntt = twiddles.ntt.entry("default".to_owned()).or_default();
    for i in 0..context.key_rns_num() {
        let q = context.q(i);
        default_ntt
            .rns_polys
            .push(RnsPolynomial::new(twiddle_table(omega[i], 1, q, half_n)?, q));
    }

    let default_intt = twiddles.intt.entry("default".to_owned()).or_default();
    for i in 0..context.key_rns_num() {
        let q = context.q(i);
        default_intt.rns_polys.push(RnsPolynomial::new(
            twiddle_table(omega_inv[i], 1, q, half_n)?,
            q,
        ));
    }

    for galois_elt in context.galois_elements() {
        let exp_scale = inv_mod(galois_elt, 2 * context.n)?;
        let mut entry = Polynomial::default();
        for i in 0..context.key_rns_num() {
            let q = context.q(i);
            entry.rns_polys.push(RnsPolynomial::new(
                twiddle_table(omega_inv[i], exp_scale, q, half_n)?,
                q,
            ));
        }
        twiddles.intt.insert(galois_elt.to_string(), entry);
    }

    Ok(twiddles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_contexts::bgv_context_n16;

    #[test]
    fn default_twiddles_match_reference_values() {
        let twiddles = extract_twiddles(&bgv_context_n16()).unwrap();
        assert!(!twiddles.only_power_of_two);

        let ntt = &twiddles.ntt["default"];
        assert_eq!(ntt.rns_polys.len(), 2);
        assert_eq!(ntt.rns_polys[0].modulus, 97);
        assert_eq!(ntt.rns_polys[0].coeffs, vec![35, 25, 4, 86, 6, 32, 9, 48]);
        assert_eq!(
            ntt.rns_polys[1].coeffs,
            vec![108, 157, 12, 189, 130, 21, 186, 131]
        );

        let intt = &twiddles.intt["default"];
        assert_eq!(intt.rns_polys[0].coeffs, vec![35, 49, 88, 65, 91, 11, 93, 72]);
        assert_eq!(
            intt.rns_polys[1].coeffs,
            vec![108, 62, 7, 172, 63, 4, 181, 36]
        );
    }

    #[test]
    fn galois_elements_add_inverse_tables_only() {
        use crate::context::SchemeInfo;
        use crate::layouts::KeySwitch;

        let mut ctx = bgv_context_n16();
        if let SchemeInfo::Bgv(info) = &mut ctx.info {
            info.plaintext_specific[0]
                .keys
                .rotation_keys
                .insert(3, KeySwitch::default());
        }

        let twiddles = extract_twiddles(&ctx).unwrap();
        assert!(twiddles.intt.contains_key("3"));
        assert!(!twiddles.ntt.contains_key("3"));
        assert_eq!(twiddles.intt["3"].rns_polys[0].coeffs.len(), 8);
    }
}
