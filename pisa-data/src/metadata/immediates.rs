use pisa_arith::{inv_mod, mul_mod, pow_mod, to_montgomery, MONT_R};

use crate::context::{FheContext, Scheme, SchemeInfo};
use crate::error::DataError;
use crate::metadata::flatten::index_key;
use crate::metadata::MetadataImmediates;

fn lookup(context_extra: &std::collections::BTreeMap<String, u32>, key: &str) -> Result<u32, DataError> {
    context_extra
        .get(key)
        .copied()
        .ok_or_else(|| DataError::MissingContextField(key.to_owned()))
}

/// The scalar immediates an emitted program references by name.
///
/// Values are Montgomery-encoded except `one`, the global `iN`, and the
/// per-prime `R2_i` tables, which stay plain.
pub fn extract_immediates(context: &FheContext) -> Result<MetadataImmediates, DataError> {
    let mut immediates = MetadataImmediates::default();
    immediates.insert("one", 1);

    match &context.info {
        SchemeInfo::Bgv(info) => {
            for i in 0..context.key_rns_num() {
                let q = context.q(i);
                immediates.insert(
                    format!("R2_{i}"),
                    pow_mod(MONT_R, 2u64, q as u64)? as u32,
                );
                immediates.insert(
                    format!("iN_{i}"),
                    to_montgomery(inv_mod(context.n, q)?, q),
                );
                for j in 0..i {
                    let qj = context.q(j);
                    immediates.insert(
                        format!("inv_q_i_{i}_mod_q_j_{j}"),
                        to_montgomery(inv_mod(q, qj)?, qj),
                    );
                }
                for (pt, plaintext) in info.plaintext_specific.iter().enumerate() {
                    let inv_t = inv_mod(plaintext.plaintext_modulus, q)?;
                    immediates.insert(
                        format!("neg_inv_t_{pt}_mod_q_i_{i}"),
                        to_montgomery(inv_t.wrapping_neg(), q),
                    );
                    immediates.insert(
                        format!("t_{pt}_mod_q_i_{i}"),
                        to_montgomery(plaintext.plaintext_modulus, q),
                    );
                }
            }

            immediates.insert("iN", (0x1_0000_0000u64 / context.n as u64) as u32);

            // The third base_change_matrix index is the relin key's digit
            // parameter, constant across the whole family.
            let k = info
                .plaintext_specific
                .first()
                .ok_or_else(|| DataError::MissingContextField("bgv plaintext_specific".into()))?
                .keys
                .relin_key
                .k;

            let key_rns = context.key_rns_num();
            let p = context.q(key_rns - 1);
            for i in 0..key_rns - 1 {
                let q = context.q(i);
                immediates.insert(
                    format!("inv_p_mod_q_i_{i}"),
                    to_montgomery(inv_mod(p, q)?, q),
                );
            }

            for l in 0..key_rns - 1 {
                for j in 0..key_rns {
                    let qj = context.q(j);
                    for i in 0..l + 1 {
                        let mut q_over_qi_mod_qj = 1u32;
                        for m in 0..key_rns {
                            if m != i {
                                q_over_qi_mod_qj = mul_mod(q_over_qi_mod_qj, context.q(m), qj)?;
                            }
                        }
                        immediates.insert(
                            format!("base_change_matrix_{i}_{j}_{k}"),
                            to_montgomery(q_over_qi_mod_qj, qj),
                        );
                        if i == j {
                            let qi = context.q(i);
                            immediates.insert(
                                format!("inv_punctured_prod_{i}_{i}"),
                                to_montgomery(inv_mod(q_over_qi_mod_qj, qi)?, qi),
                            );
                        }
                    }
                }
            }
        }
        SchemeInfo::Ckks(info) => {
            let extra = &info.metadata_extra;

            let dnum = context.dnum;
            let alpha = context.alpha;
            let size_q = context.q_size;
            let size_p = context.key_rns_num - size_q;
            if dnum == 0 || alpha == 0 {
                return Err(DataError::FieldOutOfRange(format!(
                    "CKKS key-switching shape requires alpha and dnum, got alpha {alpha} dnum {dnum}"
                )));
            }

            for i in 0..context.key_rns_num() {
                let q = context.q(i);
                immediates.insert(
                    format!("R2_{i}"),
                    pow_mod(MONT_R, 2u64, q as u64)? as u32,
                );
                immediates.insert(
                    format!("iN_{i}"),
                    to_montgomery(inv_mod(context.n, q)?, q),
                );
            }
            immediates.insert("iN", (0x1_0000_0000u64 / context.n as u64) as u32);

            // Mod-raise constants between the bottom two primes.
            let q0_inv_mod_q1 = inv_mod(context.q(0), context.q(1))?;
            let q1_inv_mod_q0 = inv_mod(context.q(1), context.q(0))?;
            immediates.insert("q0InvModq1", to_montgomery(q0_inv_mod_q1, context.q(1)));
            immediates.insert("q1InvModq0", to_montgomery(q1_inv_mod_q0, context.q(0)));

            // (Q/Q_i)^-1 mod q_j, zero for q_j outside Q_i.
            for i in 0..dnum {
                for j in 0..size_q {
                    let key = format!("partQHatInvModq_{}", index_key(&[i, j]));
                    immediates.insert(key.clone(), to_montgomery(lookup(extra, &key)?, context.q(j as usize)));
                }
            }

            // (Q^(i*alpha + j)_i / q_l)^-1 mod q_l within each digit.
            for i in 0..dnum {
                let digit_size = if i < dnum - 1 {
                    alpha
                } else {
                    size_q.checked_sub(alpha * (dnum - 1)).ok_or_else(|| {
                        DataError::FieldOutOfRange(format!(
                            "alpha {alpha} and dnum {dnum} overshoot q_size {size_q}"
                        ))
                    })?
                };
                for j in 0..digit_size {
                    for l in 0..j + 1 {
                        let key = format!("partQlHatInvModq_{}", index_key(&[i, j, l]));
                        immediates.insert(
                            key.clone(),
                            to_montgomery(lookup(extra, &key)?, context.q((alpha * i + l) as usize)),
                        );
                    }
                }
            }

            // (Q^(i)_j / q_l) mod q_s or p_s, for moduli outside the digit.
            // `idx` walks the complement of the digit inside [q_0 .. p_last].
            for i in 0..size_q {
                let beta = (i + 1).div_ceil(alpha);
                for j in 0..beta {
                    let digit_size = if j < beta - 1 {
                        alpha
                    } else {
                        (i + 1) - alpha * (beta - 1)
                    };
                    let size_compl = (i + 1) + size_p - digit_size;
                    for l in 0..digit_size {
                        for s in 0..size_compl {
                            let idx = if s < alpha * j {
                                s
                            } else if s < i + 1 - digit_size {
                                s + digit_size
                            } else {
                                s + digit_size + size_q - i - 1
                            };
                            let key = format!("partQlHatModp_{}", index_key(&[i, j, l, s]));
                            immediates.insert(
                                key.clone(),
                                to_montgomery(lookup(extra, &key)?, context.q(idx as usize)),
                            );
                        }
                    }
                }
            }

            for i in 0..size_q {
                let q = context.q(i as usize);
                for family in ["pInvModq", "pModq"] {
                    let key = format!("{family}_{i}");
                    immediates.insert(key.clone(), to_montgomery(lookup(extra, &key)?, q));
                }
            }

            for i in 0..size_p {
                let key = format!("pHatInvModp_{i}");
                immediates.insert(
                    key.clone(),
                    to_montgomery(lookup(extra, &key)?, context.q((i + size_q) as usize)),
                );
            }

            for i in 0..size_p {
                for j in 0..size_q {
                    let key = format!("pHatModq_{}", index_key(&[i, j]));
                    immediates.insert(key.clone(), to_montgomery(lookup(extra, &key)?, context.q(j as usize)));
                }
            }

            // Rescale constants: q_l is the prime being dropped.
            for i in 0..size_q.saturating_sub(1) {
                for j in 0..size_q - i - 1 {
                    for family in ["qlInvModq", "QlQlInvModqlDivqlModq"] {
                        let key = format!("{family}_{}", index_key(&[i, j]));
                        immediates.insert(
                            key.clone(),
                            to_montgomery(lookup(extra, &key)?, context.q(j as usize)),
                        );
                    }
                }
            }

            for i in 0..2usize {
                for j in 0..size_q as usize {
                    immediates.insert(
                        format!("qlModq_{i}_{j}"),
                        to_montgomery(context.q(i), context.q(j)),
                    );
                }
            }

            let boot_correction = lookup(extra, "boot_correction")?;
            for i in 0..32u32 {
                let val = 1u32 << i;
                for j in 0..size_q as usize {
                    immediates.insert(format!("bmu_{val}_{j}"), to_montgomery(val, context.q(j)));
                    if i == 0 {
                        immediates.insert(
                            format!("bmu_{boot_correction}"),
                            to_montgomery(boot_correction, context.q(j)),
                        );
                    }
                }
            }
        }
        SchemeInfo::Bfv => return Err(DataError::UnsupportedScheme(Scheme::Bfv)),
    }

    Ok(immediates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_contexts::{bgv_context_n16, ckks_context_n16};

    #[test]
    fn bgv_per_prime_immediates() {
        let immediates = extract_immediates(&bgv_context_n16()).unwrap();

        assert_eq!(immediates.get("one"), Some(1));
        assert_eq!(immediates.get("iN"), Some(0x1000_0000));
        assert_eq!(immediates.get("R2_0"), Some(61));
        assert_eq!(immediates.get("R2_1"), Some(84));
        assert_eq!(immediates.get("iN_0"), Some(81));
        assert_eq!(immediates.get("iN_1"), Some(55));

        assert_eq!(immediates.get("inv_q_i_1_mod_q_j_0"), Some(62));
        assert_eq!(immediates.get("inv_q_i_0_mod_q_j_1"), None);

        assert_eq!(immediates.get("neg_inv_t_0_mod_q_i_0"), Some(92));
        assert_eq!(immediates.get("t_0_mod_q_i_0"), Some(70));
        assert_eq!(immediates.get("neg_inv_t_0_mod_q_i_1"), Some(30));
        assert_eq!(immediates.get("t_0_mod_q_i_1"), Some(23));

        assert_eq!(immediates.get("inv_p_mod_q_i_0"), Some(62));
        assert_eq!(immediates.get("inv_p_mod_q_i_1"), None);
    }

    #[test]
    fn bgv_base_change_matrix_uses_the_relin_digit_parameter() {
        let immediates = extract_immediates(&bgv_context_n16()).unwrap();

        // k = 1 comes from the relin key, not a loop index.
        assert_eq!(immediates.get("base_change_matrix_0_0_1"), Some(62));
        assert_eq!(immediates.get("base_change_matrix_0_1_1"), Some(0));
        assert_eq!(immediates.get("base_change_matrix_0_0_0"), None);
        assert_eq!(immediates.get("inv_punctured_prod_0_0"), Some(62));
    }

    #[test]
    fn ckks_families_cover_the_key_switching_shape() {
        let ctx = ckks_context_n16();
        let immediates = extract_immediates(&ctx).unwrap();

        assert_eq!(immediates.get("one"), Some(1));
        assert!(immediates.get("q0InvModq1").is_some());
        assert!(immediates.get("q1InvModq0").is_some());

        // partQHatInvModq_0_1 holds 1 and is encoded mod q_1 = 193.
        assert_eq!(immediates.get("partQHatInvModq_0_1"), Some(to_montgomery(1, 193)));
        // partQlHatInvModq_0_1_1 holds 3 and is encoded mod q_1.
        assert_eq!(
            immediates.get("partQlHatInvModq_0_1_1"),
            Some(to_montgomery(3, 193))
        );
        // The complement index for i = 1 lands on the extension prime q_2.
        assert_eq!(
            immediates.get("partQlHatModp_1_0_0_0"),
            Some(to_montgomery(6, 257))
        );

        assert_eq!(immediates.get("pHatInvModp_0"), Some(to_montgomery(12, 257)));
        assert_eq!(immediates.get("qlInvModq_0_0"), Some(to_montgomery(15, 97)));
        assert!(immediates.get("qlModq_1_0").is_some());

        // A disabled boot correction still produces its (zero) entry.
        assert_eq!(immediates.get("bmu_0"), Some(0));
        assert_eq!(immediates.get("bmu_1_0"), Some(to_montgomery(1, 97)));
        assert_eq!(
            immediates.get(&format!("bmu_{}_1", 1u32 << 31)),
            Some(to_montgomery(1 << 31, 193))
        );
    }

    #[test]
    fn missing_metadata_extra_entry_is_fatal() {
        let mut ctx = ckks_context_n16();
        if let crate::context::SchemeInfo::Ckks(info) = &mut ctx.info {
            info.metadata_extra.remove("pInvModq_0");
        }
        assert!(matches!(
            extract_immediates(&ctx),
            Err(DataError::MissingContextField(key)) if key == "pInvModq_0"
        ));
    }

    #[test]
    fn bfv_has_no_immediate_families() {
        let mut ctx = bgv_context_n16();
        ctx.scheme = Scheme::Bfv;
        ctx.info = SchemeInfo::Bfv;
        assert!(matches!(
            extract_immediates(&ctx),
            Err(DataError::UnsupportedScheme(Scheme::Bfv))
        ));
    }
}
