use crate::context::FheContext;
use crate::metadata::MetadataParams;

/// Scalar parameters describing the key-switching shape. `dnum` duplicates
/// `digit_size`; both names are emitted until downstream consumers agree on
/// one.
pub fn extract_params(context: &FheContext) -> MetadataParams {
    let mut params = MetadataParams::default();
    params
        .sym_param_map
        .insert("key_rns_num".to_owned(), context.key_rns_num);
    params
        .sym_param_map
        .insert("digit_size".to_owned(), context.dnum);
    params
        .sym_param_map
        .insert("q_size".to_owned(), context.q_size);
    params.sym_param_map.insert("alpha".to_owned(), context.alpha);
    params.sym_param_map.insert("dnum".to_owned(), context.dnum);
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_contexts::ckks_context_n16;

    #[test]
    fn params_mirror_the_context_shape() {
        let params = extract_params(&ckks_context_n16());
        assert_eq!(params.sym_param_map["key_rns_num"], 3);
        assert_eq!(params.sym_param_map["q_size"], 2);
        assert_eq!(params.sym_param_map["alpha"], 2);
        assert_eq!(params.sym_param_map["dnum"], 1);
        assert_eq!(params.sym_param_map["digit_size"], 1);
    }
}
