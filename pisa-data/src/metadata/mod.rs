//! Precomputed tables derived from an [`FheContext`].
//!
//! The emitted P-ISA program references polynomials, twiddle factors and
//! scalar immediates by name; this module computes them. Polynomial tables
//! are stored in bit-reversed Montgomery form, twiddles in Montgomery form
//! without bit reversal, and immediates in Montgomery form unless noted on
//! the producing routine.

mod flatten;
mod immediates;
mod params;
mod polys;
mod twiddles;

use std::collections::BTreeMap;

use crate::context::FheContext;
use crate::error::DataError;
use crate::layouts::{Polynomial, RnsPolynomial};

pub use flatten::{
    bit_reverse_vec, flatten_ciphertext, flatten_key_switch, from_montgomery_rns, index_key,
    split_symbol_name, to_montgomery_vec,
};
pub use polys::{convert_polys_to_testvector, extract_polys, extract_testvector_polys};

pub use immediates::extract_immediates;
pub use params::extract_params;
pub use twiddles::extract_twiddles;

/// Named polynomial tables, each a single residue polynomial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolySymbols {
    pub sym_poly_map: BTreeMap<String, RnsPolynomial>,
}

impl PolySymbols {
    pub fn insert(&mut self, name: impl Into<String>, poly: RnsPolynomial) {
        self.sym_poly_map.insert(name.into(), poly);
    }

    pub fn get(&self, name: &str) -> Option<&RnsPolynomial> {
        self.sym_poly_map.get(name)
    }
}

/// NTT/INTT twiddle tables. Keyed by `"default"` for the standard transform
/// and by the decimal Galois element for rotation-fused inverse transforms;
/// each entry carries one length-N/2 residue polynomial per RNS prime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTwiddles {
    pub ntt: BTreeMap<String, Polynomial>,
    pub intt: BTreeMap<String, Polynomial>,
    pub only_power_of_two: bool,
}

/// Named scalar immediates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataImmediates {
    pub sym_immediate_map: BTreeMap<String, u32>,
}

impl MetadataImmediates {
    pub fn insert(&mut self, name: impl Into<String>, value: u32) {
        self.sym_immediate_map.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.sym_immediate_map.get(name).copied()
    }
}

/// Named scalar parameters describing the key-switching shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataParams {
    pub sym_param_map: BTreeMap<String, u32>,
}

/// Everything the emitter and downstream consumers need from a context.
#[derive(Debug, Clone, Default)]
pub struct MetadataBundle {
    pub polys: PolySymbols,
    pub twiddles: MetadataTwiddles,
    pub immediates: MetadataImmediates,
    pub params: MetadataParams,
}

impl MetadataBundle {
    pub fn extract(context: &FheContext) -> Result<Self, DataError> {
        context.validate()?;
        Ok(Self {
            polys: extract_polys(context)?,
            twiddles: extract_twiddles(context)?,
            immediates: extract_immediates(context)?,
            params: extract_params(context),
        })
    }
}
