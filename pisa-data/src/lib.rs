//! FHE context, polynomial layouts and metadata extraction.
//!
//! This crate owns the data side of the lowering toolchain:
//!
//! - [`layouts`] defines the RNS polynomial containers a trace operates on
//!   (single residue polynomials up to key-switching key sets) together with
//!   their little-endian wire encoding.
//! - [`context`] holds the immutable [`context::FheContext`] describing the
//!   cryptographic setup: ring dimension, RNS primes, 2N-th roots of unity
//!   and the scheme-specific key material.
//! - [`manifest`] implements the `[section] key=value` text manifests that
//!   tie multi-file context/test-vector dumps together, and [`store`] the
//!   split rules for writing and reassembling them.
//! - [`metadata`] computes the named tables an emitted P-ISA program
//!   references: per-prime powers of the 2N-th roots in bit-reversed
//!   Montgomery form, NTT/INTT twiddles, and the scalar immediates of the
//!   RNS base-change and key-switching arithmetic.

pub mod context;
pub mod layouts;
pub mod manifest;
pub mod metadata;
pub mod store;

mod error;
mod serialization;

pub use error::DataError;
pub use serialization::{ReaderFrom, WriterTo};
