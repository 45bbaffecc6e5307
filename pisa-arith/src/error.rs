use thiserror::Error;

/// Failures of the modular arithmetic primitives.
///
/// Both variants are recoverable: callers either validated their moduli up
/// front or probe invertibility with [`crate::try_inv_mod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithError {
    /// A reduction was requested modulo zero.
    #[error("modulus cannot be zero")]
    InvalidModulus,
    /// A modular inverse was requested for a value not coprime to the modulus.
    #[error("value has no inverse under the given modulus")]
    GcdNotOne,
}
