use pisa_arith::ArithError;
use thiserror::Error;

/// Failures of the data layer: context validation, manifest parsing,
/// metadata extraction and the underlying I/O.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("manifest has no sections")]
    MalformedManifest,

    #[error("missing context field: {0}")]
    MissingContextField(String),

    #[error("missing symbol: {0}")]
    MissingSymbol(String),

    #[error("context field out of range: {0}")]
    FieldOutOfRange(String),

    #[error("operation requires a {expected:?} context but the scheme is {found:?}")]
    SchemeMismatch {
        expected: crate::context::Scheme,
        found: crate::context::Scheme,
    },

    #[error("metadata extraction is not defined for scheme {0:?}")]
    UnsupportedScheme(crate::context::Scheme),

    #[error("symbol name is not of the form root_order_rns: {0}")]
    MalformedSymbol(String),

    #[error("polynomial length {0} is not a power of two")]
    NonPowerOfTwoDegree(usize),

    #[error(transparent)]
    Arith(#[from] ArithError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
