use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("operand is not of the form name-order-rns: {0}")]
    MalformedOperand(String),

    #[error("malformed trace row: {0}")]
    MalformedRow(String),

    #[error("operation {0} is missing a required argument: {1}")]
    MissingArgument(String, &'static str),

    #[error("row for {op} carries {given} arguments but the descriptor lists {expected}")]
    TooManyArguments {
        op: String,
        given: usize,
        expected: usize,
    },

    #[error("unsupported trace format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
