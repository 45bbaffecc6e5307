use thiserror::Error;

/// Failures of external kernel-generator invocations.
#[derive(Debug, Error)]
pub enum KernelGenError {
    #[error("failed to spawn kernel generator: {0}")]
    Spawn(std::io::Error),

    #[error("kernel generator exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    #[error("kernel generator timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("kernel generator output is not parseable P-ISA: {0}")]
    UnparseableOutput(String),
}

/// Failures of the lowering pipeline.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("unknown P-ISA opcode: {0}")]
    UnknownOpcode(String),

    #[error("malformed P-ISA line: {0}")]
    MalformedInstruction(String),

    #[error("instruction graph contains a cycle")]
    CyclicIr,

    #[error("mac instruction has no input matching its output register {0}")]
    InvalidMacInstruction(String),

    #[error(
        "operand shape mismatch for {symbol}: produced as order {produced_order} rns \
         {produced_rns}, consumed as order {consumed_order} rns {consumed_rns}"
    )]
    ShapeMismatch {
        symbol: String,
        produced_order: u32,
        produced_rns: u32,
        consumed_order: u32,
        consumed_rns: u32,
    },

    #[error("kernel generation failed: {0}")]
    KernelGen(#[from] KernelGenError),

    #[error(transparent)]
    Trace(#[from] pisa_trace::TraceError),

    #[error(transparent)]
    Data(#[from] pisa_data::DataError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
