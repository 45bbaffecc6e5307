//! Compile-time operation descriptors.
//!
//! Each descriptor lists the positional argument kinds of one polynomial
//! operation as it appears in a trace row. Scheme-wide kinds (`FheScheme`,
//! `PolymodDegLog2`, `KeyRns`, `Alpha`, `QSize`, `Dnum`) are dispatched to
//! the enclosing program; the rest land on the operation itself.

/// Kind of one positional argument in a trace row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    OpName,
    FheScheme,
    PolymodDegLog2,
    KeyRns,
    OutputArgument,
    InputArgument,
    InputOutputArgument,
    CipherDegree,
    RnsTerm,
    GaloisElt,
    Factor,
    Alpha,
    QSize,
    Dnum,
}

/// Layout of one operation: the name used when a kernel is requested for it
/// and the positional kinds of its trace arguments.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    pub op_name: &'static str,
    pub params: &'static [ParamKind],
}

use ParamKind::*;

const BINARY_OP: &[ParamKind] = &[
    OpName,
    FheScheme,
    PolymodDegLog2,
    KeyRns,
    OutputArgument,
    InputArgument,
    InputArgument,
];

const UNARY_OP: &[ParamKind] = &[
    OpName,
    FheScheme,
    PolymodDegLog2,
    KeyRns,
    OutputArgument,
    InputArgument,
];

const RELIN: &[ParamKind] = &[
    OpName,
    FheScheme,
    PolymodDegLog2,
    KeyRns,
    OutputArgument,
    InputArgument,
    Alpha,
    QSize,
    Dnum,
];

const RESCALE: &[ParamKind] = &[
    OpName,
    FheScheme,
    PolymodDegLog2,
    KeyRns,
    OutputArgument,
    InputArgument,
    QSize,
];

const ROTATE: &[ParamKind] = &[
    OpName,
    FheScheme,
    PolymodDegLog2,
    KeyRns,
    OutputArgument,
    InputArgument,
    GaloisElt,
    Alpha,
    QSize,
    Dnum,
];

/// Looks up the descriptor for a trace opcode. `mod_switch` rows produce an
/// operation named `mod`, and `mod` is accepted back so written traces
/// reparse.
pub fn descriptor(op: &str) -> Option<OperationDescriptor> {
    let (op_name, params): (&'static str, &'static [ParamKind]) = match op {
        "add" | "add_plain" => ("add", BINARY_OP),
        "sub" => ("sub", BINARY_OP),
        "mul" | "mul_plain" => ("mul", BINARY_OP),
        "square" => ("square", UNARY_OP),
        "ntt" => ("ntt", UNARY_OP),
        "intt" => ("intt", UNARY_OP),
        "mod_switch" | "mod" => ("mod", UNARY_OP),
        "relin" => ("relin", RELIN),
        "rescale" => ("rescale", RESCALE),
        "rotate" => ("rotate", ROTATE),
        _ => return None,
    };
    Some(OperationDescriptor { op_name, params })
}
