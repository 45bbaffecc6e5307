//! Polynomial-program IR and trace I/O.
//!
//! A *polynomial program* is the ordered list of FHE-level operations the
//! lowering consumes: adds, multiplies, NTTs, relinearizations and friends,
//! each with named operands of a known `(order, rns)` shape. This crate
//! models the program ([`program::PolyProgram`]), the wire-level trace it is
//! parsed from ([`wire::Trace`], binary) and the CSV form used for debugging
//! and interchange ([`csv`]), plus the conversions between them.
//!
//! Operation argument layouts are driven by the compile-time descriptor
//! table in [`descriptors`]; an opcode missing from the table is a parse
//! error, not a lookup miss at use time.

pub mod csv;
pub mod descriptors;
pub mod program;
pub mod wire;

mod error;

pub use error::TraceError;
pub use program::{PolyOperand, PolyOperation, PolyProgram};
