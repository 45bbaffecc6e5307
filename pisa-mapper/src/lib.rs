//! Lowering of polynomial programs to flat P-ISA instruction streams.
//!
//! The pipeline mirrors the data flow of the toolchain: each FHE-level
//! operation of a [`pisa_trace::PolyProgram`] is expanded into a *kernel* of
//! P-ISA instructions by an external generator (cached on disk by
//! [`kernel::KernelCache`]), the kernel's boundary symbols are renamed into
//! the program-wide namespace ([`kernel::Kernel`]), the concatenated stream
//! is rewritten over a data-flow graph ([`optimizer::GraphOptimizer`]:
//! single-assignment renaming, MULI/MAC operand ordering, duplicate-input
//! separation, topological linearization) and finally written out together
//! with its memory manifest ([`emitter`]).
//!
//! [`mapper::ProgramMapper`] drives the whole sequence; everything it
//! depends on is also usable piecemeal.

pub mod emitter;
pub mod graph;
pub mod isa;
pub mod kernel;
pub mod mapper;
pub mod optimizer;
pub mod process;

mod error;

pub use error::{KernelGenError, MapperError};
pub use isa::{Opcode, Operand, PisaInstruction, WParam};
pub use mapper::{MapperOptions, ProgramMapper};
