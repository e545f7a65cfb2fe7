//! Lifted-program intermediate representation

pub mod display;
pub mod instr;
pub mod verify;

pub use instr::{Block, BlockId, IrOp, Lifted, Note, Program, Terminator};
pub use verify::{verify, VerifyError};
