//! chiplift engine: static CHIP-8 binary translation
//!
//! Lifts a CHIP-8 ROM (16-bit big-endian instruction words, loaded at 0x200)
//! into a structured control-flow IR, verifies it, and executes it once
//! through a Cranelift JIT backend.
//!
//! Pipeline:
//!
//! ```text
//! ROM bytes -> isa::decode -> lift::lift_program -> ir::Program
//!                                                      |
//!                                  ir::verify ---------+
//!                                                      v
//!                              jit::Chip8Jit (feature "jit") -> native run
//! ```
//!
//! The lifter is the interesting part: it reconstructs basic blocks from an
//! address space with no code/data boundaries, deferring forward jump targets
//! and splitting already-emitted blocks for backward ones, and turns the
//! ISA's "skip next instruction" model into structured two-way branches that
//! re-merge after a single instruction.

pub mod isa;
pub mod ir;
pub mod lift;
pub mod render;
pub mod vm;

#[cfg(feature = "jit")]
pub mod jit;

pub use ir::instr::{Block, BlockId, Lifted, Program, Terminator};
pub use lift::lifter::{lift_program, LiftReport};
pub use lift::ranges::CodeRanges;
pub use vm::VmState;
