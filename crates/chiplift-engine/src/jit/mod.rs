//! Cranelift execution backend
//!
//! Lowers a verified program to Cranelift IR, JIT-compiles it into a
//! `cranelift_jit::JITModule` with the runtime shims registered as symbols,
//! and runs the generated entry point once.

pub mod engine;
pub mod lowering;
pub mod runtime;

pub use engine::{Chip8Jit, JitError};
pub use lowering::LowerError;
